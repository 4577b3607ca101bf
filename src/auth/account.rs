//! Account model that site tokens are bound to.

// self
use crate::{_prelude::*, auth::AccountId};

const USERNAME_MAX_LEN: usize = 64;

/// Lifecycle status of an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccountStatus {
	/// Registered but not yet confirmed.
	#[default]
	Pending = 0,
	/// Allowed to sign in.
	Enabled = 1,
	/// Locked out.
	Disabled = 2,
	/// Terminal state.
	Deleted = 3,
}
impl AccountStatus {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Enabled => "enabled",
			Self::Disabled => "disabled",
			Self::Deleted => "deleted",
		}
	}
}
impl From<AccountStatus> for u8 {
	fn from(value: AccountStatus) -> Self {
		value as u8
	}
}
impl TryFrom<u8> for AccountStatus {
	type Error = AccountError;

	fn try_from(code: u8) -> Result<Self, Self::Error> {
		match code {
			0 => Ok(Self::Pending),
			1 => Ok(Self::Enabled),
			2 => Ok(Self::Disabled),
			3 => Ok(Self::Deleted),
			_ => Err(AccountError::InvalidStatus { code }),
		}
	}
}
impl Display for AccountStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Errors raised while building or mutating an [`Account`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum AccountError {
	/// Email address failed validation.
	#[error("Email address `{email}` is invalid.")]
	InvalidEmail {
		/// Rejected address.
		email: String,
	},
	/// Username failed validation.
	#[error("Username is invalid: {reason}.")]
	InvalidUsername {
		/// Why the username was rejected.
		reason: &'static str,
	},
	/// Status code is unknown.
	#[error("Account status code {code} is unknown.")]
	InvalidStatus {
		/// Rejected status code.
		code: u8,
	},
	/// Deleted accounts cannot change status.
	#[error("Account cannot move from {from} to {to}.")]
	InvalidTransition {
		/// Current status.
		from: AccountStatus,
		/// Requested status.
		to: AccountStatus,
	},
	/// The store already assigned an identifier to this account.
	#[error("Account already carries identifier {id}.")]
	IdAlreadyAssigned {
		/// Identifier already present on the account.
		id: AccountId,
	},
}

/// User account owning site tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	#[serde(default)]
	id: Option<AccountId>,
	email: String,
	username: String,
	status: AccountStatus,
	created: i64,
	#[serde(rename = "lastmodified")]
	last_modified: i64,
}
impl Account {
	/// Creates a pending account after validating the email address and username.
	pub fn new(email: &str, username: &str) -> Result<Self, AccountError> {
		let email = normalize_email(email)?;

		validate_username(username)?;

		let now = OffsetDateTime::now_utc().unix_timestamp();

		Ok(Self {
			id: None,
			email,
			username: username.to_owned(),
			status: AccountStatus::Pending,
			created: now,
			last_modified: now,
		})
	}

	/// Store-assigned identifier, if the account has been persisted.
	pub fn id(&self) -> Option<AccountId> {
		self.id
	}

	/// Normalized (lowercase) email address.
	pub fn email(&self) -> &str {
		&self.email
	}

	/// Display username.
	pub fn username(&self) -> &str {
		&self.username
	}

	/// Current status.
	pub fn status(&self) -> AccountStatus {
		self.status
	}

	/// Creation instant (Unix seconds).
	pub fn created(&self) -> i64 {
		self.created
	}

	/// Last mutation instant (Unix seconds).
	pub fn last_modified(&self) -> i64 {
		self.last_modified
	}

	/// Disabled and deleted accounts are inactive; pending accounts count as active.
	pub fn is_active(&self) -> bool {
		!matches!(self.status, AccountStatus::Disabled | AccountStatus::Deleted)
	}

	/// Records the store-assigned identifier.
	pub fn assign_id(&mut self, id: AccountId) -> Result<(), AccountError> {
		if let Some(existing) = self.id {
			return Err(AccountError::IdAlreadyAssigned { id: existing });
		}

		self.id = Some(id);

		Ok(())
	}

	/// Stamps the last-modified instant.
	pub fn touch(&mut self, now: i64) {
		self.last_modified = now;
	}

	/// Enables the account.
	pub fn enable(&mut self, now: i64) -> Result<(), AccountError> {
		self.set_status(AccountStatus::Enabled, now)
	}

	/// Disables the account.
	pub fn disable(&mut self, now: i64) -> Result<(), AccountError> {
		self.set_status(AccountStatus::Disabled, now)
	}

	/// Marks the account deleted.
	pub fn mark_deleted(&mut self, now: i64) -> Result<(), AccountError> {
		self.set_status(AccountStatus::Deleted, now)
	}

	fn set_status(&mut self, to: AccountStatus, now: i64) -> Result<(), AccountError> {
		if self.status == AccountStatus::Deleted {
			return Err(AccountError::InvalidTransition { from: self.status, to });
		}

		self.status = to;
		self.last_modified = now;

		Ok(())
	}
}

fn normalize_email(raw: &str) -> Result<String, AccountError> {
	let email = raw.trim().to_lowercase();
	let invalid = || AccountError::InvalidEmail { email: raw.to_owned() };

	if email.chars().any(char::is_whitespace) {
		return Err(invalid());
	}

	let (local, domain) = email.split_once('@').ok_or_else(invalid)?;

	if local.is_empty() || domain.contains('@') || !domain.contains('.') {
		return Err(invalid());
	}
	if domain.starts_with('.') || domain.ends_with('.') {
		return Err(invalid());
	}

	Ok(email)
}

fn validate_username(username: &str) -> Result<(), AccountError> {
	if username.is_empty() {
		return Err(AccountError::InvalidUsername { reason: "empty" });
	}
	if username.chars().count() > USERNAME_MAX_LEN {
		return Err(AccountError::InvalidUsername { reason: "longer than 64 characters" });
	}
	if !username.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
		return Err(AccountError::InvalidUsername {
			reason: "only letters, digits, `_`, and `-` are allowed",
		});
	}

	Ok(())
}
