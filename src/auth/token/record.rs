//! Access token record, its lifecycle state machine, and its builder.

// self
use crate::{
	_prelude::*,
	auth::{
		AccountId, TokenId,
		token::{
			kind::{Permission, TokenRole, TokenStatus},
			secret::TokenSecret,
		},
	},
};

/// Default lifetime of a site token.
pub const SITE_TOKEN_TTL: Duration = Duration::seconds(3600);

/// Errors produced while constructing or mutating a [`Token`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenError {
	/// Requested permission level is outside `login..=delete`.
	#[error("Permission code {code} is not a valid requirement.")]
	InvalidPermission {
		/// Rejected permission code.
		code: u8,
	},
	/// Role code is unknown.
	#[error("Role code {code} is unknown.")]
	InvalidRole {
		/// Rejected role code.
		code: u8,
	},
	/// Status code is unknown.
	#[error("Status code {code} is unknown.")]
	InvalidStatus {
		/// Rejected status code.
		code: u8,
	},
	/// Random source or hashing failed while minting the secret.
	#[error("Token generation failed: {message}.")]
	GenerationFailed {
		/// Underlying failure message.
		message: String,
	},
	/// The lifecycle does not allow the requested status change.
	#[error("Token cannot move from {from} to {to}.")]
	InvalidTransition {
		/// Current status.
		from: TokenStatus,
		/// Requested status.
		to: TokenStatus,
	},
	/// The store already assigned an identifier to this token.
	#[error("Token already carries identifier {id}.")]
	IdAlreadyAssigned {
		/// Identifier already present on the token.
		id: TokenId,
	},
}

/// Access token with a fixed role and permission level and a status lifecycle.
///
/// Timestamps are Unix seconds. `expires == 0` means the token never expires and
/// `deleted == 0` means it was never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	#[serde(default)]
	id: Option<TokenId>,
	access_token: TokenSecret,
	#[serde(default, deserialize_with = "unbound_as_zero::deserialize")]
	account_id: Option<AccountId>,
	role: TokenRole,
	permissions: Permission,
	status: TokenStatus,
	created: i64,
	#[serde(rename = "lastmodified")]
	last_modified: i64,
	expires: i64,
	deleted: i64,
}
impl Token {
	/// Returns a builder for a token with the provided role.
	pub fn builder(role: TokenRole) -> TokenBuilder {
		TokenBuilder::new(role)
	}

	/// Creates an unclassified token: no role, no permissions, never expires.
	pub fn new() -> Result<Self, TokenError> {
		Self::builder(TokenRole::None).build()
	}

	/// Creates an enabled, non-expiring account token with the requested permissions.
	pub fn for_account(account: AccountId, permissions: Permission) -> Result<Self, TokenError> {
		if !permissions.is_requirable() {
			return Err(TokenError::InvalidPermission { code: permissions.code() });
		}

		Self::builder(TokenRole::Account)
			.account(account)
			.permissions(permissions)
			.status(TokenStatus::Enabled)
			.build()
	}

	/// Creates an enabled site token without an owner that expires after `ttl`.
	pub fn site(ttl: Duration) -> Result<Self, TokenError> {
		Self::builder(TokenRole::Site).status(TokenStatus::Enabled).expires_in(ttl).build()
	}

	/// Creates an enabled site token with write permissions for the account, expiring after
	/// `ttl`.
	pub fn site_for_account(account: AccountId, ttl: Duration) -> Result<Self, TokenError> {
		Self::builder(TokenRole::Site)
			.account(account)
			.permissions(Permission::Write)
			.status(TokenStatus::Enabled)
			.expires_in(ttl)
			.build()
	}

	/// Store-assigned identifier, if the token has been persisted.
	pub fn id(&self) -> Option<TokenId> {
		self.id
	}

	/// Secret used to look the token up. Callers must avoid logging it.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Owning account, if any.
	pub fn account_id(&self) -> Option<AccountId> {
		self.account_id
	}

	/// Role fixed at construction.
	pub fn role(&self) -> TokenRole {
		self.role
	}

	/// Permission level fixed at construction.
	pub fn permissions(&self) -> Permission {
		self.permissions
	}

	/// Stored lifecycle status.
	pub fn status(&self) -> TokenStatus {
		self.status
	}

	/// Creation instant.
	pub fn created(&self) -> i64 {
		self.created
	}

	/// Last mutation instant.
	pub fn last_modified(&self) -> i64 {
		self.last_modified
	}

	/// Expiry instant, `0` if the token never expires.
	pub fn expires(&self) -> i64 {
		self.expires
	}

	/// Deletion instant, `0` if the token was never deleted.
	pub fn deleted(&self) -> i64 {
		self.deleted
	}

	/// Records the store-assigned identifier. Identifiers never change once set.
	pub fn assign_id(&mut self, id: TokenId) -> Result<(), TokenError> {
		if let Some(existing) = self.id {
			return Err(TokenError::IdAlreadyAssigned { id: existing });
		}

		self.id = Some(id);

		Ok(())
	}

	/// Stamps the last-modified instant.
	pub fn touch(&mut self, now: i64) {
		self.last_modified = now;
	}

	/// Returns `true` if the token is enabled and unexpired at `now`.
	pub fn is_active_at(&self, now: i64) -> bool {
		self.status == TokenStatus::Enabled && !self.is_expired_at(now)
	}

	/// Returns `true` if the token is enabled and unexpired relative to the current clock.
	pub fn is_active(&self) -> bool {
		self.is_active_at(unix_now())
	}

	/// Returns `true` if the token carries an expiry and `now` has reached it.
	pub fn is_expired_at(&self, now: i64) -> bool {
		self.expires != 0 && now >= self.expires
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(unix_now())
	}

	/// Checks whether the token grants at least `required`.
	///
	/// Fails with [`TokenError::InvalidPermission`] when `required` is [`Permission::None`].
	pub fn has_permissions(&self, required: Permission) -> Result<bool, TokenError> {
		if !required.is_requirable() {
			return Err(TokenError::InvalidPermission { code: required.code() });
		}

		Ok(self.permissions >= required)
	}

	/// Returns `true` for site-session tokens.
	pub fn is_site_token(&self) -> bool {
		self.role == TokenRole::Site
	}

	/// Returns `true` for service-to-service tokens.
	pub fn is_infrastructure_token(&self) -> bool {
		self.role == TokenRole::Infrastructure
	}

	/// Returns `true` for durable account tokens.
	pub fn is_account_token(&self) -> bool {
		self.role == TokenRole::Account
	}

	/// Moves a freshly constructed token into the enabled state.
	pub fn enable(&mut self, now: i64) -> Result<(), TokenError> {
		self.transition(TokenStatus::Enabled, now)
	}

	/// Switches the token off without deleting it.
	pub fn disable(&mut self, now: i64) -> Result<(), TokenError> {
		self.transition(TokenStatus::Disabled, now)
	}

	/// Marks the token deleted and stamps the deletion instant.
	pub fn mark_deleted(&mut self, now: i64) -> Result<(), TokenError> {
		self.transition(TokenStatus::Deleted, now)?;
		self.deleted = now;

		Ok(())
	}

	fn transition(&mut self, to: TokenStatus, now: i64) -> Result<(), TokenError> {
		if !self.status.can_transition_to(to) {
			return Err(TokenError::InvalidTransition { from: self.status, to });
		}

		self.status = to;
		self.last_modified = now;

		Ok(())
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug)]
pub struct TokenBuilder {
	role: TokenRole,
	account_id: Option<AccountId>,
	permissions: Permission,
	status: TokenStatus,
	access_token: Option<TokenSecret>,
	created: Option<i64>,
	expires: Option<i64>,
	expires_in: Option<Duration>,
}
impl TokenBuilder {
	fn new(role: TokenRole) -> Self {
		Self {
			role,
			account_id: None,
			permissions: Permission::None,
			status: TokenStatus::None,
			access_token: None,
			created: None,
			expires: None,
			expires_in: None,
		}
	}

	/// Binds the token to an account.
	pub fn account(mut self, account: AccountId) -> Self {
		self.account_id = Some(account);

		self
	}

	/// Sets the permission level.
	pub fn permissions(mut self, permissions: Permission) -> Self {
		self.permissions = permissions;

		self
	}

	/// Sets the initial status.
	pub fn status(mut self, status: TokenStatus) -> Self {
		self.status = status;

		self
	}

	/// Uses a caller-supplied secret instead of minting one.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the creation instant (Unix seconds); defaults to the current clock.
	pub fn created(mut self, instant: i64) -> Self {
		self.created = Some(instant);

		self
	}

	/// Sets an absolute expiry instant (Unix seconds); `0` means never.
	pub fn expires(mut self, instant: i64) -> Self {
		self.expires = Some(instant);

		self
	}

	/// Sets a relative expiry from the creation instant.
	pub fn expires_in(mut self, ttl: Duration) -> Self {
		self.expires_in = Some(ttl);

		self
	}

	/// Consumes the builder and produces a [`Token`], minting a secret when none was supplied.
	pub fn build(self) -> Result<Token, TokenError> {
		let created = self.created.unwrap_or_else(unix_now);
		let access_token = match self.access_token {
			Some(secret) => secret,
			None => TokenSecret::generate(created)?,
		};
		let expires = match (self.expires, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(ttl)) => created.saturating_add(ttl.whole_seconds()),
			(None, None) => 0,
		};

		Ok(Token {
			id: None,
			access_token,
			account_id: self.account_id,
			role: self.role,
			permissions: self.permissions,
			status: self.status,
			created,
			last_modified: created,
			expires,
			deleted: 0,
		})
	}
}

/// Reads `account_id` as `null`, a positive id, or `0` for a token bound to no account.
mod unbound_as_zero {
	// crates.io
	use serde::{Deserializer, de::Error as _};
	// self
	use crate::{_prelude::*, auth::AccountId};

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<AccountId>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<i64>::deserialize(deserializer)? {
			None | Some(0) => Ok(None),
			Some(raw) => AccountId::new(raw).map(Some).map_err(D::Error::custom),
		}
	}
}

fn unix_now() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}
