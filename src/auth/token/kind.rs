//! Token role, permission, and status enumerations with their stable wire codes.

// self
use crate::{_prelude::*, auth::token::record::TokenError};

macro_rules! def_code_enum {
	(
		$(#[$meta:meta])*
		$name:ident, $err:expr, {
			$($(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal,)+
		}
	) => {
		$(#[$meta])*
		#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "u8", into = "u8")]
		pub enum $name {
			#[default]
			$($(#[$vmeta])* $variant = $code,)+
		}
		impl $name {
			/// Returns the stable integer code persisted for this value.
			pub const fn code(self) -> u8 {
				self as u8
			}

			/// Returns a stable label suitable for span or log fields.
			pub const fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $label,)+
				}
			}
		}
		impl From<$name> for u8 {
			fn from(value: $name) -> Self {
				value.code()
			}
		}
		impl TryFrom<u8> for $name {
			type Error = TokenError;

			fn try_from(code: u8) -> Result<Self, Self::Error> {
				match code {
					$($code => Ok(Self::$variant),)+
					_ => Err($err(code)),
				}
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(self.as_str())
			}
		}
	};
}

def_code_enum! {
	/// What a token stands for; fixed when the token is constructed.
	TokenRole, |code| TokenError::InvalidRole { code }, {
		/// Unclassified token.
		None = 0 => "none",
		/// Durable account-level credential.
		Account = 1 => "account",
		/// Short-lived browser/site session token.
		Site = 2 => "site",
		/// Service-to-service credential.
		Infrastructure = 3 => "infrastructure",
	}
}

def_code_enum! {
	/// Capability level granted to a token, ordered from least to most capable.
	Permission, |code| TokenError::InvalidPermission { code }, {
		/// No capability; never a valid requirement.
		None = 0 => "none",
		/// May sign in.
		Login = 1 => "login",
		/// May read.
		Read = 2 => "read",
		/// May write.
		Write = 3 => "write",
		/// May delete.
		Delete = 4 => "delete",
	}
}

def_code_enum! {
	/// Stored lifecycle status of a token. Expiry is derived and has no status of its own.
	TokenStatus, |code| TokenError::InvalidStatus { code }, {
		/// Constructed but not yet enabled.
		None = 0 => "none",
		/// Usable until it expires.
		Enabled = 1 => "enabled",
		/// Switched off; may still be deleted.
		Disabled = 2 => "disabled",
		/// Terminal state.
		Deleted = 3 => "deleted",
	}
}

impl Permission {
	/// Returns `true` for levels that may be demanded by a caller (`login` through `delete`).
	pub const fn is_requirable(self) -> bool {
		!matches!(self, Self::None)
	}
}

impl TokenStatus {
	/// Returns `true` if the state machine allows moving from `self` to `next`.
	pub const fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::None, Self::Enabled)
				| (Self::Enabled, Self::Disabled)
				| (Self::Enabled, Self::Deleted)
				| (Self::Disabled, Self::Deleted)
		)
	}
}
