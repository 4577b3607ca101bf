//! Strongly typed integer identifiers for accounts and tokens.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "i64", into = "i64")]
		pub struct $name(i64);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: i64) -> Result<Self, IdentifierError> {
				validate_value($kind, value)?;

				Ok(Self(value))
			}

			/// Returns the raw integer value.
			pub const fn get(self) -> i64 {
				self.0
			}
		}
		impl Deref for $name {
			type Target = i64;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl From<$name> for i64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<i64> for $name {
			type Error = IdentifierError;

			fn try_from(value: i64) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let value = s.trim().parse::<i64>().map_err(|e| IdentifierError::Malformed {
					kind: $kind,
					reason: e.to_string(),
				})?;

				Self::new(value)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Store-assigned identifiers are strictly positive.
	#[error("{kind} identifier must be positive, got {value}.")]
	NotPositive {
		/// Kind of identifier (account, token).
		kind: &'static str,
		/// Rejected value.
		value: i64,
	},
	/// The identifier string could not be parsed as an integer.
	#[error("{kind} identifier is malformed: {reason}.")]
	Malformed {
		/// Kind of identifier (account, token).
		kind: &'static str,
		/// Parser failure message.
		reason: String,
	},
}

def_id! { AccountId, "Store-assigned identifier of an account.", "Account" }
def_id! { TokenId, "Store-assigned identifier of an access token.", "Token" }

fn validate_value(kind: &'static str, value: i64) -> Result<(), IdentifierError> {
	if value <= 0 {
		return Err(IdentifierError::NotPositive { kind, value });
	}

	Ok(())
}
