//! JSON payload handed to clients that requested a site token.

// self
use crate::{
	_prelude::*,
	auth::{Permission, Token, TokenSecret},
};

/// Client-facing view of a site token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTokenResponse {
	/// Secret the client presents on later requests.
	pub access_token: TokenSecret,
	/// Expiry instant (Unix seconds), `0` if the token never expires.
	pub expires: i64,
	/// Permission level, serialized as its integer code.
	pub permissions: Permission,
}
impl From<&Token> for SiteTokenResponse {
	fn from(token: &Token) -> Self {
		Self {
			access_token: token.access_token().clone(),
			expires: token.expires(),
			permissions: token.permissions(),
		}
	}
}
