//! Access token secret wrapper that redacts sensitive material, plus the generator that mints
//! new secrets.

// crates.io
use rand::{Rng, SeedableRng, distr::Alphanumeric, rngs::StdRng};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::token::record::TokenError};

const ENTROPY_CHARS: usize = 100;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Mints a fresh secret: 100 random alphanumeric characters suffixed with the Unix
	/// timestamp, hashed with SHA-256 and hex encoded.
	pub fn generate(created: i64) -> Result<Self, TokenError> {
		let rng = StdRng::try_from_os_rng()
			.map_err(|e| TokenError::GenerationFailed { message: e.to_string() })?;
		let mut raw: String =
			rng.sample_iter(Alphanumeric).take(ENTROPY_CHARS).map(char::from).collect();

		raw.push_str(&created.to_string());

		Ok(Self(hex::encode(Sha256::digest(raw.as_bytes()))))
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
