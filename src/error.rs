//! Broker-level error types shared across the token model, stores, and the broker.

// self
use crate::{
	_prelude::*,
	auth::{AccountError, Permission, TokenError},
	store::StoreError,
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure, returned unchanged from the store.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Token construction or lifecycle failure.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Account validation or lifecycle failure.
	#[error(transparent)]
	Account(#[from] AccountError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Caller cancelled the operation while it waited on the store.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// Account has not been persisted, so it has no identifier to bind tokens to.
	#[error("Account has no identifier; persist it before requesting tokens.")]
	UnassignedAccount,
	/// Token exists but is disabled, deleted, or expired.
	#[error("Token is not active.")]
	InactiveToken,
	/// Token is active but grants less than the caller requires.
	#[error("Token lacks the required {required} permission.")]
	InsufficientPermission {
		/// Permission level the caller demanded.
		required: Permission,
	},
}

/// Configuration and validation failures raised by the broker.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Site token lifetime must be positive.
	#[error("Site token TTL must be positive, got {seconds} seconds.")]
	NonPositiveTtl {
		/// Rejected lifetime in seconds.
		seconds: i64,
	},
	/// Site tokens must carry a real permission level.
	#[error("Site token permission must be login, read, write, or delete.")]
	InvalidSitePermission,
	/// Configuration payload could not be parsed.
	#[error("Configuration is malformed: {message}.")]
	Malformed {
		/// Parser failure message.
		message: String,
	},
}
