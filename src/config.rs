//! Broker configuration.

// self
use crate::{
	_prelude::*,
	auth::{Permission, SITE_TOKEN_TTL},
	error::ConfigError,
};

/// Tunables for [`SiteTokenBroker`](crate::broker::SiteTokenBroker).
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use site_token_broker::config::BrokerConfig;
///
/// let config = BrokerConfig::from_json(r#"{ "site_token_ttl": 900 }"#).unwrap();
///
/// assert_eq!(config.site_token_ttl.whole_seconds(), 900);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// Lifetime of newly issued site tokens.
	#[serde(with = "ttl_seconds")]
	pub site_token_ttl: Duration,
	/// Permission level granted to newly issued site tokens.
	pub site_permission: Permission,
	/// Serializes acquisitions for the same account within one broker instance.
	///
	/// Without it, concurrent acquisitions may briefly create duplicate tokens that the next
	/// reconciliation pass collapses.
	pub serialize_per_account: bool,
}
impl BrokerConfig {
	/// Parses a JSON document and validates it.
	pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(payload);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			ConfigError::Malformed { message: format!("{} at `{}`", e.inner(), e.path()) }
		})?;

		deserializer
			.end()
			.map_err(|e| ConfigError::Malformed { message: e.to_string() })?;

		config.validate()?;

		Ok(config)
	}

	/// Overrides the site token lifetime.
	pub fn with_site_token_ttl(mut self, ttl: Duration) -> Self {
		self.site_token_ttl = ttl;

		self
	}

	/// Overrides the permission level of issued site tokens.
	pub fn with_site_permission(mut self, permission: Permission) -> Self {
		self.site_permission = permission;

		self
	}

	/// Enables or disables per-account serialization.
	pub fn with_serialize_per_account(mut self, enabled: bool) -> Self {
		self.serialize_per_account = enabled;

		self
	}

	/// Checks invariants the broker relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.site_token_ttl.is_positive() {
			return Err(ConfigError::NonPositiveTtl { seconds: self.site_token_ttl.whole_seconds() });
		}
		if !self.site_permission.is_requirable() {
			return Err(ConfigError::InvalidSitePermission);
		}

		Ok(())
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			site_token_ttl: SITE_TOKEN_TTL,
			site_permission: Permission::Write,
			serialize_per_account: false,
		}
	}
}

mod ttl_seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(ttl.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
