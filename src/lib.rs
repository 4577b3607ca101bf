//! Issue, reconcile, and verify short-lived site access tokens, keeping at most one live site
//! token per account while superseded duplicates are pruned in the background.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod obs;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use tokio_util::sync::CancellationToken;

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Account, AccountId, Permission, Token, TokenId, TokenRole, TokenStatus},
		broker::SiteTokenBroker,
		config::BrokerConfig,
		store::{AccountStore, MemoryStore, SequentialIds, TokenStore},
	};

	/// Identifier floor for store-allocated ids, leaving lower ids free for seeded fixtures.
	pub const ALLOCATED_ID_FLOOR: i64 = 1_000;

	/// Constructs a [`SiteTokenBroker`] backed by a fresh in-memory store.
	pub fn build_test_broker(config: BrokerConfig) -> (SiteTokenBroker, Arc<MemoryStore>) {
		let store_backend = Arc::new(test_store());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let broker = SiteTokenBroker::with_config(store, config)
			.expect("Test broker configuration should be valid.");

		(broker, store_backend)
	}

	/// Creates an in-memory store whose allocated ids start above [`ALLOCATED_ID_FLOOR`].
	pub fn test_store() -> MemoryStore {
		MemoryStore::with_ids(Arc::new(SequentialIds::starting_after(ALLOCATED_ID_FLOOR)))
	}

	/// Creates and persists an enabled account with the provided email address.
	pub async fn seed_account(store: &MemoryStore, email: &str) -> Account {
		let username = email.split('@').next().unwrap_or("user");
		let account = Account::new(email, username).expect("Account fixture should be valid.");
		let mut account =
			store.create_account(account).await.expect("Seeding account fixture should succeed.");

		account
			.enable(OffsetDateTime::now_utc().unix_timestamp())
			.expect("Seeded accounts should accept the enabled status.");

		store.update_account(account).await.expect("Enabling account fixture should succeed.")
	}

	/// Stores a site token with an explicit id, status, and expiry, bypassing id allocation.
	pub async fn seed_site_token(
		store: &MemoryStore,
		account: AccountId,
		id: i64,
		status: TokenStatus,
		expires: i64,
	) -> Token {
		let now = OffsetDateTime::now_utc().unix_timestamp();
		let mut token = Token::builder(TokenRole::Site)
			.account(account)
			.permissions(Permission::Write)
			.status(status)
			.created(now - 60)
			.expires(expires)
			.build()
			.expect("Site token fixture should build.");

		token
			.assign_id(TokenId::new(id).expect("Token id fixture should be valid."))
			.expect("Fresh token fixture should accept an id.");

		store.update(token).await.expect("Seeding site token fixture should succeed.")
	}

	/// Returns the current Unix timestamp in seconds.
	pub fn unix_now() -> i64 {
		OffsetDateTime::now_utc().unix_timestamp()
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

#[cfg(test)] use color_eyre as _;
