//! Site token broker: acquisition with reconciliation, verification, and maintenance sweeps.
//!
//! [`SiteTokenBroker::acquire`] returns the single live site token for an account. It lists
//! the account's tokens, keeps the active site tokens as candidates, returns the one with the
//! highest identifier (or issues a new one), and hands every superseded or stale site token to
//! the [`CleanupQueue`]. Cleanup runs on background tasks and never affects the caller's
//! result.
//!
//! Uniqueness is eventual: two acquisitions racing for one account may both issue a token,
//! and the next pass collapses them. [`BrokerConfig::serialize_per_account`] removes that
//! window inside one broker instance.

pub mod cleanup;
pub mod response;

mod acquire;
mod metrics;

pub use cleanup::{CleanupQueue, CleanupReason, CleanupStats};
pub use metrics::BrokerMetrics;
pub use response::SiteTokenResponse;

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, Permission, Token},
	config::BrokerConfig,
	obs::{self, OpOutcome, OpSpan, Operation},
	store::{StoreFuture, TokenStore},
};

/// Acquires the site token for `account` with a default-configured broker.
///
/// Superseded tokens are removed on background tasks that outlive this call; they are spawned
/// on the current Tokio runtime and skipped when none is running.
pub async fn acquire_site_token(
	cancel: &CancellationToken,
	store: Arc<dyn TokenStore>,
	account: &Account,
) -> Result<Token> {
	SiteTokenBroker::new(store).acquire(cancel, account).await
}

/// Issues and reconciles site tokens against an injected [`TokenStore`].
#[derive(Clone)]
pub struct SiteTokenBroker {
	/// Token store every operation reads from and writes to.
	pub store: Arc<dyn TokenStore>,
	/// Validated broker configuration.
	pub config: BrokerConfig,
	/// Shared counters for acquisition outcomes.
	pub metrics: Arc<BrokerMetrics>,
	cleanup: CleanupQueue,
	account_guards: AccountGuards,
}
impl SiteTokenBroker {
	/// Creates a broker with the default configuration.
	pub fn new(store: Arc<dyn TokenStore>) -> Self {
		Self::build(store, BrokerConfig::default())
	}

	/// Creates a broker after validating `config`.
	pub fn with_config(store: Arc<dyn TokenStore>, config: BrokerConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self::build(store, config))
	}

	fn build(store: Arc<dyn TokenStore>, config: BrokerConfig) -> Self {
		Self {
			cleanup: CleanupQueue::new(store.clone()),
			store,
			config,
			metrics: Default::default(),
			account_guards: Default::default(),
		}
	}

	/// Background cleanup queue; await [`CleanupQueue::drain`] to observe settled state.
	pub fn cleanup(&self) -> &CleanupQueue {
		&self.cleanup
	}

	/// Looks up a presented token and requires it to be active and to grant `required`.
	pub async fn verify(
		&self,
		cancel: &CancellationToken,
		access_token: &str,
		required: Permission,
	) -> Result<Token> {
		const OP: Operation = Operation::Verify;

		let span = OpSpan::new(OP, "verify");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.call(cancel, self.store.get_by_access_token(access_token)).await?;

				if !token.is_active() {
					return Err(Error::InactiveToken);
				}
				if !token.has_permissions(required)? {
					return Err(Error::InsufficientPermission { required });
				}

				Ok(token)
			})
			.await;

		record_result(OP, &result);

		result
	}

	/// Removes every inactive site token in the store and returns how many were removed.
	///
	/// Unlike acquisition cleanup, removals run in the foreground and store errors propagate.
	pub async fn sweep_inactive(&self, cancel: &CancellationToken) -> Result<usize> {
		const OP: Operation = Operation::Sweep;

		let span = OpSpan::new(OP, "sweep_inactive");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let now = OffsetDateTime::now_utc().unix_timestamp();
				let tokens = self.call(cancel, self.store.list()).await?;
				let mut removed = 0;

				for token in tokens.iter().filter(|t| t.is_site_token() && !t.is_active_at(now)) {
					let Some(id) = token.id() else { continue };

					self.call(cancel, self.store.remove(id)).await?;

					removed += 1;
				}

				tracing::debug!(removed, "Swept inactive site tokens.");

				Ok(removed)
			})
			.await;

		record_result(OP, &result);

		result
	}

	/// Races a store call against the caller's cancellation signal.
	async fn call<T>(&self, cancel: &CancellationToken, fut: StoreFuture<'_, T>) -> Result<T> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(Error::Cancelled),
			result = fut => result.map_err(Error::from),
		}
	}

	/// Returns (and creates on demand) the singleflight guard for an account.
	fn account_guard(&self, account: AccountId) -> AccountGuardLease {
		let lock = self
			.account_guards
			.lock()
			.entry(account)
			.or_insert_with(|| Arc::new(AsyncMutex::new(())))
			.clone();

		AccountGuardLease { guards: self.account_guards.clone(), account, lock }
	}
}
impl Debug for SiteTokenBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SiteTokenBroker")
			.field("config", &self.config)
			.field("metrics", &self.metrics)
			.field("cleanup", &self.cleanup)
			.finish()
	}
}

type AccountGuards = Arc<Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>>;

/// Shared handle on one account's singleflight lock; the map entry is dropped with the last
/// lease.
struct AccountGuardLease {
	guards: AccountGuards,
	account: AccountId,
	lock: Arc<AsyncMutex<()>>,
}
impl Drop for AccountGuardLease {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// One reference in the map, one held here.
		if Arc::strong_count(&self.lock) <= 2 {
			guards.remove(&self.account);
		}
	}
}

fn record_result<T>(op: Operation, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_op_outcome(op, OpOutcome::Success),
		Err(_) => obs::record_op_outcome(op, OpOutcome::Failure),
	}
}
