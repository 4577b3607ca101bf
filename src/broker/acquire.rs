//! Site token acquisition and candidate reconciliation.

// std
use std::cmp::Reverse;
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, Token, TokenRole, TokenStatus},
	broker::{CleanupReason, SiteTokenBroker, record_result},
	obs::{self, OpOutcome, OpSpan, Operation},
};

/// Outcome of partitioning one account's tokens at a single instant.
#[derive(Debug, Default)]
pub(crate) struct Reconciliation {
	/// Active site token with the highest identifier.
	pub(crate) chosen: Option<Token>,
	/// Other active site tokens, to be removed.
	pub(crate) superseded: Vec<Token>,
	/// Disabled, deleted, or expired site tokens, to be removed.
	pub(crate) stale: Vec<Token>,
}

/// Keeps site tokens only, splits them into active candidates and stale leftovers, and picks
/// the candidate with the highest identifier.
pub(crate) fn reconcile(tokens: Vec<Token>, now: i64) -> Reconciliation {
	let (mut candidates, stale): (Vec<_>, Vec<_>) =
		tokens.into_iter().filter(Token::is_site_token).partition(|t| t.is_active_at(now));

	candidates.sort_unstable_by_key(|t| Reverse(t.id()));

	let mut ranked = candidates.into_iter();
	let chosen = ranked.next();

	Reconciliation { chosen, superseded: ranked.collect(), stale }
}

impl SiteTokenBroker {
	/// Returns the single live site token for `account`, issuing one if needed.
	///
	/// Store calls made on the caller's behalf stop with [`Error::Cancelled`] once `cancel`
	/// fires. Removal of superseded and stale tokens is queued on the broker's
	/// [`CleanupQueue`](crate::broker::CleanupQueue) and is not bound to `cancel`. It runs on
	/// the current Tokio runtime; outside one those tokens are left for a later pass.
	pub async fn acquire(&self, cancel: &CancellationToken, account: &Account) -> Result<Token> {
		const OP: Operation = Operation::Acquire;

		let span = OpSpan::new(OP, "acquire");

		obs::record_op_outcome(OP, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.acquire_inner(cancel, account, None)).await;

		match &result {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		record_result(OP, &result);

		result
	}

	/// `observed_at` overrides the instant used to partition candidates; the returned token is
	/// always re-checked against the live clock.
	async fn acquire_inner(
		&self,
		cancel: &CancellationToken,
		account: &Account,
		observed_at: Option<i64>,
	) -> Result<Token> {
		let account_id = account.id().ok_or(Error::UnassignedAccount)?;
		let lease = self.config.serialize_per_account.then(|| self.account_guard(account_id));
		let _singleflight = match &lease {
			Some(lease) => Some(tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				held = lease.lock.lock() => held,
			}),
			None => None,
		};
		let tokens = self.call(cancel, self.store.list_for_account(account_id)).await?;
		let now = observed_at.unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp());
		let Reconciliation { chosen, superseded, stale } = reconcile(tokens, now);

		if !superseded.is_empty() {
			self.metrics.record_superseded(superseded.len());
		}

		self.cleanup.schedule(superseded, CleanupReason::Superseded);
		self.cleanup.schedule(stale, CleanupReason::Inactive);

		let Some(token) = chosen else {
			return self.issue(cancel, account_id).await;
		};

		if token.is_active() {
			self.metrics.record_reused();
			tracing::debug!(%account_id, token_id = ?token.id(), "Reusing site token.");

			return Ok(token);
		}

		// Crossed its expiry boundary after the candidate scan.
		if let Some(id) = token.id() {
			match self.call(cancel, self.store.remove(id)).await {
				Ok(()) => {},
				Err(Error::Cancelled) => return Err(Error::Cancelled),
				Err(e) => tracing::warn!(
					%account_id,
					token_id = %id,
					error = %e,
					"Failed to remove expired site token."
				),
			}
		}

		self.issue(cancel, account_id).await
	}

	async fn issue(&self, cancel: &CancellationToken, account_id: AccountId) -> Result<Token> {
		let token = Token::builder(TokenRole::Site)
			.account(account_id)
			.permissions(self.config.site_permission)
			.status(TokenStatus::Enabled)
			.expires_in(self.config.site_token_ttl)
			.build()?;
		let stored = self.call(cancel, self.store.create(token)).await?;

		self.metrics.record_issued();
		tracing::info!(
			%account_id,
			token_id = ?stored.id(),
			expires = stored.expires(),
			"Issued site token."
		);

		Ok(stored)
	}
}
