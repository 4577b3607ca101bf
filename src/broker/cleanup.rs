//! Fire-and-forget removal of superseded and stale tokens.
//!
//! Jobs run on tokio tasks that are detached from the caller's cancellation scope. Failures
//! are logged and counted; they never reach the caller of
//! [`SiteTokenBroker::acquire`](crate::broker::SiteTokenBroker::acquire).

// std
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
// crates.io
use tokio::{runtime::Handle, sync::Notify};
// self
use crate::{
	_prelude::*,
	auth::Token,
	obs::{self, OpOutcome, OpSpan, Operation},
	store::TokenStore,
};

/// Why a token was handed to the cleanup queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CleanupReason {
	/// Active duplicate that lost the highest-identifier tie-break.
	Superseded,
	/// Disabled, deleted, or expired site token.
	Inactive,
}
impl CleanupReason {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CleanupReason::Superseded => "superseded",
			CleanupReason::Inactive => "inactive",
		}
	}
}
impl Display for CleanupReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Thread-safe counters for cleanup jobs.
#[derive(Debug, Default)]
pub struct CleanupStats {
	scheduled: AtomicU64,
	removed: AtomicU64,
	failed: AtomicU64,
}
impl CleanupStats {
	/// Returns the number of tokens handed to the queue.
	pub fn scheduled(&self) -> u64 {
		self.scheduled.load(Ordering::Relaxed)
	}

	/// Returns the number of tokens removed successfully.
	pub fn removed(&self) -> u64 {
		self.removed.load(Ordering::Relaxed)
	}

	/// Returns the number of removals that failed and were dropped.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}
}

#[derive(Debug, Default)]
struct Inflight {
	jobs: AtomicUsize,
	idle: Notify,
}

/// Decrements the in-flight count even if the job panics.
struct JobSlot(Arc<Inflight>);
impl Drop for JobSlot {
	fn drop(&mut self) {
		if self.0.jobs.fetch_sub(1, Ordering::AcqRel) == 1 {
			self.0.idle.notify_waiters();
		}
	}
}

/// Background queue that removes tokens from a [`TokenStore`].
#[derive(Clone)]
pub struct CleanupQueue {
	store: Arc<dyn TokenStore>,
	stats: Arc<CleanupStats>,
	inflight: Arc<Inflight>,
}
impl CleanupQueue {
	/// Creates a queue that removes tokens from `store`.
	pub fn new(store: Arc<dyn TokenStore>) -> Self {
		Self { store, stats: Default::default(), inflight: Default::default() }
	}

	/// Spawns a background job removing `tokens` on the current Tokio runtime; does nothing for
	/// an empty batch.
	///
	/// Without a runtime the batch is dropped and counted as failed.
	pub fn schedule(&self, tokens: Vec<Token>, reason: CleanupReason) {
		let ids: Vec<_> = tokens.iter().filter_map(Token::id).collect();

		if ids.is_empty() {
			return;
		}

		self.stats.scheduled.fetch_add(ids.len() as u64, Ordering::Relaxed);

		let Ok(runtime) = Handle::try_current() else {
			self.stats.failed.fetch_add(ids.len() as u64, Ordering::Relaxed);
			obs::record_op_outcome(Operation::Cleanup, OpOutcome::Failure);
			tracing::warn!(count = ids.len(), %reason, "No Tokio runtime; dropped token cleanup.");

			return;
		};

		self.inflight.jobs.fetch_add(1, Ordering::AcqRel);

		let slot = JobSlot(self.inflight.clone());
		let store = self.store.clone();
		let stats = self.stats.clone();
		let span = OpSpan::new(Operation::Cleanup, reason.as_str());

		tracing::debug!(count = ids.len(), %reason, "Scheduled token cleanup.");
		runtime.spawn(span.instrument(async move {
			let _slot = slot;

			for id in ids {
				obs::record_op_outcome(Operation::Cleanup, OpOutcome::Attempt);

				match store.remove(id).await {
					Ok(()) => {
						stats.removed.fetch_add(1, Ordering::Relaxed);
						obs::record_op_outcome(Operation::Cleanup, OpOutcome::Success);
					},
					Err(e) => {
						stats.failed.fetch_add(1, Ordering::Relaxed);
						obs::record_op_outcome(Operation::Cleanup, OpOutcome::Failure);
						tracing::warn!(token_id = %id, %reason, error = %e, "Failed to delete token.");
					},
				}
			}
		}));
	}

	/// Waits until every scheduled job has finished.
	pub async fn drain(&self) {
		loop {
			let idle = self.inflight.idle.notified();

			if self.inflight.jobs.load(Ordering::Acquire) == 0 {
				return;
			}

			idle.await;
		}
	}

	/// Number of jobs still running.
	pub fn pending(&self) -> usize {
		self.inflight.jobs.load(Ordering::Acquire)
	}

	/// Counters for scheduled, removed, and failed removals.
	pub fn stats(&self) -> &CleanupStats {
		&self.stats
	}
}
impl Debug for CleanupQueue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CleanupQueue")
			.field("pending", &self.pending())
			.field("stats", &self.stats)
			.finish()
	}
}
