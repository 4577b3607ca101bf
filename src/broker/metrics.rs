// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for site token acquisitions.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	issued: AtomicU64,
	reused: AtomicU64,
	superseded: AtomicU64,
}
impl BrokerMetrics {
	/// Returns the total number of acquisition attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions that returned a token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed acquisitions.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of newly issued site tokens.
	pub fn issued(&self) -> u64 {
		self.issued.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions satisfied by an existing token.
	pub fn reused(&self) -> u64 {
		self.reused.load(Ordering::Relaxed)
	}

	/// Returns the number of active duplicates that lost the tie-break.
	pub fn superseded(&self) -> u64 {
		self.superseded.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_issued(&self) {
		self.issued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reused(&self) {
		self.reused.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_superseded(&self, count: usize) {
		self.superseded.fetch_add(count as u64, Ordering::Relaxed);
	}
}
