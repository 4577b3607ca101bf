//! Identifier allocation injected into stores.

// std
use std::sync::atomic::{AtomicI64, Ordering};
// self
use crate::{_prelude::*, store::StoreError};

/// Source of unique, strictly increasing positive integers.
///
/// The broker's tie-break relies on identifiers growing with creation order, so
/// implementations must never hand out a smaller value after a larger one.
pub trait IdAllocator
where
	Self: Debug + Send + Sync,
{
	/// Returns the next identifier.
	fn next_id(&self) -> Result<i64, StoreError>;
}

/// In-process counter starting at `1`.
#[derive(Debug)]
pub struct SequentialIds(AtomicI64);
impl SequentialIds {
	/// Creates a counter whose first identifier is `last + 1`.
	pub fn starting_after(last: i64) -> Self {
		Self(AtomicI64::new(last.max(0)))
	}

	/// Returns the most recently issued identifier (`0` if none).
	pub fn last(&self) -> i64 {
		self.0.load(Ordering::Acquire)
	}
}
impl Default for SequentialIds {
	fn default() -> Self {
		Self::starting_after(0)
	}
}
impl IdAllocator for SequentialIds {
	fn next_id(&self) -> Result<i64, StoreError> {
		self.0
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| last.checked_add(1))
			.map(|last| last + 1)
			.map_err(|_| StoreError::IdAllocation { message: "identifier space exhausted".into() })
	}
}
