//! Observability helpers for broker operations.
//!
//! Every operation runs inside a `tracing` span named `site_token_broker.op` with the `op`
//! and `stage` fields.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `site_token_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Site token acquisition and reconciliation.
	Acquire,
	/// Background removal of superseded tokens.
	Cleanup,
	/// Presented token verification.
	Verify,
	/// Store-wide removal of inactive site tokens.
	Sweep,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Acquire => "acquire",
			Operation::Cleanup => "cleanup",
			Operation::Verify => "verify",
			Operation::Sweep => "sweep",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller (or logged, for cleanup).
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
