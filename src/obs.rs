//! Observability helpers shared by the token cache and the sync engine.
//!
//! - Every public operation runs inside an `info` span named `graph_identity_sync.op` with the
//!   `op` (operation) and `stage` (call site) fields.
//! - With the `metrics` feature, `graph_identity_sync_operation_total` counts each
//!   attempt/success/failure labeled by `op` + `outcome`, and
//!   `graph_identity_sync_records_skipped_total` counts dropped records labeled by `kind`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Access token acquisition.
	TokenRefresh,
	/// One page of the user collection.
	ListUsers,
	/// One page of the group collection, including membership resolution.
	ListGroups,
	/// Full member drain of one group.
	ListMembers,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::TokenRefresh => "token_refresh",
			Operation::ListUsers => "list_users",
			Operation::ListGroups => "list_groups",
			Operation::ListMembers => "list_members",
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
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Outcome::Success } else { Outcome::Failure }
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span and records attempt plus terminal outcome.
pub async fn observe<T, E, Fut>(op: Operation, stage: &'static str, fut: Fut) -> Result<T, E>
where
	Fut: Future<Output = Result<T, E>>,
{
	record_operation_outcome(op, Outcome::Attempt);

	let result = OpSpan::new(op, stage).instrument(fut).await;

	record_operation_outcome(op, Outcome::of(&result));

	result
}
