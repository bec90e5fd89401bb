// self
use crate::obs::{Operation, Outcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(op: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"graph_identity_sync_operation_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Records a dropped record of `kind` (`user`, `group`, `member`, `checkpoint`).
pub fn record_skipped(kind: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("graph_identity_sync_records_skipped_total", "kind" => kind).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = kind;
	}
}
