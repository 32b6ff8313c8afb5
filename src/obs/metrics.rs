// self
use crate::{
	obs::{CallKind, CallOutcome},
	rate_limit::ThrottleEvent,
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"meli_sdk_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a throttling event via the global metrics recorder (when enabled).
pub fn record_throttle(event: &ThrottleEvent) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("meli_sdk_throttle_total").increment(1);
		metrics::histogram!("meli_sdk_throttle_wait_seconds").record(event.wait.as_seconds_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}
