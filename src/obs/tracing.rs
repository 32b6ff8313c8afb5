// self
use crate::{_prelude::*, obs::CallKind};

/// Future returned by [`CallSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`CallSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// `meli_sdk.call` span covering one client call.
///
/// Besides `call` and `stage`, the span carries two fields filled in while the call runs:
/// `status` (the HTTP status the API answered with) and `throttled_ms` (time the rate limiter
/// held the call back, when it did).
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Opens a span for `kind`, tagged with the client method that started it.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"meli_sdk.call",
				call = kind.as_str(),
				stage,
				status = tracing::field::Empty,
				throttled_ms = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records the HTTP status returned by the API.
	pub fn record_status(&self, status: u16) {
		#[cfg(feature = "tracing")]
		self.span.record("status", status);
		#[cfg(not(feature = "tracing"))]
		let _ = status;
	}

	/// Runs `fut` inside the span; no guard is held across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Stores the total rate limiter suspension on the enclosing `meli_sdk.call` span, if any.
///
/// The limiter runs inside the transport, so the span it sees is the one the client opened for
/// the call. Outside a client call this is a no-op.
pub fn record_throttle_wait(waited: Duration) {
	#[cfg(feature = "tracing")]
	tracing::Span::current().record("throttled_ms", waited.whole_milliseconds() as i64);
	#[cfg(not(feature = "tracing"))]
	let _ = waited;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn span_fields_can_be_filled_inside_the_call() {
		let span = CallSpan::new(CallKind::Api, "get");
		let value = span
			.instrument(async {
				record_throttle_wait(Duration::seconds(11));

				42
			})
			.await;

		span.record_status(200);

		assert_eq!(value, 42);
	}

	#[test]
	fn throttle_wait_outside_a_call_is_ignored() {
		record_throttle_wait(Duration::milliseconds(250));
	}
}
