// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for admission decisions.
#[derive(Debug, Default)]
pub struct ThrottleMetrics {
	admitted: AtomicU64,
	throttled: AtomicU64,
	bypassed: AtomicU64,
}
impl ThrottleMetrics {
	/// Returns the number of calls recorded in the call log.
	pub fn admitted(&self) -> u64 {
		self.admitted.load(Ordering::Relaxed)
	}

	/// Returns the number of times a caller had to wait for the window to clear.
	pub fn throttled(&self) -> u64 {
		self.throttled.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that skipped admission because enforcement was disabled.
	pub fn bypassed(&self) -> u64 {
		self.bypassed.load(Ordering::Relaxed)
	}

	pub(crate) fn record_admitted(&self) {
		self.admitted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_throttled(&self) {
		self.throttled.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_bypassed(&self) {
		self.bypassed.fetch_add(1, Ordering::Relaxed);
	}
}
