//! Time sources and suspension primitives used by the rate limiter.
//!
//! Injecting both lets tests drive the sliding window deterministically: [`ManualClock`] only
//! moves when told to, and [`ClockSleeper`] advances it by exactly the requested wait.

// std
use std::time::Duration as StdDuration;
// self
use crate::_prelude::*;

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Wall-clock source for call log timestamps.
pub trait Clock: Send + Sync + Debug {
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Suspension primitive used while waiting for the window to clear.
pub trait Sleeper: Send + Sync + Debug {
	/// Suspends the caller for `duration`; non-positive durations resolve immediately.
	fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// [`Clock`] backed by the system UTC clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;
impl Sleeper for TokioSleeper {
	fn sleep(&self, duration: Duration) -> SleepFuture {
		let duration = StdDuration::try_from(duration).unwrap_or_default();

		Box::pin(tokio::time::sleep(duration))
	}
}

/// Settable [`Clock`] for deterministic tests and simulations.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward (or backward, for negative values).
	pub fn advance(&self, by: Duration) {
		*self.0.lock() += by;
	}

	/// Jumps the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

/// [`Sleeper`] that advances a [`ManualClock`] instead of waiting, recording every request.
#[derive(Clone, Debug)]
pub struct ClockSleeper {
	clock: ManualClock,
	calls: Arc<Mutex<Vec<Duration>>>,
}
impl ClockSleeper {
	/// Creates a sleeper driving `clock`.
	pub fn new(clock: ManualClock) -> Self {
		Self { clock, calls: Default::default() }
	}

	/// Returns every duration passed to [`Sleeper::sleep`] so far.
	pub fn calls(&self) -> Vec<Duration> {
		self.calls.lock().clone()
	}

	/// Returns the sum of all requested suspensions.
	pub fn total_slept(&self) -> Duration {
		self.calls.lock().iter().fold(Duration::ZERO, |acc, d| acc + *d)
	}
}
impl Sleeper for ClockSleeper {
	fn sleep(&self, duration: Duration) -> SleepFuture {
		let clock = self.clock.clone();
		let calls = self.calls.clone();

		Box::pin(async move {
			calls.lock().push(duration);

			if duration.is_positive() {
				clock.advance(duration);
			}
		})
	}
}
