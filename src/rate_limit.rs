//! Sliding-window admission control wrapped around any [`Transport`].
//!
//! [`RateLimiter`] keeps a call log with one timestamp per admitted request. Before each call it
//! evicts entries that left the trailing window, admits immediately while the log holds fewer
//! than `max_requests` entries, and otherwise suspends the caller until the oldest entry expires
//! (plus the configured safety margin). [`RateLimitedTransport`] pairs a limiter with an inner
//! transport and implements [`Transport`] itself, so it drops in wherever a transport is
//! expected.
//!
//! Admission decisions are serialized by an async mutex held for the full decision, including
//! the suspension, so concurrent callers queue instead of jointly overshooting the budget. A
//! disabled limiter is checked before that mutex, so bypassing callers never queue. The
//! call log sits behind a separate synchronous lock that is never held across an `.await`, which
//! keeps [`RateLimiter::stats`], [`RateLimiter::reset`], and [`RateLimiter::configure`] usable
//! while a caller is waiting.
//!
//! There is no built-in timeout: drop the future (for example via `tokio::time::timeout`) to
//! abandon a wait. An abandoned wait records nothing.

mod clock;
mod config;
mod metrics;

pub use clock::*;
pub use config::*;
pub use metrics::ThrottleMetrics;

// std
use std::{
	collections::VecDeque,
	ops::Deref,
	panic::{self, AssertUnwindSafe},
};
// self
use crate::{
	_prelude::*,
	http::{HttpRequest, Transport, TransportFuture},
	obs,
};

/// Observer invoked once per throttling event.
pub type ThrottleObserver = Arc<dyn Fn(&ThrottleEvent) + Send + Sync>;

/// Details handed to the [`ThrottleObserver`] right before a caller is suspended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ThrottleEvent {
	/// Time until the oldest logged call leaves the window, excluding the safety margin.
	pub wait: Duration,
	/// Calls currently inside the window.
	pub current_count: usize,
	/// Configured budget.
	pub max_requests: u32,
}

/// Point-in-time view of the limiter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
	/// Calls inside the trailing window.
	pub requests_made: usize,
	/// Configured budget.
	pub max_requests: u32,
	/// Configured window.
	pub window: Duration,
	/// Calls that can still be admitted without waiting.
	pub requests_remaining: u32,
	/// Whether admission control is active.
	pub enabled: bool,
}

struct LimiterState {
	config: RateLimitConfig,
	enabled: bool,
	log: VecDeque<OffsetDateTime>,
	observer: Option<ThrottleObserver>,
}
impl LimiterState {
	fn evict(&mut self, now: OffsetDateTime) {
		// A window reaching past the representable range keeps every entry.
		let Some(cutoff) = now.checked_sub(self.config.window()) else { return };

		self.log.retain(|at| *at > cutoff);
	}
}

enum Decision {
	Proceed,
	Wait { event: ThrottleEvent, observer: Option<ThrottleObserver>, margin: Duration },
}

/// Sliding-window admission controller.
pub struct RateLimiter {
	state: Mutex<LimiterState>,
	admission: AsyncMutex<()>,
	clock: Arc<dyn Clock>,
	sleeper: Arc<dyn Sleeper>,
	metrics: ThrottleMetrics,
}
impl RateLimiter {
	/// Creates an enabled limiter using the system clock and the tokio timer.
	pub fn new(config: RateLimitConfig) -> Self {
		Self::with_time(config, Arc::new(SystemClock), Arc::new(TokioSleeper))
	}

	/// Creates an enabled limiter with explicit time primitives.
	pub fn with_time(config: RateLimitConfig, clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
		Self {
			state: Mutex::new(LimiterState {
				config,
				enabled: true,
				log: VecDeque::new(),
				observer: None,
			}),
			admission: AsyncMutex::new(()),
			clock,
			sleeper,
			metrics: ThrottleMetrics::default(),
		}
	}

	/// Replaces the budget. Existing log entries are kept and judged by the new budget on the
	/// next admission.
	pub fn configure(&self, config: RateLimitConfig) {
		self.state.lock().config = config;
	}

	/// Returns the active budget.
	pub fn config(&self) -> RateLimitConfig {
		self.state.lock().config
	}

	/// Turns admission control on.
	pub fn enable(&self) {
		self.state.lock().enabled = true;
	}

	/// Turns admission control off. Calls pass straight through and are not logged.
	pub fn disable(&self) {
		self.state.lock().enabled = false;
	}

	/// Returns whether admission control is active.
	pub fn is_enabled(&self) -> bool {
		self.state.lock().enabled
	}

	/// Registers the throttling observer, replacing any previous one.
	///
	/// The observer runs on the waiting caller's task before the suspension starts. A panicking
	/// observer is logged and ignored; the caller is still admitted.
	pub fn set_observer<F>(&self, observer: F)
	where
		F: 'static + Send + Sync + Fn(&ThrottleEvent),
	{
		self.state.lock().observer = Some(Arc::new(observer));
	}

	/// Removes the throttling observer.
	pub fn clear_observer(&self) {
		self.state.lock().observer = None;
	}

	/// Returns current usage.
	///
	/// Reading stats evicts expired entries from the call log first.
	pub fn stats(&self) -> RateLimitStats {
		let now = self.clock.now();
		let mut state = self.state.lock();

		state.evict(now);

		let max_requests = state.config.max_requests();
		let requests_made = state.log.len();
		let made = u32::try_from(requests_made).unwrap_or(u32::MAX);

		RateLimitStats {
			requests_made,
			max_requests,
			window: state.config.window(),
			requests_remaining: max_requests.saturating_sub(made),
			enabled: state.enabled,
		}
	}

	/// Clears the call log.
	pub fn reset(&self) {
		self.state.lock().log.clear();
	}

	/// Returns lifetime admission counters.
	pub fn metrics(&self) -> &ThrottleMetrics {
		&self.metrics
	}

	/// Waits until the budget has room for one more call, then records it.
	///
	/// Resolves immediately when enforcement is disabled, even while another caller is suspended.
	pub async fn admit(&self) {
		if !self.is_enabled() {
			self.metrics.record_bypassed();

			return;
		}

		let _turn = self.admission.lock().await;
		let mut waited = Duration::ZERO;

		loop {
			let (event, observer, margin) = match self.decide() {
				Decision::Proceed => break,
				Decision::Wait { event, observer, margin } => (event, observer, margin),
			};

			self.metrics.record_throttled();
			obs::record_throttle(&event);

			#[cfg(feature = "tracing")]
			tracing::info!(
				wait_ms = event.wait.whole_milliseconds() as i64,
				current_count = event.current_count,
				max_requests = event.max_requests,
				"Rate limit reached; suspending caller."
			);

			if let Some(observer) = observer {
				notify(&observer, &event);
			}

			let pause = event.wait.saturating_add(margin);

			self.sleeper.sleep(pause).await;

			waited = waited.saturating_add(pause);
		}

		if waited.is_positive() {
			obs::record_throttle_wait(waited);
		}
	}

	fn decide(&self) -> Decision {
		let mut state = self.state.lock();

		if !state.enabled {
			self.metrics.record_bypassed();

			return Decision::Proceed;
		}

		let now = self.clock.now();

		state.evict(now);

		let max_requests = state.config.max_requests();
		let current_count = state.log.len();

		if current_count >= max_requests as usize {
			let oldest = state.log.iter().min().copied().unwrap_or(now);
			let wait = state.config.window() - (now - oldest);

			if wait.is_positive() {
				return Decision::Wait {
					event: ThrottleEvent { wait, current_count, max_requests },
					observer: state.observer.clone(),
					margin: state.config.safety_margin(),
				};
			}
		}

		state.log.push_back(now);
		self.metrics.record_admitted();

		#[cfg(feature = "tracing")]
		tracing::debug!(logged = state.log.len(), max_requests, "Call admitted.");

		Decision::Proceed
	}
}
impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(RateLimitConfig::default())
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RateLimiter")
			.field("config", &state.config)
			.field("enabled", &state.enabled)
			.field("logged", &state.log.len())
			.field("observer_set", &state.observer.is_some())
			.field("clock", &self.clock)
			.field("sleeper", &self.sleeper)
			.finish()
	}
}

/// [`Transport`] decorator that runs every request through a [`RateLimiter`].
///
/// The decorator dereferences to its limiter, so budget management (`configure`, `enable`,
/// `disable`, `set_observer`, `stats`, `reset`) is available directly on it. Responses and
/// transport errors from the inner transport are returned unchanged; throttling only decides
/// when a request fires.
pub struct RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	inner: Arc<T>,
	limiter: Arc<RateLimiter>,
}
impl<T> RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	/// Wraps `inner` with a fresh limiter enforcing `config`.
	pub fn new(inner: Arc<T>, config: RateLimitConfig) -> Self {
		Self::with_limiter(inner, Arc::new(RateLimiter::new(config)))
	}

	/// Wraps `inner` with a caller-provided limiter, which may be shared with other transports.
	pub fn with_limiter(inner: Arc<T>, limiter: Arc<RateLimiter>) -> Self {
		Self { inner, limiter }
	}

	/// Returns the wrapped transport.
	pub fn inner(&self) -> &Arc<T> {
		&self.inner
	}

	/// Returns the shared limiter handle.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}
}
impl<T> Clone for RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone(), limiter: self.limiter.clone() }
	}
}
impl<T> Deref for RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	type Target = RateLimiter;

	fn deref(&self) -> &Self::Target {
		&self.limiter
	}
}
impl<T> Debug for RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimitedTransport").field("limiter", &self.limiter).finish()
	}
}
impl<T> Transport for RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			self.limiter.admit().await;
			self.inner.send(request).await
		})
	}
}

fn notify(observer: &ThrottleObserver, event: &ThrottleEvent) {
	if panic::catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
		#[cfg(feature = "tracing")]
		tracing::warn!(
			current_count = event.current_count,
			max_requests = event.max_requests,
			"Throttle observer panicked; continuing admission."
		);
	}
}
