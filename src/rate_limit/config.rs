//! Validated rate limit budget.

// self
use crate::{_prelude::*, error::ConfigError};

/// Requests-per-window budget enforced by the [`RateLimiter`](super::RateLimiter).
///
/// Values only exist in validated form: every constructor rejects a non-positive request count or
/// window, so swapping a configuration into a running limiter can never leave it half-updated.
/// Deserializing goes through the same checks using the integer form
/// `{ "max_requests": 50, "window_seconds": 60, "safety_margin_ms": 1000 }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawRateLimitConfig")]
pub struct RateLimitConfig {
	max_requests: u32,
	window: Duration,
	safety_margin: Duration,
}
impl RateLimitConfig {
	/// Requests admitted per window when nothing else is configured.
	pub const DEFAULT_MAX_REQUESTS: u32 = 50;
	/// Extra suspension added to every computed wait.
	///
	/// Timestamps taken around the window edge can land a hair early, so the limiter oversleeps
	/// by this much. The bias is conservative; it never admits a call early.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(1);
	/// Window length when nothing else is configured.
	pub const DEFAULT_WINDOW: Duration = Duration::seconds(60);

	/// Creates a budget of `max_requests` per `window`.
	pub fn new(max_requests: u32, window: Duration) -> Result<Self, ConfigError> {
		if max_requests == 0 {
			return Err(ConfigError::NonPositiveMaxRequests { value: 0 });
		}
		if !window.is_positive() {
			return Err(ConfigError::NonPositiveWindow { value: window });
		}

		Ok(Self { max_requests, window, safety_margin: Self::DEFAULT_SAFETY_MARGIN })
	}

	/// Creates a budget from signed integers, as they arrive from configuration files.
	pub fn from_secs(max_requests: i64, window_seconds: i64) -> Result<Self, ConfigError> {
		let max = u32::try_from(max_requests)
			.ok()
			.filter(|max| *max > 0)
			.ok_or(ConfigError::NonPositiveMaxRequests { value: max_requests })?;

		Self::new(max, Duration::seconds(window_seconds))
	}

	/// Overrides the safety margin added to each throttling wait.
	pub fn with_safety_margin(mut self, margin: Duration) -> Result<Self, ConfigError> {
		if margin.is_negative() {
			return Err(ConfigError::NegativeSafetyMargin { value: margin });
		}

		self.safety_margin = margin;

		Ok(self)
	}

	/// Maximum admitted calls inside any trailing window.
	pub fn max_requests(&self) -> u32 {
		self.max_requests
	}

	/// Length of the sliding window.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Extra suspension added to computed waits.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			max_requests: Self::DEFAULT_MAX_REQUESTS,
			window: Self::DEFAULT_WINDOW,
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
		}
	}
}
impl TryFrom<RawRateLimitConfig> for RateLimitConfig {
	type Error = ConfigError;

	fn try_from(raw: RawRateLimitConfig) -> Result<Self, Self::Error> {
		let config = Self::from_secs(raw.max_requests, raw.window_seconds)?;

		match raw.safety_margin_ms {
			Some(ms) => config.with_safety_margin(Duration::milliseconds(ms)),
			None => Ok(config),
		}
	}
}

#[derive(Deserialize)]
struct RawRateLimitConfig {
	max_requests: i64,
	window_seconds: i64,
	#[serde(default)]
	safety_margin_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rejects_non_positive_values() {
		assert!(matches!(
			RateLimitConfig::from_secs(0, 60),
			Err(ConfigError::NonPositiveMaxRequests { value: 0 })
		));
		assert!(matches!(
			RateLimitConfig::from_secs(-5, 60),
			Err(ConfigError::NonPositiveMaxRequests { value: -5 })
		));
		assert!(matches!(
			RateLimitConfig::from_secs(50, 0),
			Err(ConfigError::NonPositiveWindow { .. })
		));
		assert!(matches!(
			RateLimitConfig::new(50, Duration::seconds(-1)),
			Err(ConfigError::NonPositiveWindow { .. })
		));
		assert!(matches!(
			RateLimitConfig::default().with_safety_margin(Duration::milliseconds(-1)),
			Err(ConfigError::NegativeSafetyMargin { .. })
		));
	}

	#[test]
	fn accepts_positive_values() {
		let config =
			RateLimitConfig::from_secs(50, 60).expect("A 50-per-minute budget should be valid.");

		assert_eq!(config.max_requests(), 50);
		assert_eq!(config.window(), Duration::seconds(60));
		assert_eq!(config.safety_margin(), RateLimitConfig::DEFAULT_SAFETY_MARGIN);
		assert_eq!(config, RateLimitConfig::default());
	}

	#[test]
	fn deserializes_through_validation() {
		let config: RateLimitConfig = serde_json::from_str(
			"{\"max_requests\":300,\"window_seconds\":60,\"safety_margin_ms\":250}",
		)
		.expect("A valid raw config should deserialize.");

		assert_eq!(config.max_requests(), 300);
		assert_eq!(config.safety_margin(), Duration::milliseconds(250));

		let err = serde_json::from_str::<RateLimitConfig>(
			"{\"max_requests\":-5,\"window_seconds\":60}",
		)
		.expect_err("Negative budgets should be rejected during deserialization.");

		assert!(err.to_string().contains("maxRequests must be greater than 0"));
	}
}
