//! Optional observability helpers for client calls and rate limiting.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `meli_sdk.call` with the `call` (operation)
//!   and `stage` (call site) fields, filled in with the response `status` and the rate limiter's
//!   `throttled_ms` suspension, plus events when the rate limiter throttles a caller.
//! - Enable `metrics` to increment the `meli_sdk_call_total` counter for every
//!   attempt/success/failure, labeled by `call` + `outcome`, and `meli_sdk_throttle_total` for
//!   every throttling event.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Client operations observed by the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Authorization code exchange against the token endpoint.
	AuthorizationCode,
	/// Refresh token rotation.
	Refresh,
	/// Generic API passthrough (`GET`, `POST`, ...).
	Api,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::AuthorizationCode => "authorization_code",
			CallKind::Refresh => "refresh",
			CallKind::Api => "api",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a client helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
