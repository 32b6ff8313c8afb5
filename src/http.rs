//! Transport primitives for MercadoLibre API calls.
//!
//! The module exposes [`Transport`] alongside [`ApiResponse`] so downstream crates can plug in
//! custom HTTP clients without losing the client's decoding helpers or the rate limiter.
//! Requests and responses are expressed with the [`http`](oauth2::http) types re-exported by
//! `oauth2`, keeping the contract independent from any particular HTTP stack.

// std
#[cfg(feature = "reqwest")] use std::time::Duration as StdDuration;
// crates.io
use oauth2::http::{HeaderMap, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::error::{ConfigError, TransportError};

/// Outbound request handed to a [`Transport`].
pub type HttpRequest = oauth2::HttpRequest;

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one request.
///
/// The trait is the client's only dependency on an HTTP implementation. It is also the seam the
/// rate limiter decorates: [`RateLimitedTransport`](crate::rate_limit::RateLimitedTransport)
/// implements `Transport` by wrapping another `Transport`, so code written against the trait
/// accepts the raw transport and the throttled one interchangeably.
///
/// Implementations report transport-level failures through [`Error`]; HTTP error statuses are
/// successful sends and come back as an [`ApiResponse`].
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the full response body has been read.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}
impl<T> Transport for Arc<T>
where
	T: ?Sized + Transport,
{
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		self.as_ref().send(request)
	}
}

/// Fully buffered HTTP response returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Returns the numeric status code.
	pub fn status_code(&self) -> u16 {
		self.status.as_u16()
	}

	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns the body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body into `T`, reporting the JSON path of any mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status_code() })
	}

	/// Decodes the body leniently.
	///
	/// Empty bodies map to [`DecodedBody::Empty`]. Bodies that are not valid JSON are kept as raw
	/// text next to the decoder's message instead of being discarded.
	pub fn decode(&self) -> DecodedBody {
		if self.body.iter().all(u8::is_ascii_whitespace) {
			return DecodedBody::Empty;
		}

		match serde_json::from_slice::<Value>(&self.body) {
			Ok(value) => DecodedBody::Json(value),
			Err(e) => DecodedBody::Raw { text: self.text(), error: format!("JSON decode error: {e}") },
		}
	}

	/// Parses the `Retry-After` header as either delta-seconds or an RFC 2822 date.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Body of an [`ApiResponse`] decoded without a target schema.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedBody {
	/// No body was returned.
	Empty,
	/// Body parsed as JSON.
	Json(Value),
	/// Body was not valid JSON.
	Raw {
		/// Raw response text.
		text: String,
		/// Decoder message explaining why parsing failed.
		error: String,
	},
}
impl DecodedBody {
	/// Returns the JSON value when decoding succeeded.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			_ => None,
		}
	}

	/// Returns the decode error message for raw bodies.
	pub fn error(&self) -> Option<&str> {
		match self {
			Self::Raw { error, .. } => Some(error),
			_ => None,
		}
	}
}

/// Immutable connection settings applied when building the default transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
	/// `User-Agent` header sent with every request.
	pub user_agent: String,
	/// Whether TLS certificates are verified.
	pub verify_tls: bool,
	/// Maximum time allowed to establish a connection, in seconds.
	pub connect_timeout_secs: u64,
	/// Maximum time allowed for the whole request, in seconds.
	pub timeout_secs: u64,
}
impl TransportConfig {
	/// Overrides the user agent.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Overrides both timeouts.
	pub fn with_timeouts(mut self, connect_timeout_secs: u64, timeout_secs: u64) -> Self {
		self.connect_timeout_secs = connect_timeout_secs;
		self.timeout_secs = timeout_secs;

		self
	}

	/// Toggles TLS certificate verification.
	pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
		self.verify_tls = verify_tls;

		self
	}
}
impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			user_agent: concat!("MELI-RUST-SDK-", env!("CARGO_PKG_VERSION")).into(),
			verify_tls: true,
			connect_timeout_secs: 10,
			timeout_secs: 60,
		}
	}
}

/// Default [`Transport`] backed by a shared [`ReqwestClient`].
///
/// The client is built once from a [`TransportConfig`] and reused for every request so TCP and
/// TLS connections are pooled.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport from explicit connection settings.
	pub fn new(config: &TransportConfig) -> Result<Self> {
		let client = ReqwestClient::builder()
			.user_agent(config.user_agent.as_str())
			.connect_timeout(StdDuration::from_secs(config.connect_timeout_secs))
			.timeout(StdDuration::from_secs(config.timeout_secs))
			.danger_accept_invalid_certs(!config.verify_tls)
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request: reqwest::Request = request.try_into().map_err(ConfigError::from)?;
			let response = client.execute(request).await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(TransportError::from)?;

			Ok(ApiResponse::new(status, headers, body.to_vec()))
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderValue;
	// self
	use super::*;

	fn response(status: u16, body: &str) -> ApiResponse {
		ApiResponse::new(
			StatusCode::from_u16(status).expect("Status fixture should be valid."),
			HeaderMap::new(),
			body,
		)
	}

	#[test]
	fn decode_keeps_raw_text_for_invalid_json() {
		let decoded = response(200, "<html>oops</html>").decode();

		match decoded {
			DecodedBody::Raw { text, error } => {
				assert_eq!(text, "<html>oops</html>");
				assert!(error.starts_with("JSON decode error"));
			},
			other => panic!("Unexpected decoded body: {other:?}."),
		}
	}

	#[test]
	fn decode_distinguishes_empty_and_json_bodies() {
		assert_eq!(response(204, "").decode(), DecodedBody::Empty);
		assert_eq!(
			response(200, "{\"id\":\"MLB123\"}").decode().as_json(),
			Some(&serde_json::json!({ "id": "MLB123" }))
		);
	}

	#[test]
	fn json_reports_the_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Item {
			#[allow(dead_code)]
			price: u64,
		}

		let err = response(200, "{\"price\":\"cheap\"}")
			.json::<Item>()
			.expect_err("String price should not decode into u64.");

		match err {
			Error::Decode { source, status } => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "price");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn retry_after_accepts_delta_seconds() {
		let mut resp = response(429, "");

		resp.headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		assert_eq!(resp.retry_after(), Some(Duration::seconds(7)));

		resp.headers.insert(RETRY_AFTER, HeaderValue::from_static("not-a-date"));

		assert_eq!(resp.retry_after(), None);
	}

	#[test]
	fn default_transport_config_matches_documented_defaults() {
		let config = TransportConfig::default();

		assert!(config.user_agent.starts_with("MELI-RUST-SDK-"));
		assert!(config.verify_tls);
		assert_eq!(config.connect_timeout_secs, 10);
		assert_eq!(config.timeout_secs, 60);

		let parsed: TransportConfig = serde_json::from_str("{\"timeout_secs\":5}")
			.expect("Partial transport config should deserialize with defaults.");

		assert_eq!(parsed.timeout_secs, 5);
		assert_eq!(parsed.connect_timeout_secs, 10);
	}
}
