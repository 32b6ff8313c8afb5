//! MercadoLibre API client.
//!
//! [`MeliClient`] owns the application credentials and the current [`TokenSet`], builds request
//! URLs against the API root, and sends everything (API verbs and token calls alike) through a
//! single [`Transport`]. Hand it a
//! [`RateLimitedTransport`](crate::rate_limit::RateLimitedTransport) and every outbound call is
//! admitted by the limiter first.

pub mod session;

mod authorize;

pub use session::*;

// std
use std::borrow::Cow;
// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenSet},
	error::ConfigError,
	http::{ApiResponse, Transport},
	obs::{self, CallKind, CallOutcome, CallSpan},
};
#[cfg(feature = "reqwest")]
use crate::{
	http::{ReqwestTransport, TransportConfig},
	rate_limit::{RateLimitConfig, RateLimitedTransport},
};

/// Default root every API path is resolved against.
pub const DEFAULT_API_ROOT: &str = "https://api.mercadolibre.com";

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestMeliClient = MeliClient<ReqwestTransport>;
#[cfg(feature = "reqwest")]
/// Client whose reqwest transport is wrapped by the sliding-window rate limiter.
pub type RateLimitedMeliClient = MeliClient<RateLimitedTransport<ReqwestTransport>>;

/// Query parameters appended to a request path.
pub type Params<'a> = &'a [(&'a str, &'a str)];

/// Credentials, tokens, and transport for talking to the MercadoLibre API.
///
/// Token state sits behind interior locks so a shared `Arc<MeliClient<_>>` can authorize,
/// refresh, and issue calls from many tasks. Refreshes are single-flight: concurrent callers
/// queue behind one rotation.
pub struct MeliClient<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	client_id: String,
	client_secret: TokenSecret,
	api_root: Url,
	redirect_uri: RwLock<Option<Url>>,
	tokens: RwLock<Option<TokenSet>>,
	refresh_guard: AsyncMutex<()>,
}
impl<T> MeliClient<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client for the given application credentials.
	///
	/// Fails when either credential is empty.
	pub fn new(
		transport: Arc<T>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self> {
		let client_id = client_id.into();
		let client_secret = TokenSecret::new(client_secret);

		if client_id.trim().is_empty() {
			return Err(ConfigError::InvalidClientId.into());
		}
		if client_secret.is_blank() {
			return Err(ConfigError::InvalidClientSecret.into());
		}

		Ok(Self {
			transport,
			client_id,
			client_secret,
			api_root: Url::parse(DEFAULT_API_ROOT)
				.map_err(|source| ConfigError::InvalidRequestUrl { source })?,
			redirect_uri: RwLock::new(None),
			tokens: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
		})
	}

	/// Seeds previously issued tokens.
	pub fn with_tokens(self, access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		*self.tokens.write() = Some(TokenSet::new(access_token, refresh_token));

		self
	}

	/// Overrides the API root (for sandboxes and mock servers).
	pub fn with_api_root(mut self, api_root: Url) -> Self {
		self.api_root = api_root;

		self
	}

	/// Returns the application identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Returns the API root paths are resolved against.
	pub fn api_root(&self) -> &Url {
		&self.api_root
	}

	/// Returns the transport every call is sent through.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Returns the redirect URI remembered from the last login URL or authorization.
	pub fn redirect_uri(&self) -> Option<Url> {
		self.redirect_uri.read().clone()
	}

	/// Returns the current access token.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.tokens.read().as_ref().map(|set| set.access_token.clone())
	}

	/// Returns the current refresh token.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.tokens.read().as_ref().and_then(|set| set.refresh_token.clone())
	}

	/// Returns a snapshot of the current token set.
	pub fn tokens(&self) -> Option<TokenSet> {
		self.tokens.read().clone()
	}

	/// Replaces the current token set.
	pub fn set_tokens(&self, tokens: TokenSet) {
		*self.tokens.write() = Some(tokens);
	}

	/// Drops every held token.
	pub fn clear_tokens(&self) {
		*self.tokens.write() = None;
	}

	/// Resolves `path` against the API root and appends `params` as a query string.
	///
	/// A leading `/` is added when missing. Parameters are percent-encoded.
	pub fn make_path(&self, path: &str, params: Params<'_>) -> Result<Url> {
		let path =
			if path.starts_with('/') { Cow::Borrowed(path) } else { Cow::Owned(format!("/{path}")) };
		let root = self.api_root.as_str().trim_end_matches('/');
		let mut url = Url::parse(&format!("{root}{path}"))
			.map_err(|source| ConfigError::InvalidRequestUrl { source })?;

		if !params.is_empty() {
			url.query_pairs_mut().extend_pairs(params.iter());
		}

		Ok(url)
	}

	/// Sends a `GET` request.
	pub async fn get(&self, path: &str, params: Params<'_>) -> Result<ApiResponse> {
		self.dispatch("get", Method::GET, path, params, None).await
	}

	/// Sends a `POST` request with a JSON body.
	pub async fn post<B>(&self, path: &str, body: &B, params: Params<'_>) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let body = encode_body(body)?;

		self.dispatch("post", Method::POST, path, params, Some(body)).await
	}

	/// Sends a `PUT` request with a JSON body.
	pub async fn put<B>(&self, path: &str, body: &B, params: Params<'_>) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let body = encode_body(body)?;

		self.dispatch("put", Method::PUT, path, params, Some(body)).await
	}

	/// Sends a `DELETE` request.
	pub async fn delete(&self, path: &str, params: Params<'_>) -> Result<ApiResponse> {
		self.dispatch("delete", Method::DELETE, path, params, None).await
	}

	/// Sends an `OPTIONS` request.
	pub async fn options(&self, path: &str, params: Params<'_>) -> Result<ApiResponse> {
		self.dispatch("options", Method::OPTIONS, path, params, None).await
	}

	/// Sends an arbitrary request.
	///
	/// `body` is sent verbatim with `Content-Type: application/json`. The bearer token is
	/// attached when one is held. HTTP error statuses are returned as responses, not errors.
	pub async fn execute(
		&self,
		method: Method,
		path: &str,
		params: Params<'_>,
		body: Option<Vec<u8>>,
	) -> Result<ApiResponse> {
		self.dispatch("execute", method, path, params, body).await
	}

	async fn dispatch(
		&self,
		stage: &'static str,
		method: Method,
		path: &str,
		params: Params<'_>,
		body: Option<Vec<u8>>,
	) -> Result<ApiResponse> {
		const KIND: CallKind = CallKind::Api;

		let span = CallSpan::new(KIND, stage);

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.make_path(path, params)?;
				let request = self.build_request(method, &url, body)?;
				let response = self.transport.send(request).await?;

				#[cfg(feature = "tracing")]
				tracing::debug!(
					path = url.path(),
					status = response.status_code(),
					"API call completed."
				);

				Ok::<_, Error>(response)
			})
			.await;

		if let Ok(response) = &result {
			span.record_status(response.status_code());
		}

		obs::record_call_outcome(
			KIND,
			if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure },
		);

		result
	}

	fn build_request(
		&self,
		method: Method,
		url: &Url,
		body: Option<Vec<u8>>,
	) -> Result<Request<Vec<u8>>> {
		let mut builder =
			Request::builder().method(method).uri(url.as_str()).header(ACCEPT, "application/json");

		if body.is_some() {
			builder = builder.header(CONTENT_TYPE, "application/json");
		}
		if let Some(token) = self.access_token() {
			builder = builder.header(AUTHORIZATION, token.bearer_header()?);
		}

		builder.body(body.unwrap_or_default()).map_err(|e| ConfigError::from(e).into())
	}
}
#[cfg(feature = "reqwest")]
impl MeliClient<ReqwestTransport> {
	/// Creates a client backed by a reqwest transport built from `config`.
	pub fn with_reqwest(
		config: &TransportConfig,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self> {
		Self::new(Arc::new(ReqwestTransport::new(config)?), client_id, client_secret)
	}
}
#[cfg(feature = "reqwest")]
impl MeliClient<RateLimitedTransport<ReqwestTransport>> {
	/// Creates a client whose reqwest transport is throttled by `rate_limit`.
	pub fn rate_limited(
		config: &TransportConfig,
		rate_limit: RateLimitConfig,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self> {
		let inner = Arc::new(ReqwestTransport::new(config)?);

		Self::new(Arc::new(RateLimitedTransport::new(inner, rate_limit)), client_id, client_secret)
	}
}
impl<T> Debug for MeliClient<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MeliClient")
			.field("client_id", &self.client_id)
			.field("api_root", &self.api_root.as_str())
			.field("redirect_uri", &*self.redirect_uri.read())
			.field("tokens", &*self.tokens.read())
			.finish()
	}
}

fn encode_body<B>(body: &B) -> Result<Vec<u8>>
where
	B: ?Sized + Serialize,
{
	serde_json::to_vec(body).map_err(|e| ConfigError::BodyEncode(e).into())
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use oauth2::http::{HeaderMap, StatusCode};
	// self
	use super::*;
	use crate::http::{HttpRequest, TransportFuture};

	#[derive(Debug, Default)]
	pub(super) struct RecordingTransport {
		pub(super) requests: Mutex<Vec<HttpRequest>>,
		pub(super) responses: Mutex<Vec<(u16, String)>>,
		pub(super) calls: AtomicUsize,
	}
	impl RecordingTransport {
		pub(super) fn replying(status: u16, body: &str) -> Arc<Self> {
			let transport = Self::default();

			transport.responses.lock().push((status, body.to_owned()));

			Arc::new(transport)
		}
	}
	impl Transport for RecordingTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				self.requests.lock().push(request);

				let (status, body) = {
					let mut responses = self.responses.lock();

					if responses.len() > 1 {
						responses.remove(0)
					} else {
						responses.first().cloned().unwrap_or((200, "{}".into()))
					}
				};

				Ok(ApiResponse::new(
					StatusCode::from_u16(status).expect("Scripted status should be valid."),
					HeaderMap::new(),
					body,
				))
			})
		}
	}

	pub(super) fn client(transport: Arc<RecordingTransport>) -> MeliClient<RecordingTransport> {
		MeliClient::new(transport, "123", "s3cr3t").expect("Client fixture should be valid.")
	}

	#[test]
	fn new_rejects_empty_credentials() {
		let transport = Arc::new(RecordingTransport::default());

		assert!(matches!(
			MeliClient::new(transport.clone(), "", "secret"),
			Err(Error::Config(ConfigError::InvalidClientId))
		));
		assert!(matches!(
			MeliClient::new(transport, "123", " "),
			Err(Error::Config(ConfigError::InvalidClientSecret))
		));
	}

	#[test]
	fn make_path_prefixes_slash_and_encodes_params() {
		let client = client(Arc::new(RecordingTransport::default()));
		let url = client
			.make_path("sites/MLB/search", &[("q", "café com leite"), ("limit", "5")])
			.expect("Path should resolve.");

		assert_eq!(
			url.as_str(),
			"https://api.mercadolibre.com/sites/MLB/search?q=caf%C3%A9+com+leite&limit=5"
		);

		let bare = client.make_path("/users/me", &[]).expect("Path should resolve.");

		assert_eq!(bare.as_str(), "https://api.mercadolibre.com/users/me");
	}

	#[test]
	fn make_path_respects_custom_root() {
		let client = client(Arc::new(RecordingTransport::default())).with_api_root(
			Url::parse("http://127.0.0.1:8080/").expect("Root fixture should parse."),
		);
		let url = client.make_path("items", &[]).expect("Path should resolve.");

		assert_eq!(url.as_str(), "http://127.0.0.1:8080/items");
	}

	#[tokio::test]
	async fn verbs_attach_bearer_and_json_headers() {
		let transport = RecordingTransport::replying(201, "{\"id\":\"MLB1\"}");
		let client = client(transport.clone()).with_tokens("APP_USR-token", None);
		let response = client
			.post("/items", &serde_json::json!({ "title": "Mate" }), &[])
			.await
			.expect("Post should succeed.");

		assert_eq!(response.status_code(), 201);

		let requests = transport.requests.lock();
		let request = &requests[0];

		assert_eq!(request.method(), Method::POST);
		assert_eq!(
			request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Bearer APP_USR-token")
		);
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some("application/json")
		);
		assert_eq!(request.body().as_slice(), br#"{"title":"Mate"}"#);
	}

	#[tokio::test]
	async fn anonymous_get_has_no_authorization_header() {
		let transport = RecordingTransport::replying(200, "[]");
		let client = client(transport.clone());

		client.get("/sites", &[]).await.expect("Get should succeed.");
		client.delete("/items/MLB1", &[]).await.expect("Delete should succeed.");
		client.options("/items", &[]).await.expect("Options should succeed.");

		let requests = transport.requests.lock();

		assert_eq!(requests.len(), 3);
		assert!(requests.iter().all(|r| r.headers().get(AUTHORIZATION).is_none()));
		assert_eq!(requests[1].method(), Method::DELETE);
		assert_eq!(requests[2].method(), Method::OPTIONS);
	}

	#[tokio::test]
	async fn error_statuses_are_responses() {
		let transport = RecordingTransport::replying(404, "{\"message\":\"not_found\"}");
		let client = client(transport);
		let response =
			client.put("/items/MLB9", &serde_json::json!({}), &[]).await.expect("Put should resolve.");

		assert!(!response.is_success());
		assert_eq!(response.status_code(), 404);
	}
}
