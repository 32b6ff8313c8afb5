//! Token endpoint plumbing for the authorization-code and refresh grants.
//!
//! Requests are plain form posts sent through the client's [`Transport`](crate::http::Transport),
//! so token calls share the rate limiter with every other call. Successful responses are decoded
//! with the `oauth2` crate's [`StandardTokenResponse`] extended with MercadoLibre's `user_id`
//! field; failures are classified from the OAuth `error` field, then the description or body
//! text, then the HTTP status.

pub use oauth2;

// crates.io
use oauth2::{
	ExtraTokenFields, StandardTokenResponse, TokenResponse,
	basic::BasicTokenType,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenSet},
	error::{ConfigError, TransientError},
	http::{ApiResponse, HttpRequest},
};

/// Path of the token endpoint relative to the API root.
pub const TOKEN_PATH: &str = "/oauth/token";

const BODY_PREVIEW_LIMIT: usize = 256;

/// Token response shape returned by `/oauth/token`.
pub type MeliTokenResponse = StandardTokenResponse<MeliTokenFields, BasicTokenType>;

/// OAuth grants issued against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// Exchange of an authorization code returned to the redirect URI.
	AuthorizationCode,
	/// Rotation of a refresh token.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// MercadoLibre-specific fields carried next to the standard token response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeliTokenFields {
	/// Identifier of the user who granted access.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<u64>,
}
impl ExtraTokenFields for MeliTokenFields {}

/// Form body for a single token endpoint call.
#[derive(Clone)]
pub(crate) struct TokenRequest {
	grant: GrantType,
	form: Vec<(&'static str, String)>,
}
impl TokenRequest {
	pub(crate) fn authorization_code(
		client_id: &str,
		client_secret: &TokenSecret,
		code: &str,
		redirect_uri: Option<&Url>,
		pkce_verifier: Option<&str>,
	) -> Self {
		let mut form = Self::base(GrantType::AuthorizationCode, client_id, client_secret);

		form.push(("code", code.to_owned()));

		if let Some(redirect_uri) = redirect_uri {
			form.push(("redirect_uri", redirect_uri.as_str().to_owned()));
		}
		if let Some(verifier) = pkce_verifier {
			form.push(("code_verifier", verifier.to_owned()));
		}

		Self { grant: GrantType::AuthorizationCode, form }
	}

	pub(crate) fn refresh(
		client_id: &str,
		client_secret: &TokenSecret,
		refresh_token: &TokenSecret,
	) -> Self {
		let mut form = Self::base(GrantType::RefreshToken, client_id, client_secret);

		form.push(("refresh_token", refresh_token.expose().to_owned()));

		Self { grant: GrantType::RefreshToken, form }
	}

	fn base(
		grant: GrantType,
		client_id: &str,
		client_secret: &TokenSecret,
	) -> Vec<(&'static str, String)> {
		vec![
			("grant_type", grant.as_str().to_owned()),
			("client_id", client_id.to_owned()),
			("client_secret", client_secret.expose().to_owned()),
		]
	}

	pub(crate) fn grant(&self) -> GrantType {
		self.grant
	}

	/// Encodes the form as an `application/x-www-form-urlencoded` POST to `endpoint`.
	pub(crate) fn into_http(self, endpoint: &Url) -> Result<HttpRequest> {
		let body = form_urlencoded::Serializer::new(String::new())
			.extend_pairs(self.form.iter().map(|(k, v)| (*k, v.as_str())))
			.finish();

		Request::builder()
			.method(Method::POST)
			.uri(endpoint.as_str())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json")
			.body(body.into_bytes())
			.map_err(|e| ConfigError::from(e).into())
	}
}
impl Debug for TokenRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let keys = self.form.iter().map(|(k, _)| *k).collect::<Vec<_>>();

		f.debug_struct("TokenRequest").field("grant", &self.grant).field("fields", &keys).finish()
	}
}

/// Canonical token endpoint failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// Code or refresh token was rejected.
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the application may use.
	InsufficientScope,
	/// Failure is temporary and may be retried.
	Transient,
}

/// Error payload returned by `/oauth/token`.
///
/// MercadoLibre reports `message` and `error` (plus `status` and `cause`); standard OAuth servers
/// use `error` and `error_description`. All are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TokenErrorBody {
	/// OAuth error code.
	#[serde(default)]
	pub error: Option<String>,
	/// RFC 6749 description.
	#[serde(default)]
	pub error_description: Option<String>,
	/// MercadoLibre human-readable message.
	#[serde(default)]
	pub message: Option<String>,
}
impl TokenErrorBody {
	fn description(&self) -> Option<&str> {
		self.error_description.as_deref().or(self.message.as_deref())
	}
}

/// Turns a token endpoint response into a [`TokenSet`] or a classified [`Error`].
pub(crate) fn parse_token_response(grant: GrantType, response: &ApiResponse) -> Result<TokenSet> {
	if !response.is_success() {
		return Err(map_error_response(grant, response));
	}

	let mut de = serde_json::Deserializer::from_slice(&response.body);
	let parsed: MeliTokenResponse = serde_path_to_error::deserialize(&mut de).map_err(|source| {
		TransientError::TokenResponseParse { source, status: Some(response.status_code()) }
	})?;

	map_token_response(parsed)
}

fn map_token_response(response: MeliTokenResponse) -> Result<TokenSet> {
	let issued_at = OffsetDateTime::now_utc();
	let expires_at = match response.expires_in() {
		Some(expires_in) => {
			let secs = i64::try_from(expires_in.as_secs())
				.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

			Some(
				issued_at
					.checked_add(Duration::seconds(secs))
					.ok_or(ConfigError::ExpiresInOutOfRange)?,
			)
		},
		None => None,
	};
	let scope = response.scopes().map(|scopes| {
		scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ")
	});

	Ok(TokenSet {
		access_token: TokenSecret::new(response.access_token().secret()),
		refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret())),
		user_id: response.extra_fields().user_id,
		scope,
		issued_at,
		expires_at,
	})
}

fn map_error_response(grant: GrantType, response: &ApiResponse) -> Error {
	let status = response.status_code();
	let body = serde_json::from_slice::<TokenErrorBody>(&response.body).ok();
	let preview = truncate_preview(response.text());
	let kind = classify_token_error(status, body.as_ref(), &preview);
	let detail = body
		.as_ref()
		.and_then(|body| body.description().or(body.error.as_deref()))
		.map(str::to_owned)
		.unwrap_or_else(|| format!("HTTP {status}"));
	let message = format!("{grant} grant failed: {detail}");

	#[cfg(feature = "tracing")]
	tracing::warn!(%grant, status, ?kind, "Token endpoint rejected the request.");

	match kind {
		TokenErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		TokenErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		TokenErrorKind::InsufficientScope => Error::InsufficientScope { reason: message },
		TokenErrorKind::Transient => TransientError::TokenEndpoint {
			message,
			status: Some(status),
			retry_after: response.retry_after(),
		}
		.into(),
	}
}

/// Classifies a failed token call.
///
/// Structured fields win over body text, and body text wins over the HTTP status.
pub fn classify_token_error(
	status: u16,
	body: Option<&TokenErrorBody>,
	preview: &str,
) -> TokenErrorKind {
	if let Some(kind) = body.and_then(|body| {
		body.error
			.as_deref()
			.and_then(match_exact_value)
			.or_else(|| body.description().and_then(match_exact_value))
			.or_else(|| classify_text(body.description()))
	}) {
		return kind;
	}
	if let Some(kind) = classify_text(Some(preview)) {
		return kind;
	}

	classify_status(status)
}

fn match_exact_value(value: &str) -> Option<TokenErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(TokenErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(TokenErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(TokenErrorKind::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
		|| value.eq_ignore_ascii_case("local_rate_limited")
	{
		Some(TokenErrorKind::Transient)
	} else {
		None
	}
}

fn classify_text(text: Option<&str>) -> Option<TokenErrorKind> {
	let lowered = text?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(TokenErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(TokenErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(TokenErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(TokenErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: u16) -> TokenErrorKind {
	match status {
		400 | 404 | 410 => TokenErrorKind::InvalidGrant,
		401 => TokenErrorKind::InvalidClient,
		403 => TokenErrorKind::InsufficientScope,
		_ => TokenErrorKind::Transient,
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
