//! Login URLs, authorization-code exchange, and refresh-token rotation.

// self
use crate::{
	_prelude::*,
	auth::TokenSet,
	client::{AuthorizationSession, MeliClient},
	error::ConfigError,
	http::Transport,
	oauth::{self, TOKEN_PATH, TokenRequest},
	obs::{self, CallKind, CallOutcome, CallSpan},
	site::Site,
};

impl<T> MeliClient<T>
where
	T: ?Sized + Transport,
{
	/// Builds the login URL for `site` and remembers `redirect_uri` for the code exchange.
	pub fn auth_url(&self, redirect_uri: &str, site: Site) -> Result<Url> {
		self.auth_url_with(redirect_uri, site.auth_base())
	}

	/// Builds the login URL against a custom login host.
	///
	/// The result is `<auth_base>/authorization?client_id=..&response_type=code&redirect_uri=..`.
	pub fn auth_url_with(&self, redirect_uri: &str, auth_base: &str) -> Result<Url> {
		let redirect = parse_redirect(redirect_uri)?;
		let url = self.login_url(auth_base, &redirect)?;

		*self.redirect_uri.write() = Some(redirect);

		Ok(url)
	}

	/// Starts a login with an anti-forgery `state` and a PKCE challenge.
	pub fn start_authorization(&self, redirect_uri: &str, site: Site) -> Result<AuthorizationSession> {
		let redirect = parse_redirect(redirect_uri)?;
		let login_url = self.login_url(site.auth_base(), &redirect)?;

		*self.redirect_uri.write() = Some(redirect.clone());

		Ok(AuthorizationSession::start(&self.client_id, site, redirect, login_url))
	}

	/// Exchanges an authorization code for tokens and stores them.
	///
	/// `redirect_uri` must match the one used for the login URL; when omitted, the URI remembered
	/// from [`auth_url`](Self::auth_url) is sent.
	pub async fn authorize(&self, code: &str, redirect_uri: Option<&str>) -> Result<TokenSet> {
		const KIND: CallKind = CallKind::AuthorizationCode;

		let span = CallSpan::new(KIND, "authorize");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				if code.trim().is_empty() {
					return Err(ConfigError::MissingAuthorizationCode.into());
				}

				let redirect = match redirect_uri {
					Some(raw) => {
						let redirect = parse_redirect(raw)?;

						*self.redirect_uri.write() = Some(redirect.clone());

						Some(redirect)
					},
					None => self.redirect_uri(),
				};
				let request = TokenRequest::authorization_code(
					&self.client_id,
					&self.client_secret,
					code,
					redirect.as_ref(),
					None,
				);

				self.store_tokens(request, false).await
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Completes a PKCE login started with [`start_authorization`](Self::start_authorization).
	pub async fn exchange_session(
		&self,
		session: AuthorizationSession,
		code: &str,
		returned_state: &str,
	) -> Result<TokenSet> {
		const KIND: CallKind = CallKind::AuthorizationCode;

		let span = CallSpan::new(KIND, "exchange_session");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				session.validate_state(returned_state)?;

				if code.trim().is_empty() {
					return Err(ConfigError::MissingAuthorizationCode.into());
				}

				let request = TokenRequest::authorization_code(
					&self.client_id,
					&self.client_secret,
					code,
					Some(&session.redirect_uri),
					Some(session.verifier()),
				);

				self.store_tokens(request, false).await
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Rotates the held refresh token for a new access token.
	///
	/// Fails with [`Error::OfflineAccessNotAllowed`] when no refresh token is held. When the
	/// endpoint does not rotate the refresh token, the previous one is kept. Concurrent calls are
	/// serialized.
	pub async fn refresh_access_token(&self) -> Result<TokenSet> {
		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "refresh_access_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.refresh_guard.lock().await;
				let refresh_token = self
					.tokens()
					.filter(TokenSet::can_refresh)
					.and_then(|set| set.refresh_token)
					.ok_or(Error::OfflineAccessNotAllowed)?;
				let request =
					TokenRequest::refresh(&self.client_id, &self.client_secret, &refresh_token);

				self.store_tokens(request, true).await
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	async fn store_tokens(&self, request: TokenRequest, keep_refresh: bool) -> Result<TokenSet> {
		let grant = request.grant();
		let endpoint = self.make_path(TOKEN_PATH, &[])?;
		let response = self.transport.send(request.into_http(&endpoint)?).await?;
		let mut issued = oauth::parse_token_response(grant, &response)?;

		if keep_refresh {
			issued = issued.inherit_refresh(self.tokens.read().as_ref());
		}

		*self.tokens.write() = Some(issued.clone());

		#[cfg(feature = "tracing")]
		tracing::info!(
			%grant,
			user_id = issued.user_id,
			refresh_held = issued.can_refresh(),
			"Tokens stored."
		);

		Ok(issued)
	}

	fn login_url(&self, auth_base: &str, redirect: &Url) -> Result<Url> {
		let base = auth_base.trim();

		if base.is_empty() {
			return Err(ConfigError::InvalidAuthUrl { source: None }.into());
		}

		let mut url = Url::parse(&format!("{}/authorization", base.trim_end_matches('/')))
			.map_err(|e| ConfigError::InvalidAuthUrl { source: Some(e) })?;

		url.query_pairs_mut()
			.append_pair("client_id", &self.client_id)
			.append_pair("response_type", "code")
			.append_pair("redirect_uri", redirect.as_str());

		Ok(url)
	}
}

fn parse_redirect(raw: &str) -> Result<Url> {
	Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidRedirect { source }.into())
}

fn record_outcome<V>(kind: CallKind, result: &Result<V>) {
	obs::record_call_outcome(
		kind,
		if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure },
	);
}
