//! Token set issued by the authorization-code and refresh grants.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Tokens currently held by a [`MeliClient`](crate::client::MeliClient).
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
	/// Bearer token attached to API calls.
	pub access_token: TokenSecret,
	/// Refresh token, present when the application has offline access.
	pub refresh_token: Option<TokenSecret>,
	/// Numeric identifier of the user who granted access, when reported.
	pub user_id: Option<u64>,
	/// Space-delimited scopes reported by the token endpoint.
	pub scope: Option<String>,
	/// Instant the tokens were received.
	pub issued_at: OffsetDateTime,
	/// Access token expiry, when the endpoint reported `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenSet {
	/// Creates a set from raw token strings with no expiry metadata.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: refresh_token.map(TokenSecret::new),
			user_id: None,
			scope: None,
			issued_at: OffsetDateTime::now_utc(),
			expires_at: None,
		}
	}

	/// Returns `true` when a refresh token is held.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|secret| !secret.is_blank())
	}

	/// Returns `true` when the access token is past its expiry at `instant`.
	///
	/// Sets without a known expiry never report as expired.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` when the access token is past its expiry now.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Keeps the previous refresh token when the new set arrived without one.
	pub(crate) fn inherit_refresh(mut self, previous: Option<&TokenSet>) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token = previous.and_then(|set| set.refresh_token.clone());
		}

		self
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("user_id", &self.user_id)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
