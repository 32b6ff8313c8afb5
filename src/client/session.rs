//! Login session carrying the anti-forgery `state` and a PKCE pair.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, site::Site};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Login handshake returned by [`MeliClient::start_authorization`](super::MeliClient::start_authorization).
///
/// Send the user to [`authorize_url`](Self::authorize_url), keep the session until the redirect
/// comes back, then pass it to
/// [`MeliClient::exchange_session`](super::MeliClient::exchange_session) with the returned `code`
/// and `state`.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Marketplace the user logs in on.
	pub site: Site,
	/// Opaque value that must round-trip through the redirect.
	pub state: String,
	/// Redirect URI embedded in the login URL.
	pub redirect_uri: Url,
	/// Login URL to send the user to.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	pub(super) fn start(client_id: &str, site: Site, redirect_uri: Url, login_url: Url) -> Self {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let mut authorize_url = login_url;

		authorize_url
			.query_pairs_mut()
			.append_pair("state", &state)
			.append_pair("code_challenge", &pkce.challenge)
			.append_pair("code_challenge_method", pkce.method.as_str());

		#[cfg(feature = "tracing")]
		tracing::debug!(client_id, site = site.as_str(), "Authorization session started.");
		#[cfg(not(feature = "tracing"))]
		let _ = client_id;

		Self { site, state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Checks the `state` returned with the redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "Authorization state mismatch.".into() })
		}
	}

	pub(super) fn verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("site", &self.site)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("authorize_url", &self.authorize_url.as_str())
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session() -> AuthorizationSession {
		AuthorizationSession::start(
			"123",
			Site::Mla,
			Url::parse("https://app.example.com/cb").expect("Redirect fixture should parse."),
			Url::parse("https://auth.mercadolibre.com.ar/authorization?client_id=123")
				.expect("Login URL fixture should parse."),
		)
	}

	#[test]
	fn challenge_matches_rfc_7636_vector() {
		assert_eq!(
			pkce_challenge("dBjftJeZ4CK-P5tM6JrKeEWx8e6n8eqYeU8BwYzhTSA"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn start_appends_state_and_challenge() {
		let session = session();
		let pairs = session.authorize_url.query_pairs().into_owned().collect::<Vec<_>>();

		assert_eq!(session.state.len(), STATE_LEN);
		assert_eq!(session.verifier().len(), PKCE_VERIFIER_LEN);
		assert!(pairs.contains(&("client_id".into(), "123".into())));
		assert!(pairs.contains(&("state".into(), session.state.clone())));
		assert!(pairs.contains(&("code_challenge".into(), session.code_challenge().into())));
		assert!(pairs.contains(&("code_challenge_method".into(), "S256".into())));
		assert!(!format!("{session:?}").contains(session.verifier()));
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let session = session();

		assert!(session.validate_state(&session.state.clone()).is_ok());

		let err = session.validate_state("forged").expect_err("State mismatch should fail.");

		assert!(matches!(err, Error::InvalidGrant { .. }));
	}
}
