//! Demonstrates plugging a custom, non-reqwest transport into the client and the rate limiter.
//!
//! 1. Implement [`Transport`] for your HTTP stack (here an in-memory canned responder).
//! 2. Wrap it in [`RateLimitedTransport`] so every call is admitted by the sliding window.
//! 3. Hand the wrapped transport to [`MeliClient::new`]; token calls and API verbs now share the
//!    same budget, and transport failures surface unchanged.

// std
use std::{
	fmt::{Display, Formatter, Result as FmtResult},
	sync::Arc,
};
// crates.io
use color_eyre::Result;
use time::Duration;
// self
use meli_sdk::{
	client::MeliClient,
	error::{Error, TransportError},
	http::{ApiResponse, HttpRequest, Transport, TransportFuture},
	http_types::{HeaderMap, StatusCode},
	rate_limit::{RateLimitConfig, RateLimitedTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let budget = RateLimitConfig::new(10, Duration::seconds(1))?;
	let transport =
		Arc::new(RateLimitedTransport::new(Arc::new(CannedTransport::Healthy), budget));
	let client = MeliClient::new(transport, "1234567890", "demo-secret")?;
	let tokens = client.authorize("TG-demo-code", Some("https://app.example.com/cb")).await?;

	println!("Access token issued by the canned transport: {}.", tokens.access_token.expose());

	let me = client.get("/users/me", &[]).await?;

	println!("GET /users/me answered {} with {}.", me.status_code(), me.text());
	println!("Limiter state: {:?}.", client.transport().stats());

	let failing = RateLimitedTransport::new(
		Arc::new(CannedTransport::Unreachable { host: "api.mercadolibre.com" }),
		budget,
	);
	let failing_client = MeliClient::new(Arc::new(failing), "1234567890", "demo-secret")?;

	match failing_client.get("/sites", &[]).await {
		Ok(_) => println!("Canned transport unexpectedly succeeded."),
		Err(Error::Transport(e)) => println!("Transport error passed through the limiter: {e}."),
		Err(e) => println!("Unexpected error: {e}."),
	}

	Ok(())
}

#[derive(Debug)]
struct DnsFailure {
	host: &'static str,
}
impl Display for DnsFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "DNS lookup failed for {}", self.host)
	}
}
impl std::error::Error for DnsFailure {}

#[derive(Debug)]
enum CannedTransport {
	Healthy,
	Unreachable { host: &'static str },
}
impl Transport for CannedTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			match self {
				Self::Healthy => {
					let body: &[u8] = if request.uri().path() == "/oauth/token" {
						b"{\"access_token\":\"APP_USR-canned\",\"token_type\":\"bearer\",\"expires_in\":21600,\"user_id\":1}"
					} else {
						b"{\"id\":1,\"nickname\":\"CANNED_USER\"}"
					};

					Ok(ApiResponse::new(StatusCode::OK, HeaderMap::new(), body))
				},
				Self::Unreachable { host } =>
					Err(TransportError::network(DnsFailure { host: *host }).into()),
			}
		})
	}
}
