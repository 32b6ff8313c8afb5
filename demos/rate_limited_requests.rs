//! Sends a burst of calls through a rate-limited client against a local mock API and prints
//! each throttling event the limiter reports.

// std
use std::time::Instant;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use meli_sdk::{client::MeliClient, http::TransportConfig, rate_limit::RateLimitConfig};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/sites/MLA/categories");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let budget =
		RateLimitConfig::new(3, Duration::seconds(2))?.with_safety_margin(Duration::milliseconds(100))?;
	let client =
		MeliClient::rate_limited(&TransportConfig::default(), budget, "1234567890", "demo-secret")?
			.with_api_root(Url::parse(&server.base_url())?);

	client.transport().set_observer(|event| {
		println!(
			"Throttled: {} of {} calls in the window, waiting {:.2}s.",
			event.current_count,
			event.max_requests,
			event.wait.as_seconds_f64()
		);
	});

	let started = Instant::now();

	for i in 1..=7 {
		let response = client.get("/sites/MLA/categories", &[]).await?;
		let stats = client.transport().stats();

		println!(
			"Call {i}: HTTP {} after {:?} ({} remaining).",
			response.status_code(),
			started.elapsed(),
			stats.requests_remaining
		);
	}

	mock.assert_calls_async(7).await;

	println!("Limiter counters: {:?}.", client.transport().metrics());

	Ok(())
}
