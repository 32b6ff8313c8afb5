//! Walks through starting a PKCE login for a marketplace site and keeping the session around
//! for the redirect handler to exchange later.

// std
use std::collections::HashMap;
// crates.io
use color_eyre::Result;
// self
use meli_sdk::{client::MeliClient, http::TransportConfig, site::Site};

fn main() -> Result<()> {
	color_eyre::install()?;

	let client =
		MeliClient::with_reqwest(&TransportConfig::default(), "1234567890", "demo-client-secret")?;
	let plain = client.auth_url("https://app.example.com/oauth/callback", Site::Mla)?;

	println!("Plain login URL: {plain}.");

	let site = "mlb".parse::<Site>()?;
	let session = client.start_authorization("https://app.example.com/oauth/callback", site)?;

	println!("Send your user to {}.", &session.authorize_url);
	println!(
		"PKCE challenge ({:?}): {}.",
		session.code_challenge_method(),
		session.code_challenge()
	);

	let mut sessions = HashMap::new();

	sessions.insert(session.state.clone(), session.clone());

	// Simulate the redirect handler looking up the stored session by `state`.
	let returned_state = session.state.clone();

	if let Some(stashed) = sessions.remove(&returned_state) {
		stashed.validate_state(&returned_state)?;
		println!("Validated state for site {}.", stashed.site);
		println!("Call MeliClient::exchange_session with the returned code during the callback.");
	} else {
		eprintln!("State `{returned_state}` was not recognized.");
	}

	Ok(())
}
