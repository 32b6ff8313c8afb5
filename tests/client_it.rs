#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde::Deserialize;
// self
use meli_sdk::{
	client::MeliClient,
	error::{ConfigError, Error, TransportError},
	http::{DecodedBody, ReqwestTransport, TransportConfig},
	url::Url,
};

const CLIENT_ID: &str = "1234567890";
const CLIENT_SECRET: &str = "client-secret";

fn build_client(server: &MockServer) -> MeliClient<ReqwestTransport> {
	let transport = ReqwestTransport::new(&TransportConfig::default())
		.expect("Default transport config should build a reqwest client.");

	MeliClient::new(Arc::new(transport), CLIENT_ID, CLIENT_SECRET)
		.expect("Client credentials fixture should be valid.")
		.with_api_root(Url::parse(&server.base_url()).expect("Mock server URL should parse."))
}

#[derive(Debug, Deserialize)]
struct User {
	id: u64,
	nickname: String,
}

#[tokio::test]
async fn get_sends_bearer_token_and_query_params() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/users/me")
				.query_param("attributes", "id,nickname")
				.header("authorization", "Bearer APP_USR-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":202593498,\"nickname\":\"TETE2870021\"}");
		})
		.await;
	let client = build_client(&server).with_tokens("APP_USR-access", None);
	let response = client
		.get("users/me", &[("attributes", "id,nickname")])
		.await
		.expect("GET against the mock server should succeed.");

	mock.assert_async().await;

	let user = response.json::<User>().expect("User payload should decode.");

	assert_eq!(user.id, 202_593_498);
	assert_eq!(user.nickname, "TETE2870021");
}

#[tokio::test]
async fn post_and_put_send_json_bodies() {
	let server = MockServer::start_async().await;
	let post = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/items")
				.header("content-type", "application/json")
				.body_includes("\"title\":\"Mate\"");
			then.status(201).header("content-type", "application/json").body("{\"id\":\"MLA1\"}");
		})
		.await;
	let put = server
		.mock_async(|when, then| {
			when.method(PUT).path("/items/MLA1").body_includes("\"price\":10");
			then.status(200).header("content-type", "application/json").body("{\"id\":\"MLA1\"}");
		})
		.await;
	let client = build_client(&server).with_tokens("APP_USR-access", None);
	let created = client
		.post("/items", &serde_json::json!({ "title": "Mate" }), &[])
		.await
		.expect("POST should succeed.");
	let updated = client
		.put("/items/MLA1", &serde_json::json!({ "price": 10 }), &[])
		.await
		.expect("PUT should succeed.");

	post.assert_async().await;
	put.assert_async().await;

	assert_eq!(created.status_code(), 201);
	assert!(updated.is_success());
}

#[tokio::test]
async fn delete_and_options_return_error_statuses_verbatim() {
	let server = MockServer::start_async().await;
	let delete = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/questions/1");
			then.status(404).body("not found");
		})
		.await;
	let options = server
		.mock_async(|when, then| {
			when.method(OPTIONS).path("/items");
			then.status(204);
		})
		.await;
	let client = build_client(&server);
	let missing =
		client.delete("/questions/1", &[]).await.expect("DELETE should resolve to a response.");
	let preflight = client.options("/items", &[]).await.expect("OPTIONS should succeed.");

	delete.assert_async().await;
	options.assert_async().await;

	assert_eq!(missing.status_code(), 404);
	assert!(matches!(missing.decode(), DecodedBody::Raw { ref text, .. } if text == "not found"));
	assert_eq!(preflight.decode(), DecodedBody::Empty);
}

#[tokio::test]
async fn authorize_exchanges_code_and_refresh_rotates() {
	let server = MockServer::start_async().await;
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=TG-code")
				.body_includes("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"APP_USR-first\",\"token_type\":\"bearer\",\"expires_in\":21600,\"scope\":\"offline_access read\",\"user_id\":7,\"refresh_token\":\"TG-first\"}",
			);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=TG-first");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"APP_USR-second\",\"token_type\":\"bearer\",\"expires_in\":21600,\"refresh_token\":\"TG-second\"}",
			);
		})
		.await;
	let client = build_client(&server);
	let first = client
		.authorize("TG-code", Some("https://app.example.com/cb"))
		.await
		.expect("Authorization code exchange should succeed.");

	assert_eq!(first.access_token.expose(), "APP_USR-first");
	assert_eq!(first.user_id, Some(7));

	let second = client.refresh_access_token().await.expect("Refresh should succeed.");

	exchange.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(second.access_token.expose(), "APP_USR-second");
	assert_eq!(client.refresh_token().as_ref().map(|secret| secret.expose()), Some("TG-second"));
}

#[tokio::test]
async fn token_endpoint_errors_are_classified() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"message\":\"Error validating grant. Your authorization code or refresh token may be expired or it was already used\",\"error\":\"invalid_grant\",\"status\":400,\"cause\":[]}",
			);
		})
		.await;
	let client = build_client(&server);
	let err = client
		.authorize("TG-used", Some("https://app.example.com/cb"))
		.await
		.expect_err("Used authorization code should be rejected.");

	mock.assert_async().await;

	assert!(matches!(err, Error::InvalidGrant { .. }));
	assert!(client.access_token().is_none());
}

#[tokio::test]
async fn refresh_without_offline_access_never_reaches_the_server() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200);
		})
		.await;
	let client = build_client(&server).with_tokens("APP_USR-access", None);
	let err = client.refresh_access_token().await.expect_err("Refresh should be refused.");

	assert!(matches!(err, Error::OfflineAccessNotAllowed));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn strict_decode_reports_the_failing_field() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/me");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"not-a-number\",\"nickname\":\"x\"}");
		})
		.await;
	let client = build_client(&server);
	let response = client.get("/users/me", &[]).await.expect("GET should succeed.");
	let err = response.json::<User>().expect_err("String id should fail strict decoding.");

	match err {
		Error::Decode { source, status } => {
			assert_eq!(status, 200);
			assert_eq!(source.path().to_string(), "id");
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn unreachable_host_surfaces_transport_errors() {
	let transport = ReqwestTransport::new(&TransportConfig::default().with_timeouts(2, 5))
		.expect("Transport config should build a reqwest client.");
	let client = MeliClient::new(Arc::new(transport), CLIENT_ID, CLIENT_SECRET)
		.expect("Client credentials fixture should be valid.")
		.with_api_root(Url::parse("http://127.0.0.1:9").expect("Discard port URL should parse."));
	let err = client.get("/sites", &[]).await.expect_err("Closed port should fail to connect.");

	assert!(matches!(
		err,
		Error::Transport(TransportError::Network { .. } | TransportError::Timeout { .. })
	));
}

#[test]
fn empty_credentials_are_rejected() {
	let transport = ReqwestTransport::new(&TransportConfig::default())
		.expect("Default transport config should build a reqwest client.");
	let transport = Arc::new(transport);

	assert!(matches!(
		MeliClient::new(transport.clone(), "", CLIENT_SECRET),
		Err(Error::Config(ConfigError::InvalidClientId))
	));
	assert!(matches!(
		MeliClient::new(transport, CLIENT_ID, ""),
		Err(Error::Config(ConfigError::InvalidClientSecret))
	));
}
