//! MercadoLibre API client with OAuth token exchange, refresh rotation, and a sliding-window
//! rate limiter that every outbound call funnels through.
//!
//! The crate is layered:
//!
//! - [`http::Transport`] performs a single HTTP request; [`http::ReqwestTransport`] is the default
//!   implementation.
//! - [`rate_limit::RateLimitedTransport`] decorates any transport with admission control and is a
//!   transport itself, so the two are interchangeable.
//! - [`client::MeliClient`] owns credentials and tokens and exposes the OAuth handshake plus the
//!   `GET`/`POST`/`PUT`/`DELETE`/`OPTIONS` passthrough verbs.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod rate_limit;
pub mod site;

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
