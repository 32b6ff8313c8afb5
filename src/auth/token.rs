//! Token secrets and the token set issued by the `/oauth/token` endpoint.

pub mod secret;
pub mod set;
