//! Credentials and token models held by the client.

pub mod token;

pub use token::{secret::*, set::*};
