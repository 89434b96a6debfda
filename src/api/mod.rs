//! Client for the blend backend.
//!
//! `BlendClient` wraps the authenticated `/data` endpoints and playlist
//! creation. Every call obtains its bearer token through the session
//! coordinator, so expired tokens are refreshed transparently, and a 401 from
//! any endpoint logs both users out.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod client;

pub use client::{BlendClient, BlendOptions, BlendPreview};

use crate::config::ApiConfig;
use crate::error::{BlendError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Shared HTTP client. Every request is bounded by the configured timeout so
/// a hung backend cannot stall token refresh or data fetches.
pub fn build_http_client(config: &ApiConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("spotify-blend/", env!("CARGO_PKG_VERSION")))
        .use_rustls_tls()
        .build()
        .map_err(|e| BlendError::Internal(format!("Failed to create HTTP client: {}", e)))?;

    debug!(
        "Created HTTP client (timeout {}s, connect timeout {}s)",
        config.timeout_seconds, config.connect_timeout_seconds
    );
    Ok(client)
}
