// Error types for spotify-blend
// Author: kelexine (https://github.com/kelexine)

use crate::oauth::Slot;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlendError {
    /// The authorization redirect carried an `error` parameter.
    #[error("Authentication failed: {0}")]
    ProviderAuth(String),

    #[error("missing authentication data")]
    MissingData,

    #[error("Unknown user slot: {0:?}")]
    InvalidSlot(String),

    #[error("Access token for user {0} expired and no refresh token is stored")]
    ExpiredNoRefresh(Slot),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Unauthorized - all sessions were cleared")]
    Unauthorized,

    #[error("User {0} is not connected")]
    NotConnected(Slot),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlendError {
    /// Errors after which the front end should send the user back to the home view.
    pub fn requires_home_redirect(&self) -> bool {
        matches!(
            self,
            BlendError::ProviderAuth(_)
                | BlendError::MissingData
                | BlendError::InvalidSlot(_)
                | BlendError::Unauthorized
        )
    }
}

pub type Result<T> = std::result::Result<T, BlendError>;
