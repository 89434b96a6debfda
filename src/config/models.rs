//! Configuration data structures for spotify-blend.
//!
//! This module defines the schema for the application settings: the backend
//! API location, session storage, blend defaults, and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::models::BlendStyle;
use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Backend API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Session storage and provider settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Defaults for playlist creation.
    #[serde(default)]
    pub blend: BlendConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the blend backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend serving `/auth`, `/data` and `/blend`.
    /// Default: `http://localhost:8000`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Overall timeout for every outbound request, in seconds.
    /// Default: `10`
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connection establishment timeout in seconds.
    /// Default: `5`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

/// Settings for credential persistence and session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path to the JSON session file shared by all views.
    /// Default: `~/.spotify-blend/session.json`
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Whether to watch the session file for changes made by other processes.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub watch_store: bool,

    /// Provider page hit on logout to drop the browser-side session.
    /// An empty string disables the call.
    /// Default: `https://accounts.spotify.com/logout`
    #[serde(default = "default_provider_logout_url")]
    pub provider_logout_url: String,

    /// Lifetime assumed when a refresh response omits `expires_in`.
    /// Default: `3600`
    #[serde(default = "default_expires_in")]
    pub default_expires_in_seconds: i64,
}

/// Defaults applied to `POST /blend/` when the caller does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendConfig {
    /// Default: `A + B Blend`
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,

    /// Number of top tracks taken from each user.
    /// Default: `25`
    #[serde(default = "default_tracks_per_user")]
    pub tracks_per_user: u32,

    /// Default: `interleave`
    #[serde(default)]
    pub style: BlendStyle,

    /// Playlist description; the backend generates one when unset.
    #[serde(default)]
    pub description: Option<String>,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `warn`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `compact`
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to mask tokens in logged URLs and response bodies.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub sanitize_tokens: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            watch_store: true,
            provider_logout_url: default_provider_logout_url(),
            default_expires_in_seconds: default_expires_in(),
        }
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            playlist_name: default_playlist_name(),
            tracks_per_user: default_tracks_per_user(),
            style: BlendStyle::default(),
            description: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            sanitize_tokens: true,
        }
    }
}

impl AuthConfig {
    /// The provider logout URL, if one is configured.
    pub fn provider_logout_url(&self) -> Option<&str> {
        Some(self.provider_logout_url.trim()).filter(|u| !u.is_empty())
    }
}

// Helper functions for serde defaults
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_store_path() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".spotify-blend")
        .join("session.json")
        .to_string_lossy()
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_provider_logout_url() -> String {
    "https://accounts.spotify.com/logout".to_string()
}

fn default_expires_in() -> i64 {
    3600 // 1 hour, Spotify's access token lifetime
}

fn default_playlist_name() -> String {
    "A + B Blend".to_string()
}

fn default_tracks_per_user() -> u32 {
    25
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout_seconds, 10);
        assert!(config.auth.store_path.ends_with("session.json"));
        assert_eq!(config.blend.playlist_name, "A + B Blend");
        assert_eq!(config.blend.style, BlendStyle::Interleave);
    }

    #[test]
    fn test_empty_logout_url_disables_call() {
        let auth = AuthConfig {
            provider_logout_url: "  ".to_string(),
            ..AuthConfig::default()
        };
        assert_eq!(auth.provider_logout_url(), None);
        assert!(AuthConfig::default().provider_logout_url().is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://blend.example.com"

            [blend]
            style = "shuffle"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://blend.example.com");
        assert_eq!(config.api.timeout_seconds, 10);
        assert_eq!(config.blend.style, BlendStyle::Shuffle);
        assert_eq!(config.logging.format, "compact");
    }
}
