//! Structured logging and token-safe trace utilities.
//!
//! This module configures the `tracing` ecosystem for the application and
//! provides [`sanitize`] to keep access and refresh tokens out of log sinks.
//! Logs go to stderr so command output on stdout stays scriptable.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static SANITIZE_ENABLED: AtomicBool = AtomicBool::new(true);

/// Markers after which a secret value follows.
const SECRET_MARKERS: &[(&str, &str)] = &[
    ("Bearer ", "[REDACTED_TOKEN]"),
    ("access_token=", "[REDACTED_ACCESS_TOKEN]"),
    ("refresh_token=", "[REDACTED_REFRESH_TOKEN]"),
    ("\"access_token\":\"", "[REDACTED_ACCESS_TOKEN]"),
    ("\"refresh_token\":\"", "[REDACTED_REFRESH_TOKEN]"),
    ("\"token_a\":\"", "[REDACTED_TOKEN]"),
    ("\"token_b\":\"", "[REDACTED_TOKEN]"),
];

/// Initializes the global tracing subscriber for the application.
///
/// Supports three output formats:
/// - `json`: Structured JSON logs for ingestion.
/// - `pretty`: Human-readable, multi-line output for development.
/// - `compact` (default): One line per event.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    SANITIZE_ENABLED.store(config.sanitize_tokens, Ordering::Relaxed);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Replaces token values in `input` with `[REDACTED_*]` placeholders.
///
/// Covers `Bearer` headers, `access_token=`/`refresh_token=` query parameters
/// and the JSON fields carrying tokens in refresh and blend bodies. A no-op
/// when sanitizing was disabled in [`LoggingConfig`].
pub fn sanitize(input: &str) -> String {
    if !SANITIZE_ENABLED.load(Ordering::Relaxed) {
        return input.to_string();
    }

    let mut result = input.to_string();
    for (marker, placeholder) in SECRET_MARKERS {
        let mut search_from = 0;
        while let Some(found) = result[search_from..].find(marker) {
            let start = search_from + found + marker.len();
            let end = result[start..]
                .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '&' | ','))
                .map(|i| start + i)
                .unwrap_or(result.len());
            search_from = if end > start {
                result.replace_range(start..end, placeholder);
                start + placeholder.len()
            } else {
                start
            };
        }
    }
    result
}
