//! Authorization redirect parsing.
//!
//! The backend finishes the provider handshake and redirects the browser to
//! `/callback?access_token=..&state=..&expires_in=..&refresh_token=..`, or to a
//! URL carrying `error`/`message` when something went wrong. [`parse`] turns
//! those query parameters into a [`CallbackResult`] without touching any state;
//! the session coordinator decides what to do with it.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::Slot;
use crate::error::BlendError;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Message used when the provider reports an error without describing it.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Authentication failed";

/// Delay before returning to the home view after a successful login.
pub const SUCCESS_REDIRECT_DELAY: Duration = Duration::from_millis(1500);

/// Delay before returning to the home view after a failed login, long enough
/// to read the message.
pub const FAILURE_REDIRECT_DELAY: Duration = Duration::from_millis(3000);

/// Outcome of one authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    Success {
        slot: Slot,
        access_token: String,
        /// Token lifetime in seconds, as reported by the provider.
        expires_in: Option<i64>,
        refresh_token: Option<String>,
    },
    Failure(CallbackFailure),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackFailure {
    #[error("{message}")]
    Provider { message: String },

    #[error("missing authentication data")]
    MissingData,

    #[error("unknown user slot: {0:?}")]
    InvalidSlot(String),
}

impl CallbackFailure {
    /// Text shown to the user while the redirect home is pending.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<CallbackFailure> for BlendError {
    fn from(failure: CallbackFailure) -> Self {
        match failure {
            CallbackFailure::Provider { message } => BlendError::ProviderAuth(message),
            CallbackFailure::MissingData => BlendError::MissingData,
            CallbackFailure::InvalidSlot(raw) => BlendError::InvalidSlot(raw),
        }
    }
}

impl CallbackResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CallbackResult::Success { .. })
    }

    /// How long the front end waits before navigating back home.
    pub fn redirect_delay(&self) -> Duration {
        if self.is_success() {
            SUCCESS_REDIRECT_DELAY
        } else {
            FAILURE_REDIRECT_DELAY
        }
    }
}

/// Classify redirect query parameters. Empty values count as absent.
pub fn parse(params: &HashMap<String, String>) -> CallbackResult {
    let get = |key: &str| {
        params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    if get("error").is_some() {
        let message = get("message").unwrap_or(DEFAULT_FAILURE_MESSAGE).to_string();
        return CallbackResult::Failure(CallbackFailure::Provider { message });
    }

    let (Some(access_token), Some(state)) = (get("access_token"), get("state")) else {
        return CallbackResult::Failure(CallbackFailure::MissingData);
    };

    let slot = match state.parse::<Slot>() {
        Ok(slot) => slot,
        Err(_) => return CallbackResult::Failure(CallbackFailure::InvalidSlot(state.to_string())),
    };

    CallbackResult::Success {
        slot,
        access_token: access_token.to_string(),
        expires_in: get("expires_in").and_then(|v| v.parse::<i64>().ok()),
        refresh_token: get("refresh_token").map(str::to_string),
    }
}

/// Parse a raw `key=value&key=value` query string (leading `?` allowed).
pub fn parse_query(query: &str) -> CallbackResult {
    parse(&query_params(query))
}

/// Parse a full redirect URL, e.g. `http://localhost:3000/callback?access_token=..`.
pub fn parse_url(url: &str) -> CallbackResult {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    // Fragments are never part of the callback contract.
    let query = query.split('#').next().unwrap_or("");
    parse_query(query)
}

fn query_params(query: &str) -> HashMap<String, String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = HashMap::new();

    for param in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        let decode = |raw: &str| {
            let raw = raw.replace('+', " ");
            urlencoding::decode(&raw)
                .map(|v| v.into_owned())
                .unwrap_or(raw)
        };
        // First occurrence wins, like URLSearchParams::get.
        params.entry(decode(key)).or_insert_with(|| decode(value));
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_success_with_token_and_state() {
        let result = parse(&params(&[("access_token", "t"), ("state", "A")]));
        assert_eq!(
            result,
            CallbackResult::Success {
                slot: Slot::A,
                access_token: "t".to_string(),
                expires_in: None,
                refresh_token: None,
            }
        );
    }

    #[test]
    fn test_provider_error_uses_message() {
        let result = parse(&params(&[("error", "denied"), ("message", "user cancelled")]));
        match result {
            CallbackResult::Failure(f) => assert_eq!(f.message(), "user cancelled"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_error_default_message() {
        let result = parse(&params(&[("error", "auth_failed")]));
        assert_eq!(
            result,
            CallbackResult::Failure(CallbackFailure::Provider {
                message: DEFAULT_FAILURE_MESSAGE.to_string()
            })
        );
    }

    #[test]
    fn test_error_wins_over_token() {
        let result = parse(&params(&[
            ("access_token", "t"),
            ("state", "A"),
            ("error", "denied"),
        ]));
        assert!(!result.is_success());
    }

    #[test]
    fn test_missing_state() {
        let result = parse(&params(&[("access_token", "t")]));
        match result {
            CallbackResult::Failure(f) => {
                assert_eq!(f, CallbackFailure::MissingData);
                assert_eq!(f.message(), "missing authentication data");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_token_counts_as_missing() {
        let result = parse(&params(&[("access_token", ""), ("state", "B")]));
        assert_eq!(result, CallbackResult::Failure(CallbackFailure::MissingData));
    }

    #[test]
    fn test_unknown_slot_rejected() {
        let result = parse(&params(&[("access_token", "t"), ("state", "C")]));
        assert_eq!(
            result,
            CallbackResult::Failure(CallbackFailure::InvalidSlot("C".to_string()))
        );
    }

    #[test]
    fn test_optional_fields() {
        let result = parse_query("access_token=t&state=B&expires_in=3600&refresh_token=r");
        assert_eq!(
            result,
            CallbackResult::Success {
                slot: Slot::B,
                access_token: "t".to_string(),
                expires_in: Some(3600),
                refresh_token: Some("r".to_string()),
            }
        );
    }

    #[test]
    fn test_garbage_expiry_ignored() {
        match parse_query("access_token=t&state=A&expires_in=soon") {
            CallbackResult::Success { expires_in, .. } => assert_eq!(expires_in, None),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_url_decodes_values() {
        let result = parse_url(
            "http://localhost:3000/?error=auth_failed&message=Failed%20to%20get%20access+token",
        );
        assert_eq!(
            result,
            CallbackResult::Failure(CallbackFailure::Provider {
                message: "Failed to get access token".to_string()
            })
        );
    }

    #[test]
    fn test_redirect_delays() {
        let ok = parse_query("?access_token=t&state=A");
        let failed = parse_query("");
        assert_eq!(ok.redirect_delay(), SUCCESS_REDIRECT_DELAY);
        assert_eq!(failed.redirect_delay(), FAILURE_REDIRECT_DELAY);
    }
}
