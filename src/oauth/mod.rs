// OAuth session types shared by the store, token manager and coordinator
// Author: kelexine (https://github.com/kelexine)

pub mod callback;
pub mod login;
mod manager;

pub use callback::{CallbackFailure, CallbackResult};
pub use manager::TokenManager;

use crate::error::BlendError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// One of the two identity positions a session can bind an account to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::A, Slot::B];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::A => "A",
            Slot::B => "B",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = BlendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Slot::A),
            "B" | "b" => Ok(Slot::B),
            other => Err(BlendError::InvalidSlot(other.to_string())),
        }
    }
}

/// Access/refresh token triple stored for a slot.
///
/// A credential without an access token means the slot is logged out; the
/// expiry and refresh token carry no meaning on their own.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Credential {
    #[zeroize(skip)]
    pub slot: Slot,
    pub access_token: Option<String>,
    /// Absolute expiry in epoch milliseconds. `None` never expires.
    pub expires_at: Option<i64>,
    pub refresh_token: Option<String>,
}

// Custom Debug impl that never logs tokens
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credential")
            .field("slot", &self.slot)
            .field("access_token", &redact(&self.access_token))
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

impl Credential {
    /// The logged-out credential for a slot.
    pub fn empty(slot: Slot) -> Self {
        Self {
            slot,
            access_token: None,
            expires_at: None,
            refresh_token: None,
        }
    }

    /// Build a credential from a token grant, turning `expires_in` seconds into
    /// an absolute deadline. Lifetimes beyond the `i64` range saturate.
    pub fn issued(
        slot: Slot,
        access_token: impl Into<String>,
        expires_in: Option<i64>,
        refresh_token: Option<String>,
    ) -> Self {
        let expires_at = expires_in.map(|secs| {
            chrono::Utc::now()
                .timestamp_millis()
                .saturating_add(secs.saturating_mul(1000))
        });
        Self {
            slot,
            access_token: Some(access_token.into()),
            expires_at,
            refresh_token,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }

    /// Check whether the access token has reached its recorded expiry.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_millis >= expires_at,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp_millis())
    }

    /// Remaining lifetime in seconds, if an expiry is recorded.
    pub fn expires_in_seconds(&self) -> Option<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        self.expires_at.map(|e| e.saturating_sub(now) / 1000)
    }
}

/// Connection status of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Disconnected,
    Connected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_impl_masks_tokens() {
        let creds = Credential {
            slot: Slot::A,
            access_token: Some("BQD-secret-access".to_string()),
            expires_at: Some(1768126811935),
            refresh_token: Some("AQC-secret-refresh".to_string()),
        };

        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("BQD-secret"));
        assert!(!debug_str.contains("AQC-secret"));
        assert!(debug_str.contains("1768126811935"));
    }

    #[test]
    fn test_expiry_detection() {
        let now = chrono::Utc::now().timestamp_millis();
        let creds = Credential {
            slot: Slot::B,
            access_token: Some("t".to_string()),
            expires_at: Some(now + 3_600_000),
            refresh_token: None,
        };

        assert!(!creds.is_expired());
        assert!(creds.is_expired_at(now + 3_600_000));
        assert!(creds.expires_in_seconds().unwrap() > 3500);
    }

    #[test]
    fn test_missing_expiry_never_expires() {
        let creds = Credential::issued(Slot::A, "t", None, None);
        assert!(!creds.is_expired_at(i64::MAX));
        assert_eq!(creds.expires_in_seconds(), None);
    }

    #[test]
    fn test_extreme_lifetimes_saturate() {
        let forever = Credential::issued(Slot::A, "t", Some(i64::MAX), None);
        assert_eq!(forever.expires_at, Some(i64::MAX));
        assert!(!forever.is_expired());

        let long_gone = Credential::issued(Slot::B, "t", Some(i64::MIN), None);
        assert_eq!(long_gone.expires_at, Some(i64::MIN));
        assert!(long_gone.is_expired());
    }

    #[test]
    fn test_expires_in_seconds_with_extreme_deadline() {
        let creds = Credential {
            slot: Slot::A,
            access_token: Some("t".to_string()),
            expires_at: Some(i64::MIN),
            refresh_token: None,
        };
        assert!(creds.expires_in_seconds().unwrap() < 0);

        let mut creds = creds;
        creds.expires_at = Some(i64::MAX);
        assert!(creds.expires_in_seconds().unwrap() > 0);
    }

    #[test]
    fn test_slot_parsing() {
        assert_eq!("A".parse::<Slot>().unwrap(), Slot::A);
        assert_eq!(" b ".parse::<Slot>().unwrap(), Slot::B);
        assert!(matches!(
            "C".parse::<Slot>(),
            Err(BlendError::InvalidSlot(s)) if s == "C"
        ));
        assert_eq!(Slot::B.to_string(), "B");
    }
}
