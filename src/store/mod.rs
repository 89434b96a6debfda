//! Persistent credential storage.
//!
//! Credentials live in a flat string-to-string namespace using the same keys
//! the web front end keeps in browser storage (`tokenA`, `tokenA_expires`,
//! `tokenA_refresh`, ..., `lastLoggedInUser`), so both front ends can share one
//! session file. Every implementation publishes a [`StoreEvent`] whenever a
//! slot changes, letting other views react without polling.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::oauth::{Credential, Slot};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::warn;

/// Capacity of the change-notification channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

pub const LAST_LOGGED_IN_KEY: &str = "lastLoggedInUser";

/// Raw persisted key-value namespace.
pub(crate) type Namespace = BTreeMap<String, String>;

/// Change notification emitted by a credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The credential for this slot was written or cleared.
    Changed(Slot),
}

/// Synchronous key-value persistence of per-slot credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, slot: Slot) -> Result<Credential>;

    /// Overwrite the slot named by `credential.slot`. Absent fields are removed.
    fn set(&self, credential: &Credential) -> Result<()>;

    fn clear(&self, slot: Slot) -> Result<()>;

    /// Clear both slots and the last-logged-in marker.
    fn clear_all(&self) -> Result<()>;

    /// Atomically replace the slot with `new` (or clear it when `None`) only if
    /// the stored credential still equals `expected`. Returns whether it wrote.
    fn compare_and_swap(&self, expected: &Credential, new: Option<&Credential>) -> Result<bool>;

    fn last_logged_in(&self) -> Result<Option<Slot>>;

    fn set_last_logged_in(&self, slot: Slot) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

pub(crate) fn access_key(slot: Slot) -> String {
    format!("token{}", slot)
}

pub(crate) fn expires_key(slot: Slot) -> String {
    format!("token{}_expires", slot)
}

pub(crate) fn refresh_key(slot: Slot) -> String {
    format!("token{}_refresh", slot)
}

/// Decode one slot's credential out of the namespace.
pub(crate) fn read_credential(ns: &Namespace, slot: Slot) -> Credential {
    let expires_at = ns.get(&expires_key(slot)).and_then(|raw| match raw.parse::<i64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!("Ignoring unparseable expiry {:?} for user {}", raw, slot);
            None
        }
    });

    Credential {
        slot,
        access_token: ns.get(&access_key(slot)).cloned(),
        expires_at,
        refresh_token: ns.get(&refresh_key(slot)).cloned(),
    }
}

/// Replace one slot's keys in the namespace.
pub(crate) fn write_credential(ns: &mut Namespace, credential: &Credential) {
    let slot = credential.slot;
    remove_credential(ns, slot);

    // Expiry and refresh token mean nothing without an access token.
    let Some(access_token) = &credential.access_token else {
        return;
    };
    ns.insert(access_key(slot), access_token.clone());
    if let Some(expires_at) = credential.expires_at {
        ns.insert(expires_key(slot), expires_at.to_string());
    }
    if let Some(refresh_token) = &credential.refresh_token {
        ns.insert(refresh_key(slot), refresh_token.clone());
    }
}

pub(crate) fn remove_credential(ns: &mut Namespace, slot: Slot) {
    ns.remove(&access_key(slot));
    ns.remove(&expires_key(slot));
    ns.remove(&refresh_key(slot));
}

pub(crate) fn read_last_logged_in(ns: &Namespace) -> Option<Slot> {
    ns.get(LAST_LOGGED_IN_KEY).and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_keys() {
        let mut ns = Namespace::new();
        let cred = Credential {
            slot: Slot::B,
            access_token: Some("at".to_string()),
            expires_at: Some(1_700_000_000_000),
            refresh_token: Some("rt".to_string()),
        };
        write_credential(&mut ns, &cred);

        assert_eq!(ns.get("tokenB").map(String::as_str), Some("at"));
        assert_eq!(ns.get("tokenB_expires").map(String::as_str), Some("1700000000000"));
        assert_eq!(ns.get("tokenB_refresh").map(String::as_str), Some("rt"));
        assert_eq!(read_credential(&ns, Slot::B), cred);
        assert!(!read_credential(&ns, Slot::A).is_connected());
    }

    #[test]
    fn test_write_without_access_token_clears_slot() {
        let mut ns = Namespace::new();
        ns.insert("tokenA_refresh".to_string(), "stale".to_string());
        let mut orphan = Credential::empty(Slot::A);
        orphan.refresh_token = Some("rt".to_string());

        write_credential(&mut ns, &orphan);
        assert!(ns.is_empty());
    }

    #[test]
    fn test_unparseable_expiry_treated_as_absent() {
        let mut ns = Namespace::new();
        ns.insert("tokenA".to_string(), "at".to_string());
        ns.insert("tokenA_expires".to_string(), "NaN".to_string());

        let cred = read_credential(&ns, Slot::A);
        assert_eq!(cred.expires_at, None);
        assert!(!cred.is_expired());
    }
}
