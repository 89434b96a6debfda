// Snapshot of both slots as rendered by the front end
// Author: kelexine (https://github.com/kelexine)

use crate::error::Result;
use crate::oauth::{Credential, Slot, SlotStatus};
use crate::store::CredentialStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub a: Credential,
    pub b: Credential,
    /// Slot of the most recent successful login, if any.
    pub last_logged_in: Option<Slot>,
}

impl SessionState {
    pub fn load(store: &dyn CredentialStore) -> Result<Self> {
        Ok(Self {
            a: store.get(Slot::A)?,
            b: store.get(Slot::B)?,
            last_logged_in: store.last_logged_in()?,
        })
    }

    pub fn get(&self, slot: Slot) -> &Credential {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    pub fn status(&self, slot: Slot) -> SlotStatus {
        if self.get(slot).is_connected() {
            SlotStatus::Connected
        } else {
            SlotStatus::Disconnected
        }
    }

    /// Both slots hold an access token; the blend can be created.
    pub fn both_connected(&self) -> bool {
        self.a.is_connected() && self.b.is_connected()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            a: Credential::empty(Slot::A),
            b: Credential::empty(Slot::B),
            last_logged_in: None,
        }
    }
}
