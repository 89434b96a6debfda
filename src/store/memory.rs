// In-memory credential store
// Author: kelexine (https://github.com/kelexine)

use super::{
    read_credential, read_last_logged_in, remove_credential, write_credential, CredentialStore,
    Namespace, StoreEvent, EVENT_CHANNEL_CAPACITY, LAST_LOGGED_IN_KEY,
};
use crate::error::Result;
use crate::oauth::{Credential, Slot};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Process-local store used by tests and embedders that manage persistence
/// themselves. Shares the namespace layout of [`super::FileStore`].
pub struct MemoryStore {
    namespace: Mutex<Namespace>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            namespace: Mutex::new(Namespace::new()),
            events,
        }
    }

    /// Copy of the raw key-value namespace.
    pub fn snapshot(&self) -> Namespace {
        self.namespace.lock().clone()
    }

    fn notify(&self, slot: Slot) {
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent::Changed(slot));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, slot: Slot) -> Result<Credential> {
        Ok(read_credential(&self.namespace.lock(), slot))
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        write_credential(&mut self.namespace.lock(), credential);
        self.notify(credential.slot);
        Ok(())
    }

    fn clear(&self, slot: Slot) -> Result<()> {
        remove_credential(&mut self.namespace.lock(), slot);
        self.notify(slot);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        {
            let mut ns = self.namespace.lock();
            for slot in Slot::ALL {
                remove_credential(&mut ns, slot);
            }
            ns.remove(LAST_LOGGED_IN_KEY);
        }
        for slot in Slot::ALL {
            self.notify(slot);
        }
        Ok(())
    }

    fn compare_and_swap(&self, expected: &Credential, new: Option<&Credential>) -> Result<bool> {
        let slot = expected.slot;
        {
            let mut ns = self.namespace.lock();
            if read_credential(&ns, slot) != *expected {
                return Ok(false);
            }
            match new {
                Some(credential) => write_credential(&mut ns, credential),
                None => remove_credential(&mut ns, slot),
            }
        }
        self.notify(slot);
        Ok(true)
    }

    fn last_logged_in(&self) -> Result<Option<Slot>> {
        Ok(read_last_logged_in(&self.namespace.lock()))
    }

    fn set_last_logged_in(&self, slot: Slot) -> Result<()> {
        let previous = self
            .namespace
            .lock()
            .insert(LAST_LOGGED_IN_KEY.to_string(), slot.to_string());
        if previous.as_deref() != Some(slot.as_str()) {
            self.notify(slot);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
