//! Dual-slot session coordination.
//!
//! The `SessionCoordinator` owns the cached view of both slots that the front
//! end renders from. It ingests redirect callbacks into the credential store,
//! performs logouts, and keeps its view synchronized with store change events
//! so that a login or logout made in another view shows up without a manual
//! refresh.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod state;

pub use state::SessionState;

use crate::config::AppConfig;
use crate::error::{BlendError, Result};
use crate::oauth::{CallbackResult, Credential, Slot, TokenManager};
use crate::store::CredentialStore;
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SessionCoordinator {
    store: Arc<dyn CredentialStore>,
    tokens: TokenManager,
    view: Arc<watch::Sender<SessionState>>,
    http_client: Client,
    provider_logout_url: Option<String>,
    /// Provider logout requests that may still be in flight.
    provider_logouts: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SessionCoordinator {
    /// Builds the coordinator and loads the initial view from the store.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        http_client: Client,
        config: &AppConfig,
    ) -> Result<Self> {
        let tokens = TokenManager::new(
            Arc::clone(&store),
            http_client.clone(),
            &config.api,
            &config.auth,
        );
        let initial = SessionState::load(store.as_ref())?;
        let (view, _) = watch::channel(initial);

        Ok(Self {
            store,
            tokens,
            view: Arc::new(view),
            http_client,
            provider_logout_url: config.auth.provider_logout_url().map(str::to_string),
            provider_logouts: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Current view of both slots.
    pub fn session_state(&self) -> SessionState {
        self.view.borrow().clone()
    }

    /// Receiver notified whenever the view changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.view.subscribe()
    }

    pub fn both_connected(&self) -> bool {
        self.view.borrow().both_connected()
    }

    /// Recomputes the view from the store, notifying subscribers on change.
    pub fn resync(&self) -> Result<()> {
        resync_view(self.store.as_ref(), &self.view)
    }

    /// Applies a parsed redirect. Success writes the slot's credential; failure
    /// leaves every slot as it was and hands the error back to the caller.
    pub fn on_callback_result(&self, result: CallbackResult) -> Result<Slot> {
        match result {
            CallbackResult::Success {
                slot,
                access_token,
                expires_in,
                refresh_token,
            } => {
                let credential = Credential::issued(slot, access_token, expires_in, refresh_token);
                self.store.set(&credential)?;
                self.store.set_last_logged_in(slot)?;
                self.resync()?;
                info!("User {} connected", slot);
                Ok(slot)
            }
            CallbackResult::Failure(failure) => {
                warn!("Authorization callback failed: {}", failure);
                Err(failure.into())
            }
        }
    }

    /// Valid access token for `slot`, refreshing if needed. The view is
    /// resynced afterwards because a refresh may have cleared the slot.
    pub async fn valid_token(&self, slot: Slot) -> Result<Option<String>> {
        let token = self.tokens.get_valid_token(slot).await;
        self.resync()?;
        token
    }

    /// Like [`Self::valid_token`] but treats a logged-out slot as an error.
    pub async fn require_token(&self, slot: Slot) -> Result<String> {
        self.valid_token(slot)
            .await?
            .ok_or(BlendError::NotConnected(slot))
    }

    pub fn logout(&self, slot: Slot) -> Result<()> {
        self.store.clear(slot)?;
        self.resync()?;
        info!("User {} logged out", slot);
        self.spawn_provider_logout();
        Ok(())
    }

    pub fn logout_all(&self) -> Result<()> {
        self.store.clear_all()?;
        self.resync()?;
        info!("All users logged out");
        self.spawn_provider_logout();
        Ok(())
    }

    /// Reaction to a 401 from any authenticated call: both slots are dropped.
    pub fn handle_unauthorized(&self) -> Result<()> {
        warn!("Backend rejected credentials; clearing both sessions");
        for slot in Slot::ALL {
            self.store.clear(slot)?;
        }
        self.resync()
    }

    /// Starts a task that resyncs the view on every store change, including
    /// changes written by other processes. The task holds only weak references
    /// and ends once the store and every coordinator clone are dropped.
    pub fn spawn_store_listener(&self) -> JoinHandle<()> {
        let mut events = self.store.subscribe();
        let store = Arc::downgrade(&self.store);
        let view = Arc::downgrade(&self.view);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => debug!("Store event {:?}; resyncing session view", event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Missed {} store events; resyncing session view", skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                let (Some(store), Some(view)) = (store.upgrade(), view.upgrade()) else {
                    break;
                };
                if let Err(e) = resync_view(store.as_ref(), &view) {
                    warn!("Failed to resync session view: {}", e);
                }
            }
            debug!("Store listener stopped");
        })
    }

    /// Waits up to `limit` for provider logout requests started by
    /// [`Self::logout`] or [`Self::logout_all`]. Short-lived callers use this
    /// so the runtime is not torn down before the request goes out.
    pub async fn wait_for_provider_logout(&self, limit: Duration) {
        let pending: Vec<_> = self.provider_logouts.lock().drain(..).collect();
        if pending.is_empty() {
            return;
        }
        if tokio::time::timeout(limit, futures::future::join_all(pending))
            .await
            .is_err()
        {
            debug!("Provider logout still pending after {:?}; giving up", limit);
        }
    }

    /// Best-effort provider logout. Detached; its outcome never affects the
    /// local state, which is already cleared by the time this runs.
    fn spawn_provider_logout(&self) {
        let Some(url) = self.provider_logout_url.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime; skipping provider logout");
            return;
        };

        let client = self.http_client.clone();
        let task = handle.spawn(async move {
            match client.get(&url).send().await {
                Ok(resp) => debug!("Provider logout returned {}", resp.status()),
                Err(e) => debug!("Provider logout failed (ignored): {}", e),
            }
        });

        let mut pending = self.provider_logouts.lock();
        pending.retain(|t| !t.is_finished());
        pending.push(task);
    }
}

/// Recomputes `view` from `store`, notifying subscribers only on change.
fn resync_view(store: &dyn CredentialStore, view: &watch::Sender<SessionState>) -> Result<()> {
    let latest = SessionState::load(store)?;
    view.send_if_modified(|current| {
        if *current == latest {
            return false;
        }
        *current = latest;
        true
    });
    Ok(())
}
