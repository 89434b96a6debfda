//! Per-slot access token lifecycle.
//!
//! This module provides the `TokenManager`, which serves currently valid access
//! tokens for either slot. Tokens past their recorded expiry are exchanged once
//! against the backend's `/auth/refresh` endpoint; when that is impossible or
//! fails, the slot is cleared so the user is asked to log in again.
//!
//! Refreshes are serialized per slot with a "double-checked locking" guard:
//! concurrent callers wait for the in-flight exchange and then observe its
//! outcome from the store instead of issuing their own. The final write is a
//! compare-and-swap against the credential the exchange started from, so a
//! re-login or logout performed meanwhile (possibly in another process) wins.

// Author: kelexine (https://github.com/kelexine)

use super::{Credential, Slot};
use crate::config::{ApiConfig, AuthConfig};
use crate::error::{BlendError, Result};
use crate::models::{RefreshRequest, RefreshResponse};
use crate::store::CredentialStore;
use crate::utils::logging::sanitize;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Path of the refresh endpoint relative to the API base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Serves valid access tokens for both slots, refreshing on demand.
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    http_client: Client,
    refresh_url: String,
    /// Lifetime assumed when the refresh response omits `expires_in`.
    default_expires_in: i64,
    /// One in-flight refresh guard per slot, indexed by [`Slot::index`].
    refresh_locks: Arc<[Mutex<()>; 2]>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        http_client: Client,
        api: &ApiConfig,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            store,
            http_client,
            refresh_url: format!("{}{}", api.base_url.trim_end_matches('/'), REFRESH_PATH),
            default_expires_in: auth.default_expires_in_seconds,
            refresh_locks: Arc::new([Mutex::new(()), Mutex::new(())]),
        }
    }

    /// Whether the slot's access token is past its recorded expiry.
    ///
    /// A slot without a recorded expiry is treated as never expiring.
    pub fn is_expired(&self, slot: Slot) -> Result<bool> {
        Ok(self.store.get(slot)?.is_expired())
    }

    /// Returns a currently valid access token for `slot`, refreshing it if needed.
    ///
    /// `Ok(None)` means the slot is (now) logged out: it never had a token, the
    /// token expired without a refresh token, or the refresh exchange failed.
    /// `Err` is reserved for credential store failures.
    pub async fn get_valid_token(&self, slot: Slot) -> Result<Option<String>> {
        // Fast path: token missing or still valid.
        {
            let creds = self.store.get(slot)?;
            if !creds.is_connected() {
                return Ok(None);
            }
            if !creds.is_expired() {
                return Ok(creds.access_token.clone());
            }
        }

        // Slow path: one refresh per slot at a time.
        let _guard = self.refresh_locks[slot.index()].lock().await;

        // Re-verify after gaining the lock; another caller may have finished.
        let creds = self.store.get(slot)?;
        if !creds.is_connected() {
            debug!("User {} was logged out while waiting for refresh", slot);
            return Ok(None);
        }
        if !creds.is_expired() {
            debug!("Token for user {} already refreshed by a concurrent caller", slot);
            return Ok(creds.access_token.clone());
        }

        let Some(refresh_token) = creds.refresh_token.as_deref() else {
            let reason = BlendError::ExpiredNoRefresh(slot);
            info!("{}; user must log in again", reason);
            self.store.compare_and_swap(&creds, None)?;
            return Ok(None);
        };

        warn!("Access token for user {} expired; initiating refresh", slot);
        match self.refresh_exchange(slot, refresh_token).await {
            Ok(response) => {
                let expires_in = response.expires_in.unwrap_or(self.default_expires_in);
                let refreshed = Credential::issued(
                    slot,
                    response.access_token.as_str(),
                    Some(expires_in),
                    response
                        .refresh_token
                        .clone()
                        .or_else(|| creds.refresh_token.clone()),
                );

                if self.store.compare_and_swap(&creds, Some(&refreshed))? {
                    info!("Refreshed token for user {} (expires in {}s)", slot, expires_in);
                    return Ok(refreshed.access_token.clone());
                }

                // Replaced underneath us; the newer credential wins.
                warn!("Credential for user {} changed during refresh; discarding result", slot);
                let current = self.store.get(slot)?;
                Ok(current
                    .access_token
                    .clone()
                    .filter(|_| !current.is_expired()))
            }
            Err(e) => {
                warn!("{}; clearing user {}", e, slot);
                self.store.compare_and_swap(&creds, None)?;
                Ok(None)
            }
        }
    }

    /// Exchanges a refresh token for a new access token. Never retried.
    async fn refresh_exchange(&self, slot: Slot, refresh_token: &str) -> Result<RefreshResponse> {
        let body = RefreshRequest {
            refresh_token,
            user: slot,
        };

        let response = self
            .http_client
            .post(&self.refresh_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BlendError::RefreshFailed(format!("network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(BlendError::RefreshFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                sanitize(&error_text)
            )));
        }

        response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| BlendError::RefreshFailed(format!("Malformed JSON response: {}", e)))
    }

    /// Remaining lifetime and expiry flag per slot, for status displays.
    pub fn token_info(&self, slot: Slot) -> Result<(Option<i64>, bool)> {
        let creds = self.store.get(slot)?;
        Ok((creds.expires_in_seconds(), creds.is_expired()))
    }
}
