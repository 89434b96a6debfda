// Blend backend client
// Author: kelexine (https://github.com/kelexine)

use crate::config::{AppConfig, BlendConfig};
use crate::error::{BlendError, Result};
use crate::models::{BlendRequest, BlendResponse, BlendStyle, TopTracksResponse};
use crate::oauth::Slot;
use crate::session::SessionCoordinator;
use crate::utils::logging::sanitize;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Maximum length of an error body carried into [`BlendError::Api`].
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Per-call overrides for playlist creation. Unset fields fall back to
/// [`BlendConfig`].
#[derive(Debug, Clone, Default)]
pub struct BlendOptions {
    pub playlist_name: Option<String>,
    pub style: Option<BlendStyle>,
    pub tracks_per_user: Option<u32>,
    pub description: Option<String>,
}

/// Both users' top tracks, fetched together.
#[derive(Debug, Clone)]
pub struct BlendPreview {
    pub a: TopTracksResponse,
    pub b: TopTracksResponse,
}

#[derive(Clone)]
pub struct BlendClient {
    http_client: Client,
    base_url: String,
    session: SessionCoordinator,
    defaults: BlendConfig,
}

impl BlendClient {
    pub fn new(http_client: Client, config: &AppConfig, session: SessionCoordinator) -> Self {
        Self {
            http_client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            session,
            defaults: config.blend.clone(),
        }
    }

    pub fn session(&self) -> &SessionCoordinator {
        &self.session
    }

    /// `GET /data/top-tracks` for one user.
    pub async fn top_tracks(&self, slot: Slot) -> Result<TopTracksResponse> {
        let response = self.authorized_get(slot, "/data/top-tracks").await?;
        let tracks: TopTracksResponse = response.json().await?;
        debug!("Fetched {} top tracks for user {}", tracks.items.len(), slot);
        Ok(tracks)
    }

    /// `GET /data/user-profile`. `None` when the user is not connected.
    pub async fn user_profile(&self, slot: Slot) -> Result<Option<Value>> {
        if self.session.valid_token(slot).await?.is_none() {
            return Ok(None);
        }
        let response = self.authorized_get(slot, "/data/user-profile").await?;
        Ok(Some(response.json().await?))
    }

    /// Fetches both users' top tracks concurrently.
    pub async fn preview(&self) -> Result<BlendPreview> {
        let (a, b) = futures::join!(self.top_tracks(Slot::A), self.top_tracks(Slot::B));
        Ok(BlendPreview { a: a?, b: b? })
    }

    /// `POST /blend/` with both users' tokens. Both slots must be connected.
    pub async fn create_blend(&self, options: BlendOptions) -> Result<BlendResponse> {
        // Both lookups run to completion so a refresh in flight for one slot
        // is persisted even when the other slot is not connected.
        let (token_a, token_b) = futures::join!(
            self.session.require_token(Slot::A),
            self.session.require_token(Slot::B)
        );
        let (token_a, token_b) = (token_a?, token_b?);

        let request = BlendRequest {
            token_a,
            token_b,
            playlist_name: options
                .playlist_name
                .unwrap_or_else(|| self.defaults.playlist_name.clone()),
            tracks_per_user: Some(options.tracks_per_user.unwrap_or(self.defaults.tracks_per_user)),
            blend_style: Some(options.style.unwrap_or(self.defaults.style)),
            playlist_description: options.description.or_else(|| self.defaults.description.clone()),
        };

        info!(
            "Creating blend \"{}\" ({} tracks per user, {})",
            request.playlist_name,
            request.tracks_per_user.unwrap_or_default(),
            request.blend_style.unwrap_or_default()
        );

        let response = self
            .http_client
            .post(format!("{}/blend/", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let blend: BlendResponse = response.json().await?;

        info!("Blend created: {}", blend.playlist_url);
        Ok(blend)
    }

    async fn authorized_get(&self, slot: Slot, path: &str) -> Result<Response> {
        let token = self.session.require_token(slot).await?;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} as user {}", url, slot);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?;
        self.check_status(response).await
    }

    /// Maps error statuses; a 401 clears both sessions before returning.
    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.session.handle_unauthorized()?;
            return Err(BlendError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = truncate_body(&sanitize(&body));
            warn!("Backend returned HTTP {}: {}", status.as_u16(), message);
            return Err(BlendError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

/// Truncate a response body to avoid logging excessive data.
fn truncate_body(body: &str) -> String {
    let total = body.chars().count();
    if total <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated, {} total chars)", head, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::callback::parse_query;
    use crate::oauth::Credential;
    use crate::store::{CredentialStore, MemoryStore};
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    fn client(base_url: &str) -> BlendClient {
        client_with_store(base_url, Arc::new(MemoryStore::new()))
    }

    fn client_with_store(base_url: &str, store: Arc<MemoryStore>) -> BlendClient {
        let mut config = AppConfig::default();
        config.api.base_url = base_url.to_string();
        config.auth.provider_logout_url = String::new();
        let session = SessionCoordinator::new(store, Client::new(), &config).unwrap();
        BlendClient::new(Client::new(), &config, session)
    }

    fn connect_both(client: &BlendClient) {
        let session = client.session();
        session.on_callback_result(parse_query("access_token=ta&state=A")).unwrap();
        session.on_callback_result(parse_query("access_token=tb&state=B")).unwrap();
    }

    #[tokio::test]
    async fn test_top_tracks_uses_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data/top-tracks")
            .match_header("authorization", "Bearer tb")
            .with_status(200)
            .with_body(
                json!({"items": [{"id": "1", "name": "Song", "artists": [{"name": "Band"}]}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client(&server.url());
        connect_both(&client);

        let tracks = client.top_tracks(Slot::B).await.unwrap();
        assert_eq!(tracks.items[0].name, "Song");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_logs_everyone_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/data/top-tracks")
            .with_status(401)
            .create_async()
            .await;

        let client = client(&server.url());
        connect_both(&client);

        let err = client.top_tracks(Slot::A).await.unwrap_err();
        assert!(matches!(err, BlendError::Unauthorized));
        assert!(err.requires_home_redirect());
        let state = client.session().session_state();
        assert!(!state.a.is_connected());
        assert!(!state.b.is_connected());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/data/top-tracks")
            .with_status(502)
            .with_body("upstream down")
            .create_async()
            .await;

        let client = client(&server.url());
        connect_both(&client);

        match client.top_tracks(Slot::A).await {
            Err(BlendError::Api { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("expected API error, got {:?}", other.map(|_| ())),
        }
        // Non-auth failures keep the sessions.
        assert!(client.session().both_connected());
    }

    #[tokio::test]
    async fn test_profile_none_when_disconnected() {
        let client = client("http://127.0.0.1:1");
        assert!(client.user_profile(Slot::A).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_blend_sends_both_tokens() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/blend/")
            .match_body(Matcher::PartialJson(json!({
                "token_a": "ta",
                "token_b": "tb",
                "playlist_name": "Road Trip",
                "blend_style": "interleave",
                "tracks_per_user": 25
            })))
            .with_status(200)
            .with_body(
                json!({"playlist_url": "https://open.spotify.com/playlist/xyz", "track_count": 50})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client(&server.url());
        connect_both(&client);

        let blend = client
            .create_blend(BlendOptions {
                playlist_name: Some("Road Trip".to_string()),
                ..BlendOptions::default()
            })
            .await
            .unwrap();

        assert_eq!(blend.playlist_url, "https://open.spotify.com/playlist/xyz");
        assert_eq!(blend.track_count, Some(50));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_blend_requires_both_users() {
        let client = client("http://127.0.0.1:1");
        client
            .session()
            .on_callback_result(parse_query("access_token=ta&state=A"))
            .unwrap();

        let err = client.create_blend(BlendOptions::default()).await.unwrap_err();
        assert!(matches!(err, BlendError::NotConnected(Slot::B)));
    }

    #[tokio::test]
    async fn test_create_blend_keeps_refresh_of_connected_user() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(
                json!({"access_token": "fresh-a", "expires_in": 3600, "refresh_token": "rotated"})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let blend = server.mock("POST", "/blend/").expect(0).create_async().await;

        let store = Arc::new(MemoryStore::new());
        store
            .set(&Credential {
                slot: Slot::A,
                access_token: Some("stale-a".to_string()),
                expires_at: Some(0),
                refresh_token: Some("r-a".to_string()),
            })
            .unwrap();
        let client = client_with_store(&server.url(), store.clone());

        let err = client.create_blend(BlendOptions::default()).await.unwrap_err();
        assert!(matches!(err, BlendError::NotConnected(Slot::B)));

        refresh.assert_async().await;
        blend.assert_async().await;
        let a = store.get(Slot::A).unwrap();
        assert_eq!(a.access_token.as_deref(), Some("fresh-a"));
        assert_eq!(a.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = truncate_body(&long);
        assert!(truncated.contains("truncated"));
        assert!(truncated.len() < long.len() + 40);
        assert_eq!(truncate_body("short"), "short");
    }
}
