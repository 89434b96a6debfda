// spotify-blend - Dual-account session manager for blended Spotify playlists
// Author: kelexine (https://github.com/kelexine)

use anyhow::Result;
use clap::Parser;
use spotify_blend::api::{build_http_client, BlendClient, BlendOptions};
use spotify_blend::cli::{Args, Command};
use spotify_blend::config::AppConfig;
use spotify_blend::oauth::{callback, login, CallbackResult, Slot, SlotStatus};
use spotify_blend::session::{SessionCoordinator, SessionState};
use spotify_blend::store::{CredentialStore, FileStore};
use spotify_blend::utils::logging;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info};

/// How long a logout command lingers for the provider logout request.
const PROVIDER_LOGOUT_WAIT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration, CLI flags win
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(api) = &args.api {
        config.api.base_url = api.clone();
    }
    if let Some(store) = &args.store {
        config.auth.store_path = store.clone();
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    debug!("Starting spotify-blend v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Open the shared session store
    let watch = config.auth.watch_store && matches!(args.command, Command::Watch);
    let store: Arc<dyn CredentialStore> = if watch {
        Arc::new(FileStore::open_watched(&config.auth.store_path)?)
    } else {
        Arc::new(FileStore::open(&config.auth.store_path)?)
    };

    // Phase 4: Session coordinator and backend client
    let http_client = build_http_client(&config.api)?;
    let session = SessionCoordinator::new(store, http_client.clone(), &config)?;
    let client = BlendClient::new(http_client, &config, session.clone());

    match args.command {
        Command::Login {
            slot,
            no_browser,
            listen,
        } => {
            login::launch(&config.api.base_url, slot, !no_browser)?;
            match listen {
                Some(port) => {
                    let result = login::receive_callback(port).await?;
                    apply_callback(&session, result).await?;
                }
                None => println!(
                    "After logging in, pass the redirect URL to `spotify-blend callback <url>`."
                ),
            }
        }
        Command::Callback { url } => {
            apply_callback(&session, callback::parse_url(&with_query_marker(&url))).await?;
        }
        Command::Status => {
            print_state(&session.session_state());
        }
        Command::Token { slot } => {
            let token = session.require_token(slot).await?;
            println!("{}", token);
        }
        Command::Profile { slot } => match client.user_profile(slot).await? {
            Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
            None => println!("User {} is not connected.", slot),
        },
        Command::TopTracks { slot, limit } => {
            let tracks = client.top_tracks(slot).await?;
            println!("Top tracks for user {}:", slot);
            for (i, track) in tracks.items.iter().take(limit).enumerate() {
                println!("{:>3}. {} - {}", i + 1, track.name, track.artist_names());
            }
        }
        Command::Blend {
            name,
            style,
            tracks,
            description,
        } => {
            if !session.both_connected() {
                println!("Both users must be connected before creating a blend.");
                print_state(&session.session_state());
                return Ok(());
            }
            let blend = client
                .create_blend(BlendOptions {
                    playlist_name: name,
                    style,
                    tracks_per_user: tracks,
                    description,
                })
                .await?;
            println!("Blend created: {}", blend.playlist_url);
        }
        Command::Logout { slot } => {
            session.logout(slot)?;
            session.wait_for_provider_logout(PROVIDER_LOGOUT_WAIT).await;
            println!("User {} logged out.", slot);
        }
        Command::LogoutAll => {
            session.logout_all()?;
            session.wait_for_provider_logout(PROVIDER_LOGOUT_WAIT).await;
            println!("All users logged out.");
        }
        Command::Watch => {
            run_watch(&session).await;
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Stores a callback outcome and mirrors the web front end's brief pause
/// before returning to the home view.
async fn apply_callback(session: &SessionCoordinator, result: CallbackResult) -> Result<()> {
    let delay = result.redirect_delay();
    match session.on_callback_result(result) {
        Ok(slot) => println!("User {} connected.", slot),
        Err(e) => eprintln!("{}", e),
    }
    tokio::time::sleep(delay).await;
    print_state(&session.session_state());
    Ok(())
}

/// Accepts a bare query string as well as a full URL.
fn with_query_marker(input: &str) -> String {
    if input.contains('?') {
        input.to_string()
    } else {
        format!("?{}", input)
    }
}

fn print_state(state: &SessionState) {
    for slot in Slot::ALL {
        let credential = state.get(slot);
        let status = match state.status(slot) {
            SlotStatus::Connected => match credential.expires_in_seconds() {
                Some(secs) if secs <= 0 => "connected (expired, refresh pending)".to_string(),
                Some(secs) => format!("connected (expires in {}s)", secs),
                None => "connected".to_string(),
            },
            SlotStatus::Disconnected => "disconnected".to_string(),
        };
        let marker = if state.last_logged_in == Some(slot) {
            " *"
        } else {
            ""
        };
        println!("User {}: {}{}", slot, status, marker);
    }
    if state.both_connected() {
        println!("Ready to blend.");
    }
}

async fn run_watch(session: &SessionCoordinator) {
    let mut view = session.subscribe();
    let listener = session.spawn_store_listener();
    print_state(&view.borrow_and_update().clone());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = view.borrow_and_update().clone();
                println!();
                print_state(&state);
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    listener.abort();
    info!("Stopped watching sessions");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
