// spotify-blend - Dual-account session manager for blended Spotify playlists
// Author: kelexine (https://github.com/kelexine)

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod oauth;
pub mod session;
pub mod store;
pub mod utils;
