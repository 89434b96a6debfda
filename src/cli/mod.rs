// CLI module for spotify-blend
// Author: kelexine (https://github.com/kelexine)

use crate::models::BlendStyle;
use crate::oauth::Slot;
use clap::{Parser, Subcommand};

/// spotify-blend - connect two Spotify accounts and blend their top tracks
#[derive(Parser, Debug)]
#[command(name = "spotify-blend", version, about, long_about = None)]
pub struct Args {
    /// Config file (default: ~/.spotify-blend/config.toml)
    #[arg(long, global = true, env = "SPOTIFY_BLEND_CONFIG")]
    pub config: Option<String>,

    /// Backend base URL, overrides the config file
    #[arg(long, global = true)]
    pub api: Option<String>,

    /// Session file, overrides the config file
    #[arg(long, global = true)]
    pub store: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the provider login for a user (opens the browser)
    Login {
        /// User slot: A or B
        slot: Slot,

        /// Only print the login URL
        #[arg(long)]
        no_browser: bool,

        /// Wait for the redirect on this local port and store the result
        #[arg(long)]
        listen: Option<u16>,
    },

    /// Store the result of an authorization redirect
    Callback {
        /// The full redirect URL or just its query string
        url: String,
    },

    /// Show both users' connection state
    Status,

    /// Print a valid access token for a user, refreshing it if needed
    Token { slot: Slot },

    /// Show a user's provider profile
    Profile { slot: Slot },

    /// List a user's top tracks
    TopTracks {
        slot: Slot,

        /// Number of tracks to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Create the blended playlist (both users must be connected)
    Blend {
        /// Playlist name
        #[arg(long)]
        name: Option<String>,

        /// interleave, shuffle or popularity
        #[arg(long)]
        style: Option<BlendStyle>,

        /// Top tracks taken from each user
        #[arg(long)]
        tracks: Option<u32>,

        /// Playlist description
        #[arg(long)]
        description: Option<String>,
    },

    /// Log one user out
    Logout { slot: Slot },

    /// Log both users out
    LogoutAll,

    /// Print session changes as they happen, including from other terminals
    Watch,

    /// Print the effective configuration
    Config,
}
