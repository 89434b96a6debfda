//! Wire types for the blend backend.
//!
//! - `auth`: token refresh exchange
//! - `tracks`: top-track listings
//! - `blend`: playlist creation

// Author: kelexine (https://github.com/kelexine)

pub mod auth;
pub mod blend;
pub mod tracks;

pub use auth::{RefreshRequest, RefreshResponse};
pub use blend::{BlendRequest, BlendResponse, BlendStyle};
pub use tracks::{Artist, TopTracksResponse, Track};
