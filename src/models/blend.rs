// Blend playlist creation types
// Author: kelexine (https://github.com/kelexine)

use crate::error::BlendError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the backend merges the two track lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendStyle {
    /// Alternate A, B, A, B, then append the longer list's tail.
    #[default]
    Interleave,
    /// Combine both lists and shuffle.
    Shuffle,
    /// Sort each list by popularity, then alternate.
    Popularity,
}

impl BlendStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            BlendStyle::Interleave => "interleave",
            BlendStyle::Shuffle => "shuffle",
            BlendStyle::Popularity => "popularity",
        }
    }
}

impl fmt::Display for BlendStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendStyle {
    type Err = BlendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interleave" => Ok(BlendStyle::Interleave),
            "shuffle" => Ok(BlendStyle::Shuffle),
            "popularity" => Ok(BlendStyle::Popularity),
            other => Err(BlendError::Config(format!("Unknown blend style: {}", other))),
        }
    }
}

/// Body of `POST /blend/`. Carries both access tokens, so no `Debug`.
#[derive(Clone, Serialize)]
pub struct BlendRequest {
    pub token_a: String,
    pub token_b: String,
    pub playlist_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks_per_user: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blend_style: Option<BlendStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_description: Option<String>,
}

/// Response of `POST /blend/`. Only `playlist_url` is guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendResponse {
    pub playlist_url: String,
    #[serde(default)]
    pub playlist_id: Option<String>,
    #[serde(default)]
    pub playlist_name: Option<String>,
    #[serde(default)]
    pub track_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_omitted() {
        let req = BlendRequest {
            token_a: "a".to_string(),
            token_b: "b".to_string(),
            playlist_name: "A + B Blend".to_string(),
            tracks_per_user: None,
            blend_style: None,
            playlist_description: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"token_a": "a", "token_b": "b", "playlist_name": "A + B Blend"})
        );
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("Shuffle".parse::<BlendStyle>().unwrap(), BlendStyle::Shuffle);
        assert!("random".parse::<BlendStyle>().is_err());
        assert_eq!(
            serde_json::to_value(BlendStyle::Popularity).unwrap(),
            serde_json::json!("popularity")
        );
    }
}
