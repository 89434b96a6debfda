// Token refresh exchange types
// Author: kelexine (https://github.com/kelexine)

use crate::oauth::Slot;
use serde::{Deserialize, Serialize};

/// Body of `POST /auth/refresh`.
#[derive(Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
    pub user: Slot,
}

/// Successful refresh response. The provider may rotate the refresh token;
/// when it does not, the previous one stays valid.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "rt",
            user: Slot::B,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"refresh_token": "rt", "user": "B"}));
    }

    #[test]
    fn test_response_without_rotation() {
        let resp: RefreshResponse =
            serde_json::from_str(r#"{"access_token":"new","expires_in":3600}"#).unwrap();
        assert_eq!(resp.access_token, "new");
        assert_eq!(resp.expires_in, Some(3600));
        assert!(resp.refresh_token.is_none());
    }
}
