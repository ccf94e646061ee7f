//! Access token returned by the login endpoint

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Bearer token issued at login.
///
/// Never renewed: the refresh token is kept only because the service hands it
/// out. Descriptors receive a clone, so a renewal would not reach them anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: String,

    /// Lifetime in seconds, counted from `issued_at`
    #[serde(default)]
    pub expires_in: i64,

    #[serde(default)]
    pub user_id: String,

    /// Local receipt time; not part of the wire format
    #[serde(skip, default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
}

impl Default for AccessToken {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            expires_in: 0,
            user_id: String::new(),
            issued_at: Utc::now(),
        }
    }
}

impl AccessToken {
    /// Get expiration time
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.expires_in)
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_login_response() {
        let token: AccessToken = serde_json::from_str(
            r#"{"accessToken":"abc","refreshToken":"def","expiresIn":3600,"userId":"u-1"}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.refresh_token, "def");
        assert_eq!(token.user_id, "u-1");
        assert!(!token.is_expired());
        assert_eq!(token.bearer(), "Bearer abc");
    }

    #[test]
    fn test_token_expiry_check() {
        let mut token: AccessToken =
            serde_json::from_str(r#"{"accessToken":"abc","expiresIn":10}"#).unwrap();
        token.issued_at = Utc::now() - Duration::seconds(11);
        assert!(token.is_expired());
    }
}
