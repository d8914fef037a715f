//! Access tokens

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::{Error, Result};

/// Seconds before the real expiry at which a token counts as expired
const EXPIRY_SKEW_SECS: u64 = 60;

/// An OAuth2 access token
#[derive(Clone)]
pub struct AccessToken {
    /// Bearer value
    pub token_value: String,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Refresh token (optional)
    pub refresh_token: Option<String>,

    /// Token expiration time (Unix timestamp)
    pub expires_at: Option<u64>,

    /// Granted scopes
    pub scope: Option<String>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Successful token endpoint response (RFC 6749 §5.1)
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Error token endpoint response (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl AccessToken {
    /// Create a bearer token without expiry or refresh token
    pub fn bearer(token_value: impl Into<String>) -> Self {
        Self {
            token_value: token_value.into(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        }
    }

    /// Set the lifetime relative to now
    #[must_use]
    pub fn expires_in(mut self, secs: u64) -> Self {
        self.expires_at = Some(now_secs().saturating_add(secs));
        self
    }

    /// Attach a refresh token
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Convert a token endpoint response
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenEndpoint`] if `expires_in` does not fit a
    /// timestamp.
    pub(crate) fn from_response(response: TokenResponse) -> Result<Self> {
        let expires_at = match response.expires_in {
            Some(secs) => Some(now_secs().checked_add(secs).ok_or_else(|| {
                Error::TokenEndpoint(format!("Token response has out-of-range expires_in {secs}"))
            })?),
            None => None,
        };

        Ok(Self {
            token_value: response.access_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: response.refresh_token,
            expires_at,
            scope: response.scope,
        })
    }

    /// Check if the token is expired (with 60 second buffer)
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now_secs() + EXPIRY_SKEW_SECS >= expires_at)
    }

    /// Time until expiration
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = now_secs();
        self.expires_at
            .filter(|&expires_at| expires_at > now)
            .map(|expires_at| Duration::from_secs(expires_at - now))
    }

    /// Whether the token type is Bearer (case-insensitive, RFC 6750)
    pub fn is_bearer(&self) -> bool {
        self.token_type.eq_ignore_ascii_case("bearer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expiry() {
        let token = AccessToken::bearer("test_token").expires_in(3600);
        assert!(!token.is_expired());
        assert!(token.time_until_expiry().is_some());

        let mut expired = token.clone();
        expired.expires_at = Some(0);
        assert!(expired.is_expired());
        assert!(expired.time_until_expiry().is_none());
    }

    #[test]
    fn token_within_skew_counts_as_expired() {
        let token = AccessToken::bearer("short").expires_in(30);
        assert!(token.is_expired());
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let token = AccessToken::bearer("test_token");
        assert!(!token.is_expired());
        assert!(token.time_until_expiry().is_none());
    }

    #[test]
    fn from_response_defaults_to_bearer() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "expires_in": 300}"#).unwrap();
        let token = AccessToken::from_response(response).unwrap();
        assert_eq!(token.token_value, "abc");
        assert!(token.is_bearer());
        assert!(token.expires_at.is_some());
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn huge_expires_in_is_a_token_endpoint_error() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"Bearer","expires_in":18446744073709551615}"#,
        )
        .unwrap();
        let err = AccessToken::from_response(response).unwrap_err();
        assert!(err.is_token_endpoint(), "unexpected error: {err}");
    }

    #[test]
    fn expires_in_saturates() {
        let token = AccessToken::bearer("abc").expires_in(u64::MAX);
        assert_eq!(token.expires_at, Some(u64::MAX));
        assert!(!token.is_expired());
    }

    #[test]
    fn bearer_type_is_case_insensitive() {
        let mut token = AccessToken::bearer("abc");
        token.token_type = "bearer".to_string();
        assert!(token.is_bearer());
        token.token_type = "mac".to_string();
        assert!(!token.is_bearer());
    }

    #[test]
    fn debug_hides_token_value() {
        let token = AccessToken::bearer("super-secret-value").with_refresh_token("rt-secret");
        let dbg = format!("{token:?}");
        assert!(!dbg.contains("super-secret-value"));
        assert!(!dbg.contains("rt-secret"));
    }
}
