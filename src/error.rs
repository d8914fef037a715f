//! Error types for MCP client authentication

use thiserror::Error;

/// Result type alias for MCP client authentication
pub type Result<T> = std::result::Result<T, Error>;

/// MCP client authentication errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (e.g. a required client registration is missing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token endpoint unreachable, rejected the client, or returned garbage
    #[error("Token endpoint error: {0}")]
    TokenEndpoint(String),

    /// Token endpoint answered with an OAuth2 error response (RFC 6749 §5.2)
    #[error("Token endpoint error: {message}")]
    OAuth2 {
        /// `error` code, e.g. `invalid_grant`
        code: String,
        /// Rendered status, code and description
        message: String,
    },

    /// No authorized client for an interactive principal; the user has to
    /// complete the `authorization_code` flow first
    #[error("Authorization required for principal '{principal}' (registration '{registration_id}')")]
    AuthorizationRequired {
        /// Registration the principal needs to authorize
        registration_id: String,
        /// Principal name
        principal: String,
    },

    /// Invalid outbound request (e.g. a header value that cannot be encoded)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP error from the next pipeline stage
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is a startup-configuration defect rather than a
    /// runtime condition
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether the error came from the token endpoint
    #[must_use]
    pub fn is_token_endpoint(&self) -> bool {
        matches!(self, Self::TokenEndpoint(_) | Self::OAuth2 { .. })
    }

    /// OAuth2 `error` code returned by the token endpoint, if any
    #[must_use]
    pub fn oauth2_error_code(&self) -> Option<&str> {
        match self {
            Self::OAuth2 { code, .. } => Some(code),
            _ => None,
        }
    }
}
