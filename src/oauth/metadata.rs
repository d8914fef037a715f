//! Authorization server metadata discovery
//!
//! Implements RFC 8414 (OAuth Authorization Server Metadata), falling back to
//! OpenID Connect discovery for issuers that only publish that document.

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::registration::AuthorizationGrantType;
use crate::{Error, Result};

/// Well-known metadata documents, tried in order
const WELL_KNOWN_PATHS: [&str; 2] = [
    ".well-known/oauth-authorization-server",
    ".well-known/openid-configuration",
];

/// OAuth Authorization Server Metadata (RFC 8414)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Authorization server issuer URL
    pub issuer: String,

    /// Authorization endpoint URL
    #[serde(default)]
    pub authorization_endpoint: Option<String>,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Supported grant types
    #[serde(default)]
    pub grant_types_supported: Vec<String>,

    /// Supported scopes (may be string or array due to implementation bugs)
    #[serde(default, deserialize_with = "deserialize_scopes")]
    pub scopes_supported: Vec<String>,

    /// Supported token endpoint auth methods
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// Deserialize scopes that may be either a string or array
fn deserialize_scopes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Ok(s.split_whitespace().map(String::from).collect()),
        StringOrVec::Vec(v) => Ok(v),
    }
}

impl AuthorizationServerMetadata {
    /// Discover authorization server metadata for an issuer
    ///
    /// # Errors
    ///
    /// Returns an error if no metadata document is reachable or the document
    /// is invalid.
    pub async fn discover(client: &Client, issuer: &str) -> Result<Self> {
        let base = issuer.trim_end_matches('/');
        let mut last_error = None;

        for path in WELL_KNOWN_PATHS {
            let url = format!("{base}/{path}");
            debug!(url = %url, "Discovering OAuth authorization server metadata");

            match Self::fetch(client, &url).await {
                Ok(metadata) => {
                    debug!(issuer = %metadata.issuer, token_endpoint = %metadata.token_endpoint, "Discovered authorization server");
                    return Ok(metadata);
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Metadata document unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Internal("No metadata locations configured".to_string())))
    }

    async fn fetch(client: &Client, url: &str) -> Result<Self> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Failed to fetch OAuth metadata: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "OAuth metadata discovery failed: HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse OAuth metadata: {e}")))
    }

    /// Whether the server advertises the grant type.
    ///
    /// Servers that omit `grant_types_supported` are assumed to support it.
    #[must_use]
    pub fn supports_grant(&self, grant: AuthorizationGrantType) -> bool {
        self.grant_types_supported.is_empty()
            || self.grant_types_supported.iter().any(|g| g == grant.as_str())
    }
}
