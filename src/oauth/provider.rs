//! Client-credentials token provider

use async_trait::async_trait;
use tracing::info;

use super::context::AuthorizationContext;
use super::endpoint::TokenEndpointClient;
use super::registration::AuthorizationGrantType;
use super::token::AccessToken;
use crate::{Error, Result};

/// Obtains tokens with the `client_credentials` grant
#[async_trait]
pub trait ClientCredentialsTokenProvider: Send + Sync {
    /// Exchange the context's client credentials for an access token.
    ///
    /// Implementations must not return a cached token; every call is a
    /// fresh exchange.
    async fn authorize(&self, context: &AuthorizationContext) -> Result<AccessToken>;
}

/// [`ClientCredentialsTokenProvider`] calling the registration's token
/// endpoint over HTTP
#[derive(Debug, Clone)]
pub struct ReqwestClientCredentialsProvider {
    endpoint: TokenEndpointClient,
}

impl ReqwestClientCredentialsProvider {
    /// Create a provider on top of a token endpoint client
    #[must_use]
    pub fn new(endpoint: TokenEndpointClient) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ClientCredentialsTokenProvider for ReqwestClientCredentialsProvider {
    async fn authorize(&self, context: &AuthorizationContext) -> Result<AccessToken> {
        let registration = context.registration();

        if registration.authorization_grant_type != AuthorizationGrantType::ClientCredentials {
            return Err(Error::Config(format!(
                "Registration '{}' uses grant type {}, expected client_credentials",
                registration.registration_id, registration.authorization_grant_type
            )));
        }

        let scope = registration.scope_param();
        let mut params = vec![("grant_type", AuthorizationGrantType::ClientCredentials.as_str())];
        if let Some(ref scope) = scope {
            params.push(("scope", scope.as_str()));
        }

        let token = self.endpoint.request_token(registration, &params).await?;

        info!(
            registration = %registration.registration_id,
            principal = %context.principal().name(),
            expires_in = ?token.time_until_expiry(),
            "Obtained client_credentials token"
        );
        Ok(token)
    }
}
