//! Authorized clients for interactive users
//!
//! An authorized client binds a user's access token to the registration it
//! was issued for. The session delegate attaches that token to outbound
//! requests and refreshes it when it expires. The initial
//! `authorization_code` exchange happens elsewhere (it needs the user's
//! browser); its result is handed to [`AuthorizedClientStore::save`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Response;
use tracing::{debug, info, warn};

use super::endpoint::TokenEndpointClient;
use super::registration::{AuthorizationGrantType, ClientRegistration, ClientRegistrationRepository};
use super::token::AccessToken;
use crate::transport::{ClientRequest, Exchange, RequestDecorator};
use crate::{Error, Result};

/// A user's token for a specific registration
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    /// Registration the token was issued for
    pub registration_id: String,
    /// Principal the token belongs to
    pub principal_name: String,
    /// Current access token
    pub access_token: AccessToken,
}

/// In-memory authorized clients keyed by registration and principal
#[derive(Debug, Default)]
pub struct AuthorizedClientStore {
    clients: DashMap<(String, String), AuthorizedClient>,
}

impl AuthorizedClientStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the authorized client for a principal
    pub fn load(&self, registration_id: &str, principal_name: &str) -> Option<AuthorizedClient> {
        self.clients
            .get(&(registration_id.to_string(), principal_name.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Save (or replace) an authorized client
    pub fn save(&self, client: AuthorizedClient) {
        debug!(registration = %client.registration_id, principal = %client.principal_name, "Saved authorized client");
        self.clients.insert(
            (client.registration_id.clone(), client.principal_name.clone()),
            client,
        );
    }

    /// Remove an authorized client (e.g. on logout)
    pub fn remove(&self, registration_id: &str, principal_name: &str) -> Option<AuthorizedClient> {
        self.clients
            .remove(&(registration_id.to_string(), principal_name.to_string()))
            .map(|(_, client)| client)
    }

    /// Number of stored clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Renews an expired user token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange a refresh token for a new access token
    async fn refresh(
        &self,
        registration: &ClientRegistration,
        refresh_token: &str,
    ) -> Result<AccessToken>;
}

#[async_trait]
impl TokenRefresher for TokenEndpointClient {
    async fn refresh(
        &self,
        registration: &ClientRegistration,
        refresh_token: &str,
    ) -> Result<AccessToken> {
        let params = [
            ("grant_type", AuthorizationGrantType::RefreshToken.as_str()),
            ("refresh_token", refresh_token),
        ];
        self.request_token(registration, &params).await
    }
}

/// Session-aware pipeline stage for interactive requests.
///
/// Resolves the user's token (refreshing it if needed), attaches it and
/// forwards the request.
#[async_trait]
pub trait AuthorizedClientDelegate: Send + Sync {
    /// Decoration applied to every request before filtering
    fn default_request(&self) -> Arc<dyn RequestDecorator>;

    /// Authorize the request on behalf of its interactive principal and
    /// forward it to `next`
    async fn filter(&self, request: ClientRequest, next: &dyn Exchange) -> Result<Response>;
}

/// Sets a registration id on requests that do not carry one
#[derive(Debug, Clone)]
pub struct DefaultRegistrationId(String);

impl DefaultRegistrationId {
    /// Create a decorator for the given registration id
    pub fn new(registration_id: impl Into<String>) -> Self {
        Self(registration_id.into())
    }
}

impl RequestDecorator for DefaultRegistrationId {
    fn decorate(&self, request: &mut ClientRequest) {
        if request.registration_id().is_none() {
            request.set_registration_id(self.0.clone());
        }
    }
}

/// [`AuthorizedClientDelegate`] backed by an [`AuthorizedClientStore`]
pub struct SessionAuthorizedClientDelegate {
    registrations: Arc<dyn ClientRegistrationRepository>,
    store: Arc<AuthorizedClientStore>,
    refresher: Arc<dyn TokenRefresher>,
    default_request: Arc<DefaultRegistrationId>,
}

impl SessionAuthorizedClientDelegate {
    /// Create a delegate whose requests default to `default_registration_id`
    pub fn new(
        registrations: Arc<dyn ClientRegistrationRepository>,
        store: Arc<AuthorizedClientStore>,
        refresher: Arc<dyn TokenRefresher>,
        default_registration_id: impl Into<String>,
    ) -> Self {
        Self {
            registrations,
            store,
            refresher,
            default_request: Arc::new(DefaultRegistrationId::new(default_registration_id)),
        }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<AuthorizedClientStore> {
        &self.store
    }

    /// Resolve a usable access token for the principal, refreshing if the
    /// stored one has expired
    async fn authorize(&self, registration_id: &str, principal_name: &str) -> Result<String> {
        let registration = self
            .registrations
            .find_by_registration_id(registration_id)
            .ok_or_else(|| {
                Error::Config(format!("No client registration found for id '{registration_id}'"))
            })?;

        let required = || Error::AuthorizationRequired {
            registration_id: registration_id.to_string(),
            principal: principal_name.to_string(),
        };

        let client = self.store.load(registration_id, principal_name).ok_or_else(required)?;

        if !client.access_token.is_expired() {
            return Ok(client.access_token.token_value);
        }

        let Some(refresh_token) = client.access_token.refresh_token.clone() else {
            debug!(registration = %registration_id, principal = %principal_name, "Token expired and no refresh token");
            return Err(required());
        };

        match self.refresher.refresh(&registration, &refresh_token).await {
            Ok(mut token) => {
                // Servers may omit the refresh token when they do not rotate it
                if token.refresh_token.is_none() {
                    token.refresh_token = Some(refresh_token);
                }
                let value = token.token_value.clone();
                self.store.save(AuthorizedClient {
                    registration_id: registration_id.to_string(),
                    principal_name: principal_name.to_string(),
                    access_token: token,
                });
                info!(registration = %registration_id, principal = %principal_name, "Token refreshed successfully");
                Ok(value)
            }
            Err(e) if e.oauth2_error_code().is_some_and(revokes_authorization) => {
                warn!(registration = %registration_id, principal = %principal_name, error = %e, "Token refresh rejected, removing authorized client");
                self.store.remove(registration_id, principal_name);
                Err(required())
            }
            Err(e) => {
                warn!(registration = %registration_id, principal = %principal_name, error = %e, "Token refresh failed");
                Err(e)
            }
        }
    }
}

/// OAuth2 error codes after which the stored authorization is useless
const REVOKING_ERROR_CODES: [&str; 3] = ["invalid_grant", "invalid_token", "invalid_client"];

fn revokes_authorization(code: &str) -> bool {
    REVOKING_ERROR_CODES.contains(&code)
}

#[async_trait]
impl AuthorizedClientDelegate for SessionAuthorizedClientDelegate {
    fn default_request(&self) -> Arc<dyn RequestDecorator> {
        self.default_request.clone()
    }

    async fn filter(&self, request: ClientRequest, next: &dyn Exchange) -> Result<Response> {
        let Some(principal) = request.origin().principal() else {
            return Err(Error::Internal(
                "Authorized client delegate invoked without an interactive principal".to_string(),
            ));
        };

        let registration_id = request
            .registration_id()
            .unwrap_or(&self.default_request.0)
            .to_string();

        let token = self.authorize(&registration_id, principal.name()).await?;
        next.exchange(request.with_bearer_auth(&token)?).await
    }
}
