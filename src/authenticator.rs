//! Request authenticator
//!
//! Adds an OAuth2 access token to every request sent to the MCP server.
//!
//! Interactive requests act for the end user: they go to the authorized
//! client delegate, which holds the user's `authorization_code` token and
//! refreshes it. Background requests (MCP session setup, `initialize`,
//! `tools/list` at startup) have no user, so the authenticator fetches a
//! `client_credentials` token for the application itself.
//!
//! The background path does not cache tokens: each request triggers its own
//! token fetch, and concurrent requests are not deduplicated. This is fine
//! for a handful of startup calls but multiplies token endpoint traffic if
//! background call volume grows.
//!
//! # Example
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//! use mcp_client_auth::{RequestAuthenticator, RequestOrigin, config::Config};
//! use mcp_client_auth::oauth::AuthorizedClientStore;
//! use mcp_client_auth::transport::{ClientRequest, FilteredClient};
//!
//! # tokio_test::block_on(async {
//! let config = Config::load(Some(Path::new("auth.yaml")))?;
//! let store = Arc::new(AuthorizedClientStore::new());
//! let authenticator = Arc::new(RequestAuthenticator::from_config(&config, store).await?);
//!
//! let client = FilteredClient::builder()
//!     .apply(&authenticator.configuration())
//!     .build(Arc::new(reqwest::Client::new()));
//!
//! let request = reqwest::Client::new()
//!     .post("http://localhost:8090/mcp/message")
//!     .build()?;
//! let _response = client
//!     .execute(ClientRequest::new(request, RequestOrigin::Background))
//!     .await?;
//! # Ok::<(), mcp_client_auth::Error>(())
//! # });
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Response;
use tracing::debug;

use crate::config::{ClientConfig, Config};
use crate::oauth::{
    AccessToken, AuthorizationContext, AuthorizedClientDelegate, AuthorizedClientStore,
    ClientCredentialsTokenProvider, ClientRegistrationRepository,
    InMemoryClientRegistrationRepository, Principal, ReqwestClientCredentialsProvider,
    SessionAuthorizedClientDelegate, TokenEndpointClient,
};
use crate::origin::RequestOrigin;
use crate::transport::{ClientRequest, Exchange, ExchangeFilter, PipelineInstaller};
use crate::{Error, Result};

/// Registration ids the authenticator works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationIds {
    /// Registration used for interactive (`authorization_code`) requests
    pub authorization_code: String,
    /// Registration used for background (`client_credentials`) requests
    pub client_credentials: String,
}

impl From<&ClientConfig> for RegistrationIds {
    fn from(config: &ClientConfig) -> Self {
        Self {
            authorization_code: config.authorization_code_registration_id.clone(),
            client_credentials: config.client_credentials_registration_id.clone(),
        }
    }
}

/// How a request gets its token
enum AuthStrategy<'a> {
    /// Hand the request to the session-aware delegate
    InteractiveAuth {
        delegate: &'a dyn AuthorizedClientDelegate,
    },
    /// Fetch a `client_credentials` token and attach it here
    ServiceAuth {
        registration_id: &'a str,
        repository: &'a dyn ClientRegistrationRepository,
        provider: &'a dyn ClientCredentialsTokenProvider,
    },
}

/// Pipeline filter attaching bearer tokens to outbound MCP requests
pub struct RequestAuthenticator {
    delegate: Arc<dyn AuthorizedClientDelegate>,
    registrations: Arc<dyn ClientRegistrationRepository>,
    token_provider: Arc<dyn ClientCredentialsTokenProvider>,
    ids: RegistrationIds,
}

impl RequestAuthenticator {
    /// Create an authenticator.
    ///
    /// The delegate should already default to `ids.authorization_code`.
    pub fn new(
        delegate: Arc<dyn AuthorizedClientDelegate>,
        registrations: Arc<dyn ClientRegistrationRepository>,
        token_provider: Arc<dyn ClientCredentialsTokenProvider>,
        ids: RegistrationIds,
    ) -> Self {
        Self {
            delegate,
            registrations,
            token_provider,
            ids,
        }
    }

    /// Wire an authenticator from configuration.
    ///
    /// Registrations are resolved (with issuer discovery where needed), the
    /// interactive delegate is backed by `store`, and both configured
    /// registrations are verified before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a registration is missing or cannot be
    /// resolved.
    pub async fn from_config(config: &Config, store: Arc<AuthorizedClientStore>) -> Result<Self> {
        let ids = RegistrationIds::from(&config.client);
        let endpoint = TokenEndpointClient::with_timeout(config.client.request_timeout)?;
        let registrations: Arc<dyn ClientRegistrationRepository> = Arc::new(
            InMemoryClientRegistrationRepository::from_config(config, endpoint.http_client())
                .await?,
        );

        let delegate = SessionAuthorizedClientDelegate::new(
            Arc::clone(&registrations),
            store,
            Arc::new(endpoint.clone()),
            ids.authorization_code.clone(),
        );
        let provider = ReqwestClientCredentialsProvider::new(endpoint);

        let authenticator = Self::new(Arc::new(delegate), registrations, Arc::new(provider), ids);
        authenticator.verify()?;
        Ok(authenticator)
    }

    /// Registration ids in use
    pub fn registration_ids(&self) -> &RegistrationIds {
        &self.ids
    }

    /// Check that both configured registrations exist.
    ///
    /// Call at startup so a missing registration aborts initialization
    /// instead of failing the first request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing registration.
    pub fn verify(&self) -> Result<()> {
        for id in [&self.ids.authorization_code, &self.ids.client_credentials] {
            if self.registrations.find_by_registration_id(id).is_none() {
                return Err(missing_registration(id));
            }
        }
        Ok(())
    }

    /// Authenticate the request according to its origin and forward it.
    ///
    /// Nothing is forwarded if a background token cannot be obtained.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the `client_credentials` registration is missing
    /// - [`Error::TokenEndpoint`] if the token fetch fails
    /// - whatever the delegate or `next` return
    pub async fn authenticate(&self, request: ClientRequest, next: &dyn Exchange) -> Result<Response> {
        match self.strategy(request.origin()) {
            AuthStrategy::InteractiveAuth { delegate } => {
                debug!(url = %request.inner().url(), "Interactive request, delegating to authorized client");
                delegate.filter(request, next).await
            }
            AuthStrategy::ServiceAuth {
                registration_id,
                repository,
                provider,
            } => {
                debug!(url = %request.inner().url(), registration = %registration_id, "Background request, using client_credentials");
                let token =
                    Self::client_credentials_token(registration_id, repository, provider).await?;
                next.exchange(request.with_bearer_auth(&token.token_value)?)
                    .await
            }
        }
    }

    /// Fetch a fresh `client_credentials` token for the application
    ///
    /// # Errors
    ///
    /// Same as the background path of [`Self::authenticate`].
    pub async fn client_credentials_access_token(&self) -> Result<AccessToken> {
        Self::client_credentials_token(
            &self.ids.client_credentials,
            self.registrations.as_ref(),
            self.token_provider.as_ref(),
        )
        .await
    }

    /// Reusable configuration step: installs the delegate's default-request
    /// decoration and this authenticator as a filter. Applying it more than
    /// once to the same builder has no further effect.
    pub fn configuration(self: &Arc<Self>) -> PipelineInstaller {
        PipelineInstaller::new(self.delegate.default_request(), Arc::clone(self) as Arc<dyn ExchangeFilter>)
    }

    fn strategy(&self, origin: &RequestOrigin) -> AuthStrategy<'_> {
        if origin.is_interactive() {
            AuthStrategy::InteractiveAuth {
                delegate: self.delegate.as_ref(),
            }
        } else {
            AuthStrategy::ServiceAuth {
                registration_id: &self.ids.client_credentials,
                repository: self.registrations.as_ref(),
                provider: self.token_provider.as_ref(),
            }
        }
    }

    async fn client_credentials_token(
        registration_id: &str,
        repository: &dyn ClientRegistrationRepository,
        provider: &dyn ClientCredentialsTokenProvider,
    ) -> Result<AccessToken> {
        let registration = repository
            .find_by_registration_id(registration_id)
            .ok_or_else(|| missing_registration(registration_id))?;

        let context = AuthorizationContext::new(registration, Principal::service());
        provider.authorize(&context).await
    }
}

fn missing_registration(registration_id: &str) -> Error {
    Error::Config(format!(
        "No client registration found for id '{registration_id}'"
    ))
}

#[async_trait]
impl ExchangeFilter for RequestAuthenticator {
    async fn filter(&self, request: ClientRequest, next: &dyn Exchange) -> Result<Response> {
        self.authenticate(request, next).await
    }
}
