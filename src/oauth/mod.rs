//! OAuth 2.0 client building blocks
//!
//! Features:
//! - Client registrations loaded from configuration (RFC 8414 issuer discovery)
//! - `client_credentials` token provider for machine-to-machine calls
//! - Session-aware authorized clients with token refresh for interactive users

mod authorized;
mod context;
mod endpoint;
mod metadata;
mod provider;
mod registration;
mod token;

pub use authorized::{
    AuthorizedClient, AuthorizedClientDelegate, AuthorizedClientStore, DefaultRegistrationId,
    SessionAuthorizedClientDelegate, TokenRefresher,
};
pub use context::{ANONYMOUS_AUTHORITY, AuthorizationContext, Principal, SERVICE_PRINCIPAL_NAME};
pub use endpoint::TokenEndpointClient;
pub use metadata::AuthorizationServerMetadata;
pub use provider::{ClientCredentialsTokenProvider, ReqwestClientCredentialsProvider};
pub use registration::{
    AuthorizationGrantType, ClientAuthenticationMethod, ClientRegistration,
    ClientRegistrationRepository, InMemoryClientRegistrationRepository,
};
pub use token::AccessToken;
