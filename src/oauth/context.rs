//! Principals and per-fetch authorization contexts

use std::sync::Arc;

use super::registration::ClientRegistration;

/// Principal name used for machine-to-machine token requests
pub const SERVICE_PRINCIPAL_NAME: &str = "client-credentials-client";

/// Authority carried by the synthetic service principal
pub const ANONYMOUS_AUTHORITY: &str = "ROLE_ANONYMOUS";

/// Identity a token is requested on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    name: String,
    authorities: Vec<String>,
    anonymous: bool,
}

impl Principal {
    /// An authenticated end user
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorities: Vec::new(),
            anonymous: false,
        }
    }

    /// The synthetic identity used for `client_credentials` requests.
    ///
    /// No end user is present during startup or background work, so the
    /// token is requested for an anonymous principal.
    #[must_use]
    pub fn service() -> Self {
        Self {
            name: SERVICE_PRINCIPAL_NAME.to_string(),
            authorities: vec![ANONYMOUS_AUTHORITY.to_string()],
            anonymous: true,
        }
    }

    /// Add a granted authority
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    /// Principal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Granted authorities
    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    /// Whether this is an anonymous (non-user) principal
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

/// A client registration paired with the principal a token is requested for.
///
/// Built per token request and dropped right after.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    registration: Arc<ClientRegistration>,
    principal: Principal,
}

impl AuthorizationContext {
    /// Create a context for the given registration and principal
    pub fn new(registration: Arc<ClientRegistration>, principal: Principal) -> Self {
        Self {
            registration,
            principal,
        }
    }

    /// Client registration
    pub fn registration(&self) -> &ClientRegistration {
        &self.registration
    }

    /// Principal
    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
