//! Client registrations
//!
//! A registration describes one OAuth2 client: where its token endpoint is,
//! how it authenticates there, and which grant it uses. Registrations are
//! loaded once from configuration and never change afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::metadata::AuthorizationServerMetadata;
use crate::config::{Config, RegistrationConfig};
use crate::{Error, Result};

/// OAuth2 grant type of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationGrantType {
    /// Interactive user authorization (browser redirect)
    AuthorizationCode,
    /// Machine-to-machine authorization
    ClientCredentials,
    /// Refresh of a previously issued token
    RefreshToken,
}

impl AuthorizationGrantType {
    /// Wire value used in `grant_type`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for AuthorizationGrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthenticationMethod {
    /// HTTP Basic with form-encoded client id and secret
    #[default]
    ClientSecretBasic,
    /// `client_id` and `client_secret` in the request body
    ClientSecretPost,
    /// Public client, only `client_id` is sent
    None,
}

/// A configured OAuth2 client
#[derive(Clone)]
pub struct ClientRegistration {
    /// Registration identifier
    pub registration_id: String,
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret (absent for public clients)
    pub client_secret: Option<String>,
    /// Token endpoint authentication method
    pub client_authentication_method: ClientAuthenticationMethod,
    /// Grant type this registration is used with
    pub authorization_grant_type: AuthorizationGrantType,
    /// Token endpoint
    pub token_uri: Url,
    /// Requested scopes
    pub scopes: Vec<String>,
}

impl fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("registration_id", &self.registration_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field(
                "client_authentication_method",
                &self.client_authentication_method,
            )
            .field("authorization_grant_type", &self.authorization_grant_type)
            .field("token_uri", &self.token_uri.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl ClientRegistration {
    /// Build a registration from its configuration entry and a resolved
    /// token endpoint
    fn from_config(registration_id: &str, config: &RegistrationConfig, token_uri: Url) -> Self {
        Self {
            registration_id: registration_id.to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone().filter(|s| !s.is_empty()),
            client_authentication_method: config.client_authentication_method,
            authorization_grant_type: config.authorization_grant_type,
            token_uri,
            scopes: config.scopes.clone(),
        }
    }

    /// Space-delimited scope parameter, if any scopes are configured
    pub fn scope_param(&self) -> Option<String> {
        (!self.scopes.is_empty()).then(|| self.scopes.join(" "))
    }
}

/// Lookup of client registrations by id
pub trait ClientRegistrationRepository: Send + Sync {
    /// Find a registration; `None` when no such id is configured
    fn find_by_registration_id(&self, registration_id: &str) -> Option<Arc<ClientRegistration>>;
}

/// Registrations held in memory, read-only after construction
#[derive(Debug, Default)]
pub struct InMemoryClientRegistrationRepository {
    registrations: HashMap<String, Arc<ClientRegistration>>,
}

impl InMemoryClientRegistrationRepository {
    /// Create a repository from already-built registrations
    pub fn new(registrations: impl IntoIterator<Item = ClientRegistration>) -> Self {
        Self {
            registrations: registrations
                .into_iter()
                .map(|r| (r.registration_id.clone(), Arc::new(r)))
                .collect(),
        }
    }

    /// Build the repository from configuration.
    ///
    /// Registrations with an `issuer_uri` but no `token_uri` get their token
    /// endpoint from the issuer's authorization server metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid token URI, a registration
    /// with neither `token_uri` nor `issuer_uri`, or a failed discovery.
    pub async fn from_config(config: &Config, http_client: &Client) -> Result<Self> {
        let mut registrations = HashMap::with_capacity(config.registrations.len());

        for (id, reg) in &config.registrations {
            let token_uri = resolve_token_uri(id, reg, http_client).await?;
            debug!(registration = %id, token_uri = %token_uri, grant_type = %reg.authorization_grant_type, "Loaded client registration");
            registrations.insert(
                id.clone(),
                Arc::new(ClientRegistration::from_config(id, reg, token_uri)),
            );
        }

        info!(count = registrations.len(), "Client registrations loaded");
        Ok(Self { registrations })
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether no registrations are configured
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registration ids, sorted
    pub fn registration_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.registrations.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl ClientRegistrationRepository for InMemoryClientRegistrationRepository {
    fn find_by_registration_id(&self, registration_id: &str) -> Option<Arc<ClientRegistration>> {
        self.registrations.get(registration_id).cloned()
    }
}

async fn resolve_token_uri(id: &str, reg: &RegistrationConfig, http_client: &Client) -> Result<Url> {
    if let Some(ref token_uri) = reg.token_uri {
        return Url::parse(token_uri).map_err(|e| {
            Error::Config(format!("Registration '{id}': invalid token_uri '{token_uri}': {e}"))
        });
    }

    let Some(ref issuer) = reg.issuer_uri else {
        return Err(Error::Config(format!(
            "Registration '{id}': either token_uri or issuer_uri is required"
        )));
    };

    let metadata = AuthorizationServerMetadata::discover(http_client, issuer)
        .await
        .map_err(|e| Error::Config(format!("Registration '{id}': issuer discovery failed: {e}")))?;

    if !metadata.supports_grant(reg.authorization_grant_type) {
        return Err(Error::Config(format!(
            "Registration '{id}': issuer does not support grant type {}",
            reg.authorization_grant_type
        )));
    }

    Url::parse(&metadata.token_endpoint).map_err(|e| {
        Error::Config(format!(
            "Registration '{id}': issuer advertised invalid token endpoint: {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(id: &str, grant: AuthorizationGrantType) -> ClientRegistration {
        ClientRegistration {
            registration_id: id.to_string(),
            client_id: "mcp-client".to_string(),
            client_secret: Some("s3cr3t".to_string()),
            client_authentication_method: ClientAuthenticationMethod::ClientSecretBasic,
            authorization_grant_type: grant,
            token_uri: Url::parse("http://localhost:9000/oauth2/token").unwrap(),
            scopes: vec!["mcp.read".to_string(), "mcp.write".to_string()],
        }
    }

    #[test]
    fn grant_type_wire_values() {
        assert_eq!(AuthorizationGrantType::AuthorizationCode.as_str(), "authorization_code");
        assert_eq!(AuthorizationGrantType::ClientCredentials.as_str(), "client_credentials");
        assert_eq!(AuthorizationGrantType::RefreshToken.to_string(), "refresh_token");
    }

    #[test]
    fn grant_type_deserializes_snake_case() {
        let grant: AuthorizationGrantType = serde_json::from_str("\"client_credentials\"").unwrap();
        assert_eq!(grant, AuthorizationGrantType::ClientCredentials);
    }

    #[test]
    fn debug_redacts_client_secret() {
        let reg = registration("authserver", AuthorizationGrantType::AuthorizationCode);
        let dbg = format!("{reg:?}");
        assert!(!dbg.contains("s3cr3t"));
        assert!(dbg.contains("***"));
    }

    #[test]
    fn scope_param_joins_with_spaces() {
        let reg = registration("authserver", AuthorizationGrantType::AuthorizationCode);
        assert_eq!(reg.scope_param().as_deref(), Some("mcp.read mcp.write"));

        let mut no_scopes = reg;
        no_scopes.scopes.clear();
        assert_eq!(no_scopes.scope_param(), None);
    }

    #[test]
    fn in_memory_lookup() {
        let repo = InMemoryClientRegistrationRepository::new([
            registration("authserver", AuthorizationGrantType::AuthorizationCode),
            registration(
                "authserver-client-credentials",
                AuthorizationGrantType::ClientCredentials,
            ),
        ]);

        assert_eq!(repo.len(), 2);
        assert_eq!(
            repo.registration_ids(),
            vec!["authserver", "authserver-client-credentials"]
        );
        let found = repo
            .find_by_registration_id("authserver-client-credentials")
            .unwrap();
        assert_eq!(
            found.authorization_grant_type,
            AuthorizationGrantType::ClientCredentials
        );
        assert!(repo.find_by_registration_id("missing").is_none());
    }
}
