//! Configuration management

use std::{collections::HashMap, env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::oauth::{AuthorizationGrantType, ClientAuthenticationMethod};
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    pub env_files: Vec<String>,
    /// Authenticator settings
    pub client: ClientConfig,
    /// OAuth2 client registrations keyed by registration id
    pub registrations: HashMap<String, RegistrationConfig>,
}

/// Authenticator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Registration used for interactive requests
    /// (must use the `authorization_code` grant)
    pub authorization_code_registration_id: String,
    /// Registration used for startup/background requests
    /// (must use the `client_credentials` grant)
    pub client_credentials_registration_id: String,
    /// Timeout for token endpoint and discovery requests
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            authorization_code_registration_id: "authserver".to_string(),
            client_credentials_registration_id: "authserver-client-credentials".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One OAuth2 client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Client id (supports `${VAR}`)
    pub client_id: String,
    /// Client secret (supports `${VAR}`)
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Grant type
    pub authorization_grant_type: AuthorizationGrantType,
    /// Token endpoint authentication method
    #[serde(default)]
    pub client_authentication_method: ClientAuthenticationMethod,
    /// Requested scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Token endpoint URL
    #[serde(default)]
    pub token_uri: Option<String>,
    /// Issuer URL, used to discover the token endpoint when `token_uri` is unset
    #[serde(default)]
    pub issuer_uri: Option<String>,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (MCP_CLIENT_AUTH_ prefix)
        figment = figment.merge(Env::prefixed("MCP_CLIENT_AUTH_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        // Expand ${VAR} in registrations
        config.expand_env_vars()?;

        config.validate()?;
        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in registration values
    fn expand_env_vars(&mut self) -> Result<()> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| Error::Internal(format!("Invalid env pattern: {e}")))?;

        for reg in self.registrations.values_mut() {
            reg.client_id = Self::expand_string(&re, &reg.client_id);
            for value in [
                &mut reg.client_secret,
                &mut reg.token_uri,
                &mut reg.issuer_uri,
            ]
            .into_iter()
            .flatten()
            {
                *value = Self::expand_string(&re, value);
            }
        }
        Ok(())
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }

    /// Check the registrations the authenticator relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required registration is missing, uses
    /// the wrong grant type, or has no token endpoint source.
    pub fn validate(&self) -> Result<()> {
        for (id, reg) in &self.registrations {
            if reg.token_uri.is_none() && reg.issuer_uri.is_none() {
                return Err(Error::Config(format!(
                    "Registration '{id}': either token_uri or issuer_uri is required"
                )));
            }
            if reg.client_id.is_empty() {
                return Err(Error::Config(format!("Registration '{id}': client_id is empty")));
            }
        }

        self.require_registration(
            &self.client.authorization_code_registration_id,
            AuthorizationGrantType::AuthorizationCode,
        )?;
        self.require_registration(
            &self.client.client_credentials_registration_id,
            AuthorizationGrantType::ClientCredentials,
        )
    }

    fn require_registration(&self, id: &str, grant: AuthorizationGrantType) -> Result<()> {
        let reg = self.registrations.get(id).ok_or_else(|| {
            Error::Config(format!("No client registration found for id '{id}'"))
        })?;

        if reg.authorization_grant_type != grant {
            return Err(Error::Config(format!(
                "Registration '{id}' must use authorization-grant-type {grant}, found {}",
                reg.authorization_grant_type
            )));
        }
        Ok(())
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            let mins = mins.parse::<u64>().map_err(serde::de::Error::custom)?;
            mins.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| serde::de::Error::custom(format!("duration too large: {s}")))
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
