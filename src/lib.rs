//! MCP Client Auth Library
//!
//! OAuth2 bearer-token authentication for outbound MCP client requests.
//!
//! # Features
//!
//! - **Origin-aware**: interactive requests use the signed-in user's
//!   `authorization_code` token, background requests use the application's
//!   own `client_credentials` token
//! - **Pipeline filter**: installs into a [`transport::FilteredClient`] as a
//!   reusable, idempotent configuration step
//! - **Config-driven registrations**: YAML + environment, with RFC 8414
//!   issuer discovery for token endpoints
//! - **Token refresh**: stored user tokens are refreshed when they expire

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod cli;
pub mod config;
pub mod error;
pub mod oauth;
pub mod origin;
pub mod transport;

pub use authenticator::{RegistrationIds, RequestAuthenticator};
pub use error::{Error, Result};
pub use origin::RequestOrigin;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
