//! Token endpoint client
//!
//! Posts grant requests to a registration's token endpoint and turns the
//! response into an [`AccessToken`]. Every failure here is a
//! [`Error::TokenEndpoint`], or [`Error::OAuth2`] when the server sent an
//! OAuth2 error body.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderValue;
use tracing::debug;
use url::form_urlencoded;

use super::registration::{ClientAuthenticationMethod, ClientRegistration};
use super::token::{AccessToken, TokenErrorResponse, TokenResponse};
use crate::{Error, Result};

/// HTTP client for token endpoint requests
#[derive(Debug, Clone)]
pub struct TokenEndpointClient {
    http_client: Client,
}

impl TokenEndpointClient {
    /// Wrap an existing HTTP client
    #[must_use]
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Build a dedicated HTTP client with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build token endpoint client: {e}")))?;

        Ok(Self { http_client })
    }

    /// The underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Request a token with the given grant parameters, authenticating as
    /// the registration's client
    pub(crate) async fn request_token(
        &self,
        registration: &ClientRegistration,
        grant_params: &[(&str, &str)],
    ) -> Result<AccessToken> {
        let mut params: Vec<(&str, &str)> = grant_params.to_vec();
        let secret = registration.client_secret.as_deref().unwrap_or_default();

        let mut request = self.http_client.post(registration.token_uri.clone());

        match registration.client_authentication_method {
            ClientAuthenticationMethod::ClientSecretBasic => {
                // RFC 6749 §2.3.1: both parts are form-encoded before Basic encoding
                request = request.basic_auth(
                    form_encode(&registration.client_id),
                    Some(form_encode(secret)),
                );
            }
            ClientAuthenticationMethod::ClientSecretPost => {
                params.push(("client_id", &registration.client_id));
                params.push(("client_secret", secret));
            }
            ClientAuthenticationMethod::None => {
                params.push(("client_id", &registration.client_id));
            }
        }

        debug!(
            registration = %registration.registration_id,
            token_uri = %registration.token_uri,
            "Requesting access token"
        );

        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::TokenEndpoint(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_response(status, &body));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::TokenEndpoint(format!("Failed to parse token response: {e}")))?;

        let token = AccessToken::from_response(token_response)?;
        validate_token(&token)?;
        Ok(token)
    }
}

/// Reject tokens that cannot be sent as `Authorization: Bearer <token>`
fn validate_token(token: &AccessToken) -> Result<()> {
    if token.token_value.is_empty() {
        return Err(Error::TokenEndpoint(
            "Token response contained an empty access_token".to_string(),
        ));
    }
    if !token.is_bearer() {
        return Err(Error::TokenEndpoint(format!(
            "Unsupported token type '{}'",
            token.token_type
        )));
    }
    if HeaderValue::from_str(&format!("Bearer {}", token.token_value)).is_err() {
        return Err(Error::TokenEndpoint(
            "Token response contained an access_token that is not a valid header value"
                .to_string(),
        ));
    }
    Ok(())
}

fn form_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Map a non-2xx token endpoint response, preferring the OAuth error body
fn error_response(status: reqwest::StatusCode, body: &str) -> Error {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => {
            let message = match err.error_description {
                Some(desc) => format!("HTTP {status}: {}: {desc}", err.error),
                None => format!("HTTP {status}: {}", err.error),
            };
            Error::OAuth2 {
                code: err.error,
                message,
            }
        }
        Err(_) => Error::TokenEndpoint(format!("HTTP {status} - {body}")),
    }
}
