//! Outbound request pipeline
//!
//! A request travels through decorators and filters before reaching the
//! transport. Each filter receives the request and the next stage and decides
//! what to forward.

mod pipeline;

pub use self::pipeline::{FilteredClient, FilteredClientBuilder, PipelineInstaller};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Request, Response};

use crate::origin::RequestOrigin;
use crate::{Error, Result};

/// An outbound request together with its pipeline attributes
#[derive(Debug)]
pub struct ClientRequest {
    inner: Request,
    origin: RequestOrigin,
    registration_id: Option<String>,
}

impl ClientRequest {
    /// Wrap a request with an explicit origin
    #[must_use]
    pub fn new(inner: Request, origin: RequestOrigin) -> Self {
        Self {
            inner,
            origin,
            registration_id: None,
        }
    }

    /// Wrap a request issued by startup or background work
    #[must_use]
    pub fn background(inner: Request) -> Self {
        Self::new(inner, RequestOrigin::Background)
    }

    /// Origin of the request
    pub fn origin(&self) -> &RequestOrigin {
        &self.origin
    }

    /// Client registration the request should be authorized with, if set
    pub fn registration_id(&self) -> Option<&str> {
        self.registration_id.as_deref()
    }

    /// Set the client registration attribute
    pub fn set_registration_id(&mut self, registration_id: impl Into<String>) {
        self.registration_id = Some(registration_id.into());
    }

    /// Builder-style [`Self::set_registration_id`]
    #[must_use]
    pub fn with_registration_id(mut self, registration_id: impl Into<String>) -> Self {
        self.set_registration_id(registration_id);
        self
    }

    /// The underlying request
    pub fn inner(&self) -> &Request {
        &self.inner
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Unwrap into the transport request
    pub fn into_inner(self) -> Request {
        self.inner
    }

    /// Replace any `Authorization` header with `Bearer <token>`.
    ///
    /// Method, URL, body, timeout and all other headers are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the token is not a valid header
    /// value.
    pub fn with_bearer_auth(mut self, token: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::InvalidRequest(format!("Invalid bearer token: {e}")))?;
        value.set_sensitive(true);
        self.inner.headers_mut().insert(AUTHORIZATION, value);
        Ok(self)
    }
}

/// The next stage of the pipeline
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Send the request and return the response
    async fn exchange(&self, request: ClientRequest) -> Result<Response>;
}

/// A filter wrapped around the rest of the pipeline
#[async_trait]
pub trait ExchangeFilter: Send + Sync {
    /// Handle the request, usually by forwarding a (possibly rewritten)
    /// request to `next`
    async fn filter(&self, request: ClientRequest, next: &dyn Exchange) -> Result<Response>;
}

/// Adjusts every request before any filter runs
pub trait RequestDecorator: Send + Sync {
    /// Decorate the request in place
    fn decorate(&self, request: &mut ClientRequest);
}

#[async_trait]
impl Exchange for reqwest::Client {
    async fn exchange(&self, request: ClientRequest) -> Result<Response> {
        Ok(self.execute(request.into_inner()).await?)
    }
}
