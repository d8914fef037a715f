//! Filtered client assembly

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Response;
use tracing::debug;

use super::{ClientRequest, Exchange, ExchangeFilter, RequestDecorator};
use crate::Result;

/// Builder for a [`FilteredClient`].
///
/// Decorators and filters are deduplicated by identity: adding the same
/// `Arc` twice installs it once, so reapplying a [`PipelineInstaller`] is a
/// no-op.
#[derive(Default)]
pub struct FilteredClientBuilder {
    decorators: Vec<Arc<dyn RequestDecorator>>,
    filters: Vec<Arc<dyn ExchangeFilter>>,
}

impl FilteredClientBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default-request decorator
    #[must_use]
    pub fn default_request(mut self, decorator: Arc<dyn RequestDecorator>) -> Self {
        if self.decorators.iter().any(|d| same_instance(d, &decorator)) {
            debug!("Decorator already installed, skipping");
        } else {
            self.decorators.push(decorator);
        }
        self
    }

    /// Add a filter; filters run in insertion order
    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn ExchangeFilter>) -> Self {
        if self.filters.iter().any(|f| same_instance(f, &filter)) {
            debug!("Filter already installed, skipping");
        } else {
            self.filters.push(filter);
        }
        self
    }

    /// Apply a reusable configuration step
    #[must_use]
    pub fn apply(self, installer: &PipelineInstaller) -> Self {
        installer.apply(self)
    }

    /// Number of installed filters
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Number of installed decorators
    pub fn decorator_count(&self) -> usize {
        self.decorators.len()
    }

    /// Finish the pipeline on top of the transport
    #[must_use]
    pub fn build(self, transport: Arc<dyn Exchange>) -> FilteredClient {
        FilteredClient {
            decorators: self.decorators,
            filters: self.filters,
            transport,
        }
    }
}

fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Reusable step installing a default-request decorator and a filter
#[derive(Clone)]
pub struct PipelineInstaller {
    decorator: Arc<dyn RequestDecorator>,
    filter: Arc<dyn ExchangeFilter>,
}

impl PipelineInstaller {
    /// Create an installer
    #[must_use]
    pub fn new(decorator: Arc<dyn RequestDecorator>, filter: Arc<dyn ExchangeFilter>) -> Self {
        Self { decorator, filter }
    }

    /// Install into a builder
    #[must_use]
    pub fn apply(&self, builder: FilteredClientBuilder) -> FilteredClientBuilder {
        builder
            .default_request(Arc::clone(&self.decorator))
            .filter(Arc::clone(&self.filter))
    }
}

/// A transport wrapped in decorators and filters
pub struct FilteredClient {
    decorators: Vec<Arc<dyn RequestDecorator>>,
    filters: Vec<Arc<dyn ExchangeFilter>>,
    transport: Arc<dyn Exchange>,
}

impl FilteredClient {
    /// Start building a client
    #[must_use]
    pub fn builder() -> FilteredClientBuilder {
        FilteredClientBuilder::new()
    }

    /// Decorate the request and run it through the filter chain
    pub async fn execute(&self, mut request: ClientRequest) -> Result<Response> {
        for decorator in &self.decorators {
            decorator.decorate(&mut request);
        }

        Chain {
            filters: &self.filters,
            transport: self.transport.as_ref(),
        }
        .exchange(request)
        .await
    }
}

/// Remaining filters plus the transport
struct Chain<'a> {
    filters: &'a [Arc<dyn ExchangeFilter>],
    transport: &'a dyn Exchange,
}

#[async_trait]
impl<'a> Exchange for Chain<'a> {
    async fn exchange(&self, request: ClientRequest) -> Result<Response> {
        match self.filters.split_first() {
            Some((first, rest)) => {
                let next = Chain {
                    filters: rest,
                    transport: self.transport,
                };
                first.filter(request, &next).await
            }
            None => self.transport.exchange(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use reqwest::header::{HeaderName, HeaderValue};
    use reqwest::{Method, Request, Url};

    /// Transport recording the header trail of every request
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Option<String>, Vec<String>)>>,
    }

    #[async_trait]
    impl Exchange for Recorder {
        async fn exchange(&self, request: ClientRequest) -> Result<Response> {
            let trail = request
                .headers()
                .get_all("x-trail")
                .iter()
                .map(|v| v.to_str().unwrap().to_string())
                .collect();
            self.seen
                .lock()
                .push((request.registration_id().map(String::from), trail));
            Ok(http::Response::new("ok").into())
        }
    }

    struct Tag(&'static str);

    #[async_trait]
    impl ExchangeFilter for Tag {
        async fn filter(&self, request: ClientRequest, next: &dyn Exchange) -> Result<Response> {
            let mut inner = request.into_inner();
            inner
                .headers_mut()
                .append(HeaderName::from_static("x-trail"), HeaderValue::from_static(self.0));
            next.exchange(ClientRequest::background(inner)).await
        }
    }

    struct DefaultId;

    impl RequestDecorator for DefaultId {
        fn decorate(&self, request: &mut ClientRequest) {
            if request.registration_id().is_none() {
                request.set_registration_id("default");
            }
        }
    }

    fn request() -> ClientRequest {
        ClientRequest::background(Request::new(
            Method::GET,
            Url::parse("http://localhost/mcp").unwrap(),
        ))
    }

    #[tokio::test]
    async fn filters_run_in_insertion_order() {
        let recorder = Arc::new(Recorder::default());
        let client = FilteredClient::builder()
            .filter(Arc::new(Tag("first")))
            .filter(Arc::new(Tag("second")))
            .build(recorder.clone());

        client.execute(request()).await.unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen[0].1, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn empty_pipeline_goes_straight_to_transport() {
        let recorder = Arc::new(Recorder::default());
        let client = FilteredClient::builder().build(recorder.clone());

        let response = client.execute(request()).await.unwrap();
        assert!(response.status().is_success());
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn decorators_run_before_filters() {
        let recorder = Arc::new(Recorder::default());
        let client = FilteredClient::builder()
            .default_request(Arc::new(DefaultId))
            .build(recorder.clone());

        client.execute(request()).await.unwrap();
        client
            .execute(request().with_registration_id("explicit"))
            .await
            .unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen[0].0.as_deref(), Some("default"));
        assert_eq!(seen[1].0.as_deref(), Some("explicit"));
    }

    #[test]
    fn installer_is_idempotent() {
        let installer = PipelineInstaller::new(Arc::new(DefaultId), Arc::new(Tag("auth")));

        let builder = FilteredClientBuilder::new()
            .apply(&installer)
            .apply(&installer);
        assert_eq!(builder.filter_count(), 1);
        assert_eq!(builder.decorator_count(), 1);

        let other = PipelineInstaller::new(Arc::new(DefaultId), Arc::new(Tag("auth")));
        let builder = builder.apply(&other);
        assert_eq!(builder.filter_count(), 2);
    }
}
