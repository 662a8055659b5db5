//! The transport: the innermost service that puts requests on the wire.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::connector::https_connector;
use crate::{ClientConfig, Error, Request, RequestOptions, Response, Result};

/// Type-erased service for middleware composition.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Future type for Tower Service implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// A cloneable, thread-safe handle over a boxed service.
///
/// `BoxCloneService` is not `Sync`; the handle keeps it behind a mutex and
/// clones it for each call, so the lock is never held across an await.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Mutex<BoxedService>>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

impl Transport {
    /// Wrap any request service.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    ///
    /// use sdkit::{Request, Response, Transport};
    ///
    /// let transport = Transport::new(tower::service_fn(|_request: Request| async {
    ///     Ok::<_, sdkit::Error>(Response::new(200, HashMap::new(), "{}".into()))
    /// }));
    /// ```
    #[must_use]
    pub fn new<S>(service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        Self::from_boxed(BoxCloneService::new(service))
    }

    /// Wrap an already boxed service.
    #[must_use]
    pub fn from_boxed(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    /// The hyper transport tuned by `config`.
    #[must_use]
    pub fn hyper(config: ClientConfig) -> Self {
        Self::new(HyperTransport::new(config))
    }

    /// A clone of the wrapped service, for composing layers over it.
    #[must_use]
    pub fn boxed(&self) -> BoxedService {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send one request.
    pub fn send(&self, request: Request) -> ServiceFuture {
        let mut service = self.boxed();
        Box::pin(async move {
            std::future::poll_fn(|cx| service.poll_ready(cx)).await?;
            service.call(request).await
        })
    }
}

impl Service<Request> for Transport {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        // Readiness is polled on the cloned service when called
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.send(request)
    }
}

/// HTTP transport using hyper-util with connection pooling and rustls.
///
/// Time limits come from the [`RequestOptions`] extension of each request,
/// falling back to the [`ClientConfig`]:
/// - `timeout` bounds the whole exchange;
/// - `connect_timeout` bounds the wait for the response head;
/// - `read_timeout` bounds reading the body.
///
/// A zero duration means no limit.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

struct Limits {
    total: Option<Duration>,
    head: Option<Duration>,
    body: Option<Duration>,
}

impl Limits {
    fn new(config: &ClientConfig, options: Option<&RequestOptions>) -> Self {
        let limit = |duration: Duration| (!duration.is_zero()).then_some(duration);
        let option = |pick: fn(&RequestOptions) -> Option<Duration>| options.and_then(pick);
        Self {
            total: option(|o| o.timeout).map_or(config.timeout_limit(), limit),
            head: option(|o| o.connect_timeout).and_then(limit),
            body: option(|o| o.read_timeout).and_then(limit),
        }
    }
}

async fn within<F: Future>(limit: Option<Duration>, future: F) -> Result<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| Error::Timeout),
        None => Ok(future.await),
    }
}

impl HyperTransport {
    /// Create a transport with its own connection pool.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let connector = https_connector(config.connect_timeout_limit());

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner, config }
    }

    /// The transport tuning.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_hyper_request(request: Request) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body, extensions) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = body.map_or_else(Full::default, Full::new);
        let mut http_request = builder
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))?;

        *http_request.extensions_mut() = extensions;

        Ok(http_request)
    }

    /// Flatten response headers; repeated headers are joined with `", "`,
    /// except `Set-Cookie`, whose values are joined with newlines.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        let mut flattened: HashMap<String, String> = HashMap::with_capacity(headers.keys_len());
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let separator = if name == http::header::SET_COOKIE {
                "\n"
            } else {
                ", "
            };
            flattened
                .entry(name.to_string())
                .and_modify(|existing| {
                    existing.push_str(separator);
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        flattened
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let limits = Limits::new(&self.config, request.extensions().get::<RequestOptions>());
        let hyper_request = Self::build_hyper_request(request)?;

        let exchange = async {
            let response = within(limits.head, self.inner.request(hyper_request))
                .await?
                .map_err(Self::map_hyper_error)?;

            let status = response.status().as_u16();
            let response_headers = Self::extract_headers(response.headers());

            let body = within(limits.body, response.into_body().collect())
                .await?
                .map_err(|e| Error::connection(e.to_string()))?
                .to_bytes();

            Ok::<_, Error>(Response::new(status, response_headers, body))
        };

        within(limits.total, exchange).await?
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Service<Request> for HyperTransport {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}
