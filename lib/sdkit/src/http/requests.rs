//! Request execution shared by every client: middleware registration,
//! the cached handler stack and the HTTP client lookup.

use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use super::client::HttpClient;
use super::stack::{HandlerStack, Middleware, MiddlewareStack};
use super::transport::Transport;
use crate::container::names;
use crate::{
    ContentType, Method, RequestOptions, Response, Result, ServiceContainer, encode_json_payload,
};

/// Executes requests for a client.
///
/// Holds the registered middlewares and the handler stack built from them.
/// The stack is built on first use and cached: middlewares pushed after
/// that take effect only once the stack is reset.
///
/// # Example
///
/// ```no_run
/// use sdkit::{Method, RequestExecutor, RequestOptions};
///
/// # async fn demo() -> sdkit::Result<()> {
/// let executor = RequestExecutor::new();
/// let response = executor
///     .request("https://api.example.com/ping", Method::Get, RequestOptions::new())
///     .await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RequestExecutor {
    container: Option<ServiceContainer>,
    defaults: RequestOptions,
    base_uri: Option<Url>,
    http_client: Mutex<Option<HttpClient>>,
    middlewares: Mutex<MiddlewareStack>,
    handler_stack: Mutex<Option<Arc<HandlerStack>>>,
}

impl RequestExecutor {
    /// A standalone executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor resolving its HTTP client and transport from
    /// `container`, with the container's default options.
    #[must_use]
    pub fn with_container(container: ServiceContainer) -> Self {
        Self {
            defaults: container.default_options().clone(),
            container: Some(container),
            ..Self::default()
        }
    }

    /// Options merged under the options of every request.
    #[must_use]
    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Base URI overriding the one of the request options.
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: Url) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    /// The default options.
    #[must_use]
    pub const fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// The base URI, if any.
    #[must_use]
    pub const fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    /// Use `client` for the next requests.
    pub fn set_http_client(&self, client: HttpClient) {
        *self
            .http_client
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    /// The HTTP client: the one set explicitly, else the container's
    /// `http_client`, else a default client. The choice is kept.
    ///
    /// # Errors
    ///
    /// Returns the container's error when its `http_client` fails to build.
    pub fn http_client(&self) -> Result<HttpClient> {
        let mut slot = self
            .http_client
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = match &self.container {
            Some(container) if container.has(names::HTTP_CLIENT) => container.http_client()?,
            _ => HttpClient::default(),
        };
        *slot = Some(client.clone());
        Ok(client)
    }

    /// The transport at the bottom of the stack: the container's `handler`
    /// when registered, else a hyper transport tuned by the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error when the `handler` service is not a [`Transport`] or
    /// the HTTP client cannot be resolved.
    pub fn transport(&self) -> Result<Transport> {
        if let Some(container) = &self.container
            && container.has(names::HANDLER)
        {
            return container.resolve_cloned::<Transport>(names::HANDLER);
        }
        Ok(Transport::hyper(self.http_client()?.config().clone()))
    }

    /// Register a middleware; a named one replaces the entry of that name.
    pub fn push_middleware(&self, middleware: Middleware, name: Option<&str>) {
        self.middlewares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(middleware, name);
    }

    /// Names of the registered middlewares, in registration order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<Option<String>> {
        self.middlewares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
            .into_iter()
            .map(|name| name.map(str::to_string))
            .collect()
    }

    /// Whether a middleware is registered under `name`.
    #[must_use]
    pub fn has_middleware(&self, name: &str) -> bool {
        self.middlewares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some()
    }

    /// The handler stack, built from the registered middlewares on first
    /// use.
    ///
    /// # Errors
    ///
    /// Returns the transport resolution error.
    pub fn handler_stack(&self) -> Result<Arc<HandlerStack>> {
        if let Some(stack) = self
            .handler_stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(stack));
        }

        let transport = self.transport()?;
        let middlewares = self
            .middlewares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let built = Arc::new(HandlerStack::build(&transport, &middlewares));

        // A concurrent builder may have won; keep the first stack stored
        let mut slot = self
            .handler_stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(slot.get_or_insert(built)))
    }

    /// Use `stack` for the next requests.
    pub fn set_handler_stack(&self, stack: HandlerStack) {
        *self
            .handler_stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(stack));
    }

    /// Drop the cached stack; the next request rebuilds it.
    pub fn reset_handler_stack(&self) {
        *self
            .handler_stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Send `method` to `url` with `options` over the default options.
    ///
    /// A map or list `json` payload is written to the body with
    /// `Content-Type: application/json`; an empty one is sent as `{}`.
    ///
    /// # Errors
    ///
    /// Returns the request build error, the transport error, or the error
    /// raised by a middleware layer.
    pub async fn request(&self, url: &str, method: Method, options: RequestOptions) -> Result<Response> {
        let mut options = fix_json_payload(self.defaults.clone().merge(options))?;
        if let Some(base_uri) = &self.base_uri {
            options.base_uri = Some(base_uri.clone());
        }

        let stack = self.handler_stack()?;
        let client = self.http_client()?;
        client.send(&stack, method, url, options).await
    }
}

fn fix_json_payload(mut options: RequestOptions) -> Result<RequestOptions> {
    if let Some(payload) = options.json.take_if(|json| json.is_object() || json.is_array()) {
        options.set_header("Content-Type", ContentType::Json.as_str());
        options.body = Some(encode_json_payload(&payload)?);
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert2::check;
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::{Error, Request};

    fn echo() -> Transport {
        Transport::new(tower::service_fn(|request: Request| async move {
            let headers = HashMap::from([(
                "x-content-type".to_string(),
                request.header("content-type").unwrap_or_default().to_string(),
            )]);
            let body = request.body().cloned().unwrap_or_default();
            Ok::<_, Error>(Response::new(200, headers, body))
        }))
    }

    fn executor() -> RequestExecutor {
        let container = ServiceContainer::builder()
            .provider(|container: &ServiceContainer| {
                container.container().instance(names::HANDLER, echo());
                Ok(())
            })
            .build()
            .expect("container");
        RequestExecutor::with_container(container)
            .with_base_uri(Url::parse("https://api.example.com/").expect("base"))
    }

    #[test]
    fn json_fix_up() {
        let options = fix_json_payload(RequestOptions::new().with_json(json!([]))).expect("options");
        check!(options.body.as_deref() == Some(&b"{}"[..]));
        check!(options.header("content-type") == Some("application/json"));
        check!(options.json.is_none());

        let options = fix_json_payload(RequestOptions::new().with_json(json!("text"))).expect("options");
        check!(options.body.is_none());
        check!(options.json == Some(json!("text")));
    }

    #[tokio::test]
    async fn sends_through_container_handler() {
        let response = executor()
            .request("echo", Method::Post, RequestOptions::new().with_json(json!({"city": "杭州"})))
            .await
            .expect("response");

        check!(response.header("x-content-type") == Some("application/json"));
        check!(response.body() == &Bytes::from(r#"{"city":"杭州"}"#));
    }

    #[test]
    fn stack_is_cached_until_reset() {
        let executor = executor();
        let first = executor.handler_stack().expect("stack");
        let second = executor.handler_stack().expect("stack");
        check!(Arc::ptr_eq(&first, &second));

        executor.push_middleware(Middleware::map_request(Ok), Some("noop"));
        check!(executor.handler_stack().expect("stack").layers().len() == first.layers().len());

        executor.reset_handler_stack();
        let rebuilt = executor.handler_stack().expect("stack");
        check!(!Arc::ptr_eq(&first, &rebuilt));
        check!(rebuilt.layers().iter().any(|name| name == "noop"));
    }

    #[test]
    fn http_client_resolution() {
        let executor = RequestExecutor::new();
        check!(executor.http_client().expect("client").config().timeout.as_secs() == 30);

        let custom = HttpClient::new(
            crate::ClientConfig::builder()
                .timeout(std::time::Duration::from_secs(3))
                .build(),
            RequestOptions::new(),
        );
        executor.set_http_client(custom);
        check!(executor.http_client().expect("client").config().timeout.as_secs() == 3);
    }
}
