//! Middleware registration and handler stack composition.

use std::fmt;
use std::sync::Arc;

use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};

use super::transport::{BoxedService, ServiceFuture, Transport};
use crate::middleware::{CookiesLayer, FollowRedirectLayer, HttpErrorsLayer, PrepareBodyLayer};
use crate::{Error, Request, Response, Result};

type WrapFn = Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>;

/// A request middleware: a function wrapping the next service.
///
/// # Example
///
/// ```
/// use sdkit::Middleware;
///
/// let tag = Middleware::map_request(|request| Ok(request.with_header("X-Sdk", "demo")));
/// ```
#[derive(Clone)]
pub struct Middleware {
    wrap: WrapFn,
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").finish_non_exhaustive()
    }
}

impl Middleware {
    /// A middleware from a service-wrapping function.
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(BoxedService) -> BoxedService + Send + Sync + 'static,
    {
        Self {
            wrap: Arc::new(wrap),
        }
    }

    /// A middleware from a Tower layer.
    pub fn from_layer<L>(layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self::new(move |service| BoxCloneService::new(layer.layer(service)))
    }

    /// A middleware rewriting each request before it is sent.
    pub fn map_request<F>(map: F) -> Self
    where
        F: Fn(Request) -> Result<Request> + Send + Sync + 'static,
    {
        let map = Arc::new(map);
        Self::new(move |inner: BoxedService| {
            let map = Arc::clone(&map);
            BoxCloneService::new(tower::service_fn(move |request: Request| {
                let inner = inner.clone();
                let map = Arc::clone(&map);
                async move {
                    let request = map(request)?;
                    inner.oneshot(request).await
                }
            }))
        })
    }

    /// A middleware inspecting or rewriting each response with its request.
    pub fn map_response<F>(map: F) -> Self
    where
        F: Fn(&Request, Response) -> Result<Response> + Send + Sync + 'static,
    {
        let map = Arc::new(map);
        Self::new(move |inner: BoxedService| {
            let map = Arc::clone(&map);
            BoxCloneService::new(tower::service_fn(move |request: Request| {
                let inner = inner.clone();
                let map = Arc::clone(&map);
                async move {
                    let sent = request.clone();
                    let response = inner.oneshot(request).await?;
                    map(&sent, response)
                }
            }))
        })
    }

    /// Wrap `service`.
    #[must_use]
    pub fn apply(&self, service: BoxedService) -> BoxedService {
        (self.wrap)(service)
    }
}

/// Registered middlewares, in registration order.
///
/// A named middleware replaces the one registered under the same name, in
/// place; unnamed ones are appended.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareStack {
    entries: Vec<(Option<String>, Middleware)>,
}

impl MiddlewareStack {
    /// An empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware, optionally under a name.
    pub fn push(&mut self, middleware: Middleware, name: Option<&str>) {
        if let Some(name) = name
            && let Some(slot) = self
                .entries
                .iter_mut()
                .find(|(existing, _)| existing.as_deref() == Some(name))
        {
            slot.1 = middleware;
            return;
        }
        self.entries.push((name.map(str::to_string), middleware));
    }

    /// The middleware registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Middleware> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.as_deref() == Some(name))
            .map(|(_, middleware)| middleware)
    }

    /// Names in registration order; `None` for unnamed entries.
    #[must_use]
    pub fn names(&self) -> Vec<Option<&str>> {
        self.entries.iter().map(|(name, _)| name.as_deref()).collect()
    }

    /// Number of middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Option<&str>, &Middleware)> {
        self.entries
            .iter()
            .map(|(name, middleware)| (name.as_deref(), middleware))
    }
}

/// Names of the built-in layers.
pub mod layer_names {
    /// Cookie jar handling.
    pub const COOKIES: &str = "cookies";
    /// `Content-Length` preparation.
    pub const PREPARE_BODY: &str = "prepare_body";
    /// Redirect following.
    pub const ALLOW_REDIRECTS: &str = "allow_redirects";
    /// 4xx/5xx promotion to errors.
    pub const HTTP_ERRORS: &str = "http_errors";
}

/// A composed request pipeline: built-in layers and registered middlewares
/// around a transport.
///
/// From the outside in: `http_errors`, the registered middlewares in
/// registration order, `allow_redirects`, `prepare_body`, `cookies`, then
/// the transport.
#[derive(Clone)]
pub struct HandlerStack {
    service: Transport,
    layers: Vec<String>,
}

impl fmt::Debug for HandlerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerStack")
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HandlerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, name) in self.layers.iter().enumerate() {
            writeln!(f, "> {}) {name}", depth + 1)?;
        }
        writeln!(f, "0) transport")?;
        for (depth, name) in self.layers.iter().enumerate().rev() {
            writeln!(f, "< {}) {name}", depth + 1)?;
        }
        Ok(())
    }
}

impl HandlerStack {
    /// A stack sending straight to `transport`, without any layer.
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self {
            service: transport,
            layers: Vec::new(),
        }
    }

    /// Compose the built-in layers and `middlewares` around `transport`.
    #[must_use]
    pub fn build(transport: &Transport, middlewares: &MiddlewareStack) -> Self {
        let mut service = transport.boxed();
        service = BoxCloneService::new(CookiesLayer.layer(service));
        service = BoxCloneService::new(PrepareBodyLayer.layer(service));
        service = BoxCloneService::new(FollowRedirectLayer.layer(service));

        // First registered ends up outermost, so it sees the request first
        for (_, middleware) in middlewares.iter().rev() {
            service = middleware.apply(service);
        }
        service = BoxCloneService::new(HttpErrorsLayer.layer(service));

        let mut layers = vec![layer_names::HTTP_ERRORS.to_string()];
        layers.extend(
            middlewares
                .iter()
                .enumerate()
                .map(|(index, (name, _))| name.map_or_else(|| format!("#{index}"), str::to_string)),
        );
        layers.extend(
            [
                layer_names::ALLOW_REDIRECTS,
                layer_names::PREPARE_BODY,
                layer_names::COOKIES,
            ]
            .map(str::to_string),
        );

        tracing::debug!(?layers, "handler stack built");
        Self {
            service: Transport::from_boxed(service),
            layers,
        }
    }

    /// Layer names, outermost first.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Send a request through the stack.
    pub fn send(&self, request: Request) -> ServiceFuture {
        self.service.send(request)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert2::check;
    use bytes::Bytes;

    use super::*;
    use crate::Method;

    fn echo_transport(seen: Arc<Mutex<Vec<String>>>) -> Transport {
        Transport::new(tower::service_fn(move |request: Request| {
            let seen = Arc::clone(&seen);
            async move {
                let mut tags: Vec<(String, String)> = request
                    .headers()
                    .iter()
                    .filter(|(name, _)| name.starts_with("X-Tag"))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                tags.sort();
                seen.lock()
                    .expect("seen")
                    .extend(tags.into_iter().map(|(name, value)| format!("{name}={value}")));
                Ok::<_, Error>(Response::new(200, HashMap::new(), Bytes::new()))
            }
        }))
    }

    fn tag(name: &'static str, value: &'static str) -> Middleware {
        Middleware::map_request(move |request| Ok(request.with_header(name, value)))
    }

    #[test]
    fn named_entries_overwrite_in_place() {
        let mut stack = MiddlewareStack::new();
        stack.push(tag("X-Tag-A", "1"), Some("token"));
        stack.push(tag("X-Tag-B", "1"), None);
        stack.push(tag("X-Tag-A", "2"), Some("token"));

        check!(stack.len() == 2);
        check!(stack.names() == vec![Some("token"), None]);
        check!(stack.get("token").is_some());
    }

    #[tokio::test]
    async fn overwritten_middleware_is_the_only_one_applied() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut middlewares = MiddlewareStack::new();
        middlewares.push(tag("X-Tag-First", "1"), Some("signer"));
        middlewares.push(tag("X-Tag-Second", "1"), Some("signer"));

        let stack = HandlerStack::build(&echo_transport(Arc::clone(&seen)), &middlewares);
        let url = url::Url::parse("https://api.example.com/").expect("url");
        stack
            .send(Request::builder(Method::Get, url).build())
            .await
            .expect("response");

        check!(*seen.lock().expect("seen") == vec!["X-Tag-Second=1"]);
    }

    #[tokio::test]
    async fn first_registered_sees_request_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut middlewares = MiddlewareStack::new();
        for name in ["outer", "inner"] {
            let order = Arc::clone(&order);
            middlewares.push(
                Middleware::map_request(move |request| {
                    order.lock().expect("order").push(name);
                    Ok(request)
                }),
                Some(name),
            );
        }

        let stack = HandlerStack::build(&echo_transport(Arc::default()), &middlewares);
        let url = url::Url::parse("https://api.example.com/").expect("url");
        stack
            .send(Request::builder(Method::Get, url).build())
            .await
            .expect("response");

        check!(*order.lock().expect("order") == vec!["outer", "inner"]);
    }

    #[test]
    fn display_lists_layers() {
        let mut middlewares = MiddlewareStack::new();
        middlewares.push(tag("X-Tag", "1"), Some("access_token"));
        middlewares.push(tag("X-Tag", "2"), None);
        let stack = HandlerStack::build(&echo_transport(Arc::default()), &middlewares);

        insta::assert_snapshot!(stack.to_string(), @r"
        > 1) http_errors
        > 2) access_token
        > 3) #1
        > 4) allow_redirects
        > 5) prepare_body
        > 6) cookies
        0) transport
        < 6) cookies
        < 5) prepare_body
        < 4) allow_redirects
        < 3) #1
        < 2) access_token
        < 1) http_errors
        ");
    }
}
