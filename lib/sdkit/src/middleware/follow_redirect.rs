//! Follow redirect middleware.
//!
//! Follows 3xx responses carrying a `Location` header, under the request's
//! redirect policy (`allow_redirects`, five hops by default). Only `http`
//! and `https` targets are followed.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use url::Url;

use crate::{Error, Method, Redirects, Request, RequestOptions, Response, Result};

/// Layer that follows HTTP redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowRedirectLayer;

impl<S> Layer<S> for FollowRedirectLayer {
    type Service = FollowRedirect<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FollowRedirect { inner }
    }
}

/// Service that follows HTTP redirects.
#[derive(Debug, Clone)]
pub struct FollowRedirect<S> {
    inner: S,
}

/// Check if a status code is a redirect.
fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Determine the method for the redirected request.
///
/// - 301, 302, 303: GET (HEAD stays HEAD)
/// - 307, 308: original method
fn redirect_method(status: u16, original: Method) -> Method {
    match (status, original) {
        (307 | 308, method) | (_, method @ Method::Head) => method,
        _ => Method::Get,
    }
}

/// Resolve a redirect Location URL relative to the original request URL.
fn resolve_redirect_url(base_url: &Url, location: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(location) {
        return Ok(url);
    }

    base_url.join(location).map_err(Error::InvalidUrl)
}

/// Build the request for the next hop.
fn redirect_request(request: Request, status: u16, location: Url) -> Request {
    let method = redirect_method(status, request.method());
    let same_host = request.url().host_str() == location.host_str();
    let (original_method, _, headers, body, extensions) = request.into_parts();

    let keeps_body = method == original_method;
    let mut next = Request::from_parts(
        method,
        location,
        headers,
        body.filter(|_| keeps_body),
        extensions,
    );
    if !keeps_body {
        next = next
            .without_header("Content-Type")
            .without_header("Content-Length");
    }
    if !same_host {
        next = next.without_header("Authorization").without_header("Cookie");
    }
    next
}

impl<S> Service<Request> for FollowRedirect<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let policy = request
            .extensions()
            .get::<RequestOptions>()
            .and_then(|options| options.allow_redirects)
            .unwrap_or_default();

        Box::pin(async move {
            let Redirects::Max(max_redirects) = policy else {
                return inner.call(request).await;
            };

            let mut current_request = request;
            let mut redirects = 0;

            loop {
                let response = inner.call(current_request.clone()).await?;

                if !is_redirect(response.status()) {
                    return Ok(response);
                }
                let Some(location) = response.header("location") else {
                    // Nothing to follow
                    return Ok(response);
                };

                if redirects >= max_redirects {
                    return Err(Error::TooManyRedirects {
                        count: redirects,
                        max: max_redirects,
                    });
                }

                let new_url = resolve_redirect_url(current_request.url(), location)?;
                if !matches!(new_url.scheme(), "http" | "https") {
                    return Err(Error::InvalidRedirect(format!(
                        "redirect to unsupported scheme: {new_url}"
                    )));
                }

                tracing::debug!(
                    from = %current_request.url(),
                    to = %new_url,
                    status = response.status(),
                    "following redirect"
                );
                current_request = redirect_request(current_request, response.status(), new_url);
                redirects += 1;
            }
        })
    }
}
