//! Cookie jar middleware.
//!
//! Active for requests whose options carry a [`CookieJar`]: matching cookies
//! are sent in the `Cookie` header and `Set-Cookie` responses are stored.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{CookieJar, Error, Request, RequestOptions, Response, Result};

/// Layer that sends and stores cookies.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookiesLayer;

impl<S> Layer<S> for CookiesLayer {
    type Service = Cookies<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Cookies { inner }
    }
}

/// Service that sends and stores cookies.
#[derive(Debug, Clone)]
pub struct Cookies<S> {
    inner: S,
}

impl<S> Service<Request> for Cookies<S>
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
        let jar: Option<CookieJar> = request
            .extensions()
            .get::<RequestOptions>()
            .and_then(|options| options.cookies.clone());
        let mut inner = self.inner.clone();

        let Some(jar) = jar else {
            return Box::pin(async move { inner.call(request).await });
        };

        let url = request.url().clone();
        let request = match jar.header_for(&url) {
            Some(cookie) => request.with_header("Cookie", cookie),
            None => request,
        };
        Box::pin(async move {
            let response = inner.call(request).await?;
            if let Some(set_cookie) = response.header("set-cookie") {
                jar.store(&url, set_cookie.lines());
            }
            Ok(response)
        })
    }
}
