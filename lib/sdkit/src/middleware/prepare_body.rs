//! Body preparation middleware: sets `Content-Length` on non-empty bodies.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{Error, Request, Response, Result};

/// Layer that prepares request bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareBodyLayer;

impl<S> Layer<S> for PrepareBodyLayer {
    type Service = PrepareBody<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PrepareBody { inner }
    }
}

/// Service that prepares request bodies.
#[derive(Debug, Clone)]
pub struct PrepareBody<S> {
    inner: S,
}

impl<S> Service<Request> for PrepareBody<S>
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
        let length = request.body().map_or(0, bytes::Bytes::len);
        let request = if length > 0 && request.header("Content-Length").is_none() {
            request.with_header("Content-Length", length.to_string())
        } else {
            request
        };

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert2::check;
    use bytes::Bytes;

    use super::*;
    use crate::Method;

    #[tokio::test]
    async fn sets_content_length() {
        let transport = tower::service_fn(|request: Request| async move {
            let length = request.header("content-length").unwrap_or("none").to_string();
            Ok::<_, Error>(Response::new(200, HashMap::new(), Bytes::from(length)))
        });
        let mut service = PrepareBodyLayer.layer(transport);
        let url = url::Url::parse("https://api.example.com/").expect("url");

        let with_body = Request::builder(Method::Post, url.clone())
            .body(Bytes::from_static(b"hello"))
            .build();
        let response = service.call(with_body).await.expect("response");
        check!(response.contents() == "5");

        let without_body = Request::builder(Method::Get, url).build();
        let response = service.call(without_body).await.expect("response");
        check!(response.contents() == "none");
    }
}
