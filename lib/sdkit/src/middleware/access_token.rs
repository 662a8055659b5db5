//! Access token middleware.
//!
//! Applies an [`AccessToken`](crate::AccessToken) to every outgoing request,
//! with the request's options. Without a token, requests pass unchanged.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{Error, Request, RequestOptions, Response, Result, SharedAccessToken};

/// Layer that signs requests with an access token.
#[derive(Clone, Default)]
pub struct AccessTokenLayer {
    token: Option<SharedAccessToken>,
}

impl std::fmt::Debug for AccessTokenLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenLayer")
            .field("token", &self.token.is_some())
            .finish()
    }
}

impl AccessTokenLayer {
    /// Sign requests with `token`, if any.
    #[must_use]
    pub fn new(token: Option<SharedAccessToken>) -> Self {
        Self { token }
    }
}

impl<S> Layer<S> for AccessTokenLayer {
    type Service = AccessTokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessTokenService {
            inner,
            token: self.token.clone(),
        }
    }
}

/// Service that signs requests with an access token.
#[derive(Clone)]
pub struct AccessTokenService<S> {
    inner: S,
    token: Option<SharedAccessToken>,
}

impl<S> Service<Request> for AccessTokenService<S>
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
        let request = match &self.token {
            Some(token) => {
                let options = request
                    .extensions()
                    .get::<RequestOptions>()
                    .cloned()
                    .unwrap_or_default();
                match token.apply_to_request(request, &options) {
                    Ok(request) => request,
                    Err(err) => return Box::pin(async move { Err(err) }),
                }
            }
            None => request,
        };

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use assert2::{check, let_assert};
    use bytes::Bytes;
    use tower::ServiceExt;

    use super::*;
    use crate::{AccessToken, Method};

    struct HeaderToken;

    impl AccessToken for HeaderToken {
        fn apply_to_request(&self, request: Request, options: &RequestOptions) -> Result<Request> {
            let scope = options.header("X-Scope").unwrap_or("none").to_string();
            Ok(request.with_header("X-Token", format!("t-{scope}")))
        }
    }

    struct Expired;

    impl AccessToken for Expired {
        fn apply_to_request(&self, _request: Request, _options: &RequestOptions) -> Result<Request> {
            Err(Error::invalid_request("token expired"))
        }
    }

    async fn send(token: Option<SharedAccessToken>, request: Request) -> Result<Response> {
        AccessTokenLayer::new(token)
            .layer(tower::service_fn(|request: Request| async move {
                let body = Bytes::from(request.header("x-token").unwrap_or("-").to_string());
                Ok::<_, Error>(Response::new(200, HashMap::new(), body))
            }))
            .oneshot(request)
            .await
    }

    fn request() -> Request {
        let url = url::Url::parse("https://api.example.com/").expect("url");
        Request::builder(Method::Get, url)
            .extension(RequestOptions::new().with_header("X-Scope", "menu"))
            .build()
    }

    #[tokio::test]
    async fn token_sees_request_options() {
        let response = send(Some(Arc::new(HeaderToken)), request()).await.expect("response");
        check!(response.contents() == "t-menu");
    }

    #[tokio::test]
    async fn no_token_passes_through() {
        let response = send(None, request()).await.expect("response");
        check!(response.contents() == "-");
    }

    #[tokio::test]
    async fn token_failure_aborts_request() {
        let result = send(Some(Arc::new(Expired)), request()).await;
        let_assert!(Err(Error::InvalidRequest(message)) = result);
        check!(message == "token expired");
    }
}
