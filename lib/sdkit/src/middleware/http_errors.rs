//! Promotes 4xx and 5xx responses to [`Error::Http`].
//!
//! Enabled unless the request options set `http_errors` to `false`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{Error, Request, RequestOptions, Response, Result};

/// Longest body excerpt quoted in an error message.
const SUMMARY_LIMIT: usize = 120;

/// Layer turning error statuses into errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpErrorsLayer;

impl<S> Layer<S> for HttpErrorsLayer {
    type Service = HttpErrors<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpErrors { inner }
    }
}

/// Service turning error statuses into errors.
#[derive(Debug, Clone)]
pub struct HttpErrors<S> {
    inner: S,
}

/// Printable excerpt of a response body, `None` when empty or binary.
fn body_summary(response: &Response) -> Option<String> {
    let text = std::str::from_utf8(response.body()).ok()?.trim();
    if text.is_empty() || text.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return None;
    }
    match text.char_indices().nth(SUMMARY_LIMIT) {
        Some((cut, _)) => Some(format!("{} (truncated...)", text.get(..cut).unwrap_or(text))),
        None => Some(text.to_string()),
    }
}

/// Error message for an error response.
///
/// Reads like ``Client error: `GET https://host/path` resulted in a `404 Not Found` response``,
/// followed by a body excerpt when there is one.
fn error_message(request: &Request, response: &Response) -> String {
    let kind = if response.status() < 500 {
        "Client error"
    } else {
        "Server error"
    };
    let mut message = format!(
        "{kind}: `{} {}` resulted in a `{} {}` response",
        request.method(),
        request.url(),
        response.status(),
        response.reason()
    );
    if let Some(summary) = body_summary(response) {
        message.push_str(":\n");
        message.push_str(&summary);
    }
    message
}

impl<S> Service<Request> for HttpErrors<S>
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
        let enabled = request
            .extensions()
            .get::<RequestOptions>()
            .and_then(|options| options.http_errors)
            .unwrap_or(true);

        Box::pin(async move {
            if !enabled {
                return inner.call(request).await;
            }

            let sent = request.clone();
            let response = inner.call(request).await?;
            if response.status() < 400 {
                return Ok(response);
            }

            let message = error_message(&sent, &response);
            tracing::debug!(status = response.status(), url = %sent.url(), "error response");
            Err(Error::http_with_body(
                response.status(),
                message,
                response.body().clone(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert2::{check, let_assert};
    use bytes::Bytes;
    use tower::ServiceExt;
    use tower::util::BoxCloneService;

    use super::*;
    use crate::{BoxedService, Method};

    fn responding(status: u16, body: &'static str) -> BoxedService {
        BoxCloneService::new(HttpErrorsLayer.layer(tower::service_fn(
            move |_request: Request| async move {
                let body = Bytes::from_static(body.as_bytes());
                Ok::<_, Error>(Response::new(status, HashMap::new(), body))
            },
        )))
    }

    fn request() -> Request {
        let url = url::Url::parse("https://api.example.com/missing").expect("url");
        Request::builder(Method::Get, url).build()
    }

    #[tokio::test]
    async fn client_error_message() {
        let result = responding(404, "{\"errcode\":40001}").oneshot(request()).await;

        let_assert!(Err(Error::Http { status, message, body }) = result);
        check!(status == 404);
        check!(
            message
                == "Client error: `GET https://api.example.com/missing` resulted in a `404 Not Found` response:\n{\"errcode\":40001}"
        );
        check!(body.as_deref() == Some(&b"{\"errcode\":40001}"[..]));
    }

    #[tokio::test]
    async fn server_error_without_body() {
        let result = responding(503, "").oneshot(request()).await;

        let_assert!(Err(error) = result);
        check!(error.status() == Some(503));
        check!(
            error.to_string()
                == "HTTP error 503: Server error: `GET https://api.example.com/missing` resulted in a `503 Service Unavailable` response"
        );
    }

    #[tokio::test]
    async fn disabled_by_options() {
        let request = Request::builder(
            Method::Get,
            url::Url::parse("https://api.example.com/").expect("url"),
        )
        .extension(RequestOptions::new().with_http_errors(false))
        .build();

        let response = responding(500, "boom").oneshot(request).await.expect("response");
        check!(response.status() == 500);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(200);
        let response = Response::new(400, HashMap::new(), Bytes::from(body));
        let summary = body_summary(&response).expect("summary");
        check!(summary == format!("{} (truncated...)", "x".repeat(120)));
    }
}
