//! Rejects responses a client does not accept.
//!
//! A [`ResponseEligibility`] check runs on every response; a rejected one
//! becomes [`Error::NotEligibleResponse`] carrying the request and the
//! response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{Error, Request, Response, Result};

/// Message used when a check rejects a response without a reason.
pub const DEFAULT_MESSAGE: &str = "Unsuccessful request";

/// Outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// The response is accepted.
    Eligible,
    /// The response is rejected, with an optional reason.
    NotEligible(Option<String>),
}

/// Decides whether a response is accepted.
pub trait ResponseEligibility: Send + Sync {
    /// Check `response` to `request`.
    fn check(&self, response: &Response, request: &Request) -> Eligibility;
}

impl<F> ResponseEligibility for F
where
    F: Fn(&Response, &Request) -> Eligibility + Send + Sync,
{
    fn check(&self, response: &Response, request: &Request) -> Eligibility {
        self(response, request)
    }
}

/// Accepts 200 responses only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireStatusOk;

impl ResponseEligibility for RequireStatusOk {
    fn check(&self, response: &Response, _request: &Request) -> Eligibility {
        if response.status() == 200 {
            Eligibility::Eligible
        } else {
            Eligibility::NotEligible(Some("Response status code is not 200.".to_string()))
        }
    }
}

/// Layer applying an eligibility check.
#[derive(Clone)]
pub struct NotEligibleLayer {
    check: Arc<dyn ResponseEligibility>,
}

impl std::fmt::Debug for NotEligibleLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotEligibleLayer").finish_non_exhaustive()
    }
}

impl NotEligibleLayer {
    /// Apply `check` to every response.
    #[must_use]
    pub fn new(check: Arc<dyn ResponseEligibility>) -> Self {
        Self { check }
    }
}

impl<S> Layer<S> for NotEligibleLayer {
    type Service = NotEligible<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NotEligible {
            inner,
            check: Arc::clone(&self.check),
        }
    }
}

/// Service applying an eligibility check.
#[derive(Clone)]
pub struct NotEligible<S> {
    inner: S,
    check: Arc<dyn ResponseEligibility>,
}

impl<S> Service<Request> for NotEligible<S>
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
        let check = Arc::clone(&self.check);

        Box::pin(async move {
            let sent = request.clone();
            let response = inner.call(request).await?;
            match check.check(&response, &sent) {
                Eligibility::Eligible => Ok(response),
                Eligibility::NotEligible(reason) => {
                    let message = reason.unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
                    tracing::debug!(status = response.status(), %message, "response not eligible");
                    Err(Error::not_eligible(message, sent, response))
                }
            }
        })
    }
}
