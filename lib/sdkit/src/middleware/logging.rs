//! Request/response logging middleware.
//!
//! Each exchange is rendered through a [`MessageFormatter`] and handed to a
//! [`Logger`](crate::Logger): at the layer's level when a response comes
//! back, at [`LogLevel::Error`] when the request fails.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{Instrument, Level, span};

use crate::{Error, LogLevel, MessageFormatter, Request, Response, Result, SharedLogger};

/// Layer that logs each exchange.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use sdkit::{LogLevel, LogManager, MessageFormatter, Middleware};
/// use sdkit::middleware::LoggerLayer;
///
/// let layer = LoggerLayer::new(Arc::new(LogManager::default()), MessageFormatter::default());
/// let middleware = Middleware::from_layer(layer.with_level(LogLevel::Info));
/// ```
#[derive(Clone)]
pub struct LoggerLayer {
    logger: SharedLogger,
    formatter: MessageFormatter,
    level: LogLevel,
}

impl std::fmt::Debug for LoggerLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerLayer")
            .field("formatter", &self.formatter)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl LoggerLayer {
    /// Log through `logger` at info level.
    #[must_use]
    pub fn new(logger: SharedLogger, formatter: MessageFormatter) -> Self {
        Self {
            logger,
            formatter,
            level: LogLevel::Info,
        }
    }

    /// Level used for successful exchanges.
    #[must_use]
    pub const fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

impl<S> Layer<S> for LoggerLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service that logs each exchange.
#[derive(Clone)]
pub struct Logging<S> {
    inner: S,
    layer: LoggerLayer,
}

impl<S: std::fmt::Debug> std::fmt::Debug for Logging<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logging")
            .field("inner", &self.inner)
            .field("layer", &self.layer)
            .finish()
    }
}

impl<S> Service<Request> for Logging<S>
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
        let method = request.method();
        let url = request.url().to_string();
        let span = span!(Level::DEBUG, "http_request", %method, %url);

        let mut inner = self.inner.clone();
        let LoggerLayer {
            logger,
            formatter,
            level,
        } = self.layer.clone();

        Box::pin(
            async move {
                let start = Instant::now();
                let sent = request.clone();
                let result = inner.call(request).await;

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(elapsed_ms, ok = result.is_ok(), "request completed");

                match &result {
                    Ok(response) => {
                        logger.log(level, &formatter.format(&sent, Some(response), None));
                    }
                    Err(err) => {
                        let message = formatter.format(&sent, err.response(), Some(err));
                        logger.log(LogLevel::Error, &message);
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use assert2::{check, let_assert};
    use bytes::Bytes;
    use tower::ServiceExt;

    use super::*;
    use crate::{Logger, Method};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(LogLevel, String)>>);

    impl Logger for Recorder {
        fn log(&self, level: LogLevel, message: &str) {
            self.0
                .lock()
                .expect("records")
                .push((level, message.to_string()));
        }
    }

    fn request() -> Request {
        let url = url::Url::parse("https://api.example.com/menu").expect("url");
        Request::builder(Method::Get, url).build()
    }

    #[tokio::test]
    async fn logs_success_at_layer_level() {
        let recorder = Arc::new(Recorder::default());
        let layer = LoggerLayer::new(recorder.clone(), MessageFormatter::new("{method} {code}"))
            .with_level(LogLevel::Debug);
        let service = layer.layer(tower::service_fn(|_request: Request| async {
            Ok::<_, Error>(Response::new(200, HashMap::new(), Bytes::new()))
        }));

        service.oneshot(request()).await.expect("response");

        let records = recorder.0.lock().expect("records");
        check!(*records == vec![(LogLevel::Debug, "GET 200".to_string())]);
    }

    #[tokio::test]
    async fn logs_failure_at_error_level() {
        let recorder = Arc::new(Recorder::default());
        let layer = LoggerLayer::new(recorder.clone(), MessageFormatter::new("{code}|{error}"));
        let service = layer.layer(tower::service_fn(|_request: Request| async {
            Err::<Response, _>(Error::connection("refused"))
        }));

        let result = service.oneshot(request()).await;

        let_assert!(Err(Error::Connection(_)) = result);
        let records = recorder.0.lock().expect("records");
        check!(*records == vec![(LogLevel::Error, "NULL|connection error: refused".to_string())]);
    }

    #[tokio::test]
    async fn rejected_response_is_logged_with_its_response() {
        let recorder = Arc::new(Recorder::default());
        let layer = LoggerLayer::new(recorder.clone(), MessageFormatter::new("{code}"));
        let service = layer.layer(tower::service_fn(|request: Request| async move {
            let response = Response::new(404, HashMap::new(), Bytes::new());
            Err::<Response, _>(Error::not_eligible("Unsuccessful request", request, response))
        }));

        let _ = service.oneshot(request()).await;

        let records = recorder.0.lock().expect("records");
        check!(*records == vec![(LogLevel::Error, "404".to_string())]);
    }
}
