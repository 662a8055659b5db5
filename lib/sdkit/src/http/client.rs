//! The HTTP client: turns a method, a URL and options into a request.

use bytes::Bytes;

use super::stack::HandlerStack;
use crate::{
    ClientConfig, Config, ContentType, Error, Method, Request, RequestOptions, Response, Result,
    encode_pairs, flatten_pairs, to_json,
};

/// Builds requests from options and sends them through a handler stack.
///
/// The client holds the transport tuning and default request options, both
/// read from the `http` configuration section. It owns no connection: the
/// transport lives at the bottom of the [`HandlerStack`] given to
/// [`send`](Self::send).
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    config: ClientConfig,
    defaults: RequestOptions,
}

impl HttpClient {
    /// A client with `config` tuning and `defaults` options.
    #[must_use]
    pub fn new(config: ClientConfig, defaults: RequestOptions) -> Self {
        Self { config, defaults }
    }

    /// A client configured from the `http` section of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the section is malformed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let section = config.get("http").cloned().unwrap_or_default();
        Ok(Self::new(
            ClientConfig::from_value(&section)?,
            RequestOptions::from_value(&section)?,
        ))
    }

    /// Transport tuning.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Default request options.
    #[must_use]
    pub const fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// Build the request for `method` on `url` with `options` over the
    /// client defaults.
    ///
    /// `url` is resolved against `base_uri` when one is set. The effective
    /// options, without their body sources, ride along as a request
    /// extension for the middleware layers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for an unresolvable URL and
    /// [`Error::InvalidRequest`] when `form_params` and `multipart` are both
    /// set.
    pub fn build_request(&self, method: Method, url: &str, options: RequestOptions) -> Result<Request> {
        let mut options = self.defaults.clone().merge(options);

        let mut url = match &options.base_uri {
            Some(base) => base.join(url)?,
            None => url::Url::parse(url)?,
        };
        if let Some(query) = &options.query {
            let query = encode_pairs(&flatten_pairs(query))?;
            if !query.is_empty() {
                url.set_query(Some(&query));
            }
        }

        let mut builder = Request::builder(method, url).headers(options.headers.clone());
        if let Some((content_type, body)) = take_body(&mut options)? {
            if let Some(content_type) = content_type
                && options.header("Content-Type").is_none()
            {
                builder = builder.header("Content-Type", content_type);
            }
            builder = builder.body(body);
        }

        Ok(builder.extension(options).build())
    }

    /// Build and send a request through `stack`.
    ///
    /// # Errors
    ///
    /// Returns the build error, or whatever the stack fails with.
    pub async fn send(
        &self,
        stack: &HandlerStack,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let request = self.build_request(method, url, options)?;
        tracing::debug!(method = %request.method(), url = %request.url(), "sending request");
        stack.send(request).await
    }
}

/// Remove the body sources from `options`, returning the body of highest
/// precedence (`body`, `multipart`, `form_params`, `json`) with its content
/// type.
fn take_body(options: &mut RequestOptions) -> Result<Option<(Option<String>, Bytes)>> {
    let body = options.body.take();
    let multipart = options.multipart.take();
    let form_params = options.form_params.take();
    let json = options.json.take();

    if multipart.is_some() && form_params.is_some() {
        return Err(Error::invalid_request(
            "form_params and multipart cannot be used at the same time",
        ));
    }

    let taken = if let Some(body) = body {
        Some((None, body))
    } else if let Some(form) = multipart {
        Some((Some(form.content_type()), form.encode()))
    } else if let Some(fields) = form_params {
        let encoded = encode_pairs(&flatten_pairs(&fields))?;
        Some((Some(ContentType::FormUrlEncoded.as_str().to_string()), Bytes::from(encoded)))
    } else if let Some(json) = json {
        Some((Some(ContentType::Json.as_str().to_string()), to_json(&json)?))
    } else {
        None
    };
    Ok(taken)
}
