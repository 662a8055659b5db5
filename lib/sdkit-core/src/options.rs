//! Per-request options.
//!
//! [`RequestOptions`] is the options bag handed to every request: query,
//! headers, one body source, timeouts and the switches read by the standard
//! middleware layers. It is built in code or from the `http` section of the
//! configuration, and merged (later wins) from client defaults down to the
//! options of a single call.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::{CookieJar, Error, Form, Result};

/// Default maximum number of redirects followed.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Redirect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    /// Return 3xx responses as they are.
    Disabled,
    /// Follow up to `n` redirects.
    Max(usize),
}

impl Default for Redirects {
    fn default() -> Self {
        Self::Max(DEFAULT_MAX_REDIRECTS)
    }
}

/// Options of a single request.
///
/// At most one of `body`, `multipart`, `form_params` and `json` is used for
/// the request body, in that order of precedence; `form_params` together
/// with `multipart` is rejected when the request is built.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters, flattened bracket-style. Replaces the URL query when non-empty.
    pub query: Option<Value>,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Raw request body.
    pub body: Option<Bytes>,
    /// URL-encoded form fields.
    pub form_params: Option<Value>,
    /// JSON payload.
    pub json: Option<Value>,
    /// Multipart form.
    pub multipart: Option<Form>,
    /// Whole-exchange timeout; zero means no limit.
    pub timeout: Option<Duration>,
    /// Timeout until the response head arrives; zero means no limit.
    pub connect_timeout: Option<Duration>,
    /// Timeout for reading the response body; zero means no limit.
    pub read_timeout: Option<Duration>,
    /// Base URI that relative request URLs are resolved against.
    pub base_uri: Option<url::Url>,
    /// Turn 4xx/5xx responses into errors (default `true`).
    pub http_errors: Option<bool>,
    /// Redirect policy (default: follow up to five).
    pub allow_redirects: Option<Redirects>,
    /// Cookie jar shared by the requests that carry it.
    pub cookies: Option<CookieJar>,
    /// Unrecognized keys, kept verbatim.
    pub extra: Map<String, Value>,
}

impl RequestOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON map such as the `http` configuration section.
    ///
    /// Durations are seconds (fractions allowed). `allow_redirects` accepts a
    /// boolean, a number or `{"max": n}`; `cookies: true` creates a fresh jar.
    /// `multipart` is a list of `{"name", "contents", "filename"?}` entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when a known key has the wrong shape,
    /// or a non-map value is given.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(Error::invalid_config(format!(
                    "request options must be a map, got {other}"
                )));
            }
        };

        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "query" => options.query = non_null(value),
                "headers" => options.headers = headers(value)?,
                "body" => options.body = body(value),
                "form_params" => options.form_params = non_null(value),
                "json" => options.json = non_null(value),
                "multipart" => options.multipart = multipart(value)?,
                "timeout" => options.timeout = Some(seconds(key, value)?),
                "connect_timeout" => options.connect_timeout = Some(seconds(key, value)?),
                "read_timeout" => options.read_timeout = Some(seconds(key, value)?),
                "base_uri" => options.base_uri = base_uri(value)?,
                "http_errors" => options.http_errors = Some(flag(key, value)?),
                "allow_redirects" => options.allow_redirects = Some(redirects(value)?),
                "cookies" => {
                    options.cookies = flag(key, value)?.then(CookieJar::new);
                }
                _ => {
                    options.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(options)
    }

    /// Merge `other` on top of these options.
    ///
    /// Set fields of `other` win; headers and extra keys are combined.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (name, value) in other.headers {
            self.set_header(name, value);
        }
        self.extra.extend(other.extra);
        Self {
            query: other.query.or(self.query),
            headers: self.headers,
            body: other.body.or(self.body),
            form_params: other.form_params.or(self.form_params),
            json: other.json.or(self.json),
            multipart: other.multipart.or(self.multipart),
            timeout: other.timeout.or(self.timeout),
            connect_timeout: other.connect_timeout.or(self.connect_timeout),
            read_timeout: other.read_timeout.or(self.read_timeout),
            base_uri: other.base_uri.or(self.base_uri),
            http_errors: other.http_errors.or(self.http_errors),
            allow_redirects: other.allow_redirects.or(self.allow_redirects),
            cookies: other.cookies.or(self.cookies),
            extra: self.extra,
        }
    }

    /// Set a header, replacing any case variant of `name`.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        crate::request::set_header(&mut self.headers, name, value);
    }

    /// Header value by name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        crate::request::find_header(&self.headers, name)
    }

    /// Options with the header set.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Options with query parameters.
    #[must_use]
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = non_null(&query);
        self
    }

    /// Options with a JSON payload.
    #[must_use]
    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Options with URL-encoded form fields.
    #[must_use]
    pub fn with_form_params(mut self, form: Value) -> Self {
        self.form_params = non_null(&form);
        self
    }

    /// Options with a multipart form.
    #[must_use]
    pub fn with_multipart(mut self, form: Form) -> Self {
        self.multipart = Some(form);
        self
    }

    /// Options with a raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Options with the three timeouts set to the same duration.
    #[must_use]
    pub fn with_timeouts(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self.connect_timeout = Some(timeout);
        self.read_timeout = Some(timeout);
        self
    }

    /// Options with a base URI.
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: url::Url) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    /// Options with HTTP error promotion switched on or off.
    #[must_use]
    pub fn with_http_errors(mut self, enabled: bool) -> Self {
        self.http_errors = Some(enabled);
        self
    }

    /// Options with a redirect policy.
    #[must_use]
    pub fn with_redirects(mut self, redirects: Redirects) -> Self {
        self.allow_redirects = Some(redirects);
        self
    }

    /// Options with a cookie jar.
    #[must_use]
    pub fn with_cookies(mut self, jar: CookieJar) -> Self {
        self.cookies = Some(jar);
        self
    }
}

fn non_null(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn headers(value: &Value) -> Result<HashMap<String, String>> {
    match value {
        Value::Null => Ok(HashMap::new()),
        Value::Object(map) => {
            let mut headers = HashMap::new();
            for (name, value) in map {
                crate::request::set_header(&mut headers, name.clone(), scalar_string(value));
            }
            Ok(headers)
        }
        other => Err(Error::invalid_config(format!(
            "`headers` must be a map, got {other}"
        ))),
    }
}

fn body(value: &Value) -> Option<Bytes> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(Bytes::from(text.clone())),
        other => Some(Bytes::from(other.to_string())),
    }
}

fn seconds(key: &str, value: &Value) -> Result<Duration> {
    let secs = value.as_f64().ok_or_else(|| {
        Error::invalid_config(format!("`{key}` must be a number of seconds, got {value}"))
    })?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::invalid_config(format!("`{key}` is not a valid duration: {e}")))
}

fn flag(key: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::invalid_config(format!("`{key}` must be a boolean, got {value}")))
}

fn base_uri(value: &Value) -> Result<Option<url::Url>> {
    match value {
        Value::Null => Ok(None),
        Value::String(raw) if raw.is_empty() => Ok(None),
        Value::String(raw) => Ok(Some(url::Url::parse(raw)?)),
        other => Err(Error::invalid_config(format!(
            "`base_uri` must be a string, got {other}"
        ))),
    }
}

fn redirects(value: &Value) -> Result<Redirects> {
    let max = match value {
        Value::Bool(false) => return Ok(Redirects::Disabled),
        Value::Bool(true) => return Ok(Redirects::default()),
        Value::Number(_) => value.as_u64(),
        Value::Object(map) => match map.get("max") {
            None => return Ok(Redirects::default()),
            Some(max) => max.as_u64(),
        },
        _ => None,
    };
    max.and_then(|max| usize::try_from(max).ok())
        .map(Redirects::Max)
        .ok_or_else(|| {
            Error::invalid_config(format!(
                "`allow_redirects` must be a boolean, a count or {{\"max\": n}}, got {value}"
            ))
        })
}

fn multipart(value: &Value) -> Result<Option<Form>> {
    let entries = match value {
        Value::Null => return Ok(None),
        Value::Array(entries) => entries,
        other => {
            return Err(Error::invalid_config(format!(
                "`multipart` must be a list, got {other}"
            )));
        }
    };
    let mut form = Form::new();
    for entry in entries {
        let name = entry.get("name").and_then(Value::as_str).ok_or_else(|| {
            Error::invalid_config(format!("multipart entry needs a `name`: {entry}"))
        })?;
        let contents = entry.get("contents").map(scalar_string).unwrap_or_default();
        form = match entry.get("filename").and_then(Value::as_str) {
            Some(filename) => form.file(name, filename, contents),
            None => form.text(name, contents),
        };
    }
    Ok(Some(form))
}
