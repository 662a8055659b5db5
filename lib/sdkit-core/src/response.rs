//! HTTP response handling.
//!
//! [`Response`] provides access to status, headers, and body, with the
//! array / object / collection views used by response casting.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use bytes::Bytes;
//! use sdkit_core::Response;
//! use serde_json::json;
//!
//! let response = Response::new(200, HashMap::new(), Bytes::from(r#"{"id":1}"#));
//! assert_eq!(response.to_array(), json!({"id": 1}));
//! ```

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::Collection;

/// HTTP response with status, headers, and body.
///
/// The body is immutable [`Bytes`], so every view can be taken any number of
/// times without rewinding anything.
#[derive(Debug, Clone)]
pub struct Response<B = Bytes> {
    status: u16,
    headers: HashMap<String, String>,
    body: B,
}

impl<B> Response<B> {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: B) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Canonical reason phrase of the status (`"Not Found"`), empty if unknown.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or_default()
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        crate::request::find_header(&self.headers, name)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &B {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> B {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (u16, HashMap<String, String>, B) {
        (self.status, self.headers, self.body)
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 3xx.
    #[must_use]
    pub const fn is_redirection(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Transform the body with a function.
    pub fn map_body<F, B2>(self, f: F) -> Response<B2>
    where
        F: FnOnce(B) -> B2,
    {
        Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

impl Response<Bytes> {
    /// Deserialize the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// Get the response body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Body as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decoded body as a JSON map or list.
    ///
    /// JSON maps and lists are returned as they are, a JSON scalar becomes a
    /// one-element list, and `null`, empty or non-JSON bodies give an empty
    /// map.
    #[must_use]
    pub fn to_array(&self) -> Value {
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
            Ok(Value::Null) | Err(_) => Value::Object(Map::new()),
            Ok(scalar) => Value::Array(vec![scalar]),
        }
    }

    /// Decoded body as a JSON map; top-level lists are keyed by index.
    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        Collection::from_value(self.to_array()).into_map()
    }

    /// Decoded body as a [`Collection`].
    #[must_use]
    pub fn to_collection(&self) -> Collection {
        Collection::from_value(self.to_array())
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::json;

    use super::*;

    fn with_body(body: &'static str) -> Response {
        Response::new(200, HashMap::new(), Bytes::from(body))
    }

    #[test]
    fn response_basic() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let response = Response::new(200, headers, Bytes::from(r#"{"id":1}"#));

        check!(response.status() == 200);
        check!(response.header("content-type") == Some("application/json"));
        check!(response.reason() == "OK");
        check!(response.is_success());
        check!(!response.is_client_error());
    }

    #[test]
    fn response_status_checks() {
        let response = Response::new(301, HashMap::new(), Bytes::new());
        check!(response.is_redirection());

        let response = Response::new(404, HashMap::new(), Bytes::new());
        check!(response.is_client_error());
        check!(response.reason() == "Not Found");

        let response = Response::new(599, HashMap::new(), Bytes::new());
        check!(response.is_server_error());
        check!(response.reason().is_empty());
    }

    #[test]
    fn response_json_can_be_read_twice() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct User {
            id: u64,
        }

        let response = with_body(r#"{"id":1}"#);
        let first: User = response.json().expect("first read");
        let second: User = response.json().expect("second read");
        check!(first == second);
        check!(response.contents() == r#"{"id":1}"#);
    }

    #[test]
    fn array_view_of_bodies() {
        check!(with_body(r#"{"a":1}"#).to_array() == json!({"a": 1}));
        check!(with_body("[1,2]").to_array() == json!([1, 2]));
        check!(with_body("42").to_array() == json!([42]));
        check!(with_body(r#""ok""#).to_array() == json!(["ok"]));
        check!(with_body("null").to_array() == json!({}));
        check!(with_body("").to_array() == json!({}));
        check!(with_body("<html>").to_array() == json!({}));
    }

    #[test]
    fn object_and_collection_views_agree() {
        let response = with_body(r#"{"errcode":0,"list":["a"]}"#);
        let object = response.to_object();
        let collection = response.to_collection();

        check!(Value::Object(object.clone()) == response.to_array());
        check!(collection.as_map() == &object);

        let listed = with_body(r#"["x","y"]"#).to_object();
        check!(listed.get("1") == Some(&json!("y")));
    }
}
