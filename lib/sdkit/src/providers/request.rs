use std::collections::HashMap;

use crate::container::names;
use crate::{Method, Result, ServiceContainer, ServiceProvider};

/// The host application's current inbound request.
///
/// Hosts that serve HTTP attach it to the container builder so that
/// services can read it (OAuth callbacks read `code` and `state` from the
/// query, for instance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    method: Method,
    uri: String,
    headers: HashMap<String, String>,
    query: Vec<(String, String)>,
}

impl Default for IncomingRequest {
    fn default() -> Self {
        Self::new(Method::Get, "/")
    }
}

impl IncomingRequest {
    /// A request for `uri` (absolute, or a path with an optional query).
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let query = uri
            .split_once('?')
            .map(|(_, query)| {
                let query = query.split_once('#').map_or(query, |(query, _)| query);
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Self {
            method,
            uri,
            headers: HashMap::new(),
            query,
        }
    }

    /// The request with a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URI as received.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header value by name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decoded query pairs, in order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// First query value for `name`.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Registers the builder's [`IncomingRequest`] as `request`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestServiceProvider;

impl ServiceProvider for RequestServiceProvider {
    fn register(&self, container: &ServiceContainer) -> Result<()> {
        container
            .container()
            .set(names::REQUEST, |container: &ServiceContainer| {
                Ok(container.incoming_request().clone())
            });
        Ok(())
    }
}
