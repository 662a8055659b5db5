//! Configuration types.
//!
//! [`Config`] is the merged configuration map of a service container.
//! [`ClientConfig`] holds the transport tuning read from its `http` section.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::{Collection, Error, Result};

/// Merge `overlay` into `base`, recursively.
///
/// Maps are merged key by key and lists index by index; any other overlay
/// value replaces the base value.
///
/// # Example
///
/// ```
/// use sdkit::replace_recursive;
/// use serde_json::json;
///
/// let merged = replace_recursive(
///     json!({"http": {"timeout": 30.0, "headers": {"Accept": "*/*"}}, "ids": [1, 2, 3]}),
///     json!({"http": {"timeout": 5.0}, "ids": [9]}),
/// );
/// assert_eq!(merged, json!({"http": {"timeout": 5.0, "headers": {"Accept": "*/*"}}, "ids": [9, 2, 3]}));
/// ```
#[must_use]
pub fn replace_recursive(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => *slot = replace_recursive(slot.take(), value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(overlay)) => {
            for (index, value) in overlay.into_iter().enumerate() {
                match base.get_mut(index) {
                    Some(slot) => *slot = replace_recursive(slot.take(), value),
                    None => base.push(value),
                }
            }
            Value::Array(base)
        }
        (_, overlay) => overlay,
    }
}

/// The configuration of a service container, with dotted-path access.
///
/// A key that exists verbatim (dots included) wins over path traversal, and
/// numeric segments index into lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    items: Collection,
}

impl Config {
    /// Wrap a configuration value; a non-map value gives an empty config.
    #[must_use]
    pub fn new(value: Value) -> Self {
        let items = match value {
            Value::Object(map) => Collection::from(map),
            _ => Collection::new(),
        };
        Self { items }
    }

    /// Value at a dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items.get(key)
    }

    /// Value at a dotted key, or `default`.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.items.get_or(key, default)
    }

    /// String at a dotted key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Whether a dotted key is set.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.items.has(key)
    }

    /// Set the value at a dotted key.
    pub fn set(&mut self, key: &str, value: Value) {
        self.items.set(key, value);
    }

    /// The whole configuration map.
    #[must_use]
    pub fn all(&self) -> &Map<String, Value> {
        self.items.as_map()
    }

    /// The configuration as a collection.
    #[must_use]
    pub fn as_collection(&self) -> &Collection {
        &self.items
    }

    /// Deserialize the value at a dotted key; `None` when the key is unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonDeserialization`] when the value does not fit `T`.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| Error::json_deserialization(key, e.to_string()))
            })
            .transpose()
    }
}

impl From<Value> for Config {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Transport tuning for the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Whole-exchange timeout; [`Duration::ZERO`] means no limit.
    pub timeout: Duration,
    /// Connection timeout; [`Duration::ZERO`] means no limit.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Read the tuning keys of an `http` configuration section.
    ///
    /// Durations are seconds; unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for negative or non-numeric values.
    pub fn from_value(section: &Value) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(timeout) = seconds(section, "timeout")? {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = seconds(section, "connect_timeout")? {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = seconds(section, "pool_idle_timeout")? {
            builder = builder.pool_idle_timeout(timeout);
        }
        if let Some(count) = section.get("pool_idle_per_host") {
            let count = count
                .as_u64()
                .and_then(|count| usize::try_from(count).ok())
                .ok_or_else(|| {
                    Error::invalid_config(format!(
                        "`http.pool_idle_per_host` must be a positive integer, got {count}"
                    ))
                })?;
            builder = builder.pool_idle_per_host(count);
        }
        Ok(builder.build())
    }

    /// The whole-exchange limit, `None` when unlimited.
    #[must_use]
    pub fn timeout_limit(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }

    /// The connection limit, `None` when unlimited.
    #[must_use]
    pub fn connect_timeout_limit(&self) -> Option<Duration> {
        (!self.connect_timeout.is_zero()).then_some(self.connect_timeout)
    }
}

fn seconds(section: &Value, key: &str) -> Result<Option<Duration>> {
    let Some(value) = section.get(key) else {
        return Ok(None);
    };
    value
        .as_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .map(Some)
        .ok_or_else(|| {
            Error::invalid_config(format!(
                "`http.{key}` must be a non-negative number of seconds, got {value}"
            ))
        })
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        }
    }
}
