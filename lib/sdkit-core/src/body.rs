//! Body and query serialization utilities.

use bytes::Bytes;
use serde_json::Value;

use crate::Result;

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serialize a value to JSON bytes.
///
/// Non-ASCII characters are written as-is, never `\u` escaped.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Encode a JSON request payload.
///
/// An empty map or list is written as `{}` so that the wire form is never an
/// ambiguous `[]`; everything else goes through [`to_json`].
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use sdkit_core::encode_json_payload;
/// use serde_json::json;
///
/// assert_eq!(encode_json_payload(&json!([])).unwrap().as_ref(), b"{}");
/// assert_eq!(encode_json_payload(&json!({"city": "杭州"})).unwrap().as_ref(), r#"{"city":"杭州"}"#.as_bytes());
/// ```
pub fn encode_json_payload(payload: &Value) -> Result<Bytes> {
    let empty = match payload {
        Value::Array(list) => list.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(Bytes::from_static(b"{}"));
    }
    to_json(payload)
}

/// Flatten a JSON value into bracket-style key/value pairs.
///
/// Nested maps become `outer[inner]`, lists become `name[0]`, booleans are
/// written `1`/`0` and `null` entries are skipped. A top-level scalar has no
/// key and yields nothing.
///
/// # Example
///
/// ```
/// use sdkit_core::flatten_pairs;
/// use serde_json::json;
///
/// let pairs = flatten_pairs(&json!({"a": 1, "b": {"c": [true, "x"]}}));
/// assert_eq!(pairs, vec![
///     ("a".to_string(), "1".to_string()),
///     ("b[c][0]".to_string(), "1".to_string()),
///     ("b[c][1]".to_string(), "x".to_string()),
/// ]);
/// ```
#[must_use]
pub fn flatten_pairs(value: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(key.clone(), value, &mut pairs);
            }
        }
        Value::Array(list) => {
            for (index, value) in list.iter().enumerate() {
                flatten_into(index.to_string(), value, &mut pairs);
            }
        }
        _ => {}
    }
    pairs
}

fn flatten_into(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(flag) => pairs.push((prefix, if *flag { "1" } else { "0" }.to_string())),
        Value::Number(number) => pairs.push((prefix, number.to_string())),
        Value::String(text) => pairs.push((prefix, text.clone())),
        Value::Array(list) => {
            for (index, value) in list.iter().enumerate() {
                flatten_into(format!("{prefix}[{index}]"), value, pairs);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(format!("{prefix}[{key}]"), value, pairs);
            }
        }
    }
}

/// URL-encode key/value pairs (`+` for spaces).
///
/// # Errors
///
/// Returns an error if form serialization fails.
pub fn encode_pairs(pairs: &[(String, String)]) -> Result<String> {
    serde_html_form::to_string(pairs).map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// # Errors
///
/// Returns an error if JSON deserialization fails, with the error message
/// including the path to the problematic field (e.g., "user.address.city").
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn content_type_as_str() {
        assert_eq!(ContentType::Json.as_str(), "application/json");
        assert_eq!(
            ContentType::FormUrlEncoded.to_string(),
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn empty_payloads_are_objects() {
        assert_eq!(encode_json_payload(&json!([])).expect("encode").as_ref(), b"{}");
        assert_eq!(encode_json_payload(&json!({})).expect("encode").as_ref(), b"{}");
    }

    #[test]
    fn non_ascii_payload_is_not_escaped() {
        let body = encode_json_payload(&json!({"name": "张三", "note": "café"})).expect("encode");
        let text = std::str::from_utf8(&body).expect("utf8");
        assert_eq!(text, r#"{"name":"张三","note":"café"}"#);
        assert!(!text.contains("\\u"));
    }

    #[test]
    fn list_payload_stays_a_list() {
        let body = encode_json_payload(&json!([1, 2])).expect("encode");
        assert_eq!(body.as_ref(), b"[1,2]");
    }

    #[test]
    fn flatten_skips_nulls_and_scalars() {
        assert!(flatten_pairs(&json!("bare")).is_empty());
        assert_eq!(
            flatten_pairs(&json!({"keep": "v", "drop": null, "n": 1.5})),
            vec![
                ("keep".to_string(), "v".to_string()),
                ("n".to_string(), "1.5".to_string())
            ]
        );
    }

    #[test]
    fn encode_pairs_escapes() {
        let query = encode_pairs(&[
            ("q".to_string(), "rust lang".to_string()),
            ("ids[0]".to_string(), "a&b".to_string()),
        ])
        .expect("encode");
        assert_eq!(query, "q=rust+lang&ids%5B0%5D=a%26b");
    }

    #[test]
    fn from_json_missing_field_error_with_path() {
        #[derive(Debug, serde::Deserialize)]
        struct Address {
            #[allow(dead_code)]
            city: String,
        }

        #[derive(Debug, serde::Deserialize)]
        struct User {
            #[allow(dead_code)]
            address: Address,
        }

        let err = from_json::<User>(br#"{"address":{}}"#).expect_err("should fail");
        let msg = err.to_string();
        assert!(msg.contains("address"), "Expected path 'address' in error: {msg}");
        assert!(msg.contains("city"), "Expected field 'city' in error: {msg}");
    }
}
