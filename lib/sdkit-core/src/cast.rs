//! Response casting.
//!
//! A [`ResponseCaster`] turns a [`Response`] into the shape selected by a
//! [`ResponseType`]: the decoded JSON value, a JSON map, a [`Collection`],
//! the response itself, or a registered [`Arrayable`] type.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use bytes::Bytes;
//! use sdkit_core::{Casted, Response, ResponseCaster, ResponseType};
//!
//! let caster = ResponseCaster::new();
//! let response = Response::new(200, HashMap::new(), Bytes::from(r#"{"errcode":0}"#));
//! let casted = caster.cast(response, &ResponseType::Collection).unwrap();
//! assert!(matches!(casted, Casted::Collection(_)));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::{Collection, Error, Response, Result};

/// Target shape of a casted response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Decoded JSON map or list.
    #[default]
    Array,
    /// JSON map.
    Object,
    /// [`Collection`].
    Collection,
    /// The [`Response`] unchanged.
    Raw,
    /// A registered [`Arrayable`] type, by name.
    Custom(String),
}

impl ResponseType {
    /// Reads the selector from a configuration value; absent or `null` means [`Array`](Self::Array).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the value is not a string.
    pub fn from_config(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(name)) => Ok(name.parse().unwrap_or_default()),
            Some(other) => Err(Error::invalid_config(format!(
                "`http.response_type` must be a string, got {other}"
            ))),
        }
    }

    /// Selector name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Array => "array",
            Self::Object => "object",
            Self::Collection => "collection",
            Self::Raw => "raw",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = std::convert::Infallible;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match name {
            "" | "array" => Self::Array,
            "object" => Self::Object,
            "collection" => Self::Collection,
            "raw" => Self::Raw,
            custom => Self::Custom(custom.to_string()),
        })
    }
}

/// A value with an array-like view.
///
/// Custom response types implement this together with [`FromResponse`].
pub trait Arrayable: Any + fmt::Debug + Send + Sync {
    /// The whole value as JSON.
    fn to_array(&self) -> Value;

    /// Value at a dotted key.
    fn get(&self, key: &str) -> Option<Value> {
        Collection::from_value(self.to_array()).get(key).cloned()
    }

    /// Whether a dotted key exists.
    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Construction of a custom response type from a response.
pub trait FromResponse: Sized {
    /// Build the value.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the response cannot be represented.
    fn from_response(response: &Response) -> Result<Self>;
}

impl Arrayable for Collection {
    fn to_array(&self) -> Value {
        Collection::to_array(self)
    }

    fn get(&self, key: &str) -> Option<Value> {
        Collection::get(self, key).cloned()
    }
}

impl FromResponse for Collection {
    fn from_response(response: &Response) -> Result<Self> {
        Ok(response.to_collection())
    }
}

/// A casted response.
#[derive(Debug)]
pub enum Casted {
    /// Decoded JSON map or list.
    Array(Value),
    /// JSON map.
    Object(Map<String, Value>),
    /// Collection view.
    Collection(Collection),
    /// The response itself.
    Raw(Response),
    /// A registered custom type.
    Custom(Box<dyn Arrayable>),
}

impl Casted {
    /// The content as JSON, whatever the shape.
    #[must_use]
    pub fn to_array(&self) -> Value {
        match self {
            Self::Array(value) => value.clone(),
            Self::Object(map) => Value::Object(map.clone()),
            Self::Collection(collection) => collection.to_array(),
            Self::Raw(response) => response.to_array(),
            Self::Custom(custom) => custom.to_array(),
        }
    }

    /// The JSON value, for [`Casted::Array`].
    #[must_use]
    pub fn into_array(self) -> Option<Value> {
        match self {
            Self::Array(value) => Some(value),
            _ => None,
        }
    }

    /// The map, for [`Casted::Object`].
    #[must_use]
    pub fn into_object(self) -> Option<Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The collection, for [`Casted::Collection`].
    #[must_use]
    pub fn into_collection(self) -> Option<Collection> {
        match self {
            Self::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// The response, for [`Casted::Raw`].
    #[must_use]
    pub fn into_raw(self) -> Option<Response> {
        match self {
            Self::Raw(response) => Some(response),
            _ => None,
        }
    }

    /// The custom value, when it is a `T`.
    #[must_use]
    pub fn into_custom<T: Arrayable>(self) -> Option<T> {
        match self {
            Self::Custom(custom) => {
                let any: Box<dyn Any> = custom;
                any.downcast::<T>().ok().map(|boxed| *boxed)
            }
            _ => None,
        }
    }
}

/// Inputs accepted by [`ResponseCaster::detect_and_cast`].
#[derive(Debug)]
pub enum CastInput {
    /// A response, used as is.
    Response(Response),
    /// An array-like value, re-encoded as a JSON response.
    Arrayable(Box<dyn Arrayable>),
    /// A JSON value: maps and lists are re-encoded, scalars sent as text.
    Value(Value),
}

impl From<Response> for CastInput {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Box<dyn Arrayable>> for CastInput {
    fn from(value: Box<dyn Arrayable>) -> Self {
        Self::Arrayable(value)
    }
}

impl From<Collection> for CastInput {
    fn from(collection: Collection) -> Self {
        Self::Arrayable(Box::new(collection))
    }
}

impl From<Value> for CastInput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl CastInput {
    fn into_response(self) -> Result<Response> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Arrayable(value) => json_response(&value.to_array()),
            Self::Value(value @ (Value::Object(_) | Value::Array(_))) => json_response(&value),
            Self::Value(Value::String(text)) => Ok(text_response(text)),
            Self::Value(Value::Number(number)) => Ok(text_response(number.to_string())),
            Self::Value(Value::Bool(flag)) => {
                Ok(text_response(if flag { "1" } else { "" }.to_string()))
            }
            Self::Value(Value::Null) => Err(Error::invalid_argument(
                "Unsupported response type \"null\"",
            )),
        }
    }
}

fn json_response(value: &Value) -> Result<Response> {
    let body = crate::to_json(value)?;
    let headers = HashMap::from([("Content-Type".to_string(), "application/json".to_string())]);
    Ok(Response::new(200, headers, body))
}

fn text_response(text: String) -> Response {
    Response::new(200, HashMap::new(), Bytes::from(text))
}

type Factory = Arc<dyn Fn(&Response) -> Result<Box<dyn Arrayable>> + Send + Sync>;

/// Casts responses, with a registry of custom [`Arrayable`] types.
#[derive(Clone, Default)]
pub struct ResponseCaster {
    factories: HashMap<String, Factory>,
}

impl fmt::Debug for ResponseCaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ResponseCaster")
            .field("custom_types", &names)
            .finish()
    }
}

impl ResponseCaster {
    /// A caster without custom types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its Rust type name (`std::any::type_name`).
    pub fn register<T: Arrayable + FromResponse>(&mut self) -> &mut Self {
        self.register_as::<T>(std::any::type_name::<T>())
    }

    /// Register `T` under an alias.
    pub fn register_as<T: Arrayable + FromResponse>(&mut self, name: impl Into<String>) -> &mut Self {
        let factory: Factory = Arc::new(|response: &Response| {
            T::from_response(response).map(|value| Box::new(value) as Box<dyn Arrayable>)
        });
        self.factories.insert(name.into(), factory);
        self
    }

    /// Whether a custom type is registered under `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Check that `response_type` can be produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an unregistered custom type.
    pub fn validate(&self, response_type: &ResponseType) -> Result<()> {
        match response_type {
            ResponseType::Custom(name) if !self.is_registered(name) => Err(Error::invalid_config(
                format!("Config key \"http.response_type\" names \"{name}\", which is not a registered Arrayable type"),
            )),
            _ => Ok(()),
        }
    }

    /// Cast a response into the requested shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an unregistered custom type, or
    /// the error of the custom type's constructor.
    pub fn cast(&self, response: Response, response_type: &ResponseType) -> Result<Casted> {
        match response_type {
            ResponseType::Array => Ok(Casted::Array(response.to_array())),
            ResponseType::Object => Ok(Casted::Object(response.to_object())),
            ResponseType::Collection => Ok(Casted::Collection(response.to_collection())),
            ResponseType::Raw => Ok(Casted::Raw(response)),
            ResponseType::Custom(name) => {
                self.validate(response_type)?;
                let factory = self
                    .factories
                    .get(name)
                    .ok_or_else(|| Error::invalid_config(format!("unknown response type \"{name}\"")))?;
                factory(&response).map(Casted::Custom)
            }
        }
    }

    /// Normalize `input` into a response, then [`cast`](Self::cast) it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a `null` input, and the errors
    /// of [`cast`](Self::cast).
    pub fn detect_and_cast(
        &self,
        input: impl Into<CastInput>,
        response_type: &ResponseType,
    ) -> Result<Casted> {
        let response = input.into().into_response()?;
        self.cast(response, response_type)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct UserList {
        users: Vec<String>,
    }

    impl Arrayable for UserList {
        fn to_array(&self) -> Value {
            json!({ "users": self.users })
        }
    }

    impl FromResponse for UserList {
        fn from_response(response: &Response) -> Result<Self> {
            let users: Vec<String> = response
                .to_collection()
                .get("data.openid")
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default();
            Ok(Self { users })
        }
    }

    fn response(body: &'static str) -> Response {
        Response::new(200, HashMap::new(), Bytes::from(body))
    }

    #[test]
    fn parse_selector() {
        check!("array".parse::<ResponseType>() == Ok(ResponseType::Array));
        check!("".parse::<ResponseType>() == Ok(ResponseType::Array));
        check!("raw".parse::<ResponseType>() == Ok(ResponseType::Raw));
        check!(
            "app::Users".parse::<ResponseType>() == Ok(ResponseType::Custom("app::Users".into()))
        );
        check!(ResponseType::from_config(None).ok() == Some(ResponseType::Array));
        check!(ResponseType::from_config(Some(&json!(3))).is_err());
    }

    #[test]
    fn shapes_carry_same_content() {
        let caster = ResponseCaster::new();
        let body = r#"{"errcode":0,"data":{"openid":["a","b"]}}"#;

        let array = caster.cast(response(body), &ResponseType::Array).expect("array");
        let object = caster.cast(response(body), &ResponseType::Object).expect("object");
        let collection = caster
            .cast(response(body), &ResponseType::Collection)
            .expect("collection");

        check!(array.to_array() == object.to_array());
        check!(object.to_array() == collection.to_array());
        let_assert!(Some(collection) = collection.into_collection());
        check!(collection.get("data.openid.1") == Some(&json!("b")));
    }

    #[test]
    fn raw_keeps_response() {
        let caster = ResponseCaster::new();
        let casted = caster.cast(response("plain"), &ResponseType::Raw).expect("raw");
        let_assert!(Some(raw) = casted.into_raw());
        check!(raw.contents() == "plain");
    }

    #[test]
    fn custom_type_by_name_and_alias() {
        let mut caster = ResponseCaster::new();
        caster.register::<UserList>().register_as::<UserList>("users");

        let by_name = ResponseType::Custom(std::any::type_name::<UserList>().to_string());
        let body = r#"{"data":{"openid":["o1"]}}"#;
        let casted = caster.cast(response(body), &by_name).expect("custom");
        check!(casted.to_array() == json!({"users": ["o1"]}));
        check!(casted.into_custom::<UserList>() == Some(UserList { users: vec!["o1".into()] }));

        let casted = caster
            .cast(response(body), &ResponseType::Custom("users".into()))
            .expect("alias");
        let_assert!(Casted::Custom(custom) = casted);
        check!(custom.contains_key("users.0"));
    }

    #[test]
    fn unknown_custom_type_is_invalid_config() {
        let caster = ResponseCaster::new();
        let unknown = ResponseType::Custom("app::Missing".into());

        let_assert!(Err(err) = caster.validate(&unknown));
        check!(err.is_invalid_config());
        let_assert!(Err(err) = caster.cast(response("{}"), &unknown));
        check!(err.to_string().contains("app::Missing"));
    }

    #[test]
    fn detect_scalars_and_composites() {
        let caster = ResponseCaster::new();
        let raw = |input: CastInput| {
            caster
                .detect_and_cast(input, &ResponseType::Raw)
                .expect("cast")
                .into_raw()
                .expect("raw")
                .contents()
        };

        check!(raw(json!("text").into()) == "text");
        check!(raw(json!(12.5).into()) == "12.5");
        check!(raw(json!(true).into()) == "1");
        check!(raw(json!(false).into()) == "");
        check!(raw(json!([]).into()) == "[]");
        check!(raw(Collection::from_value(json!({"a": 1})).into()) == r#"{"a":1}"#);
    }

    #[test]
    fn detect_rejects_null() {
        let caster = ResponseCaster::new();
        let_assert!(Err(err) = caster.detect_and_cast(Value::Null, &ResponseType::Array));
        check!(err.to_string() == "invalid argument: Unsupported response type \"null\"");
    }

    #[test]
    fn detect_keeps_responses() {
        let caster = ResponseCaster::new();
        let casted = caster
            .detect_and_cast(response(r#"[1,2]"#), &ResponseType::Object)
            .expect("object");
        check!(casted.into_object().map(|map| map.len()) == Some(2));
    }
}
