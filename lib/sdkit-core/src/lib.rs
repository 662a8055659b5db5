//! Core types for the sdkit SDK-construction toolkit.
//!
//! This crate holds the transport-independent building blocks:
//! - [`Method`], [`Request`] and [`RequestBuilder`] - outgoing requests
//! - [`Response`] - buffered responses with array / object / collection views
//! - [`Error`] and [`Result`] - error handling
//! - [`RequestOptions`] and [`CookieJar`] - per-request options
//! - [`Form`] and [`Part`] - multipart bodies
//! - [`Collection`] - ordered JSON map with dotted-path access
//! - [`ResponseCaster`], [`ResponseType`] and [`Arrayable`] - response casting

mod body;
mod cast;
mod collection;
mod cookie;
mod error;
mod method;
mod multipart;
mod options;
pub mod prelude;
mod request;
mod response;

pub use body::{
    ContentType, encode_json_payload, encode_pairs, flatten_pairs, from_json, to_json,
};
pub use cast::{Arrayable, CastInput, Casted, FromResponse, ResponseCaster, ResponseType};
pub use collection::Collection;
pub use cookie::CookieJar;
pub use error::{Error, Result};
pub use method::Method;
pub use multipart::{Form, Part};
pub use options::{DEFAULT_MAX_REDIRECTS, Redirects, RequestOptions};
pub use request::{Request, RequestBuilder};
pub use response::Response;

// Re-export http crate types for status codes, headers and extensions
pub use http::{Extensions, StatusCode, header};
