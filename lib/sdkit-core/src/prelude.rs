//! Prelude module for convenient imports.
//!
//! ```
//! use sdkit_core::prelude::*;
//! ```

pub use crate::{
    Arrayable, Casted, Collection, CookieJar, Error, Form, FromResponse, Method, Part, Request,
    RequestBuilder, RequestOptions, Response, ResponseCaster, ResponseType, Result,
};
