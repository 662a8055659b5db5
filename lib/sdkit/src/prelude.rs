//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types for glob importing:
//!
//! ```
//! use sdkit::prelude::*;
//! ```

pub use crate::middleware::{Eligibility, RequireStatusOk, ResponseEligibility};
pub use crate::{
    AccessToken, AppendQuery, Arrayable, BaseClient, Casted, Collection, Config, Error,
    FromResponse, HttpClient, Logger, Method, Middleware, QueryAccessToken, Request,
    RequestOptions, Response, ResponseType, Result, ServiceContainer, ServiceProvider,
};
pub use serde::{Deserialize, Serialize};
