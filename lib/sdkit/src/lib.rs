//! SDK-construction toolkit for Rust.
//!
//! Build API clients on a service container, pluggable service providers and
//! a Tower middleware pipeline that signs requests with access tokens, logs
//! traffic, checks responses and casts them into array, object, collection
//! or custom shapes.
//!
//! # Example
//!
//! ```no_run
//! use sdkit::prelude::*;
//! use serde_json::json;
//!
//! struct MenuClient {
//!     base: BaseClient,
//! }
//!
//! impl MenuClient {
//!     async fn menu(&self) -> sdkit::Result<Casted> {
//!         self.base.get("menu/get", json!({})).await
//!     }
//! }
//!
//! # async fn demo() -> sdkit::Result<()> {
//! let container = ServiceContainer::new(json!({
//!     "http": {"base_uri": "https://api.example.com/", "timeout": 5.0}
//! }))?;
//! let client = MenuClient { base: BaseClient::new(container)? };
//! let menu = client.menu().await?;
//! # Ok(())
//! # }
//! ```

mod access_token;
mod base_client;
mod config;
mod connector;
mod container;
mod events;
mod http;
mod log;
pub mod middleware;
pub mod prelude;
mod providers;

pub use access_token::{AccessToken, AppendQuery, QueryAccessToken, SharedAccessToken};
pub use base_client::{BaseClient, BaseClientBuilder, middleware_names};
pub use config::{ClientConfig, ClientConfigBuilder, Config, replace_recursive};
pub use container::{
    Container, Service, ServiceContainer, ServiceContainerBuilder, WeakServiceContainer, names,
};
pub use events::{Event, EventDispatcher, Listener, ListenerRegistry};
pub use self::http::{
    BoxedService, HandlerStack, HttpClient, HyperTransport, Middleware, MiddlewareStack,
    RequestExecutor, ServiceFuture, Transport, layer_names,
};
pub use log::{LogLevel, LogManager, Logger, MessageFormatter, SharedLogger};
pub use providers::{
    ConfigServiceProvider, EventDispatcherServiceProvider, HttpClientServiceProvider,
    IncomingRequest, LogServiceProvider, RequestServiceProvider, ServiceProvider,
};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use sdkit_core::{
    Arrayable, CastInput, Casted, Collection, ContentType, CookieJar, DEFAULT_MAX_REDIRECTS, Error,
    Form, FromResponse, Method, Part, Redirects, Request, RequestBuilder, RequestOptions, Response,
    ResponseCaster, ResponseType, Result, encode_json_payload, encode_pairs, flatten_pairs,
    from_json, to_json,
};

// Re-export http types for status codes, headers and extensions
pub use sdkit_core::{Extensions, StatusCode, header};

// Re-export crates used in public signatures
pub use serde_json;
pub use url;
