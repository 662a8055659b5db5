//! Tower middleware layers of the sdkit request pipeline.
//!
//! Every layer wraps a service of [`Request`](crate::Request) to
//! [`Response`](crate::Response) and reads its switches from the
//! [`RequestOptions`](crate::RequestOptions) extension of the request.
//!
//! # Built-in layers
//!
//! Always part of a [`HandlerStack`](crate::HandlerStack):
//!
//! - [`HttpErrorsLayer`] - 4xx/5xx responses become [`Error::Http`](crate::Error::Http)
//! - [`FollowRedirectLayer`] - follows 3xx responses
//! - [`PrepareBodyLayer`] - sets `Content-Length`
//! - [`CookiesLayer`] - sends and stores cookies of a [`CookieJar`](crate::CookieJar)
//!
//! # Client layers
//!
//! Registered by [`BaseClient`](crate::BaseClient) before its first request:
//!
//! - [`AccessTokenLayer`] - applies an [`AccessToken`](crate::AccessToken)
//! - [`LoggerLayer`] - logs exchanges through a [`Logger`](crate::Logger)
//! - [`NotEligibleLayer`] - rejects responses failing a [`ResponseEligibility`] check
//!
//! Any of them can be registered by hand through
//! [`Middleware::from_layer`](crate::Middleware::from_layer).

mod access_token;
mod cookies;
mod follow_redirect;
mod http_errors;
mod logging;
mod not_eligible;
mod prepare_body;

pub use access_token::{AccessTokenLayer, AccessTokenService};
pub use cookies::{Cookies, CookiesLayer};
pub use follow_redirect::{FollowRedirect, FollowRedirectLayer};
pub use http_errors::{HttpErrors, HttpErrorsLayer};
pub use logging::{LoggerLayer, Logging};
pub use not_eligible::{
    DEFAULT_MESSAGE, Eligibility, NotEligible, NotEligibleLayer, RequireStatusOk,
    ResponseEligibility,
};
pub use prepare_body::{PrepareBody, PrepareBodyLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
