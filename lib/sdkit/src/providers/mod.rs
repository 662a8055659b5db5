//! Service providers.
//!
//! A provider registers one named service into a [`ServiceContainer`]. The
//! standard providers run first, in a fixed order; caller-supplied providers
//! follow in the order they were given to the builder.

mod config;
mod events;
mod http_client;
mod log;
mod request;

pub use config::ConfigServiceProvider;
pub use events::EventDispatcherServiceProvider;
pub use http_client::HttpClientServiceProvider;
pub use log::LogServiceProvider;
pub use request::{IncomingRequest, RequestServiceProvider};

use crate::{Result, ServiceContainer};

/// Registers services into a container.
pub trait ServiceProvider {
    /// Provider name, used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Register the provider's services.
    ///
    /// # Errors
    ///
    /// Returns an error when the services cannot be registered.
    fn register(&self, container: &ServiceContainer) -> Result<()>;
}

/// Any `Fn(&ServiceContainer) -> Result<()>` is a provider.
impl<F> ServiceProvider for F
where
    F: Fn(&ServiceContainer) -> Result<()>,
{
    fn register(&self, container: &ServiceContainer) -> Result<()> {
        self(container)
    }
}
