//! Dependency-injection container.
//!
//! [`Container`] is a registry of lazily created, cached services keyed by
//! name. [`ServiceContainer`] owns one, bootstraps it from configuration and
//! service providers, and offers typed accessors for the standard services.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde_json::{Value, json};

use crate::providers::{
    ConfigServiceProvider, EventDispatcherServiceProvider, HttpClientServiceProvider,
    IncomingRequest, LogServiceProvider, RequestServiceProvider, ServiceProvider,
};
use crate::{
    Config, Error, EventDispatcher, HttpClient, Listener, ListenerRegistry, LogManager,
    RequestOptions, Result, SharedLogger, replace_recursive,
};

/// Stable names of the standard services.
pub mod names {
    /// The merged [`Config`](crate::Config).
    pub const CONFIG: &str = "config";
    /// The [`SharedLogger`](crate::SharedLogger).
    pub const LOGGER: &str = "logger";
    /// The host's [`IncomingRequest`](crate::IncomingRequest).
    pub const REQUEST: &str = "request";
    /// The [`HttpClient`](crate::HttpClient).
    pub const HTTP_CLIENT: &str = "http_client";
    /// The [`EventDispatcher`](crate::EventDispatcher).
    pub const EVENTS: &str = "events";
    /// An optional [`SharedAccessToken`](crate::SharedAccessToken) picked up by every client.
    pub const ACCESS_TOKEN: &str = "access_token";
    /// An optional [`Transport`](crate::Transport) replacing the default one.
    pub const HANDLER: &str = "handler";
}

/// A type-erased service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&ServiceContainer) -> Result<Service> + Send + Sync>;

struct Entry {
    factory: Factory,
    instance: Mutex<Option<Service>>,
}

impl Entry {
    fn resolve(&self, container: &ServiceContainer) -> Result<Service> {
        if let Some(instance) = self.cached() {
            return Ok(instance);
        }
        // The factory may resolve other services, so it runs without the lock.
        let created = (self.factory)(container)?;
        let mut slot = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(slot.get_or_insert(created)))
    }

    fn cached(&self) -> Option<Service> {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Registry of named, lazily instantiated services.
#[derive(Default)]
pub struct Container {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.names())
            .finish()
    }
}

impl Container {
    /// An empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous registration.
    ///
    /// The factory runs on first resolution; its result is cached.
    pub fn set<T, F>(&self, name: impl Into<String>, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceContainer) -> Result<T> + Send + Sync + 'static,
    {
        let factory: Factory =
            Arc::new(move |container| factory(container).map(|value| Arc::new(value) as Service));
        self.insert(name.into(), Entry {
            factory,
            instance: Mutex::new(None),
        });
    }

    /// Register an already created instance under `name`.
    pub fn instance<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        let service: Service = Arc::new(value);
        let cached = Arc::clone(&service);
        self.insert(name.into(), Entry {
            factory: Arc::new(move |_| Ok(Arc::clone(&cached))),
            instance: Mutex::new(Some(service)),
        });
    }

    fn insert(&self, name: String, entry: Entry) {
        tracing::trace!(service = name, "registering service");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(entry));
    }

    /// Whether a service is registered under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    fn entry(&self, name: &str) -> Result<Arc<Entry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))
    }
}

/// The service container every client is built from.
///
/// Cloning is cheap; clones share the same services.
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<Inner>,
}

struct Inner {
    container: Container,
    config: Value,
    user_config: Value,
    logger: Option<SharedLogger>,
    listeners: ListenerRegistry,
    incoming_request: IncomingRequest,
    default_options: RequestOptions,
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("services", &self.inner.container.names())
            .field("listeners", &self.inner.listeners)
            .finish_non_exhaustive()
    }
}

impl ServiceContainer {
    /// A container for the given user configuration, with the standard providers.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while registering providers.
    pub fn new(config: Value) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a new container builder.
    #[must_use]
    pub fn builder() -> ServiceContainerBuilder {
        ServiceContainerBuilder::default()
    }

    /// The underlying registry.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    /// Whether a service is registered under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.inner.container.has(name)
    }

    /// Resolve the service registered under `name` as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceNotFound`] for an unknown name,
    /// [`Error::ServiceType`] when the service is not a `T`, and the error of
    /// the service factory.
    pub fn resolve<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let entry = self.inner.container.entry(name)?;
        entry
            .resolve(self)?
            .downcast::<T>()
            .map_err(|_| Error::ServiceType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Resolve a service holding a cloneable handle, returning a clone.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_cloned<T: Any + Clone + Send + Sync>(&self, name: &str) -> Result<T> {
        self.resolve::<T>(name).map(|service| T::clone(&service))
    }

    /// The merged configuration (`config` service).
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn config(&self) -> Result<Arc<Config>> {
        self.resolve(names::CONFIG)
    }

    /// The logger (`logger` service).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the user configuration names a
    /// logger that was not attached to the builder.
    pub fn logger(&self) -> Result<SharedLogger> {
        self.resolve_cloned(names::LOGGER)
    }

    /// The host's inbound request (`request` service).
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn request(&self) -> Result<Arc<IncomingRequest>> {
        self.resolve(names::REQUEST)
    }

    /// The HTTP client (`http_client` service).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a malformed `http` section.
    pub fn http_client(&self) -> Result<HttpClient> {
        self.resolve_cloned(names::HTTP_CLIENT)
    }

    /// The event dispatcher (`events` service).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when `events.listeners` names an
    /// unknown listener.
    pub fn events(&self) -> Result<Arc<EventDispatcher>> {
        self.resolve(names::EVENTS)
    }

    /// The merged configuration map: base defaults, package defaults, then user values.
    #[must_use]
    pub fn merged_config(&self) -> &Value {
        &self.inner.config
    }

    /// The configuration map as supplied by the user.
    #[must_use]
    pub fn user_config(&self) -> &Value {
        &self.inner.user_config
    }

    /// The logger attached to the builder, if any.
    #[must_use]
    pub fn attached_logger(&self) -> Option<&SharedLogger> {
        self.inner.logger.as_ref()
    }

    /// Listeners that `events.listeners` may refer to.
    #[must_use]
    pub fn listener_registry(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    /// The inbound request attached to the builder.
    #[must_use]
    pub fn incoming_request(&self) -> &IncomingRequest {
        &self.inner.incoming_request
    }

    /// Request options injected into every client built from this container.
    #[must_use]
    pub fn default_options(&self) -> &RequestOptions {
        &self.inner.default_options
    }

    /// A weak handle, for services that refer back to their container.
    #[must_use]
    pub fn downgrade(&self) -> WeakServiceContainer {
        WeakServiceContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Resolve the `logger` base definition.
    ///
    /// A `logger` key in the user configuration cannot carry an
    /// implementation, so it is only accepted alongside an attached logger.
    pub(crate) fn default_logger(&self) -> Result<SharedLogger> {
        if let Some(logger) = &self.inner.logger {
            return Ok(Arc::clone(logger));
        }
        if self.inner.user_config.get("logger").is_some() {
            return Err(Error::invalid_config(
                "Invalid logger provided. Attach a `Logger` implementation to the container builder",
            ));
        }
        let config = self.config()?;
        let manager = LogManager::from_config(&config)?;
        Ok(Arc::new(manager))
    }
}

/// A non-owning handle to a [`ServiceContainer`].
#[derive(Clone, Default)]
pub struct WeakServiceContainer {
    inner: Weak<Inner>,
}

impl fmt::Debug for WeakServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakServiceContainer")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl WeakServiceContainer {
    /// The container, while it is alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ServiceContainer> {
        self.inner.upgrade().map(|inner| ServiceContainer { inner })
    }
}

/// Configuration shared by every container before package and user values.
fn base_config() -> Value {
    json!({"http": {"timeout": 30.0}})
}

/// Builder for [`ServiceContainer`].
#[derive(Default)]
pub struct ServiceContainerBuilder {
    config: Value,
    defaults: Value,
    logger: Option<SharedLogger>,
    listeners: ListenerRegistry,
    incoming_request: Option<IncomingRequest>,
    default_options: RequestOptions,
    providers: Vec<Box<dyn ServiceProvider>>,
}

impl fmt::Debug for ServiceContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainerBuilder")
            .field("config", &self.config)
            .field("defaults", &self.defaults)
            .field("has_logger", &self.logger.is_some())
            .field("listeners", &self.listeners)
            .field("providers_count", &self.providers.len())
            .finish_non_exhaustive()
    }
}

impl ServiceContainerBuilder {
    /// User configuration (highest precedence).
    #[must_use]
    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Package defaults, merged under the user configuration.
    #[must_use]
    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }

    /// Logger used instead of the built-in [`LogManager`].
    #[must_use]
    pub fn logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Make a listener available to `events.listeners` under `name`.
    #[must_use]
    pub fn listener(mut self, name: impl Into<String>, listener: Listener) -> Self {
        self.listeners.insert(name, listener);
        self
    }

    /// The host's current inbound request.
    #[must_use]
    pub fn incoming_request(mut self, request: IncomingRequest) -> Self {
        self.incoming_request = Some(request);
        self
    }

    /// Request options injected into every client.
    #[must_use]
    pub fn default_options(mut self, options: RequestOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Register an extra provider, after the standard ones.
    #[must_use]
    pub fn provider(mut self, provider: impl ServiceProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Build the container and register every provider, in order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a provider's registration.
    pub fn build(self) -> Result<ServiceContainer> {
        // Unset layers are null and must not wipe the layers below them
        let merged = [self.defaults, self.config.clone()]
            .into_iter()
            .filter(|layer| !layer.is_null())
            .fold(base_config(), replace_recursive);
        let container = ServiceContainer {
            inner: Arc::new(Inner {
                container: Container::new(),
                config: merged,
                user_config: self.config,
                logger: self.logger,
                listeners: self.listeners,
                incoming_request: self.incoming_request.unwrap_or_default(),
                default_options: self.default_options,
            }),
        };

        let registry = container.container();
        registry.set(names::CONFIG, |container: &ServiceContainer| {
            Ok(Config::new(container.merged_config().clone()))
        });
        registry.set(names::LOGGER, ServiceContainer::default_logger);

        let standard: [&dyn ServiceProvider; 5] = [
            &ConfigServiceProvider,
            &LogServiceProvider,
            &RequestServiceProvider,
            &HttpClientServiceProvider,
            &EventDispatcherServiceProvider,
        ];
        for provider in standard
            .into_iter()
            .chain(self.providers.iter().map(|provider| &**provider))
        {
            tracing::debug!(provider = provider.name(), "registering service provider");
            provider.register(&container)?;
        }

        tracing::debug!(services = ?registry.names(), "service container ready");
        Ok(container)
    }
}
