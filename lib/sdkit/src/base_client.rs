//! The base API client that concrete SDK clients wrap.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::container::names;
use crate::middleware::{AccessTokenLayer, LoggerLayer, NotEligibleLayer, ResponseEligibility};
use crate::{
    Arrayable, CastInput, Casted, Form, FromResponse, HttpClient, LogLevel, MessageFormatter,
    Method, Middleware, RequestExecutor, RequestOptions, Response, ResponseCaster, ResponseType,
    Result, ServiceContainer, SharedAccessToken,
};

/// Names of the middlewares a [`BaseClient`] registers.
pub mod middleware_names {
    /// Applies the client's access token.
    pub const ACCESS_TOKEN: &str = "access_token";
    /// Logs exchanges through the container logger.
    pub const LOGGER: &str = "logger";
    /// Rejects responses failing the client's eligibility check.
    pub const NOT_ELIGIBLE_RESPONSE: &str = "not_eligible_response";
}

/// Timeout applied to uploads.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// An API client bound to a [`ServiceContainer`].
///
/// Every call registers the standard middlewares (once), sends the request
/// through the client's [`RequestExecutor`] and casts the response to the
/// configured `http.response_type`.
///
/// # Example
///
/// ```no_run
/// use sdkit::{BaseClient, ServiceContainer};
/// use serde_json::json;
///
/// # async fn demo() -> sdkit::Result<()> {
/// let container = ServiceContainer::new(json!({
///     "http": {"base_uri": "https://api.example.com/", "response_type": "collection"}
/// }))?;
/// let client = BaseClient::new(container)?;
///
/// let menu = client.get("menu/get", json!({"lang": "zh_CN"})).await?;
/// println!("{:?}", menu.to_array());
/// # Ok(())
/// # }
/// ```
pub struct BaseClient {
    container: ServiceContainer,
    executor: RequestExecutor,
    caster: ResponseCaster,
    access_token: RwLock<Option<SharedAccessToken>>,
    eligibility: Option<Arc<dyn ResponseEligibility>>,
}

impl std::fmt::Debug for BaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseClient")
            .field("executor", &self.executor)
            .field("caster", &self.caster)
            .field("eligibility", &self.eligibility.is_some())
            .finish_non_exhaustive()
    }
}

impl BaseClient {
    /// A client with the container's services and no extra settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the container's `access_token` service fails
    /// to resolve.
    pub fn new(container: ServiceContainer) -> Result<Self> {
        Self::builder(container).build()
    }

    /// A client builder.
    #[must_use]
    pub fn builder(container: ServiceContainer) -> BaseClientBuilder {
        BaseClientBuilder::new(container)
    }

    /// The service container.
    #[must_use]
    pub const fn container(&self) -> &ServiceContainer {
        &self.container
    }

    /// The request executor.
    #[must_use]
    pub const fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// The response caster.
    #[must_use]
    pub const fn caster(&self) -> &ResponseCaster {
        &self.caster
    }

    /// The access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<SharedAccessToken> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the access token.
    ///
    /// Once the standard middlewares are registered, the `access_token`
    /// entry is replaced and the handler stack rebuilt on the next call.
    pub fn set_access_token(&self, token: SharedAccessToken) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&token));
        if self.executor.has_middleware(middleware_names::ACCESS_TOKEN) {
            self.executor.push_middleware(
                Middleware::from_layer(AccessTokenLayer::new(Some(token))),
                Some(middleware_names::ACCESS_TOKEN),
            );
            self.executor.reset_handler_stack();
        }
    }

    /// Register a middleware on the client's executor.
    pub fn push_middleware(&self, middleware: Middleware, name: Option<&str>) {
        self.executor.push_middleware(middleware, name);
    }

    /// `GET` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn get(&self, url: &str, query: Value) -> Result<Casted> {
        let options = RequestOptions::new().with_query(query);
        self.fetch(url, Method::Get, options, false).await
    }

    /// `POST` with URL-encoded form fields.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn post(&self, url: &str, form: Value) -> Result<Casted> {
        let options = RequestOptions::new().with_form_params(form);
        self.fetch(url, Method::Post, options, false).await
    }

    /// `PUT` with a JSON payload.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn put(&self, url: &str, json: Value) -> Result<Casted> {
        let options = RequestOptions::new().with_json(json);
        self.fetch(url, Method::Put, options, false).await
    }

    /// `DELETE` with a JSON payload.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn delete(&self, url: &str, json: Value) -> Result<Casted> {
        let options = RequestOptions::new().with_json(json);
        self.fetch(url, Method::Delete, options, false).await
    }

    /// `POST` with a JSON payload and query parameters.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn post_json(&self, url: &str, data: Value, query: Value) -> Result<Casted> {
        let options = RequestOptions::new().with_query(query).with_json(data);
        self.fetch(url, Method::Post, options, false).await
    }

    /// Multipart `POST` of files read from disk, plus text fields.
    ///
    /// Each file becomes a part named by its key, with the file name of its
    /// path. Uploads get a 30 second timeout for the whole exchange, the
    /// connection and the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when a file cannot be read,
    /// else see [`fetch`](Self::fetch).
    pub async fn upload<F, T>(&self, url: &str, files: F, form: T, query: Value) -> Result<Casted>
    where
        F: IntoIterator<Item = (String, PathBuf)>,
        T: IntoIterator<Item = (String, String)>,
    {
        let mut multipart = Form::new();
        for (name, path) in files {
            let contents = tokio::fs::read(&path).await?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            multipart = multipart.file(name, filename, contents);
        }
        for (name, contents) in form {
            multipart = multipart.text(name, contents);
        }

        let options = RequestOptions::new()
            .with_query(query)
            .with_multipart(multipart)
            .with_timeouts(UPLOAD_TIMEOUT);
        self.fetch(url, Method::Post, options, false).await
    }

    /// Send a request and cast the response, or return it as
    /// [`Casted::Raw`] when `return_raw` is set.
    ///
    /// Unless `return_raw` is set, the configured response type is checked
    /// before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) for an
    /// unknown response type, and any request or casting error.
    pub async fn fetch(
        &self,
        url: &str,
        method: Method,
        options: RequestOptions,
        return_raw: bool,
    ) -> Result<Casted> {
        if return_raw {
            return self.request_raw(url, method, options).await.map(Casted::Raw);
        }
        let response_type = self.response_type()?;
        self.register_http_middlewares()?;

        let response = self.executor.request(url, method, options).await?;
        self.caster.cast(response, &response_type)
    }

    /// Send a request and return the response uncast.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn request_raw(&self, url: &str, method: Method, options: RequestOptions) -> Result<Response> {
        self.register_http_middlewares()?;
        self.executor.request(url, method, options).await
    }

    /// Cast `response` to the configured response type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) for an
    /// unknown response type, or the custom type's error.
    pub fn unwrap_response(&self, response: Response) -> Result<Casted> {
        self.caster.cast(response, &self.response_type()?)
    }

    /// Normalize any [`CastInput`] into a response and cast it to
    /// `response_type`.
    ///
    /// # Errors
    ///
    /// See [`ResponseCaster::detect_and_cast`].
    pub fn detect_and_cast(&self, input: impl Into<CastInput>, response_type: &ResponseType) -> Result<Casted> {
        self.caster.detect_and_cast(input, response_type)
    }

    /// The configured `http.response_type`, checked against the caster.
    fn response_type(&self) -> Result<ResponseType> {
        let config = self.container.config()?;
        let response_type = ResponseType::from_config(config.get("http.response_type"))?;
        self.caster.validate(&response_type)?;
        Ok(response_type)
    }

    /// Register the access token, logger and eligibility middlewares, in
    /// that order, unless already registered.
    fn register_http_middlewares(&self) -> Result<()> {
        if self.executor.has_middleware(middleware_names::ACCESS_TOKEN) {
            return Ok(());
        }

        // Resolve the logger first so a failure leaves nothing half registered
        let logger = if self.container.has(names::LOGGER) {
            let template = self
                .container
                .config()?
                .get_str("http.log_template")
                .unwrap_or(MessageFormatter::DEBUG)
                .to_string();
            let layer = LoggerLayer::new(self.container.logger()?, MessageFormatter::new(template))
                .with_level(LogLevel::Debug);
            Some(Middleware::from_layer(layer))
        } else {
            None
        };

        self.executor.push_middleware(
            Middleware::from_layer(AccessTokenLayer::new(self.access_token())),
            Some(middleware_names::ACCESS_TOKEN),
        );
        if let Some(logger) = logger {
            self.executor.push_middleware(logger, Some(middleware_names::LOGGER));
        }

        if let Some(check) = &self.eligibility {
            self.executor.push_middleware(
                Middleware::from_layer(NotEligibleLayer::new(Arc::clone(check))),
                Some(middleware_names::NOT_ELIGIBLE_RESPONSE),
            );
        }

        tracing::debug!(middlewares = ?self.executor.middleware_names(), "client middlewares registered");
        Ok(())
    }
}

/// Builder for [`BaseClient`].
pub struct BaseClientBuilder {
    container: ServiceContainer,
    access_token: Option<SharedAccessToken>,
    base_uri: Option<Url>,
    http_client: Option<HttpClient>,
    eligibility: Option<Arc<dyn ResponseEligibility>>,
    caster: ResponseCaster,
    default_options: Option<RequestOptions>,
}

impl std::fmt::Debug for BaseClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseClientBuilder")
            .field("base_uri", &self.base_uri)
            .field("caster", &self.caster)
            .finish_non_exhaustive()
    }
}

impl BaseClientBuilder {
    fn new(container: ServiceContainer) -> Self {
        Self {
            container,
            access_token: None,
            base_uri: None,
            http_client: None,
            eligibility: None,
            caster: ResponseCaster::new(),
            default_options: None,
        }
    }

    /// Access token applied to every request.
    ///
    /// An `access_token` service of the container takes precedence.
    #[must_use]
    pub fn access_token(mut self, token: SharedAccessToken) -> Self {
        self.access_token = Some(token);
        self
    }

    /// Base URI overriding the configured one.
    #[must_use]
    pub fn base_uri(mut self, base_uri: Url) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    /// HTTP client used instead of the container's.
    #[must_use]
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Reject responses failing `check`.
    #[must_use]
    pub fn eligibility(mut self, check: impl ResponseEligibility + 'static) -> Self {
        self.eligibility = Some(Arc::new(check));
        self
    }

    /// Register `T` as a response type, under its Rust type name.
    #[must_use]
    pub fn response_class<T: Arrayable + FromResponse>(mut self) -> Self {
        self.caster.register::<T>();
        self
    }

    /// Register `T` as a response type, under `name`.
    #[must_use]
    pub fn response_class_as<T: Arrayable + FromResponse>(mut self, name: impl Into<String>) -> Self {
        self.caster.register_as::<T>(name);
        self
    }

    /// Options merged over the container's default options.
    #[must_use]
    pub fn default_options(mut self, options: RequestOptions) -> Self {
        self.default_options = Some(options);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error when the container's `access_token` service fails
    /// to resolve.
    pub fn build(self) -> Result<BaseClient> {
        let access_token = if self.container.has(names::ACCESS_TOKEN) {
            Some(
                self.container
                    .resolve_cloned::<SharedAccessToken>(names::ACCESS_TOKEN)?,
            )
        } else {
            self.access_token
        };

        let mut executor = RequestExecutor::with_container(self.container.clone());
        if let Some(options) = self.default_options {
            let defaults = executor.defaults().clone().merge(options);
            executor = executor.with_defaults(defaults);
        }
        if let Some(base_uri) = self.base_uri {
            executor = executor.with_base_uri(base_uri);
        }
        if let Some(client) = self.http_client {
            executor.set_http_client(client);
        }

        Ok(BaseClient {
            container: self.container,
            executor,
            caster: self.caster,
            access_token: RwLock::new(access_token),
            eligibility: self.eligibility,
        })
    }
}
