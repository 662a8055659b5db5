use crate::container::names;
use crate::{HttpClient, Result, ServiceContainer, ServiceProvider};

/// Registers an [`HttpClient`] built from the `http` section as `http_client`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientServiceProvider;

impl ServiceProvider for HttpClientServiceProvider {
    fn register(&self, container: &ServiceContainer) -> Result<()> {
        container
            .container()
            .set(names::HTTP_CLIENT, |container: &ServiceContainer| {
                let config = container.config()?;
                HttpClient::from_config(&config)
            });
        Ok(())
    }
}
