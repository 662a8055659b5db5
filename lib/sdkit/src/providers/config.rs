use crate::container::names;
use crate::{Config, Result, ServiceContainer, ServiceProvider};

/// Registers the merged [`Config`] as `config`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigServiceProvider;

impl ServiceProvider for ConfigServiceProvider {
    fn register(&self, container: &ServiceContainer) -> Result<()> {
        container.container().set(names::CONFIG, |container: &ServiceContainer| {
            Ok(Config::new(container.merged_config().clone()))
        });
        Ok(())
    }
}
