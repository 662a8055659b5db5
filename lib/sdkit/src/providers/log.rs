use crate::container::names;
use crate::{Result, ServiceContainer, ServiceProvider};

/// Registers the logger as `logger`.
///
/// The logger attached to the container builder wins; otherwise a
/// [`LogManager`](crate::LogManager) configured from `log.level` is created.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogServiceProvider;

impl ServiceProvider for LogServiceProvider {
    fn register(&self, container: &ServiceContainer) -> Result<()> {
        container
            .container()
            .set(names::LOGGER, ServiceContainer::default_logger);
        Ok(())
    }
}
