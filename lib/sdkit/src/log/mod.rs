//! Host-facing logging.
//!
//! [`Logger`] is the leveled logging contract used by the toolkit; the
//! built-in [`LogManager`] forwards to `tracing`. A host can attach its own
//! logger to the service container builder instead.

mod formatter;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use formatter::MessageFormatter;

use crate::{Config, Error, Result};

/// Severity of a log record, lowest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Detailed diagnostics.
    #[default]
    Debug,
    /// Normal events.
    Info,
    /// Unusual but handled events.
    Warning,
    /// Failures.
    Error,
}

impl LogLevel {
    /// Level name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses PSR-3 style names; `notice` maps to info and the levels above
/// `error` (`critical`, `alert`, `emergency`) to error.
impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" | "notice" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" | "critical" | "alert" | "emergency" => Ok(Self::Error),
            _ => Err(Error::invalid_config(format!("unknown log level `{name}`"))),
        }
    }
}

/// Leveled logging contract.
pub trait Logger: Send + Sync {
    /// Record a message.
    fn log(&self, level: LogLevel, message: &str);

    /// Record a debug message.
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Record an info message.
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Record a warning.
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    /// Record an error.
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// A logger shared between the container and the clients.
pub type SharedLogger = Arc<dyn Logger>;

/// Built-in logger forwarding to `tracing` with target `sdkit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogManager {
    min_level: LogLevel,
}

impl LogManager {
    /// A manager dropping records below `min_level`.
    #[must_use]
    pub const fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    /// A manager configured from `log.level` (default `debug`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an unknown level name.
    pub fn from_config(config: &Config) -> Result<Self> {
        let min_level = match config.get("log.level") {
            None => LogLevel::default(),
            Some(level) => level
                .as_str()
                .ok_or_else(|| Error::invalid_config(format!("`log.level` must be a string, got {level}")))?
                .parse()?,
        };
        Ok(Self::new(min_level))
    }

    /// Minimum level recorded.
    #[must_use]
    pub const fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

impl Logger for LogManager {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }
        match level {
            LogLevel::Debug => tracing::debug!(target: "sdkit", "{message}"),
            LogLevel::Info => tracing::info!(target: "sdkit", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "sdkit", "{message}"),
            LogLevel::Error => tracing::error!(target: "sdkit", "{message}"),
        }
    }
}
