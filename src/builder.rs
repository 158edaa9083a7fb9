//! Builder pattern for configuring and creating loggers.
//!
//! # Example
//!
//! ```rust,no_run
//! // A standalone logger rotating at 5 MiB, keeping 3 backups
//! let logger = kaamiki::builder()
//!     .with_name("worker")
//!     .with_level("INFO")
//!     .with_size_rotation(5 * 1024 * 1024, 3)
//!     .build_logger()?;
//! logger.info("ready")?;
//!
//! // Or route `tracing` events through the same kind of logger
//! kaamiki::builder().with_file(false).init()?;
//! tracing::warn!("disk almost full");
//! # Ok::<(), kaamiki::Error>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::level::LevelSpec;
use crate::tracing_init::{effective_log_spec, install};
use crate::{Console, Formatter, LogConfig, Logger, Result};

/// A builder for a [`LogConfig`] and the [`Logger`] it describes.
///
/// Loggers built from builders sharing a formatter or console reuse them
/// instead of creating their own.
#[derive(Debug, Clone, Default)]
pub struct LogBuilder {
    config: LogConfig,
    formatter: Option<Arc<Formatter>>,
    console: Option<Arc<Console>>,
    cli_verbose: Option<u8>,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: LogConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Minimum level, as a name or a number.
    pub fn with_level(mut self, level: impl Into<LevelSpec>) -> Self {
        self.config = self.config.with_level(level);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_name(name);
        self
    }

    /// Directory for the log file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_path(path);
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.config = self.config.with_file(enabled);
        self
    }

    pub fn with_colored(mut self, colored: bool) -> Self {
        self.config = self.config.with_colored(colored);
        self
    }

    pub fn with_traceback(mut self, traceback: bool) -> Self {
        self.config = self.config.with_traceback(traceback);
        self
    }

    pub fn with_format(mut self, template: impl Into<String>) -> Self {
        self.config = self.config.with_format(template);
        self
    }

    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.config = self.config.with_date_format(date_format);
        self
    }

    pub fn with_size_rotation(mut self, max_bytes: u64, backups: usize) -> Self {
        self.config = self.config.with_size_rotation(max_bytes, backups);
        self
    }

    pub fn with_line_rotation(mut self, max_lines: u64, backups: usize) -> Self {
        self.config = self.config.with_line_rotation(max_lines, backups);
        self
    }

    pub fn with_time_rotation(mut self, when: impl Into<String>, interval: u32, backups: usize) -> Self {
        self.config = self.config.with_time_rotation(when, interval, backups);
        self
    }

    /// Turn rotation off entirely.
    pub fn without_rotation(mut self) -> Self {
        self.config = self.config.with_rotate(false);
        self
    }

    pub fn with_delay(mut self, delay: bool) -> Self {
        self.config = self.config.with_delay(delay);
        self
    }

    /// Reuse an existing formatter; the config's formatting options are then ignored.
    pub fn with_formatter(mut self, formatter: Arc<Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Reuse an existing console.
    pub fn with_console(mut self, console: Arc<Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Verbosity from the command line, applied by [`init`](Self::init).
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        self.cli_verbose = Some(verbose);
        self
    }

    /// Get the current configuration without creating anything.
    pub fn build(self) -> LogConfig {
        self.config
    }

    /// Validate the configuration and create the logger.
    pub fn build_logger(self) -> Result<Logger> {
        let formatter = match self.formatter {
            Some(formatter) => formatter,
            None => Arc::new(Formatter::new(self.config.formatter())?),
        };
        let console = self
            .console
            .unwrap_or_else(|| Arc::new(Console::stdout(self.config.colored)));
        Logger::with_shared(&self.config, formatter, console)
    }

    /// Create the logger and install it as the global `tracing` subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A global subscriber is already installed
    /// - The log file cannot be opened
    /// - Invalid configuration is provided
    pub fn init(self) -> Result<Arc<Logger>> {
        let spec = effective_log_spec(&self.config, self.cli_verbose)?;
        let logger = Arc::new(self.build_logger()?);
        install(logger.clone(), &spec)?;
        Ok(logger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::{RotationConfig, RotationMode};
    use crate::{Error, FormatterConfig, Level};

    #[test]
    fn test_builder_new() {
        let config = LogBuilder::new().build();
        assert_eq!(config, LogConfig::new());
    }

    #[test]
    fn test_builder_with_level() {
        let config = LogBuilder::new().with_level("error").build();
        assert_eq!(config.resolve_level().unwrap(), Level::Error);
    }

    #[test]
    fn test_builder_chaining() {
        let config = LogBuilder::new()
            .with_name("api")
            .with_path("/tmp/api-logs")
            .with_colored(false)
            .with_traceback(true)
            .with_line_rotation(500, 2)
            .build();

        assert_eq!(config.logger_name(), "api");
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/api-logs"));
        assert!(!config.colored);
        assert!(config.traceback);
        assert_eq!(config.rotation().unwrap(), RotationConfig::lines(500, 2));
    }

    #[test]
    fn test_builder_from_config() {
        let original = LogConfig::new().with_level("WARNING").with_size_rotation(10, 1);
        let config = LogBuilder::from_config(original.clone()).build();
        assert_eq!(config, original);
    }

    #[test]
    fn test_builder_without_rotation() {
        let config = LogBuilder::new()
            .with_time_rotation("midnight", 1, 7)
            .without_rotation()
            .build();
        assert_eq!(config.rotation().unwrap().mode, RotationMode::None);
    }

    #[test]
    fn test_build_logger_shares_formatter_and_console() {
        let formatter = Arc::new(Formatter::new(FormatterConfig::default()).unwrap());
        let console = Arc::new(Console::stderr(false));

        let first = LogBuilder::new()
            .with_file(false)
            .with_formatter(formatter.clone())
            .with_console(console.clone())
            .build_logger()
            .unwrap();
        let second = LogBuilder::new()
            .with_file(false)
            .with_level("ERROR")
            .with_formatter(formatter.clone())
            .with_console(console.clone())
            .build_logger()
            .unwrap();

        assert!(Arc::ptr_eq(first.formatter(), second.formatter()));
        assert!(Arc::ptr_eq(first.console(), second.console()));
        assert_eq!(second.level(), Level::Error);
    }

    #[test]
    fn test_build_logger_rejects_bad_date_format() {
        let err = LogBuilder::new()
            .with_file(false)
            .with_date_format("[not-a-component]")
            .build_logger()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "date_format", .. }));
    }

    #[test]
    fn test_build_logger_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");
        let logger = LogBuilder::new()
            .with_path(&logs)
            .with_name("svc")
            .with_console(Arc::new(Console::from_writer(std::io::sink(), false)))
            .build_logger()
            .unwrap();

        assert_eq!(logger.file_path(), Some(logs.join("svc.log").as_path()));
        assert!(logs.join("svc.log").exists());
    }
}
