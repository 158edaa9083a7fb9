//! # Kaamiki
//!
//! Leveled console and rotating file logging with a fixed-column record layout.
//!
//! ## Features
//!
//! - Five levels (`DEBUG` to `CRITICAL`) with per-logger thresholds
//! - Colorized console output, plain file output
//! - File rotation by size, line count or time, with numbered backups and retention
//! - Error summaries attached to records
//! - Integration with the `tracing` ecosystem
//!
//! ## Example
//!
//! ```rust,no_run
//! use kaamiki::{LogConfig, Logger};
//!
//! let config = LogConfig::new()
//!     .with_name("billing")
//!     .with_level("INFO")
//!     .with_size_rotation(10 * 1024 * 1024, 5);
//! let logger = Logger::new(&config)?;
//!
//! logger.info("invoice run started")?;
//! logger.warning("3 invoices skipped\nsee the audit table")?;
//! # Ok::<(), kaamiki::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod console;
pub mod error;
pub mod format;
pub mod level;
pub mod logger;
pub mod rotation;
pub mod settings;
pub mod tracing_init;
pub mod validate;
pub mod writer;

pub use builder::LogBuilder;
pub use config::LogConfig;
pub use console::Console;
pub use error::{Error, Result};
pub use format::{ExceptionInfo, Formatter, FormatterConfig, LogRecord};
pub use level::{Level, LevelSpec};
pub use logger::Logger;
pub use rotation::{RotationConfig, RotationMode, Schedule, When};
pub use settings::settings;
pub use tracing_init::{LoggerLayer, init_logging};
pub use writer::FileSink;

/// Start building a logger.
pub fn builder() -> LogBuilder {
    LogBuilder::new()
}
