//! Route `tracing` events through a [`Logger`].
//!
//! [`init_logging`] installs a global subscriber made of an [`EnvFilter`] and a
//! [`LoggerLayer`], so `tracing::info!` and friends end up in the same console
//! and rotating file as direct [`Logger`] calls.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::format::LogRecord;
use crate::logger::EmitScope;
use crate::{Error, Level, LogConfig, Logger, Result};

/// Build a [`Logger`] from `config` and install it as the global subscriber.
///
/// The returned handle can still be used directly, e.g. to close the file.
pub fn init_logging(config: &LogConfig, cli_verbose: Option<u8>) -> Result<Arc<Logger>> {
    let logger = Arc::new(Logger::new(config)?);
    let spec = effective_log_spec(config, cli_verbose)?;
    install(logger.clone(), &spec)?;
    Ok(logger)
}

/// Install `logger` as the global subscriber behind an [`EnvFilter`] built from `spec`.
pub fn install(logger: Arc<Logger>, spec: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(spec).map_err(|e| Error::Init(e.to_string()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(LoggerLayer::new(logger))
        .try_init()
        .map_err(|e| Error::Init(e.to_string()))
}

/// A [`Layer`] that renders every event it sees through a [`Logger`].
///
/// Event fields other than `message` are appended as `key=value`. Events
/// raised while any [`Logger`] is writing a record on the same thread are
/// dropped, whether that write came from this layer or from a direct call.
#[derive(Debug, Clone)]
pub struct LoggerLayer {
    logger: Arc<Logger>,
}

impl LoggerLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if EmitScope::is_active() {
            return;
        }
        let _scope = EmitScope::enter();

        let meta = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord::new(
            Level::from(*meta.level()),
            visitor.finish(),
            meta.file().unwrap_or_else(|| meta.target()),
            meta.line().unwrap_or(0),
        );
        if let Err(err) = self.logger.emit_lines(&record) {
            eprintln!("kaamiki: failed to write log record: {}", err);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: String,
}

impl FieldVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }
}

fn directive(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Warning => "warn",
        Level::Error | Level::Critical => "error",
    }
}

/// Determine the effective filter specification, considering config and CLI overrides.
pub(crate) fn effective_log_spec(config: &LogConfig, cli_verbose: Option<u8>) -> Result<String> {
    // RUST_LOG takes precedence over everything
    if let Ok(rust_log) = std::env::var("RUST_LOG")
        && !rust_log.is_empty()
    {
        return Ok(rust_log);
    }

    let level = directive(config.resolve_level()?);
    let krate = env!("CARGO_CRATE_NAME");

    Ok(match cli_verbose {
        None | Some(0) => level.to_string(),
        Some(1) => format!("{},{}=debug", level, krate),
        Some(2) => format!("{},{}=trace", level, krate),
        Some(_) => "trace".to_string(),
    })
}
