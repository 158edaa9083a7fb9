//! The leveled logging facade.
//!
//! A [`Logger`] is configured once, at construction, and never changes
//! afterwards. It holds one shared [`Formatter`], one shared [`Console`] and at
//! most one [`FileSink`] of its own.
//!
//! ```rust,no_run
//! use kaamiki::{LogConfig, Logger};
//!
//! let logger = Logger::new(&LogConfig::new().with_level("INFO").with_size_rotation(1 << 20, 5))?;
//! logger.info("service started")?;
//! logger.debug("filtered out")?;
//! # Ok::<(), kaamiki::Error>(())
//! ```

use std::cell::Cell;
use std::fmt;
use std::fs;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;

use crate::format::{ExceptionInfo, Formatter, LogRecord};
use crate::validate::is_valid_directory_name;
use crate::{Console, Error, FileSink, Level, LogConfig, Result};

thread_local! {
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as writing a record until dropped.
///
/// `tracing` events raised inside the scope (the file sink's own diagnostics,
/// for instance) are not fed back into a [`Logger`] by
/// [`LoggerLayer`](crate::LoggerLayer).
pub(crate) struct EmitScope {
    previous: bool,
}

impl EmitScope {
    pub(crate) fn enter() -> Self {
        Self {
            previous: EMITTING.with(|flag| flag.replace(true)),
        }
    }

    pub(crate) fn is_active() -> bool {
        EMITTING.with(Cell::get)
    }
}

impl Drop for EmitScope {
    fn drop(&mut self) {
        let previous = self.previous;
        EMITTING.with(|flag| flag.set(previous));
    }
}

/// Log an error at ERROR, naming the enclosing function in the summary.
///
/// ```rust,no_run
/// # let logger = kaamiki::builder().with_file(false).build_logger()?;
/// fn load_settings(logger: &kaamiki::Logger) -> kaamiki::Result<()> {
///     if let Err(err) = std::fs::read_to_string("/etc/app.toml") {
///         kaamiki::log_exception!(logger, "using defaults", &err)?;
///     }
///     Ok(())
/// }
/// # load_settings(&logger)?;
/// # Ok::<(), kaamiki::Error>(())
/// ```
#[macro_export]
macro_rules! log_exception {
    ($logger:expr, $msg:expr, $err:expr $(,)?) => {
        $logger.exception_in($crate::function_name!(), $msg, $err)
    };
}

/// Name of the enclosing function, without its module path.
#[doc(hidden)]
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let path = type_name_of(f);
        let path = path.strip_suffix("::f").unwrap_or(path);
        path.rsplit("::")
            .find(|part| *part != "{{closure}}")
            .unwrap_or(path)
    }};
}

/// Leveled logger writing to the console and, optionally, a rotating file.
#[derive(Debug)]
pub struct Logger {
    name: String,
    level: Level,
    formatter: Arc<Formatter>,
    console: Arc<Console>,
    file: Option<FileSink>,
}

impl Logger {
    /// Build a logger with its own formatter and a stdout console.
    pub fn new(config: &LogConfig) -> Result<Self> {
        let formatter = Arc::new(Formatter::new(config.formatter())?);
        let console = Arc::new(Console::stdout(config.colored));
        Self::with_shared(config, formatter, console)
    }

    /// Build a logger around a formatter and console shared with other loggers.
    ///
    /// The formatting options of `config` are ignored in favour of `formatter`.
    /// Every argument is validated before anything is opened; on error no file
    /// is created.
    pub fn with_shared(
        config: &LogConfig,
        formatter: Arc<Formatter>,
        console: Arc<Console>,
    ) -> Result<Self> {
        let level = config.resolve_level()?;
        let rotation = config.rotation()?;
        config.check_encoding()?;
        let name = config.logger_name();

        let file = if config.to_file {
            let dir = config.log_dir();
            prepare_dir(&dir)?;
            Some(FileSink::open_with(config.file_path(), true, rotation, config.delay)?)
        } else {
            None
        };

        Ok(Self {
            name,
            level,
            formatter,
            console,
            file,
        })
    }

    /// Sanitized logger name, also the log file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimum level that is written.
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    /// Path of the active log file, if file output is enabled.
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_ref().map(FileSink::path)
    }

    pub fn file_sink(&self) -> Option<&FileSink> {
        self.file.as_ref()
    }

    pub fn formatter(&self) -> &Arc<Formatter> {
        &self.formatter
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    #[track_caller]
    pub fn debug(&self, msg: impl fmt::Display) -> Result<()> {
        self.log(Level::Debug, msg)
    }

    #[track_caller]
    pub fn info(&self, msg: impl fmt::Display) -> Result<()> {
        self.log(Level::Info, msg)
    }

    #[track_caller]
    pub fn warning(&self, msg: impl fmt::Display) -> Result<()> {
        self.log(Level::Warning, msg)
    }

    #[track_caller]
    pub fn warn(&self, msg: impl fmt::Display) -> Result<()> {
        self.log(Level::Warning, msg)
    }

    #[track_caller]
    pub fn error(&self, msg: impl fmt::Display) -> Result<()> {
        self.log(Level::Error, msg)
    }

    #[track_caller]
    pub fn critical(&self, msg: impl fmt::Display) -> Result<()> {
        self.log(Level::Critical, msg)
    }

    #[track_caller]
    pub fn fatal(&self, msg: impl fmt::Display) -> Result<()> {
        self.log(Level::Critical, msg)
    }

    /// Log `msg` at ERROR with `err` attached.
    ///
    /// The summary carries no function name; see [`exception_in`](Self::exception_in)
    /// and [`log_exception!`](crate::log_exception).
    #[track_caller]
    pub fn exception<E>(&self, msg: impl fmt::Display, err: &E) -> Result<()>
    where
        E: std::error::Error + ?Sized,
    {
        self.log_error(msg, err, None)
    }

    /// Log `msg` at ERROR with `err` attached, reported from `function`.
    #[track_caller]
    pub fn exception_in<E>(&self, function: &str, msg: impl fmt::Display, err: &E) -> Result<()>
    where
        E: std::error::Error + ?Sized,
    {
        self.log_error(msg, err, Some(function))
    }

    #[track_caller]
    fn log_error<E>(&self, msg: impl fmt::Display, err: &E, function: Option<&str>) -> Result<()>
    where
        E: std::error::Error + ?Sized,
    {
        if !self.is_enabled(Level::Error) {
            return Ok(());
        }
        let location = Location::caller();
        let mut info = ExceptionInfo::from_error(err, location.line());
        if let Some(function) = function {
            info = info.in_function(function);
        }
        let record = LogRecord::new(Level::Error, msg.to_string(), location.file(), location.line())
            .with_exception(info);
        self.emit(&record)
    }

    /// Log `msg` at `level`, one record per line of `msg`.
    #[track_caller]
    pub fn log(&self, level: Level, msg: impl fmt::Display) -> Result<()> {
        if !self.is_enabled(level) {
            return Ok(());
        }
        let location = Location::caller();
        let record = LogRecord::new(level, msg.to_string(), location.file(), location.line());
        self.emit_lines(&record)
    }

    /// Write `record` once per line of its message, sharing all other metadata.
    pub fn emit_lines(&self, record: &LogRecord) -> Result<()> {
        if !self.is_enabled(record.level) {
            return Ok(());
        }
        for line in record.message.lines() {
            self.emit(&record.with_message(line))?;
        }
        Ok(())
    }

    /// Write a single record to every sink, if its level passes.
    ///
    /// Both sinks are attempted; the first failure is returned.
    pub fn emit(&self, record: &LogRecord) -> Result<()> {
        if !self.is_enabled(record.level) {
            return Ok(());
        }
        let _scope = EmitScope::enter();
        let rendered = self.formatter.render(record)?;

        let console_result = if self.console.colored() {
            self.console.write_line(&self.formatter.render_colored(record)?)
        } else {
            self.console.write_line(&rendered)
        };
        let file_result = match &self.file {
            Some(sink) => sink.write(&rendered),
            None => Ok(()),
        };

        console_result?;
        file_result
    }

    /// Flush and close the file sink. Further records fail on the file side.
    pub fn close(&self) -> Result<()> {
        match &self.file {
            Some(sink) => sink.close(),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file_path() {
            Some(path) => write!(f, "<Logger: {} - [{}] - {}>", self.name, self.level, path.display()),
            None => write!(f, "<Logger: {} - [{}]>", self.name, self.level),
        }
    }
}

fn prepare_dir(dir: &Path) -> Result<()> {
    if !is_valid_directory_name(dir) {
        return Err(Error::invalid(
            "path",
            format!("{:?} cannot be used as a log directory", dir),
        ));
    }
    fs::create_dir_all(dir)
        .map_err(|e| Error::invalid("path", format!("cannot create {:?}: {}", dir, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormatterConfig;
    use std::io::{self, Write};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logger_with(config: &LogConfig) -> (Logger, Captured) {
        let captured = Captured::default();
        let console = Arc::new(Console::from_writer(captured.clone(), false));
        let formatter = Arc::new(Formatter::new(FormatterConfig::default()).unwrap());
        (Logger::with_shared(config, formatter, console).unwrap(), captured)
    }

    #[test]
    fn test_console_only_logger() {
        let config = LogConfig::new().with_file(false).with_name("quiet");
        let (logger, captured) = logger_with(&config);

        assert!(logger.file_path().is_none());
        logger.info("hello").unwrap();
        assert!(captured.text().ends_with(" : hello\n"));
        assert_eq!(logger.to_string(), "<Logger: quiet - [DEBUG]>");
    }

    #[test]
    fn test_multi_line_message_becomes_one_record_per_line() {
        let config = LogConfig::new().with_file(false);
        let (logger, captured) = logger_with(&config);

        logger.warning("first\nsecond\nthird").unwrap();
        let text = captured.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let prefixes: Vec<&str> = lines
            .iter()
            .map(|l| l.rsplit_once(" : ").unwrap().0)
            .collect();
        assert!(prefixes.iter().all(|p| *p == prefixes[0]));
        assert!(lines[1].ends_with(" : second"));
    }

    #[test]
    fn test_records_carry_caller_location() {
        let config = LogConfig::new().with_file(false);
        let (logger, captured) = logger_with(&config);

        let line = line!() + 1;
        logger.error("where am I").unwrap();
        assert!(captured.text().contains(&format!("logger:{:04} : where am I", line)));
    }

    #[test]
    fn test_exception_is_summarised() {
        let config = LogConfig::new().with_file(false);
        let (logger, captured) = logger_with(&config);

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume");
        logger.exception("could not save", &err).unwrap();
        let text = captured.text();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("   ERROR "));
        assert!(text.contains("could not save - Error: read-only volume on line"));
    }

    #[test]
    fn test_exception_names_the_reporting_function() {
        let config = LogConfig::new().with_file(false);
        let (logger, captured) = logger_with(&config);

        fn load_settings(logger: &Logger) -> Result<()> {
            let err: Box<dyn std::error::Error + Send + Sync> = "missing key 'port'".into();
            crate::log_exception!(logger, "using defaults", &*err)
        }
        load_settings(&logger).unwrap();

        assert!(captured
            .text()
            .contains("using defaults - Error: missing key 'port' in load_settings() on line"));
    }

    #[test]
    fn test_exception_in_accepts_trait_objects() {
        let config = LogConfig::new().with_file(false);
        let (logger, captured) = logger_with(&config);

        let err: &dyn std::error::Error = &io::Error::other("socket closed");
        logger.exception_in("drain", "shutdown", err).unwrap();
        assert!(captured
            .text()
            .contains("shutdown - Error: socket closed in drain() on line"));
    }

    #[test]
    fn test_invalid_level_fails_construction() {
        let config = LogConfig::new().with_level("LOUD").with_file(false);
        let err = Logger::new(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "level", .. }));
    }

    #[test]
    fn test_invalid_path_fails_without_creating_files() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, "a regular file").unwrap();

        let config = LogConfig::new().with_path(&blocker).with_name("x");
        let err = Logger::new(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "path", .. }));
    }

    #[test]
    fn test_bad_rotation_mode_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let mut config = LogConfig::new().with_path(&logs);
        config.rotate_by = "hourly".to_string();

        assert!(matches!(
            Logger::new(&config),
            Err(Error::InvalidArgument { arg: "rotate_by", .. })
        ));
        assert!(!logs.exists());
    }

    #[test]
    fn test_closed_logger_reports_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::new().with_path(dir.path()).with_name("closing");
        let (logger, _captured) = logger_with(&config);

        logger.info("before").unwrap();
        logger.close().unwrap();
        assert!(matches!(logger.info("after"), Err(Error::ClosedSink { .. })));
    }
}
