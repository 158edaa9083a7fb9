//! Rendering of log records into single physical lines.
//!
//! The default layout is a fixed set of columns:
//!
//! ```text
//! Oct 18, 2026 22:19:03.042     INFO 0012345 [           main]                       rotation:0042 : message
//! ```
//!
//! A custom template may be supplied instead; see [`FormatterConfig::template`].

use std::panic::Location;
use std::path::{Component, Path};

use time::OffsetDateTime;
use time::format_description::{self, OwnedFormatItem};

use crate::settings::settings;
use crate::{Error, Level, Result};

/// Default date pattern, e.g. `Oct 18, 2026 22:19:03`.
pub const DEFAULT_DATE_FORMAT: &str = "[month repr:short] [day], [year] [hour]:[minute]:[second]";

/// Default width of the module column.
pub const DEFAULT_MODULE_WIDTH: usize = 30;

/// Escape that restores the default foreground color.
pub const RESET: &str = "\u{1b}[39m";

/// Details of an error attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Short type name of the error, without module path or generics.
    pub type_name: String,
    /// `Display` output of the error.
    pub message: String,
    /// Function the error was reported from, when known.
    pub function: Option<String>,
    /// Line the error was reported from.
    pub line: u32,
    /// `Display` output of each `source()` in the chain.
    pub causes: Vec<String>,
}

impl ExceptionInfo {
    /// Capture `err` and its `source()` chain. Trait objects report their
    /// trait name, since the concrete type is erased.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E, line: u32) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            type_name: short_type_name(std::any::type_name::<E>()).to_string(),
            message: err.to_string(),
            function: None,
            line,
            causes,
        }
    }

    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// `<Type>: <message> in <function>() on line <line>`
    pub fn summary(&self) -> String {
        match &self.function {
            Some(function) => format!(
                "{}: {} in {}() on line {}",
                self.type_name, self.message, function, self.line
            ),
            None => format!("{}: {} on line {}", self.type_name, self.message, self.line),
        }
    }
}

fn short_type_name(full: &str) -> &str {
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let base = full.split(['<', ' ']).next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// One log event, created per call and consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: OffsetDateTime,
    pub level: Level,
    pub process_id: u32,
    pub thread_name: String,
    /// Source file of the call site.
    pub file: String,
    /// Source line of the call site.
    pub line: u32,
    pub message: String,
    pub exception: Option<ExceptionInfo>,
}

impl LogRecord {
    /// Capture a record for the given source location on the current thread.
    pub fn new(level: Level, message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        let thread = std::thread::current();
        let thread_name = match thread.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", thread.id()),
        };

        Self {
            timestamp: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
            level,
            process_id: std::process::id(),
            thread_name,
            file: file.into(),
            line,
            message: message.into(),
            exception: None,
        }
    }

    /// Capture a record attributed to the caller's source location.
    #[track_caller]
    pub fn here(level: Level, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self::new(level, message, location.file(), location.line())
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Same metadata, different message.
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self.clone()
        }
    }
}

/// ANSI color per severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    codes: [String; 5],
}

impl ColorTable {
    pub fn get(&self, level: Level) -> &str {
        &self.codes[Self::slot(level)]
    }

    pub fn with(mut self, level: Level, code: impl Into<String>) -> Self {
        self.codes[Self::slot(level)] = code.into();
        self
    }

    fn slot(level: Level) -> usize {
        match level {
            Level::Debug => 0,
            Level::Info => 1,
            Level::Warning => 2,
            Level::Error => 3,
            Level::Critical => 4,
        }
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self {
            codes: [
                "\u{1b}[38;5;244m".to_string(), // gray
                "\u{1b}[38;5;46m".to_string(),  // green
                "\u{1b}[38;5;11m".to_string(),  // yellow
                "\u{1b}[38;5;208m".to_string(), // orange
                "\u{1b}[38;5;196m".to_string(), // red
            ],
        }
    }
}

/// Immutable settings of a [`Formatter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterConfig {
    /// `time` format description for the timestamp. `None` uses [`DEFAULT_DATE_FORMAT`].
    pub date_format: Option<String>,
    /// Custom record template. Recognised placeholders: `{asctime}`, `{msecs}`,
    /// `{levelname}`, `{process}`, `{thread}`, `{module}`, `{lineno}` and
    /// `{message}`. `None` uses the fixed column layout.
    pub template: Option<String>,
    /// Width of the module column; longer names are cut with an ellipsis.
    pub module_width: usize,
    /// Path component after which source paths become module names.
    pub package_root: String,
    pub colors: ColorTable,
    /// Keep multi-line error details instead of collapsing them.
    pub traceback: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            template: None,
            module_width: DEFAULT_MODULE_WIDTH,
            package_root: settings().product.to_string(),
            colors: ColorTable::default(),
            traceback: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Asctime,
    Msecs,
    Levelname,
    Process,
    Thread,
    Module,
    Lineno,
    Message,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "asctime" => Self::Asctime,
            "msecs" => Self::Msecs,
            "levelname" => Self::Levelname,
            "process" => Self::Process,
            "thread" => Self::Thread,
            "module" => Self::Module,
            "lineno" => Self::Lineno,
            "message" => Self::Message,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| Error::invalid("format", "unclosed '{' in template"))?;
        let name = &after[..close];
        let field = Field::parse(name)
            .ok_or_else(|| Error::invalid("format", format!("unknown placeholder {{{}}}", name)))?;
        segments.push(Segment::Field(field));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Ok(segments)
}

/// Stateless renderer, shared read-only between loggers and threads.
#[derive(Debug)]
pub struct Formatter {
    config: FormatterConfig,
    date_items: OwnedFormatItem,
    template: Option<Vec<Segment>>,
}

impl Formatter {
    pub fn new(config: FormatterConfig) -> Result<Self> {
        let pattern = config.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
        let date_items = format_description::parse_owned::<1>(pattern)
            .map_err(|e| Error::invalid("date_format", e.to_string()))?;
        let template = config.template.as_deref().map(parse_template).transpose()?;

        Ok(Self {
            config,
            date_items,
            template,
        })
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Render `record` as text without a line terminator.
    ///
    /// Unless traceback pass-through is enabled the result never contains a
    /// line break.
    pub fn render(&self, record: &LogRecord) -> Result<String> {
        self.render_with(record, false)
    }

    /// Like [`render`](Self::render), with the level name wrapped in its color.
    /// Only the level field is colored, never the message.
    pub fn render_colored(&self, record: &LogRecord) -> Result<String> {
        self.render_with(record, true)
    }

    fn render_with(&self, record: &LogRecord, colored: bool) -> Result<String> {
        let asctime = record.timestamp.format(&self.date_items)?;
        let module = self.module_name(&record.file);
        let message = self.message(record);

        let mut line = match &self.template {
            None => format!(
                "{}.{:03} {} {:07} [{:>15}] {:>width$}:{:04} : {}",
                asctime,
                record.timestamp.millisecond(),
                self.level_field(format!("{:>8}", record.level), record.level, colored),
                record.process_id,
                record.thread_name,
                module,
                record.line,
                message,
                width = self.config.module_width,
            ),
            Some(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(text) => out.push_str(text),
                        Segment::Field(Field::Asctime) => out.push_str(&asctime),
                        Segment::Field(Field::Msecs) => {
                            out.push_str(&format!("{:03}", record.timestamp.millisecond()))
                        }
                        Segment::Field(Field::Levelname) => out.push_str(&self.level_field(
                            record.level.as_str().to_string(),
                            record.level,
                            colored,
                        )),
                        Segment::Field(Field::Process) => {
                            out.push_str(&record.process_id.to_string())
                        }
                        Segment::Field(Field::Thread) => out.push_str(&record.thread_name),
                        Segment::Field(Field::Module) => out.push_str(&module),
                        Segment::Field(Field::Lineno) => out.push_str(&record.line.to_string()),
                        Segment::Field(Field::Message) => out.push_str(&message),
                    }
                }
                out
            }
        };

        if !self.config.traceback {
            line = collapse_lines(&line);
        } else if let Some(exception) = &record.exception {
            line.push_str(&format!("\n{}: {}", exception.type_name, exception.message));
            for cause in &exception.causes {
                line.push_str(&format!("\n  caused by: {}", cause));
            }
        }
        Ok(line)
    }

    /// `field` holds the (possibly padded) level name and nothing else.
    fn level_field(&self, field: String, level: Level, colored: bool) -> String {
        if !colored {
            return field;
        }
        let name = level.as_str();
        let wrapped = format!("{}{}{}", self.config.colors.get(level), name, RESET);
        field.replacen(name, &wrapped, 1)
    }

    fn message(&self, record: &LogRecord) -> String {
        match (&record.exception, self.config.traceback) {
            (Some(exception), false) if record.message.is_empty() => exception.summary(),
            (Some(exception), false) => format!("{} - {}", record.message, exception.summary()),
            _ => record.message.clone(),
        }
    }

    fn module_name(&self, file: &str) -> String {
        let module = module_path(file, &self.config.package_root);
        let width = self.config.module_width;
        if module.chars().count() > width {
            let kept: String = module.chars().take(width.saturating_sub(3)).collect();
            format!("{}...", kept)
        } else {
            module
        }
    }
}

fn collapse_lines(text: &str) -> String {
    if !text.contains(['\n', '\r']) {
        return text.to_string();
    }
    text.split(['\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dotted module name for a source path.
///
/// Everything up to and including `package_root` (and a directly following
/// `src`) is dropped; without `package_root` in the path, everything up to the
/// last `src` component is dropped. The extension of the file is removed.
pub fn module_path(file: &str, package_root: &str) -> String {
    let parts: Vec<&str> = Path::new(file)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    let start = match parts.iter().position(|p| *p == package_root) {
        Some(root) if parts.get(root + 1) == Some(&"src") => root + 2,
        Some(root) => root + 1,
        None => parts.iter().rposition(|p| *p == "src").map_or(0, |i| i + 1),
    };

    let rest = if start < parts.len() {
        &parts[start..]
    } else {
        &parts[parts.len().saturating_sub(1)..]
    };
    let Some((last, dirs)) = rest.split_last() else {
        return String::new();
    };

    let stem = Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(last);
    dirs.iter()
        .copied()
        .chain(std::iter::once(stem))
        .collect::<Vec<_>>()
        .join(".")
}
