use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::macros::format_description;

use crate::format::FormatterConfig;
use crate::level::{Level, LevelSpec};
use crate::rotation::{RotationConfig, RotationMode, Schedule, When, deserialize_size};
use crate::settings::{ENCODING, LOG_SUFFIX, settings};
use crate::validate::strip_punctuation;
use crate::{Error, Result};

/// Configuration for a [`Logger`](crate::Logger).
///
/// Every field has a default, so a partial YAML or TOML document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level, as a name (`"WARNING"`) or a number (`30`).
    pub level: LevelSpec,
    /// Log file stem; derived from the running program when absent.
    pub name: Option<String>,
    /// Directory for the log file; `~/.kaamiki/<user>/logs` when absent.
    pub path: Option<PathBuf>,
    /// Colorize level names on the console.
    pub colored: bool,
    /// Keep multi-line error details instead of a one-line summary.
    pub traceback: bool,
    /// Custom record template.
    pub format: Option<String>,
    /// Custom timestamp pattern (`time` format description).
    pub date_format: Option<String>,
    /// Write to a file at all.
    pub to_file: bool,
    /// Rotate the log file.
    pub rotate: bool,
    /// `size`, `lines` or `time`.
    pub rotate_by: String,
    /// Size threshold; a number of bytes or a string such as `"5M"`.
    #[serde(deserialize_with = "deserialize_size")]
    pub max_bytes: u64,
    /// Line threshold.
    pub max_lines: u64,
    /// Time unit: `S`, `M`, `H`, `D`, `midnight` or `W0`-`W6`.
    pub when: String,
    pub interval: u32,
    pub utc: bool,
    /// Time of day (`HH:MM[:SS]`) for `midnight` and weekday rotation.
    pub at_time: Option<String>,
    /// Backups to keep; 0 keeps all of them.
    pub backups: usize,
    /// Only UTF-8 is supported.
    pub encoding: Option<String>,
    /// Defer creating the file until the first record.
    pub delay: bool,
}

impl LogConfig {
    /// Create a new LogConfig with defaults
    pub fn new() -> Self {
        Self {
            level: LevelSpec::default(),
            name: None,
            path: None,
            colored: true,
            traceback: false,
            format: None,
            date_format: None,
            to_file: true,
            rotate: true,
            rotate_by: default_rotate_by(),
            max_bytes: 0,
            max_lines: 0,
            when: default_when(),
            interval: 1,
            utc: false,
            at_time: None,
            backups: 0,
            encoding: None,
            delay: false,
        }
    }

    /// Set log level
    pub fn with_level(mut self, level: impl Into<LevelSpec>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the log file stem
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the log directory
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_colored(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn with_traceback(mut self, traceback: bool) -> Self {
        self.traceback = traceback;
        self
    }

    /// Set a custom record template
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = Some(date_format.into());
        self
    }

    /// Enable or disable the file sink
    pub fn with_file(mut self, to_file: bool) -> Self {
        self.to_file = to_file;
        self
    }

    /// Rotate by size once the file holds `max_bytes`
    pub fn with_size_rotation(mut self, max_bytes: u64, backups: usize) -> Self {
        self.rotate = true;
        self.rotate_by = "size".to_string();
        self.max_bytes = max_bytes;
        self.backups = backups;
        self
    }

    /// Rotate once the file holds `max_lines` lines
    pub fn with_line_rotation(mut self, max_lines: u64, backups: usize) -> Self {
        self.rotate = true;
        self.rotate_by = "lines".to_string();
        self.max_lines = max_lines;
        self.backups = backups;
        self
    }

    /// Rotate every `interval` units of `when`
    pub fn with_time_rotation(mut self, when: impl Into<String>, interval: u32, backups: usize) -> Self {
        self.rotate = true;
        self.rotate_by = "time".to_string();
        self.when = when.into();
        self.interval = interval;
        self.backups = backups;
        self
    }

    pub fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_delay(mut self, delay: bool) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Validated minimum level.
    pub fn resolve_level(&self) -> Result<Level> {
        self.level.resolve()
    }

    /// Validated rotation settings.
    pub fn rotation(&self) -> Result<RotationConfig> {
        if !self.rotate {
            return Ok(RotationConfig::never());
        }

        match self.rotate_by.parse::<RotationMode>()? {
            RotationMode::None => Ok(RotationConfig::never()),
            RotationMode::Size => Ok(RotationConfig::size(self.max_bytes, self.backups)),
            RotationMode::Lines => Ok(RotationConfig::lines(self.max_lines, self.backups)),
            RotationMode::Time => {
                if self.interval == 0 {
                    return Err(Error::invalid("interval", "must be at least 1"));
                }
                let schedule = Schedule {
                    when: self.when.parse::<When>()?,
                    interval: self.interval,
                    utc: self.utc,
                    at_time: self.at_time.as_deref().map(parse_time_of_day).transpose()?,
                };
                Ok(RotationConfig::time(schedule, self.backups))
            }
        }
    }

    /// Formatter settings described by this config.
    pub fn formatter(&self) -> FormatterConfig {
        FormatterConfig {
            date_format: self.date_format.clone(),
            template: self.format.clone(),
            traceback: self.traceback,
            ..FormatterConfig::default()
        }
    }

    /// Reject encodings other than [`ENCODING`]; case and dashes are ignored.
    pub fn check_encoding(&self) -> Result<()> {
        let normalize = |enc: &str| enc.to_ascii_lowercase().replace(['-', '_'], "");
        match self.encoding.as_deref() {
            None => Ok(()),
            Some(enc) if normalize(enc) == normalize(ENCODING) => Ok(()),
            Some(enc) => Err(Error::invalid(
                "encoding",
                format!("{:?} is not supported; log files are always {}", enc, ENCODING),
            )),
        }
    }

    /// Sanitized log file stem.
    pub fn logger_name(&self) -> String {
        match &self.name {
            Some(name) => strip_punctuation(name),
            None => strip_punctuation(&program_stem()),
        }
    }

    /// Directory that holds the log file.
    pub fn log_dir(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| settings().logs_dir.clone())
    }

    /// `<log_dir>/<logger_name>.log`
    pub fn file_path(&self) -> PathBuf {
        self.log_dir()
            .join(format!("{}{}", self.logger_name(), LOG_SUFFIX))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_rotate_by() -> String {
    "size".to_string()
}

fn default_when() -> String {
    "h".to_string()
}

fn parse_time_of_day(s: &str) -> Result<time::Time> {
    let s = s.trim();
    time::Time::parse(s, format_description!("[hour]:[minute]:[second]"))
        .or_else(|_| time::Time::parse(s, format_description!("[hour]:[minute]")))
        .map_err(|e| Error::invalid("at_time", format!("{:?}: {}", s, e)))
}

/// Stem of the running program, `console` when it cannot be determined.
fn program_stem() -> String {
    std::env::args_os()
        .next()
        .map(PathBuf::from)
        .or_else(|| std::env::current_exe().ok())
        .and_then(|p| Path::new(&p).file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "console".to_string())
}
