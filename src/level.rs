use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Severity of a log record, ordered from least to most important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Canonical upper-case name, as printed in records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Resolve a numeric level. `0` (NOTSET) lets everything through.
    pub fn from_number(n: i64) -> Result<Self> {
        match n {
            0 | 10 => Ok(Self::Debug),
            20 => Ok(Self::Info),
            30 => Ok(Self::Warning),
            40 => Ok(Self::Error),
            50 => Ok(Self::Critical),
            other => Err(Error::invalid(
                "level",
                format!("{} is not a logging level; use 0, 10, 20, 30, 40 or 50", other),
            )),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` so width/alignment specifiers apply to the name
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOTSET" | "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "FATAL" | "CRITICAL" => Ok(Self::Critical),
            _ => Err(Error::invalid(
                "level",
                format!(
                    "{:?} is not a logging level; choose from CRITICAL, FATAL, ERROR, \
                     WARNING, WARN, INFO, DEBUG and NOTSET",
                    s
                ),
            )),
        }
    }
}

/// A minimum level as written in configuration: a name or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelSpec {
    Number(i64),
    Name(String),
}

impl LevelSpec {
    /// Validate and resolve into a [`Level`].
    pub fn resolve(&self) -> Result<Level> {
        match self {
            Self::Number(n) => Level::from_number(*n),
            Self::Name(name) => name.parse(),
        }
    }
}

impl Default for LevelSpec {
    fn default() -> Self {
        Self::Name("DEBUG".to_string())
    }
}

impl From<Level> for LevelSpec {
    fn from(level: Level) -> Self {
        Self::Name(level.as_str().to_string())
    }
}

impl From<&str> for LevelSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for LevelSpec {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for LevelSpec {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warning,
            tracing::Level::ERROR => Self::Error,
        }
    }
}
