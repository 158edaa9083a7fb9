//! Process-wide defaults, resolved once from build constants and the environment.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::validate::strip_punctuation;

/// Directory under the session directory that holds log files.
pub const LOGS_DIR: &str = "logs";

/// Extension given to every log file.
pub const LOG_SUFFIX: &str = ".log";

/// The only text encoding log files are written in.
pub const ENCODING: &str = "utf-8";

/// Character substituted for punctuation in derived names.
pub const SEPARATOR: char = '_';

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

/// Immutable defaults shared by every logger in the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Product name; also the hidden directory name under the home directory.
    pub product: &'static str,
    /// `~/.<product>`
    pub base_dir: PathBuf,
    /// Sanitized login name of the current user.
    pub session_user: String,
    /// `~/.<product>/<session_user>/logs`
    pub logs_dir: PathBuf,
}

impl Settings {
    fn from_env() -> Self {
        let product = env!("CARGO_PKG_NAME");
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let base_dir = home.join(format!(".{}", product));
        let session_user = strip_punctuation(&session_user());
        let logs_dir = base_dir.join(&session_user).join(LOGS_DIR);

        Self {
            product,
            base_dir,
            session_user,
            logs_dir,
        }
    }
}

/// The settings for this process.
pub fn settings() -> &'static Settings {
    &SETTINGS
}

/// Login name from the usual environment variables.
fn session_user() -> String {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}
