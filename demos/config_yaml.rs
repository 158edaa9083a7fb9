//! Example of loading logging configuration from a YAML file.
//!
//! Run with:
//! ```bash
//! cargo run --example config_yaml
//! ```

use std::collections::HashMap;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = "demos/config.yaml";
    let config_content = fs::read_to_string(config_path)?;

    let root: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&config_content)?;
    let mut config: kaamiki::LogConfig = serde_yaml::from_value(root["log"].clone())?;

    // Keep the demo's files out of the home directory
    let temp_dir = tempfile::tempdir()?;
    config.path = Some(temp_dir.path().to_path_buf());

    let logger = kaamiki::init_logging(&config, None)?;

    tracing::trace!("This is a trace message, shown as DEBUG");
    tracing::debug!("This is a debug message");
    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message");

    tracing::info!(user = "alice", action = "login", "User performed an action");
    tracing::warn!(error_code = 404, path = "/api/users", "Resource not found");

    if let Some(path) = logger.file_path() {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
