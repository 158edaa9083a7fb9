//! Basic console logging example.
//!
//! Logs through a [`kaamiki::Logger`] directly, then through `tracing`
//! after installing the same kind of logger as the global subscriber.

use std::io;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = kaamiki::builder()
        .with_name("basic")
        .with_level("INFO")
        .with_file(false)
        .build_logger()?;

    logger.debug("This is a debug message (filtered out)")?;
    logger.info("This is an info message")?;
    logger.warning("This is a warning message\nspanning two lines")?;

    let err = io::Error::new(io::ErrorKind::NotFound, "settings.toml is missing");
    logger.exception("Could not load settings", &err)?;

    kaamiki::builder().with_file(false).init()?;

    tracing::info!("This goes through the tracing layer");
    tracing::warn!(user = "alice", attempts = 3, "Login throttled");

    Ok(())
}
