//! File rotation example.
//!
//! Writes enough records to roll the log file over several times and lists
//! the backups left on disk.

use kaamiki::rotation::scan_backups;
use kaamiki::{Console, FileSink, LogConfig, Logger};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;

    // Roll over every 1 KiB, keeping the three newest backups
    let config = LogConfig::new()
        .with_path(temp_dir.path())
        .with_name("rotation")
        .with_size_rotation(1024, 3);
    let console = Arc::new(Console::stderr(true));
    let formatter = Arc::new(kaamiki::Formatter::new(config.formatter())?);
    let logger = Logger::with_shared(&config, formatter, console)?;

    for i in 0..100 {
        logger.info(format!("Log message number {}", i))?;
    }

    let Some(log_path) = logger.file_path() else {
        return Ok(());
    };
    println!("Active log file: {}", log_path.display());
    println!("Backups on disk: {:?}", scan_backups(log_path)?);
    println!(
        "Lines still readable: {}",
        FileSink::read_all(log_path)?.len()
    );

    logger.close()?;
    Ok(())
}
