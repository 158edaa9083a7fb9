use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use kaamiki::rotation::{backup_path, scan_backups};
use kaamiki::{Console, FileSink, LogConfig, Logger, RotationConfig};

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

fn quiet_logger(config: LogConfig) -> Logger {
    kaamiki::LogBuilder::from_config(config)
        .with_console(Arc::new(Console::from_writer(io::sink(), false)))
        .build_logger()
        .expect("build logger")
}

#[test]
fn test_file_output_has_no_ansi_while_console_is_colored() {
    let dir = tempfile::tempdir().unwrap();
    let captured = Captured::default();
    let logger = kaamiki::builder()
        .with_path(dir.path())
        .with_name("colors")
        .with_console(Arc::new(Console::from_writer(captured.clone(), true)))
        .build_logger()
        .unwrap();

    logger.error("disk failure").unwrap();

    let console = captured.text();
    assert!(console.contains("\u{1b}[38;5;208mERROR\u{1b}[39m"));

    let file = fs::read_to_string(logger.file_path().unwrap()).unwrap();
    assert!(file.contains("disk failure"));
    assert!(!file.contains('\u{1b}'), "ANSI escape found in log file");
}

#[test]
fn test_threshold_filters_lower_levels() {
    let dir = tempfile::tempdir().unwrap();
    let logger = quiet_logger(
        LogConfig::new()
            .with_path(dir.path())
            .with_name("threshold")
            .with_level("WARNING"),
    );

    logger.debug("d").unwrap();
    logger.info("i").unwrap();
    logger.warning("w").unwrap();
    logger.error("e").unwrap();

    let lines = FileSink::read_all(logger.file_path().unwrap()).unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(" WARNING ") && lines[0].ends_with(" : w"));
    assert!(lines[1].contains("   ERROR ") && lines[1].ends_with(" : e"));
}

#[test]
fn test_warning_threshold_applies_to_console_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let captured = Captured::default();
    let logger = kaamiki::builder()
        .with_path(dir.path())
        .with_name("both_sinks")
        .with_level("WARNING")
        .with_console(Arc::new(Console::from_writer(captured.clone(), false)))
        .build_logger()
        .unwrap();

    logger.info("x").unwrap();
    assert!(captured.text().is_empty());
    assert_eq!(fs::read_to_string(logger.file_path().unwrap()).unwrap(), "");

    logger.error("y").unwrap();
    let console = captured.text();
    let file = fs::read_to_string(logger.file_path().unwrap()).unwrap();
    assert_eq!(console, file);
    assert_eq!(file.lines().count(), 1);
    assert!(file.contains("   ERROR ") && file.ends_with(" : y\n"));
}

#[test]
fn test_multi_line_message_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let logger = quiet_logger(LogConfig::new().with_path(dir.path()).with_name("multi"));

    logger.info("alpha\nbeta\ngamma").unwrap();

    let lines = FileSink::read_all(logger.file_path().unwrap()).unwrap();
    let messages: Vec<&str> = lines
        .iter()
        .map(|l| l.rsplit_once(" : ").unwrap().1)
        .collect();
    assert_eq!(messages, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_size_rotation_moves_first_records_to_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sized.log");
    let sink = FileSink::open(&path, true, RotationConfig::size(100, 0)).unwrap();

    // 19 characters plus the terminator: five records fill the threshold exactly
    for i in 0..7 {
        sink.write(&format!("record number {:05}", i)).unwrap();
    }

    let first = fs::read_to_string(backup_path(&path, 1)).unwrap();
    assert_eq!(first.lines().count(), 5);
    assert!(first.starts_with("record number 00000\n"));

    let active = fs::read_to_string(&path).unwrap();
    assert_eq!(active, "record number 00005\nrecord number 00006\n");
}

#[test]
fn test_line_rotation_through_logger() {
    let dir = tempfile::tempdir().unwrap();
    let logger = quiet_logger(
        LogConfig::new()
            .with_path(dir.path())
            .with_name("lines")
            .with_line_rotation(3, 0),
    );

    for i in 0..7 {
        logger.info(format!("event {}", i)).unwrap();
    }

    let path = logger.file_path().unwrap();
    assert_eq!(scan_backups(path).unwrap(), vec![1, 2]);
    assert_eq!(fs::read_to_string(backup_path(path, 2)).unwrap().lines().count(), 3);
    assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 1);
    assert_eq!(FileSink::read_all(path).unwrap().len(), 7);
}

#[test]
fn test_retention_keeps_only_newest_backups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kept.log");
    let sink = FileSink::open(&path, true, RotationConfig::size(20, 2)).unwrap();

    for i in 0..6 {
        sink.write(&format!("rotate each time {:02}", i)).unwrap();
    }

    assert_eq!(scan_backups(&path).unwrap(), vec![5, 6]);
    assert_eq!(sink.rotation_state().next_index, 7);
    let newest = fs::read_to_string(backup_path(&path, 6)).unwrap();
    assert_eq!(newest, "rotate each time 05\n");
}

#[test]
fn test_failed_prune_does_not_fail_the_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stubborn.log");
    // A directory where the oldest backup should be cannot be removed as a file
    let blocker = backup_path(&path, 1);
    fs::create_dir(&blocker).unwrap();
    fs::write(blocker.join("keep"), "x").unwrap();

    let sink = FileSink::open(&path, true, RotationConfig::size(20, 1)).unwrap();
    assert_eq!(sink.rotation_state().next_index, 2);

    sink.write("rotate each time 00").unwrap();
    sink.write("rotate each time 01").unwrap();

    assert!(blocker.is_dir());
    assert_eq!(scan_backups(&path).unwrap(), vec![1, 3]);
    assert_eq!(
        fs::read_to_string(backup_path(&path, 3)).unwrap(),
        "rotate each time 01\n"
    );
}

#[test]
fn test_backup_indices_continue_across_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.log");

    let sink = FileSink::open(&path, true, RotationConfig::size(10, 0)).unwrap();
    sink.write("first run").unwrap();
    sink.write("first run").unwrap();
    sink.close().unwrap();
    assert_eq!(scan_backups(&path).unwrap(), vec![1, 2]);

    let sink = FileSink::open(&path, true, RotationConfig::size(10, 0)).unwrap();
    sink.write("second run").unwrap();
    assert_eq!(scan_backups(&path).unwrap(), vec![1, 2, 3]);
    assert_eq!(
        fs::read_to_string(backup_path(&path, 3)).unwrap(),
        "second run\n"
    );
}

#[test]
fn test_concurrent_writers_lose_and_duplicate_nothing() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 1000;
    const MAX_BYTES: u64 = 4096;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("busy.log");
    let sink = Arc::new(FileSink::open(&path, true, RotationConfig::size(MAX_BYTES, 0)).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    sink.write(&format!("thread-{}-record-{:04}", t, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    sink.close().unwrap();

    let lines = FileSink::read_all(&path).unwrap();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    let unique: HashSet<&String> = lines.iter().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);

    // Per-thread order survives rotation
    for t in 0..THREADS {
        let prefix = format!("thread-{}-", t);
        let own: Vec<&String> = lines.iter().filter(|l| l.starts_with(&prefix)).collect();
        assert!(own.windows(2).all(|w| w[0] < w[1]));
    }

    // Every record is 21 bytes with its terminator, so each backup holds the
    // smallest number of records reaching the threshold.
    let record_bytes = lines[0].len() as u64 + 1;
    assert!(lines.iter().all(|l| l.len() as u64 + 1 == record_bytes));
    let per_backup = MAX_BYTES.div_ceil(record_bytes);
    let total = (THREADS * PER_THREAD) as u64;

    let backups = scan_backups(&path).unwrap();
    assert_eq!(backups, (1..=total / per_backup).collect::<Vec<_>>());
    for index in &backups {
        let size = fs::metadata(backup_path(&path, *index)).unwrap().len();
        assert_eq!(size, per_backup * record_bytes);
    }
    assert_eq!(
        fs::metadata(&path).unwrap().len(),
        (total % per_backup) * record_bytes
    );
}
