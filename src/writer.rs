use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;

use crate::rotation::{self, Rollover, RotationConfig, RotationMode, RotationState};
use crate::{Error, Result};

/// State of the current log file.
#[derive(Debug)]
struct FileState {
    /// The open file handle; `None` until the first write when opening is deferred.
    file: Option<File>,
    /// Size, line and index bookkeeping for rotation.
    rotation: RotationState,
    /// Truncate instead of append when the handle is first opened.
    truncate: bool,
    closed: bool,
    /// Set when the active file vanished under us; the sink is unusable afterwards.
    corrupt: bool,
}

/// A file sink that appends lines and rotates the file by size, line count or time.
///
/// Appending a line, deciding to rotate and renaming the file happen under one
/// lock, so concurrent writers never observe a half-finished rotation.
#[derive(Debug)]
pub struct FileSink {
    /// Path of the active log file.
    path: PathBuf,
    config: RotationConfig,
    /// Current file state, protected by mutex.
    state: Mutex<FileState>,
}

impl FileSink {
    /// Open a sink at `path`, creating parent directories as needed.
    ///
    /// With `append` false an existing file is truncated.
    pub fn open(path: impl AsRef<Path>, append: bool, config: RotationConfig) -> Result<Self> {
        Self::open_with(path, append, config, false)
    }

    /// Like [`FileSink::open`], optionally deferring file creation until the first write.
    pub fn open_with(
        path: impl AsRef<Path>,
        append: bool,
        config: RotationConfig,
        delay: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists (create if necessary).
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let (size, line_count) = if append && path.exists() {
            existing_counts(&path, config.mode == RotationMode::Lines)?
        } else {
            (0, 0)
        };
        let rotation = RotationState::new(&path, &config, size, line_count, OffsetDateTime::now_utc())?;

        let mut state = FileState {
            file: None,
            rotation,
            truncate: !append,
            closed: false,
            corrupt: false,
        };
        if !delay {
            state.file = Some(open_file(&path, state.truncate)?);
            state.truncate = false;
        }
        tracing::debug!(path = %path.display(), mode = ?config.mode, "opened log file sink");

        Ok(Self {
            path,
            config,
            state: Mutex::new(state),
        })
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Snapshot of the rotation bookkeeping.
    pub fn rotation_state(&self) -> RotationState {
        self.lock().rotation.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Append `record` plus a line terminator, flush, then rotate if a
    /// threshold has been reached.
    ///
    /// When rotation happens the record is already in the file that became
    /// the backup. Rotation diagnostics are emitted after the lock is released,
    /// so a subscriber writing back into this sink cannot deadlock.
    pub fn write(&self, record: &str) -> Result<()> {
        let rollover = {
            let mut guard = self.lock();
            self.append(&mut guard, record)?
        };
        if let Some(rollover) = rollover {
            rollover.report(&self.path);
        }
        Ok(())
    }

    fn append(&self, state: &mut FileState, record: &str) -> Result<Option<Rollover>> {
        if state.closed {
            return Err(Error::ClosedSink {
                path: self.path.clone(),
            });
        }
        if state.corrupt {
            return Err(Error::RotationCorruption {
                path: self.path.clone(),
            });
        }

        if state.file.is_none() {
            state.file = Some(open_file(&self.path, state.truncate)?);
            state.truncate = false;
        }
        let file = state.file.as_mut().ok_or_else(|| Error::ClosedSink {
            path: self.path.clone(),
        })?;

        let mut line = String::with_capacity(record.len() + 1);
        line.push_str(record);
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()?;

        state.rotation.size += line.len() as u64;
        state.rotation.line_count += line.matches('\n').count() as u64;

        let now = OffsetDateTime::now_utc();
        if !rotation::should_rotate(&state.rotation, &self.config, now) {
            return Ok(None);
        }

        // Close current file (drop it)
        state.file = None;
        let rollover = match rotation::roll_over(&state.rotation, &self.config, now) {
            Ok(rollover) => rollover,
            Err(err) => {
                if matches!(err, Error::RotationCorruption { .. }) {
                    state.corrupt = true;
                }
                return Err(err);
            }
        };
        state.rotation = rollover.state.clone();
        state.file = Some(open_file(&self.path, false)?);
        Ok(Some(rollover))
    }

    /// Flush buffered data to the OS. No `fsync` is performed.
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.lock();
        if guard.closed {
            return Err(Error::ClosedSink {
                path: self.path.clone(),
            });
        }
        if let Some(file) = guard.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    /// Flush and release the file handle. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        {
            let mut guard = self.lock();
            if guard.closed {
                return Ok(());
            }
            guard.closed = true;
            if let Some(mut file) = guard.file.take() {
                file.flush()?;
            }
        }
        tracing::debug!(path = %self.path.display(), "closed log file sink");
        Ok(())
    }

    /// Read every line written through a sink at `path`: numbered backups in
    /// ascending order, then the active file.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let mut files: Vec<PathBuf> = rotation::scan_backups(path)?
            .into_iter()
            .map(|index| rotation::backup_path(path, index))
            .collect();
        if path.exists() {
            files.push(path.to_path_buf());
        }

        let mut lines = Vec::new();
        for file in files {
            let content = fs::read_to_string(&file)?;
            lines.extend(content.lines().map(str::to_string));
        }
        Ok(lines)
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_file(path: &Path, truncate: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options.open(path)
}

/// Size of an existing file and, when asked for, its line count.
fn existing_counts(path: &Path, count_lines: bool) -> io::Result<(u64, u64)> {
    let size = path.metadata()?.len();
    if !count_lines {
        return Ok((size, 0));
    }

    let mut file = File::open(path)?;
    let mut buf = [0u8; 8192];
    let mut lines = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        lines += buf[..n].iter().filter(|b| **b == b'\n').count() as u64;
    }
    Ok((size, lines))
}
