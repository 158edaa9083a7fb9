use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::{Error, Result};

/// Parse a size string with optional units (B/K/M/G, case-insensitive), defaulting to bytes.
fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let Some(last) = s.chars().last() else {
        return Err("empty size string".to_string());
    };

    let (num_str, unit) = if last.is_alphabetic() {
        (&s[..s.len() - last.len_utf8()], last.to_ascii_uppercase())
    } else {
        (s, 'B')
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier = match unit {
        'B' => 1,
        'K' => 1024,
        'M' => 1024 * 1024,
        'G' => 1024 * 1024 * 1024,
        _ => return Err(format!("invalid unit: {}, supported: B/K/M/G", unit)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size too large".to_string())
}

/// Size value that can be a number or string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(u64),
    String(String),
}

/// Deserialize a byte count written either as a number or as `"5M"`-style text.
pub(crate) fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(de::Error::custom),
    }
}

/// Which threshold decides when the active file rolls over.
///
/// Exactly one mode is active per sink; modes are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Never rotate.
    #[default]
    None,
    /// Rotate once the file reaches `max_bytes`.
    Size,
    /// Rotate once the file holds `max_lines` lines.
    Lines,
    /// Rotate on a wall-clock schedule.
    Time,
}

impl FromStr for RotationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "never" => Ok(Self::None),
            "size" => Ok(Self::Size),
            "lines" => Ok(Self::Lines),
            "time" => Ok(Self::Time),
            other => Err(Error::invalid(
                "rotate_by",
                format!("{:?} is not a rotation mode; use size, lines or time", other),
            )),
        }
    }
}

/// Unit of a time-based rotation schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Seconds,
    Minutes,
    Hours,
    Days,
    /// At midnight, or at the configured time of day.
    Midnight,
    /// On a weekday, 0 = Monday.
    Weekday(u8),
}

impl When {
    fn unit(&self) -> Duration {
        match self {
            Self::Seconds => Duration::SECOND,
            Self::Minutes => Duration::MINUTE,
            Self::Hours => Duration::HOUR,
            Self::Days | Self::Midnight => Duration::DAY,
            Self::Weekday(_) => Duration::WEEK,
        }
    }
}

impl FromStr for When {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "S" => Ok(Self::Seconds),
            "M" => Ok(Self::Minutes),
            "H" => Ok(Self::Hours),
            "D" => Ok(Self::Days),
            "MIDNIGHT" => Ok(Self::Midnight),
            w if w.len() == 2 && w.starts_with('W') => match w.as_bytes()[1] {
                d @ b'0'..=b'6' => Ok(Self::Weekday(d - b'0')),
                _ => Err(Error::invalid("when", format!("{:?} is not a weekday (W0-W6)", s))),
            },
            _ => Err(Error::invalid(
                "when",
                format!("{:?} is not a rotation interval; use S, M, H, D, midnight or W0-W6", s),
            )),
        }
    }
}

/// When a time-mode sink rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub when: When,
    /// Multiplier applied to the unit of `when`; at least 1.
    pub interval: u32,
    /// Compute day boundaries in UTC instead of the local offset.
    pub utc: bool,
    /// Time of day for `Midnight` and `Weekday` schedules.
    pub at_time: Option<time::Time>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            when: When::Hours,
            interval: 1,
            utc: false,
            at_time: None,
        }
    }
}

impl Schedule {
    pub fn new(when: When, interval: u32) -> Self {
        Self {
            when,
            interval,
            ..Self::default()
        }
    }

    /// Length of one rotation period.
    pub fn period(&self) -> Duration {
        self.when.unit() * self.interval.max(1)
    }

    /// The rollover instant following `now`.
    ///
    /// `previous` is the rollover instant that just fired, if any. Fixed-unit
    /// schedules count from `now`; day-aligned schedules stay on their boundary.
    pub fn next_rollover(
        &self,
        now: OffsetDateTime,
        previous: Option<OffsetDateTime>,
    ) -> OffsetDateTime {
        match self.when {
            When::Seconds | When::Minutes | When::Hours | When::Days => now + self.period(),
            When::Midnight | When::Weekday(_) => match previous {
                Some(previous) => {
                    let mut next = previous + self.period();
                    while next <= now {
                        next += self.period();
                    }
                    next
                }
                None => self.next_boundary(now),
            },
        }
    }

    fn offset(&self) -> UtcOffset {
        if self.utc {
            UtcOffset::UTC
        } else {
            UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
        }
    }

    fn next_boundary(&self, now: OffsetDateTime) -> OffsetDateTime {
        let local = now.to_offset(self.offset());
        let mut candidate = local.replace_time(self.at_time.unwrap_or(time::Time::MIDNIGHT));
        match self.when {
            When::Weekday(day) => {
                let today = local.weekday().number_days_from_monday();
                let ahead = (i64::from(day) - i64::from(today)).rem_euclid(7);
                candidate += Duration::days(ahead);
                if candidate <= local {
                    candidate += Duration::WEEK;
                }
            }
            _ => {
                if candidate <= local {
                    candidate += Duration::DAY;
                }
            }
        }
        candidate
    }
}

/// Immutable rotation settings of one sink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RotationConfig {
    pub mode: RotationMode,
    /// Size threshold in bytes; 0 disables.
    pub max_bytes: u64,
    /// Line threshold; 0 disables.
    pub max_lines: u64,
    /// Only consulted in [`RotationMode::Time`].
    pub schedule: Schedule,
    /// Backups to keep; 0 keeps all of them.
    pub backups: usize,
}

impl RotationConfig {
    /// Create a config that never rotates.
    pub fn never() -> Self {
        Self::default()
    }

    /// Create a size-based rotation config.
    pub fn size(max_bytes: u64, backups: usize) -> Self {
        Self {
            mode: RotationMode::Size,
            max_bytes,
            backups,
            ..Self::default()
        }
    }

    /// Create a line-count rotation config.
    pub fn lines(max_lines: u64, backups: usize) -> Self {
        Self {
            mode: RotationMode::Lines,
            max_lines,
            backups,
            ..Self::default()
        }
    }

    /// Create a time-based rotation config.
    pub fn time(schedule: Schedule, backups: usize) -> Self {
        Self {
            mode: RotationMode::Time,
            schedule,
            backups,
            ..Self::default()
        }
    }
}

/// Mutable bookkeeping for the active file of one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationState {
    /// Path of the active file.
    pub path: PathBuf,
    /// Bytes in the active file.
    pub size: u64,
    /// Lines in the active file.
    pub line_count: u64,
    /// When the active file was opened or last rotated.
    pub last_rotation: OffsetDateTime,
    /// Scheduled rollover instant, time mode only.
    pub next_rollover: Option<OffsetDateTime>,
    /// Index the next backup will be renamed to. Never decreases.
    pub next_index: u64,
}

impl RotationState {
    /// Fresh state for `path`, continuing after any backups already on disk.
    ///
    /// Fails when the directory holding `path` cannot be listed, since the
    /// next backup index would otherwise overwrite an existing backup.
    pub fn new(
        path: impl Into<PathBuf>,
        config: &RotationConfig,
        size: u64,
        line_count: u64,
        now: OffsetDateTime,
    ) -> io::Result<Self> {
        let path = path.into();
        let next_index = scan_backups(&path)?.last().map_or(1, |max| max + 1);
        Ok(Self {
            path,
            size,
            line_count,
            last_rotation: now,
            next_rollover: schedule_for(config, now, None),
            next_index,
        })
    }
}

fn schedule_for(
    config: &RotationConfig,
    now: OffsetDateTime,
    previous: Option<OffsetDateTime>,
) -> Option<OffsetDateTime> {
    (config.mode == RotationMode::Time).then(|| config.schedule.next_rollover(now, previous))
}

/// Decide whether the active file must roll over after a write.
pub fn should_rotate(state: &RotationState, config: &RotationConfig, now: OffsetDateTime) -> bool {
    match config.mode {
        RotationMode::None => false,
        RotationMode::Size => config.max_bytes > 0 && state.size >= config.max_bytes,
        RotationMode::Lines => config.max_lines > 0 && state.line_count + 1 > config.max_lines,
        RotationMode::Time => state.next_rollover.is_some_and(|at| now >= at),
    }
}

/// The state of a freshly rotated, empty active file.
pub fn advance(state: &RotationState, config: &RotationConfig, now: OffsetDateTime) -> RotationState {
    RotationState {
        path: state.path.clone(),
        size: 0,
        line_count: 0,
        last_rotation: now,
        next_rollover: schedule_for(config, now, state.next_rollover),
        next_index: state.next_index + 1,
    }
}

/// Outcome of one rollover.
///
/// Nothing is logged while rotating; the sink reports this once its lock is
/// released.
#[derive(Debug)]
pub struct Rollover {
    /// State of the new, empty active file.
    pub state: RotationState,
    /// Where the previous active file now lives.
    pub backup: PathBuf,
    pub prune: PruneReport,
}

impl Rollover {
    /// Emit the rotate and prune diagnostics.
    pub fn report(&self, from: &Path) {
        tracing::debug!(from = %from.display(), to = %self.backup.display(), "rotated log file");
        self.prune.report();
    }
}

/// Result of a best-effort prune.
#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: usize,
    /// Backups (or the directory being listed) that could not be removed.
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl PruneReport {
    pub fn report(&self) {
        for (path, err) in &self.failures {
            tracing::warn!(path = %path.display(), error = %err, "failed to prune log backup");
        }
    }
}

/// Rename the (already closed) active file to its next backup and prune old
/// backups.
///
/// The caller reopens the active path afterwards.
pub fn roll_over(
    state: &RotationState,
    config: &RotationConfig,
    now: OffsetDateTime,
) -> Result<Rollover> {
    if !state.path.exists() {
        return Err(Error::RotationCorruption {
            path: state.path.clone(),
        });
    }

    let backup = backup_path(&state.path, state.next_index);
    fs::rename(&state.path, &backup)?;

    let next = advance(state, config, now);
    let prune = prune_backups(&next.path, next.next_index, config.backups);
    Ok(Rollover {
        state: next,
        backup,
        prune,
    })
}

/// `<path>.<index>`
pub fn backup_path(path: &Path, index: u64) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), index))
}

/// Indices of the numbered backups of `path` currently on disk, ascending.
pub fn scan_backups(path: &Path) -> io::Result<Vec<u64>> {
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(Vec::new());
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        return Ok(Vec::new());
    }

    let prefix = format!("{}.", file_name);
    let mut indices: Vec<u64> = fs::read_dir(parent)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix(&prefix)?.parse::<u64>().ok()
        })
        .filter(|index| *index > 0)
        .collect();
    indices.sort_unstable();
    Ok(indices)
}

/// Delete backups more than `retention` generations old. Best effort:
/// failures are collected and skipped.
pub fn prune_backups(path: &Path, next_index: u64, retention: usize) -> PruneReport {
    let mut report = PruneReport::default();
    if retention == 0 {
        return report;
    }
    let cutoff = next_index.saturating_sub(retention as u64 + 1);
    if cutoff == 0 {
        return report;
    }

    let indices = match scan_backups(path) {
        Ok(indices) => indices,
        Err(err) => {
            report.failures.push((path.to_path_buf(), err));
            return report;
        }
    };

    for index in indices.into_iter().filter(|i| *i <= cutoff) {
        let backup = backup_path(path, index);
        match fs::remove_file(&backup) {
            Ok(()) => report.removed += 1,
            Err(err) => report.failures.push((backup, err)),
        }
    }
    report
}
