//! Size-triggered rotating log file.
//!
//! # Behavior
//! - Appends to the active file until the next write would exceed `max_bytes`
//! - Rotation renames the active file to `<stem>-<local time>.<ext>` and
//!   opens a fresh one
//! - After each rotation, backups beyond `max_backups` or older than
//!   `max_days` are removed (zero disables either limit)
//! - An active file removed behind the writer's back is recreated on the
//!   next rotation; pruning failures are reported on stderr and never fail
//!   the write that triggered them
//!
//! The writer is synchronous; the logger runs it behind
//! `tracing_appender::non_blocking`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::config::schema::FileRotationConfig;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Timestamp embedded in backup file names.
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Timestamp used as the active file name.
const FILE_NAME_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Limits controlling when the file rotates and what is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub max_days: u32,
    pub max_backups: u32,
}

impl RotationPolicy {
    /// Policy from configuration, with the default size applied.
    pub fn from_config(config: &FileRotationConfig) -> Self {
        Self {
            max_bytes: config.resolved_max_size().saturating_mul(BYTES_PER_MEGABYTE),
            max_days: config.max_days,
            max_backups: config.max_backups,
        }
    }
}

/// Active file name for a logger built at `now`, e.g. `20261019101112.log`.
pub fn generated_file_name(now: &DateTime<Local>) -> String {
    format!("{}.log", now.format(FILE_NAME_TIME_FORMAT))
}

/// Resolve where the rotated file lives.
///
/// The configured file name is replaced by [`generated_file_name`]; only its
/// directory is kept, falling back to the system temp directory.
pub fn resolve_target(config: &FileRotationConfig, now: &DateTime<Local>) -> PathBuf {
    let configured = Path::new(&config.file_name);
    let dir = configured
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    dir.join(generated_file_name(now))
}

/// A file writer that rotates by size.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    file: File,
    size: u64,
}

impl RotatingFile {
    /// Open (or append to) the file at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        if path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("can't use directory {} as log file", path.display()),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            policy,
            file,
            size,
        })
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the active file.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Rotate now, regardless of size.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let backup = self.backup_path(Local::now());
        match fs::rename(&self.path, &backup) {
            Ok(()) => {}
            // Removed externally: nothing to back up.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.file = open_append(&self.path)?;
        self.size = 0;

        if let Err(e) = self.prune() {
            eprintln!("failed to prune backups of {}: {}", self.path.display(), e);
        }
        Ok(())
    }

    /// Backup path for a rotation at `now`, nudged forward on collision.
    fn backup_path(&self, mut now: DateTime<Local>) -> PathBuf {
        loop {
            let candidate = self.with_timestamp(&now.format(BACKUP_TIME_FORMAT).to_string());
            if !candidate.exists() {
                return candidate;
            }
            now += chrono::Duration::milliseconds(1);
        }
    }

    fn with_timestamp(&self, stamp: &str) -> PathBuf {
        let (stem, ext) = self.stem_and_ext();
        let name = match ext {
            Some(ext) => format!("{stem}-{stamp}.{ext}"),
            None => format!("{stem}-{stamp}"),
        };
        self.path.with_file_name(name)
    }

    fn stem_and_ext(&self) -> (String, Option<String>) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
        (stem, ext)
    }

    /// Backups of this file, newest first.
    pub fn backups(&self) -> io::Result<Vec<(PathBuf, DateTime<Local>)>> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        let (stem, ext) = self.stem_and_ext();
        let prefix = format!("{stem}-");
        let suffix = ext.map(|e| format!(".{e}")).unwrap_or_default();

        let mut backups = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
            else {
                continue;
            };
            let Ok(naive) = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT) else {
                continue;
            };
            if let Some(time) = Local.from_local_datetime(&naive).earliest() {
                backups.push((entry.path(), time));
            }
        }

        backups.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(backups)
    }

    /// Remove backups beyond the count and age limits.
    pub fn prune(&self) -> io::Result<()> {
        let backups = self.backups()?;
        let cutoff = (self.policy.max_days > 0)
            .then(|| Local::now() - chrono::Duration::days(i64::from(self.policy.max_days)));

        for (index, (path, time)) in backups.iter().enumerate() {
            let over_count = self.policy.max_backups > 0 && index >= self.policy.max_backups as usize;
            let too_old = cutoff.is_some_and(|cutoff| *time < cutoff);
            if over_count || too_old {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len() as u64;
        if self.size > 0 && self.size + len > self.policy.max_bytes {
            self.rotate()?;
        }

        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
