//! # DailyRoller
//!
//! DailyRoller is a log file writer that rolls over once per calendar day. All
//! bytes go to a single live file (for example `logs/app.log`). When the first
//! write of a new local day arrives, the live file is renamed to a dated backup
//! (`logs/app-2023-12-08.log`) and a fresh live file is opened. If a backup for
//! that day already exists the live content is appended to it instead, so a
//! process restarted several times in one day never overwrites its own logs.
//!
//! Backups older than a retention window can be pruned automatically. Pruning
//! runs on a background thread after each rotation and never fails a write.
//!
//! A roller can be shared between threads: writes go through `&DailyRoller`
//! and are serialized internally. It also works as an appender for the
//! tracing crate.
//!
//! ## Example
//!
//! ```rust
//! use {
//!     dailyroller::{DailyRoller, DailyRollerConfig},
//!     std::io::Write,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = std::env::temp_dir().join("dailyroller-doc");
//!     let mut logger = DailyRoller::new(DailyRollerConfig {
//!         filename: dir.join("app"), // becomes app.log
//!         max_age_days: 7,           // keep one week of backups
//!         ..Default::default()
//!     })?;
//!
//!     writeln!(logger, "service started")?;
//!     logger.close()?;
//!     Ok(())
//! }
//! ```
//!
//! With tracing:
//!
//! ```rust
//! use {dailyroller::DailyRollerBuilder, tracing_subscriber::util::SubscriberInitExt};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let appender = DailyRollerBuilder::new(std::env::temp_dir().join("dailyroller-doc/tracing.log"))
//!         .max_age_days(3)
//!         .build()?;
//!     let (non_blocking, _guard) = tracing_appender::non_blocking(appender);
//!     tracing_subscriber::fmt()
//!         .with_writer(non_blocking)
//!         .with_ansi(false)
//!         .finish()
//!         .try_init()?;
//!
//!     tracing::info!("This is an info message");
//!     Ok(())
//! }
//! ```
mod cleanup;
mod clock;
mod naming;

pub use clock::{Clock, ManualClock, SystemClock};

use {
    crate::{
        cleanup::{remove_expired_backups, CleanupTracker},
        naming::BackupNaming,
    },
    chrono::{DateTime, Local, NaiveDate},
    std::{
        fmt, fs,
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
};

#[cfg(unix)]
use std::{
    fs::Permissions,
    os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt},
};

/// Mode for directories created on the way to the log file.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Mode for new log files when no explicit `file_mode` is configured. The
/// process umask still applies.
#[cfg(unix)]
const DEFAULT_FILE_MODE: u32 = 0o666;

/// Settings for a [`DailyRoller`].
///
/// Only `filename` is required; everything else has a usable default.
///
/// # Examples
/// ```
/// use dailyroller::DailyRollerConfig;
///
/// let config = DailyRollerConfig {
///     max_age_days: 14,
///     ..DailyRollerConfig::new("logs/app.log")
/// };
/// assert_eq!(config.file_mode, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DailyRollerConfig {
    /// Path of the live log file. `.log` is appended when it has no
    /// extension.
    pub filename: PathBuf,
    /// Delete backups dated more than this many days before today. `0` keeps
    /// every backup.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_age_days: u32,
    /// Permission bits applied to new log files (Unix-like systems only),
    /// e.g. `0o640`.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub file_mode: Option<u32>,
}

impl DailyRollerConfig {
    /// Config for `filename` with all other settings at their defaults.
    pub fn new<P: Into<PathBuf>>(filename: P) -> Self {
        DailyRollerConfig {
            filename: filename.into(),
            ..Default::default()
        }
    }
}

/// Fixed settings of a running roller. Cloned into each cleanup job.
#[derive(Clone)]
struct DailyRollerMeta {
    /// Live file path and backup naming derived from it.
    naming: BackupNaming,
    /// Retention window in days, `0` disables cleanup.
    max_age_days: u32,
    /// Explicit permission bits for new log files.
    file_mode: Option<u32>,
    /// Where "today" comes from.
    clock: Arc<dyn Clock>,
}

/// Mutable state, only touched with the roller lock held.
struct DailyRollerState {
    /// The open live file, `None` before the first open and after `close`.
    file: Option<fs::File>,
    /// The local day the open live file belongs to.
    curr_day: NaiveDate,
}

/// What was found at the live path when the roller (re)opened it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// No live file existed.
    Created,
    /// The live file was last written today and is appended to.
    Appended,
    /// The live file was last written on the given earlier day and has been
    /// archived under that day.
    RotatedStale(NaiveDate),
}

/// A log writer that rolls over to a dated backup when the local day changes.
pub struct DailyRoller {
    meta: DailyRollerMeta,
    state: Mutex<DailyRollerState>,
    cleanup: CleanupTracker,
}

impl DailyRollerMeta {
    /// Create every missing directory above the live file.
    fn create_log_dir(&self) -> Result<(), DailyRollerError> {
        let directory = self.naming.directory();
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder
            .create(directory)
            .map_err(|source| DailyRollerError::CreateDirectoryFailed {
                path: directory.to_path_buf(),
                source,
            })
    }

    /// Open the live file for appending, creating it if needed.
    fn open_log_file(&self) -> Result<fs::File, DailyRollerError> {
        let log_path = self.naming.live_path();
        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);
        #[cfg(unix)]
        open_options.mode(self.file_mode.unwrap_or(DEFAULT_FILE_MODE));

        let log_file = open_options
            .open(log_path)
            .map_err(|source| DailyRollerError::OpenFileFailed {
                path: log_path.to_path_buf(),
                source,
            })?;

        self.set_permissions(log_path)?;

        Ok(log_file)
    }

    /// Apply the configured `file_mode`, bypassing the umask.
    ///
    /// Does nothing when no mode is configured. On non-Unix systems a warning
    /// is printed and the mode is ignored.
    fn set_permissions(&self, path: &Path) -> Result<(), DailyRollerError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|source| {
                    DailyRollerError::SetPermissionsFailed {
                        path: path.to_path_buf(),
                        source,
                    }
                })?
            }
            #[cfg(not(unix))]
            {
                let _ = (mode, path);
                eprintln!("Warning: Setting file permissions is not supported on non-Unix platforms");
            }
        }
        Ok(())
    }

    /// Local day the live file was last modified, or `None` if it is missing.
    fn live_file_day(&self) -> Result<Option<NaiveDate>, DailyRollerError> {
        let log_path = self.naming.live_path();
        let read_failed = |source| DailyRollerError::ReadMetadataFailed {
            path: log_path.to_path_buf(),
            source,
        };
        match fs::metadata(log_path) {
            Ok(metadata) => {
                let modified = metadata.modified().map_err(read_failed)?;
                Ok(Some(DateTime::<Local>::from(modified).date_naive()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(read_failed(err)),
        }
    }

    /// Move the live file's content into the backup for `day`.
    ///
    /// An existing backup is appended to, never replaced. A missing live file
    /// means there is nothing to archive.
    fn archive_live_file(&self, day: NaiveDate) -> Result<(), DailyRollerError> {
        let log_path = self.naming.live_path();
        let backup_path = self.naming.backup_path(day);

        if backup_path.exists() {
            return append_and_remove(log_path, &backup_path).map_err(|source| DailyRollerError::MergeFileFailed {
                from: log_path.to_path_buf(),
                to: backup_path.clone(),
                source,
            });
        }

        match fs::rename(log_path, &backup_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DailyRollerError::RenameFileFailed {
                from: log_path.to_path_buf(),
                to: backup_path,
                source,
            }),
        }
    }
}

/// Append the bytes of `from` to the end of `to`, then delete `from`.
fn append_and_remove(from: &Path, to: &Path) -> io::Result<()> {
    let mut source = match fs::File::open(from) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    let mut target = fs::OpenOptions::new().append(true).open(to)?;
    io::copy(&mut source, &mut target)?;
    target.flush()?;
    drop(source);
    fs::remove_file(from)
}

impl DailyRoller {
    /// Open a roller for `config`.
    ///
    /// Creates missing parent directories. A live file left over from an
    /// earlier day is archived under that day right away.
    pub fn new(config: DailyRollerConfig) -> Result<Self, DailyRollerError> {
        DailyRollerBuilder::from(config).build()
    }

    /// Like [`DailyRoller::new`], but panics on failure. Meant for startup
    /// code where a broken log configuration should stop the process.
    pub fn new_or_panic(config: DailyRollerConfig) -> Self {
        DailyRollerBuilder::from(config).build_or_panic()
    }

    /// Path of the live log file, after extension defaulting.
    pub fn path(&self) -> &Path {
        self.meta.naming.live_path()
    }

    /// Path of the backup holding content written during `day`.
    pub fn backup_path(&self, day: NaiveDate) -> PathBuf {
        self.meta.naming.backup_path(day)
    }

    /// The configured retention window in days.
    pub fn max_age_days(&self) -> u32 {
        self.meta.max_age_days
    }

    /// Close the live file.
    ///
    /// Closing twice is fine. A later write reopens the file.
    pub fn close(&self) -> Result<(), DailyRollerError> {
        let mut state = self.lock_state();
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, DailyRollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the live file, archiving it first if it belongs to an earlier day.
    fn resolve(&self, state: &mut DailyRollerState, today: NaiveDate) -> Result<Resolution, DailyRollerError> {
        match self.meta.live_file_day()? {
            Some(day) if day < today => {
                state.curr_day = day;
                self.rotate(state, today)?;
                Ok(Resolution::RotatedStale(day))
            }
            found => {
                state.file = Some(self.meta.open_log_file()?);
                state.curr_day = today;
                Ok(if found.is_some() {
                    Resolution::Appended
                } else {
                    Resolution::Created
                })
            }
        }
    }

    /// Archive the live file under `state.curr_day` and start a new one for
    /// `today`.
    ///
    /// On failure the handle stays closed, so the next write re-resolves
    /// from disk.
    fn rotate(&self, state: &mut DailyRollerState, today: NaiveDate) -> Result<(), DailyRollerError> {
        // 1. Close the current file
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }

        // 2. Rename or merge it into the backup for the day it belongs to
        self.meta.archive_live_file(state.curr_day)?;

        // 3. Start the new day
        state.file = Some(self.meta.open_log_file()?);
        state.curr_day = today;

        // 4. Prune old backups asynchronously
        if self.meta.max_age_days > 0 {
            let meta = self.meta.clone();
            self.cleanup.spawn(move || {
                remove_expired_backups(&meta.naming, meta.clock.today(), meta.max_age_days);
            });
        }
        Ok(())
    }

    /// The file the next write should go to, rotating first if the day has
    /// changed.
    fn current_file<'a>(&self, state: &'a mut DailyRollerState) -> Result<&'a mut fs::File, DailyRollerError> {
        let today = self.meta.clock.today();
        if state.file.is_none() {
            self.resolve(state, today)?;
        }
        if state.curr_day != today {
            self.rotate(state, today)?;
        }
        state
            .file
            .as_mut()
            .ok_or_else(|| DailyRollerError::InternalError("log file is not open after rotation".to_string()))
    }
}

impl fmt::Debug for DailyRoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyRoller")
            .field("path", &self.path())
            .field("max_age_days", &self.meta.max_age_days)
            .finish_non_exhaustive()
    }
}

impl io::Write for &DailyRoller {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock_state();
        let file = self.current_file(&mut state).map_err(io::Error::other)?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock_state().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl io::Write for DailyRoller {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

/// Errors that can occur when using the daily roller.
#[derive(Debug, thiserror::Error)]
pub enum DailyRollerError {
    #[error("Invalid log file configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectoryFailed { path: PathBuf, source: io::Error },
    #[error("Failed to open log file '{path}': {source}")]
    OpenFileFailed { path: PathBuf, source: io::Error },
    #[error("Failed to read metadata of '{path}': {source}")]
    ReadMetadataFailed { path: PathBuf, source: io::Error },
    #[error("Failed to rename file from '{from}' to '{to}': {source}")]
    RenameFileFailed { from: PathBuf, to: PathBuf, source: io::Error },
    #[error("Failed to append '{from}' to existing backup '{to}': {source}")]
    MergeFileFailed { from: PathBuf, to: PathBuf, source: io::Error },
    #[error("Failed to set file permissions for '{path}': {source}")]
    SetPermissionsFailed { path: PathBuf, source: io::Error },
    #[error("File IO error: {0}")]
    FileIOError(#[from] io::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Fluent configuration for [`DailyRoller`].
///
/// Defaults: no backup pruning, standard file permissions, system clock.
///
/// # Examples
/// ```rust
/// use dailyroller::DailyRollerBuilder;
///
/// let dir = std::env::temp_dir().join("dailyroller-builder-doc");
/// let appender = DailyRollerBuilder::new(dir.join("app.log"))
///     .max_age_days(30) // keep a month of backups
///     .file_mode(0o640) // owner rw, group r
///     .build()
///     .unwrap();
/// assert!(appender.path().ends_with("app.log"));
/// ```
pub struct DailyRollerBuilder {
    config: DailyRollerConfig,
    clock: Arc<dyn Clock>,
}

impl DailyRollerBuilder {
    /// Start a builder for the log file at `filename`.
    pub fn new<P: AsRef<Path>>(filename: P) -> Self {
        DailyRollerBuilder::from(DailyRollerConfig::new(filename.as_ref()))
    }

    /// Delete backups dated more than `max_age_days` days before today.
    /// `0` keeps every backup.
    pub fn max_age_days(self, max_age_days: u32) -> Self {
        Self {
            config: DailyRollerConfig {
                max_age_days,
                ..self.config
            },
            ..self
        }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    /// This sets the file mode bits in octal notation like when using chmod.
    /// For example, 0o644 for rw-r--r-- permissions.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            config: DailyRollerConfig {
                file_mode: Some(mode),
                ..self.config
            },
            ..self
        }
    }

    /// Read the current day from `clock` instead of the system clock.
    pub fn clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// Build the roller.
    pub fn build(self) -> Result<DailyRoller, DailyRollerError> {
        let meta = DailyRollerMeta {
            naming: BackupNaming::new(&self.config.filename)?,
            max_age_days: self.config.max_age_days,
            file_mode: self.config.file_mode,
            clock: self.clock,
        };
        meta.create_log_dir()?;

        let today = meta.clock.today();
        let roller = DailyRoller {
            meta,
            state: Mutex::new(DailyRollerState {
                file: None,
                curr_day: today,
            }),
            cleanup: CleanupTracker::default(),
        };

        let resolution = {
            let mut state = roller.lock_state();
            roller.resolve(&mut state, today)?
        };
        let path = roller.path().display();
        match resolution {
            Resolution::Created => tracing::debug!(%path, "created log file"),
            Resolution::Appended => tracing::debug!(%path, "appending to existing log file"),
            Resolution::RotatedStale(day) => tracing::info!(
                %path,
                backup = %roller.backup_path(day).display(),
                "archived log file left over from an earlier day"
            ),
        }

        Ok(roller)
    }

    /// Build the roller, panicking on failure.
    pub fn build_or_panic(self) -> DailyRoller {
        let filename = self.config.filename.clone();
        match self.build() {
            Ok(roller) => roller,
            Err(err) => panic!("failed to open log file '{}': {err}", filename.display()),
        }
    }
}

impl From<DailyRollerConfig> for DailyRollerBuilder {
    fn from(config: DailyRollerConfig) -> Self {
        DailyRollerBuilder {
            config,
            clock: Arc::new(SystemClock),
        }
    }
}
