use {
    crate::DailyRollerError,
    chrono::NaiveDate,
    regex::Regex,
    std::path::{is_separator, Path, PathBuf},
};

/// Extension given to a target path that has none.
const DEFAULT_EXTENSION: &str = "log";

/// Date layout embedded in backup file names.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Naming scheme for a live log file and its dated backups.
///
/// For a target of `logs/app.log` the live file stays at `logs/app.log` and
/// the backup for 2023-12-08 is `logs/app-2023-12-08.log`.
#[derive(Debug, Clone)]
pub(crate) struct BackupNaming {
    /// Normalized path of the live log file.
    live_path: PathBuf,
    /// `live_path` without its extension.
    base_path: PathBuf,
    /// Extension including the leading dot, e.g. `.log`.
    extension: String,
    /// Matches `{base file name}-{YYYY-MM-DD}{extension}` and captures the date.
    pattern: Regex,
}

impl BackupNaming {
    /// Normalize `target` and derive the naming scheme from it.
    pub(crate) fn new(target: &Path) -> Result<Self, DailyRollerError> {
        let raw = target.as_os_str();
        if raw.is_empty() {
            return Err(DailyRollerError::InvalidConfig("log file path is empty".to_string()));
        }
        if raw.to_string_lossy().ends_with(is_separator) {
            return Err(DailyRollerError::InvalidConfig(format!(
                "'{}' names a directory, not a log file",
                target.display()
            )));
        }
        match target.file_name().map(|name| name.to_str()) {
            Some(Some(_)) => {}
            Some(None) => {
                return Err(DailyRollerError::InvalidConfig(format!(
                    "log file name in '{}' is not valid UTF-8",
                    target.display()
                )))
            }
            None => {
                return Err(DailyRollerError::InvalidConfig(format!(
                    "'{}' does not name a log file",
                    target.display()
                )))
            }
        }

        let mut live_path = target.to_path_buf();
        if live_path.extension().map_or(true, |ext| ext.is_empty()) {
            live_path.set_extension(DEFAULT_EXTENSION);
        }
        let extension = live_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .ok_or_else(|| DailyRollerError::InternalError(format!("no extension on '{}'", live_path.display())))?;
        let base_path = live_path.with_extension("");
        let base_file_name = base_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| DailyRollerError::InternalError(format!("no file name in '{}'", base_path.display())))?;

        let pattern = Regex::new(&format!(
            r"^{}-(\d{{4}}-\d{{2}}-\d{{2}}){}$",
            regex::escape(base_file_name),
            regex::escape(&extension)
        ))
        .map_err(|err| DailyRollerError::InternalError(err.to_string()))?;

        Ok(BackupNaming {
            live_path,
            base_path,
            extension,
            pattern,
        })
    }

    pub(crate) fn live_path(&self) -> &Path {
        &self.live_path
    }

    /// Directory holding the live file and its backups.
    pub(crate) fn directory(&self) -> &Path {
        match self.live_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Path of the backup holding content written during `day`.
    pub(crate) fn backup_path(&self, day: NaiveDate) -> PathBuf {
        let mut name = self.base_path.clone().into_os_string();
        name.push(format!("-{}{}", day.format(DATE_FORMAT), self.extension));
        PathBuf::from(name)
    }

    /// Recover the date from a backup file name (no directory component).
    ///
    /// Only the zero-padded form the roller writes is accepted. Returns `None`
    /// for the live file, for files of other logs, and for names whose date
    /// part is not a real calendar date.
    pub(crate) fn parse_backup_date(&self, file_name: &str) -> Option<NaiveDate> {
        let captures = self.pattern.captures(file_name)?;
        NaiveDate::parse_from_str(captures.get(1)?.as_str(), DATE_FORMAT).ok()
    }
}
