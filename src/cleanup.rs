use {
    crate::naming::BackupNaming,
    chrono::{Days, NaiveDate},
    std::{
        fs,
        sync::{Arc, Condvar, Mutex, PoisonError},
        thread,
    },
};

/// Remove backups dated strictly before `today - max_age_days`.
///
/// Best-effort: an unreadable directory or a failed delete is logged and
/// skipped. Returns how many backups were removed.
pub(crate) fn remove_expired_backups(naming: &BackupNaming, today: NaiveDate, max_age_days: u32) -> usize {
    if max_age_days == 0 {
        return 0;
    }
    let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(max_age_days))) else {
        return 0;
    };

    let directory = naming.directory();
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(directory = %directory.display(), error = %err, "cannot list log directory for cleanup");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if entry.file_type().map_or(true, |t| t.is_dir()) {
            continue;
        }
        let file_name = entry.file_name();
        let Some(day) = file_name.to_str().and_then(|name| naming.parse_backup_date(name)) else {
            continue;
        };
        if day >= cutoff {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), %day, "removed expired log backup");
                removed += 1;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove expired log backup");
            }
        }
    }
    removed
}

/// Dispatches cleanup jobs onto detached threads and counts the ones still
/// running.
#[derive(Debug, Clone, Default)]
pub(crate) struct CleanupTracker {
    in_flight: Arc<(Mutex<usize>, Condvar)>,
}

/// Marks one job finished when dropped, including when the job panics or the
/// thread never starts.
struct InFlight(CleanupTracker);

impl Drop for InFlight {
    fn drop(&mut self) {
        let (count, idle) = &*self.0.in_flight;
        let mut count = count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            idle.notify_all();
        }
    }
}

impl CleanupTracker {
    /// Run `job` in the background. Never blocks on the job.
    pub(crate) fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.in_flight.0.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let guard = InFlight(self.clone());
        let spawned = thread::Builder::new()
            .name("dailyroller-cleanup".to_string())
            .spawn(move || {
                let _guard = guard;
                job();
            });
        if let Err(err) = spawned {
            // The roller lock is held here and a tracing event could be routed
            // back into the same roller.
            eprintln!("Failed to start log cleanup thread: {err}");
        }
    }

    /// Block until every dispatched job has finished.
    #[cfg(test)]
    pub(crate) fn wait_idle(&self) {
        let (count, idle) = &*self.in_flight;
        let mut count = count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = idle.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{
            path::{Path, PathBuf},
            sync::atomic::{AtomicUsize, Ordering},
        },
        tempfile::tempdir,
    };

    fn touch(path: &Path, contents: &str) {
        fs::write(path, contents).unwrap();
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn backups_before(naming: &BackupNaming, today: NaiveDate, count: u64) -> Vec<PathBuf> {
        (1..=count)
            .map(|ago| {
                let path = naming.backup_path(today.checked_sub_days(Days::new(ago)).unwrap());
                touch(&path, "backup");
                path
            })
            .collect()
    }

    #[test]
    fn removes_only_backups_strictly_before_cutoff() {
        let dir = tempdir().unwrap();
        let naming = BackupNaming::new(&dir.path().join("app.log")).unwrap();
        let today = day(2024, 3, 10);
        let backups = backups_before(&naming, today, 6);

        assert_eq!(remove_expired_backups(&naming, today, 3), 3);

        // index 0 is one day old
        for (index, path) in backups.iter().enumerate() {
            let days_old = index + 1;
            assert_eq!(path.exists(), days_old <= 3, "{} ({days_old} days old)", path.display());
        }
    }

    #[test]
    fn cutoff_spans_month_and_year_boundaries() {
        let dir = tempdir().unwrap();
        let naming = BackupNaming::new(&dir.path().join("app.log")).unwrap();
        let today = day(2024, 1, 2);
        let kept = naming.backup_path(day(2023, 12, 31));
        let dropped = naming.backup_path(day(2023, 12, 30));
        touch(&kept, "k");
        touch(&dropped, "d");

        assert_eq!(remove_expired_backups(&naming, today, 2), 1);
        assert!(kept.exists());
        assert!(!dropped.exists());
    }

    #[test]
    fn zero_retention_keeps_everything() {
        let dir = tempdir().unwrap();
        let naming = BackupNaming::new(&dir.path().join("app.log")).unwrap();
        let today = day(2024, 3, 10);
        let backups = backups_before(&naming, today, 400);

        assert_eq!(remove_expired_backups(&naming, today, 0), 0);
        assert!(backups.iter().all(|path| path.exists()));
    }

    #[test]
    fn leaves_unrelated_entries_alone() {
        let dir = tempdir().unwrap();
        let naming = BackupNaming::new(&dir.path().join("app.log")).unwrap();
        let today = day(2024, 3, 10);
        let live = dir.path().join("app.log");
        let other_log = dir.path().join("other-2000-01-01.log");
        let bad_date = dir.path().join("app-2000-13-01.log");
        let wrong_ext = dir.path().join("app-2000-01-01.txt");
        for path in [&live, &other_log, &bad_date, &wrong_ext] {
            touch(path, "x");
        }
        let old_dir = dir.path().join("app-2000-01-01.log");
        fs::create_dir(&old_dir).unwrap();

        assert_eq!(remove_expired_backups(&naming, today, 1), 0);
        for path in [&live, &other_log, &bad_date, &wrong_ext, &old_dir] {
            assert!(path.exists(), "{}", path.display());
        }
    }

    #[test]
    fn loosely_formatted_dates_survive() {
        let dir = tempdir().unwrap();
        let naming = BackupNaming::new(&dir.path().join("app.log")).unwrap();
        let today = day(2024, 3, 10);
        let lookalikes: Vec<PathBuf> = [
            "app-2000-1-5.log",
            "app- 2000-01-05.log",
            "app-+2000-01-05.log",
            "app-2000-01- 5.log",
        ]
        .iter()
        .map(|name| dir.path().join(name))
        .collect();
        for path in &lookalikes {
            touch(path, "not ours");
        }
        let expired = naming.backup_path(day(2000, 1, 5));
        touch(&expired, "ours");

        assert_eq!(remove_expired_backups(&naming, today, 1), 1);
        assert!(!expired.exists());
        for path in &lookalikes {
            assert!(path.exists(), "{}", path.display());
        }
    }

    #[test]
    fn missing_directory_is_not_an_error() {
        let dir = tempdir().unwrap();
        let naming = BackupNaming::new(&dir.path().join("gone").join("app.log")).unwrap();
        assert_eq!(remove_expired_backups(&naming, day(2024, 3, 10), 1), 0);
    }

    #[test]
    fn second_pass_finds_nothing() {
        let dir = tempdir().unwrap();
        let naming = BackupNaming::new(&dir.path().join("app.log")).unwrap();
        let today = day(2024, 3, 10);
        backups_before(&naming, today, 5);

        assert_eq!(remove_expired_backups(&naming, today, 2), 3);
        assert_eq!(remove_expired_backups(&naming, today, 2), 0);
    }

    #[test]
    fn tracker_waits_for_all_jobs() {
        let tracker = CleanupTracker::default();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let done = done.clone();
            tracker.spawn(move || {
                thread::sleep(std::time::Duration::from_millis(20));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        tracker.wait_idle();
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn tracker_recovers_from_panicking_job() {
        let tracker = CleanupTracker::default();
        tracker.spawn(|| panic!("cleanup blew up"));
        tracker.wait_idle();
        tracker.wait_idle();
    }
}
