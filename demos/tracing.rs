use {
    chrono::{Days, Local},
    dailyroller::DailyRollerBuilder,
    tracing_subscriber::util::SubscriberInitExt,
};

/// Route tracing output through a roller that keeps three days of backups.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let appender = DailyRollerBuilder::new("./logs/service")
        .max_age_days(3)
        .file_mode(0o640)
        .build()?;

    // The appender moves into the worker thread below.
    let live = appender.path().to_path_buf();
    let retention = appender.max_age_days();
    let yesterday = Local::now().date_naive() - Days::new(1);
    let backup = appender.backup_path(yesterday);
    let oldest_kept = appender.backup_path(yesterday - Days::new(u64::from(retention) - 1));

    let (non_blocking, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .finish()
        .try_init()?;

    tracing::info!(retention_days = retention, "service started");
    tracing::info!(backup = %backup.display(), "yesterday's entries, if any, were archived at startup");
    tracing::warn!(oldest = %oldest_kept.display(), "older backups are pruned after the next rotation");

    println!("live file:     {}", live.display());
    println!("last backup:   {} (exists: {})", backup.display(), backup.exists());
    println!("oldest kept:   {}", oldest_kept.display());
    Ok(())
}
