use {
    dailyroller::{DailyRoller, DailyRollerConfig},
    std::io::Write,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = DailyRoller::new(DailyRollerConfig {
        filename: "./logs/daily".into(), // Written to ./logs/daily.log
        max_age_days: 7,                 // Keep one week of backups
        ..Default::default()
    })?;

    // Yesterday's content, if any, is now in ./logs/daily-YYYY-MM-DD.log
    writeln!(logger, "System startup")?;
    writeln!(logger, "Configuration loaded successfully")?;
    writeln!(logger, "Server listening on port 8080")?;

    logger.close()?;
    Ok(())
}
