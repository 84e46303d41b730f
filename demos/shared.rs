use {
    chrono::Local,
    dailyroller::{Clock, DailyRollerBuilder, ManualClock},
    std::{io::Write, sync::Arc, thread},
};

/// Several workers share one roller while a simulated clock crosses midnight.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(ManualClock::new(Local::now()));
    let logger = Arc::new(
        DailyRollerBuilder::new("./logs/shared.log")
            .max_age_days(3)
            .clock(clock.clone())
            .build()?,
    );
    let yesterday = clock.today();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let logger = logger.clone();
            thread::spawn(move || -> std::io::Result<()> {
                for i in 1..=1000 {
                    writeln!(&*logger, "worker {worker}: entry #{i}")?;
                }
                Ok(())
            })
        })
        .collect();

    clock.advance_days(1);
    for worker in workers {
        worker.join().map_err(|_| "worker panicked")??;
    }

    println!("live file: {}", logger.path().display());
    println!("backup:    {}", logger.backup_path(yesterday).display());
    Ok(())
}
