use paradigms::config::PoolConfig;
use paradigms::pool;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    // Pool workers are this same executable started with `worker train`.
    paradigms::worker::intercept();

    let config = PoolConfig::default();
    let pause: Duration = config
        .jobs
        .iter()
        .map(|job| Duration::from_millis(job.pause_ms))
        .sum();

    println!(
        "=== {} trainings on {} worker processes ===",
        config.jobs.len(),
        config.workers
    );
    println!();

    let report = pool::run(&config)?;

    println!();
    for (job, result) in config.jobs.iter().zip(&report.units) {
        match result {
            Ok(r) => println!(
                "max_iter {:>3}: {} epochs, accuracy {:.4}",
                job.max_iter, r.epochs, r.accuracy
            ),
            Err(e) => println!("max_iter {:>3}: {e}", job.max_iter),
        }
    }
    println!();
    println!("One worker:  ~{:?}", pause);
    println!(
        "{} workers:   ~{:?}",
        config.workers,
        pause / config.workers as u32
    );
    Ok(())
}
