use paradigms::concurrent;
use paradigms::config::ConcurrentConfig;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ConcurrentConfig::default();
    let longest = config.delays.iter().max().copied().unwrap_or(0);
    let sum: u32 = config.delays.iter().sum();

    println!("=== {} delayed requests on one thread ===", config.delays.len());
    println!();

    let report = concurrent::run(&config)?;

    println!();
    println!("{} succeeded, {} failed", report.succeeded(), report.failed());
    println!("Sequential: ~{sum}s (sum of delays)");
    println!("Concurrent: ~{longest}s (longest delay)");
    Ok(())
}
