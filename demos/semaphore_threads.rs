use paradigms::config::SemaphoreConfig;
use paradigms::semaphore::{self, RdapLookup};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = SemaphoreConfig::default();
    println!(
        "=== {} threads, {} permits, {:?} hold ===",
        config.addresses.len(),
        config.permits,
        config.hold
    );
    println!();

    let lookup = RdapLookup::new()?;
    let report = semaphore::run(&config, &lookup)?;

    println!();
    println!(
        "{} added, peak of {} threads inside at once",
        report.added(),
        report.peak
    );
    println!("Total elapsed: {:?}", report.elapsed);
    Ok(())
}
