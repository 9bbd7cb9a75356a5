use paradigms::asynchronous;
use paradigms::config::AsyncConfig;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Fewer quotes than the menu version; the API allows 5 requests per 30s.
    let config = AsyncConfig {
        quote_count: 4,
        ..AsyncConfig::default()
    };

    println!("=== Event loop in a background thread ===");
    println!(
        "{} quotes every {:?} while the main thread sleeps {:?} between lines",
        config.quote_count, config.quote_interval, config.main_pause
    );
    println!();

    let report = asynchronous::run(&config)?;

    println!();
    println!(
        "PDFs: {} saved, quotes: {} fetched",
        report.pdfs.iter().filter(|p| p.is_ok()).count(),
        report.quotes.iter().filter(|q| q.is_ok()).count()
    );
    println!("Total elapsed: {:?}", report.elapsed);
    println!(
        "Main thread finished its own lines after {:?}",
        report.main_steps.last().copied().unwrap_or(Duration::ZERO)
    );
    Ok(())
}
