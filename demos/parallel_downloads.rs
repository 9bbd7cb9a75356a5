use paradigms::config::ParallelConfig;
use paradigms::parallel;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    // Child processes are this same executable started with `worker ...`.
    paradigms::worker::intercept();

    let config = ParallelConfig::default();
    println!(
        "=== One process per url in {} ===",
        config.url_list.display()
    );
    println!();

    let report = parallel::run(&config)?;

    println!();
    println!(
        "{} downloaded, {} failed, saved under {}",
        report.succeeded(),
        report.failed(),
        config.image_dir.display()
    );
    Ok(())
}
