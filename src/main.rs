use std::io;

use clap::Parser;
use paradigms::Config;
use paradigms::menu::{Countdown, run_menu, run_example};

/// Pick a concurrency example from the menu and watch it run.
#[derive(Debug, Parser)]
#[command(name = "paradigms", version)]
struct Cli {}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    paradigms::worker::intercept();
    Cli::parse();

    let config = Config::default();
    let countdown = Countdown {
        from: config.countdown,
        tick: config.countdown_tick,
    };
    run_menu(io::stdin().lock(), &mut io::stdout(), countdown, |example| {
        run_example(&config, example)
    })
}
