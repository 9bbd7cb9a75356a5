//! Text menu that runs one example at a time.

use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::Context;

use crate::config::Config;
use crate::semaphore::RdapLookup;
use crate::{asynchronous, concurrent, parallel, pool, semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Example {
    Async,
    Concurrent,
    Parallel,
    Semaphore,
    WorkerPool,
}

impl Example {
    pub const ALL: [Example; 5] = [
        Example::Async,
        Example::Concurrent,
        Example::Parallel,
        Example::Semaphore,
        Example::WorkerPool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Example::Async => "async",
            Example::Concurrent => "concurrent",
            Example::Parallel => "parallel",
            Example::Semaphore => "semaphore",
            Example::WorkerPool => "workerpool",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Example::Async => "Async tasks on an event loop in a background thread",
            Example::Concurrent => "Concurrent delayed requests on one thread",
            Example::Parallel => "Parallel image downloads, one process each",
            Example::Semaphore => "Threads sharing a list through a semaphore",
            Example::WorkerPool => "Model training on a pool of worker processes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Run(Example),
    RunAll,
    Exit,
}

impl Choice {
    pub fn parse(input: &str) -> Option<Choice> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" => Some(Choice::Run(Example::Async)),
            "2" => Some(Choice::Run(Example::Concurrent)),
            "3" => Some(Choice::Run(Example::Parallel)),
            "4" => Some(Choice::Run(Example::Semaphore)),
            "5" => Some(Choice::Run(Example::WorkerPool)),
            "6" | "all" => Some(Choice::RunAll),
            "0" | "q" | "quit" | "exit" => Some(Choice::Exit),
            _ => None,
        }
    }
}

/// How long "run all" pauses between two examples.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    pub from: u32,
    pub tick: Duration,
}

impl Countdown {
    pub fn wait(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "Next example will run in...")?;
        for n in (0..=self.from).rev() {
            writeln!(out, "{n}...")?;
            out.flush()?;
            thread::sleep(self.tick);
        }
        writeln!(out, "Now!")
    }
}

fn print_menu(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Concurrency paradigms ===")?;
    for (i, example) in Example::ALL.iter().enumerate() {
        writeln!(out, "{}) {}", i + 1, example.describe())?;
    }
    writeln!(out, "6) Run all examples")?;
    writeln!(out, "0) Exit")?;
    write!(out, "> ")?;
    out.flush()
}

/// Prompt until the user exits or input ends.
///
/// `runner` is called for exactly one example at a time; its first error
/// ends the loop.
pub fn run_menu<R, W, F>(
    mut input: R,
    out: &mut W,
    countdown: Countdown,
    mut runner: F,
) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(Example) -> anyhow::Result<()>,
{
    loop {
        print_menu(out)?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(());
        }

        match Choice::parse(&line) {
            Some(Choice::Exit) => return Ok(()),
            Some(Choice::Run(example)) => announce(out, example, &mut runner)?,
            Some(Choice::RunAll) => {
                for (i, example) in Example::ALL.into_iter().enumerate() {
                    if i > 0 {
                        countdown.wait(out)?;
                    }
                    announce(out, example, &mut runner)?;
                }
            }
            None => writeln!(out, "Unknown option {:?}", line.trim())?,
        }
    }
}

fn announce<W, F>(out: &mut W, example: Example, runner: &mut F) -> anyhow::Result<()>
where
    W: Write,
    F: FnMut(Example) -> anyhow::Result<()>,
{
    writeln!(out, "Running {} tasks...", example.name())?;
    out.flush()?;
    runner(example).with_context(|| format!("{} example failed", example.name()))?;
    writeln!(out, "{} tasks completed!", capitalize(example.name()))?;
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Run an example with the given configuration.
pub fn run_example(config: &Config, example: Example) -> anyhow::Result<()> {
    match example {
        Example::Async => {
            asynchronous::run(&config.asynchronous)?;
        }
        Example::Concurrent => {
            concurrent::run(&config.concurrent)?;
        }
        Example::Parallel => {
            parallel::run(&config.parallel)?;
        }
        Example::Semaphore => {
            let lookup = RdapLookup::new()?;
            semaphore::run(&config.semaphore, &lookup)?;
        }
        Example::WorkerPool => {
            pool::run(&config.pool)?;
        }
    }
    Ok(())
}
