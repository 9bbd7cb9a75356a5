//! Five ways to run many units of work at once.
//!
//! Every runner takes a fixed set of inputs, dispatches one unit of work per
//! input with its own concurrency primitive, blocks until all units are
//! finished and prints one status line per unit:
//!
//! - [`asynchronous`]: an event loop in a background thread while the
//!   calling thread keeps working
//! - [`concurrent`]: delayed HTTP requests on a single cooperative thread
//! - [`parallel`]: one OS process per download
//! - [`semaphore`]: threads gated by a counting semaphore
//! - [`pool`]: long-lived worker processes pulling jobs from a queue

use std::time::{Duration, Instant};

pub mod asynchronous;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod fetch;
pub mod menu;
pub mod parallel;
pub mod pool;
pub mod semaphore;
pub mod training;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};

/// Wall clock shared by every line a runner prints.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Stopwatch {
            start: Instant::now(),
        }
    }

    /// A stopwatch that already reads `elapsed`, continuing a clock
    /// started in another process.
    pub fn resume(elapsed: Duration) -> Self {
        let now = Instant::now();
        Stopwatch {
            start: now.checked_sub(elapsed).unwrap_or(now),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Print `message` under `tag`, stamped with the time since start.
    pub fn say(&self, tag: &str, message: impl std::fmt::Display) {
        println!(
            "[{:>8.3}s] [{}] {}",
            self.elapsed().as_secs_f64(),
            tag,
            message
        );
    }

    /// Print an untagged line, stamped with the time since start.
    pub fn note(&self, message: impl std::fmt::Display) {
        println!("[{:>8.3}s] {}", self.elapsed().as_secs_f64(), message);
    }
}

/// Outcome of one run: how long it took and what each unit produced.
///
/// `units` is always in input order, whatever order the units finished in.
#[derive(Debug)]
pub struct Report<T> {
    pub elapsed: Duration,
    pub units: Vec<Result<T>>,
}

impl<T> Report<T> {
    pub fn secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.units.len() - self.succeeded()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.units.iter().filter_map(|u| u.as_ref().ok())
    }
}
