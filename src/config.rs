//! Parameters for each runner.
//!
//! The `Default` of every struct is the stock demo setup run from the menu.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::semaphore::random_addresses;
use crate::training::TrainJob;
use crate::worker::WorkerProgram;

pub const QUOTES_API_URL: &str = "https://zenquotes.io/api/random/";
pub const DELAY_API_URL: &str = "https://httpbin.org";

#[derive(Debug, Clone)]
pub struct AsyncConfig {
    /// Newline-delimited list of PDF urls.
    pub pdf_list: PathBuf,
    pub pdf_dir: PathBuf,
    pub quotes_url: String,
    pub quote_count: usize,
    /// Sleep before every quote request; the API allows 5 requests per 30s.
    pub quote_interval: Duration,
    /// Pause between the invoking thread's own status lines.
    pub main_pause: Duration,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        AsyncConfig {
            pdf_list: PathBuf::from("files/pdfs-list.txt"),
            pdf_dir: PathBuf::from("files/downloads/pdfs"),
            quotes_url: QUOTES_API_URL.to_string(),
            quote_count: 20,
            quote_interval: Duration::from_secs(6),
            main_pause: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrentConfig {
    /// Server exposing `/delay/{n}`.
    pub base_url: String,
    pub delays: Vec<u32>,
}

impl ConcurrentConfig {
    pub fn url_for(&self, delay: u32) -> String {
        format!("{}/delay/{}", self.base_url.trim_end_matches('/'), delay)
    }
}

impl Default for ConcurrentConfig {
    fn default() -> Self {
        ConcurrentConfig {
            base_url: DELAY_API_URL.to_string(),
            delays: (0..10).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Newline-delimited list of image urls.
    pub url_list: PathBuf,
    pub image_dir: PathBuf,
    pub program: WorkerProgram,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            url_list: PathBuf::from("files/image-urls.txt"),
            image_dir: PathBuf::from("files/downloads/images"),
            program: WorkerProgram::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SemaphoreConfig {
    pub addresses: Vec<Ipv4Addr>,
    /// Simultaneous holders of the shared list.
    pub permits: usize,
    /// How long a holder keeps its permit.
    pub hold: Duration,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        SemaphoreConfig {
            addresses: random_addresses(20, &mut rand::rng()),
            permits: 4,
            hold: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub jobs: Vec<TrainJob>,
    pub program: WorkerProgram,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            workers: 3,
            jobs: (100..200)
                .step_by(10)
                .map(|max_iter| TrainJob {
                    max_iter,
                    pause_ms: 5_000,
                })
                .collect(),
            program: WorkerProgram::default(),
        }
    }
}

/// Everything the menu needs to run any of the five examples.
#[derive(Debug, Clone)]
pub struct Config {
    pub asynchronous: AsyncConfig,
    pub concurrent: ConcurrentConfig,
    pub parallel: ParallelConfig,
    pub semaphore: SemaphoreConfig,
    pub pool: PoolConfig,
    /// Numbers counted down between examples when running them all.
    pub countdown: u32,
    pub countdown_tick: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            asynchronous: AsyncConfig::default(),
            concurrent: ConcurrentConfig::default(),
            parallel: ParallelConfig::default(),
            semaphore: SemaphoreConfig::default(),
            pool: PoolConfig::default(),
            countdown: 5,
            countdown_tick: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_setup() {
        let config = Config::default();
        assert_eq!(config.semaphore.permits, 4);
        assert_eq!(config.semaphore.addresses.len(), 20);
        assert_eq!(config.pool.workers, 3);
        let iters: Vec<u32> = config.pool.jobs.iter().map(|j| j.max_iter).collect();
        assert_eq!(iters, vec![100, 110, 120, 130, 140, 150, 160, 170, 180, 190]);
        assert_eq!(config.concurrent.delays.len(), 10);
    }

    #[test]
    fn delay_url_ignores_trailing_slash() {
        let config = ConcurrentConfig {
            base_url: "http://127.0.0.1:9000/".into(),
            delays: vec![3],
        };
        assert_eq!(config.url_for(3), "http://127.0.0.1:9000/delay/3");
    }
}
