//! Cooperative concurrency on a single thread.
//!
//! All requests are in flight at once on one current-thread runtime; a task
//! gives up the thread whenever it waits on the network, so the whole batch
//! takes about as long as the slowest response.

use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;

use crate::config::ConcurrentConfig;
use crate::error::Result;
use crate::{Report, Stopwatch};

pub fn run(config: &ConcurrentConfig) -> Result<Report<Value>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let client = reqwest::Client::builder().build()?;

    let clock = Stopwatch::start();
    let units = runtime.block_on(join_all(
        config
            .delays
            .iter()
            .map(|&delay| task(&client, config.url_for(delay), clock)),
    ));
    let report = Report {
        elapsed: clock.elapsed(),
        units,
    };

    clock.note(format!("Total: {} seconds", report.secs()));
    Ok(report)
}

async fn task(client: &reqwest::Client, url: String, clock: Stopwatch) -> Result<Value> {
    clock.note(format!("Sending request to: {url}"));
    let result = request(client, &url).await;
    match &result {
        Ok(_) => clock.note(format!("Request for {url} succeeded!")),
        Err(e) => {
            clock.note(format!("Request for {url} failed: {e}"));
            warn!("{url}: {e}");
        }
    }
    result
}

async fn request(client: &reqwest::Client, url: &str) -> Result<Value> {
    let response = client.get(url).send().await?.error_for_status()?;
    debug!("{url} answered {}", response.status());
    Ok(response.json().await?)
}
