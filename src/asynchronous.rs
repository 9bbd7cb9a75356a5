//! Event loop hosted in a background thread.
//!
//! A dedicated OS thread runs a single-threaded tokio runtime that downloads
//! a list of PDFs and fetches quotes at the same time, suspending at every
//! network or file await. The invoking thread is never blocked by that work;
//! it keeps printing its own lines and only synchronizes through the final
//! join.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::config::AsyncConfig;
use crate::error::{Error, Result};
use crate::fetch::{content_type, ensure_allowed, parse_url_list, unique_path};
use crate::Stopwatch;

const TAG: &str = "ASYNC";
const PDF_TYPES: &[&str] = &["application/pdf"];

/// Lines the invoking thread prints while the event loop works.
const MAIN_STEPS: [&str; 4] = [
    "Task is running now in background without blocking the main task!",
    "And still running as non blocking!",
    "We can keep doing stuff in the main thread.",
    "Now we can call join() to wait for its execution",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Quote {
    #[serde(rename = "q")]
    pub text: String,
    #[serde(rename = "a")]
    pub author: String,
}

#[derive(Debug)]
pub struct AsyncReport {
    pub elapsed: Duration,
    /// When each of the invoking thread's own lines was printed.
    pub main_steps: Vec<Duration>,
    pub pdfs: Vec<Result<PathBuf>>,
    pub quotes: Vec<Result<Quote>>,
}

impl AsyncReport {
    pub fn secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

type Background = (Vec<Result<PathBuf>>, Vec<Result<Quote>>);

pub fn run(config: &AsyncConfig) -> Result<AsyncReport> {
    let clock = Stopwatch::start();

    let (background, main_steps) = thread::scope(|s| {
        let handle = thread::Builder::new()
            .name("event-loop".into())
            .spawn_scoped(s, || run_event_loop(config, clock))?;

        let mut steps = Vec::with_capacity(MAIN_STEPS.len());
        for (i, line) in MAIN_STEPS.iter().enumerate() {
            if i > 0 {
                thread::sleep(config.main_pause);
            }
            clock.say("MAIN", line);
            steps.push(clock.elapsed());
        }

        let background = handle.join().map_err(Error::from_panic)?;
        Ok::<_, Error>((background, steps))
    })?;
    let (pdfs, quotes) = background?;

    Ok(AsyncReport {
        elapsed: clock.elapsed(),
        main_steps,
        pdfs,
        quotes,
    })
}

fn run_event_loop(config: &AsyncConfig, clock: Stopwatch) -> Result<Background> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let client = reqwest::Client::builder().build()?;
    debug!("event loop started on {:?}", thread::current().name());

    Ok(runtime.block_on(async {
        tokio::join!(
            download_pdfs(&client, config, clock),
            get_quotes(&client, config, clock)
        )
    }))
}

async fn download_pdfs(
    client: &reqwest::Client,
    config: &AsyncConfig,
    clock: Stopwatch,
) -> Vec<Result<PathBuf>> {
    let urls = match read_pdf_list(&config.pdf_list, &config.pdf_dir).await {
        Ok(urls) => urls,
        Err(e) => {
            clock.say(TAG, format!("Error while downloading the file: {e}"));
            warn!("pdf list {}: {e}", config.pdf_list.display());
            return vec![Err(e)];
        }
    };

    let mut results = Vec::with_capacity(urls.len());
    for (num, url) in urls.iter().enumerate() {
        clock.say(TAG, format!("Downloading PDF {num}..."));
        let result = download_pdf(client, url, &config.pdf_dir).await;
        match &result {
            Ok(_) => clock.say(TAG, format!("PDF {num} downloaded to filesystem!")),
            Err(e) => {
                clock.say(TAG, format!("Error while downloading PDF {num}: {e}"));
                warn!("pdf {num} ({url}): {e}");
            }
        }
        results.push(result);
    }
    results
}

async fn read_pdf_list(list: &Path, dir: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(list).await?;
    tokio::fs::create_dir_all(dir).await?;
    Ok(parse_url_list(&text))
}

async fn download_pdf(client: &reqwest::Client, url: &str, dir: &Path) -> Result<PathBuf> {
    let mut response = client.get(url).send().await?.error_for_status()?;
    ensure_allowed(&content_type(response.headers()), PDF_TYPES)?;

    let path = unique_path(dir, "pdf");
    if let Err(e) = write_body(&mut response, &path).await {
        // A partial file must not look like a finished download.
        if let Err(remove) = tokio::fs::remove_file(&path).await {
            debug!("leftover {}: {remove}", path.display());
        }
        return Err(e);
    }
    Ok(path)
}

async fn write_body(response: &mut reqwest::Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

async fn get_quotes(
    client: &reqwest::Client,
    config: &AsyncConfig,
    clock: Stopwatch,
) -> Vec<Result<Quote>> {
    let mut quotes = Vec::with_capacity(config.quote_count);
    for _ in 0..config.quote_count {
        tokio::time::sleep(config.quote_interval).await;
        let quote = get_quote(client, &config.quotes_url).await;
        match &quote {
            Ok(q) => clock.say(TAG, format!("{}: '{}'", q.author, q.text)),
            Err(e) => {
                clock.say(TAG, format!("Error while fetching a quote: {e}"));
                warn!("quote: {e}");
            }
        }
        quotes.push(quote);
    }
    quotes
}

async fn get_quote(client: &reqwest::Client, url: &str) -> Result<Quote> {
    let quotes: Vec<Quote> = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    quotes
        .into_iter()
        .next()
        .ok_or_else(|| Error::EmptyResponse(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_from_api_shape() {
        let body = r#"[{"q":"To do two things at once is to do neither.","a":"Publilius Syrus","h":"<blockquote/>"}]"#;
        let quotes: Vec<Quote> = serde_json::from_str(body).unwrap();
        assert_eq!(quotes[0].author, "Publilius Syrus");
        assert_eq!(quotes[0].text, "To do two things at once is to do neither.");
    }

    #[test]
    fn missing_list_is_a_failed_unit() {
        let dir = tempfile::tempdir().unwrap();
        let config = AsyncConfig {
            pdf_list: dir.path().join("missing.txt"),
            pdf_dir: dir.path().join("pdfs"),
            quotes_url: "http://127.0.0.1:9/".into(),
            quote_count: 0,
            quote_interval: Duration::ZERO,
            main_pause: Duration::ZERO,
        };
        let report = run(&config).unwrap();
        assert_eq!(report.main_steps.len(), 4);
        assert!(report.quotes.is_empty());
        assert!(matches!(report.pdfs.as_slice(), [Err(Error::Io(_))]));
    }
}
