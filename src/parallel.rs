//! True parallelism with one OS process per download.
//!
//! Every url gets its own child process with its own memory. The parent
//! starts all of them before waiting on any, then joins them; no state is
//! shared and the only thing a child reports back is its exit status.

use std::path::Path;
use std::process::{Child, ExitStatus};

use image::DynamicImage;
use image::imageops::FilterType;
use log::{debug, warn};

use crate::config::ParallelConfig;
use crate::error::{Error, Result};
use crate::fetch::{blocking_client, content_type, ensure_allowed, parse_url_list, unique_path};
use crate::worker::Role;
use crate::{Report, Stopwatch};

pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg"];

fn tag(num: usize) -> String {
    format!("PROCESS-{num}")
}

pub fn run(config: &ParallelConfig) -> Result<Report<()>> {
    let urls = parse_url_list(&std::fs::read_to_string(&config.url_list)?);
    std::fs::create_dir_all(&config.image_dir)?;

    let clock = Stopwatch::start();
    let mut slots: Vec<Option<Result<()>>> = urls.iter().map(|_| None).collect();
    let mut group = ProcessGroup::default();

    for (num, url) in urls.iter().enumerate() {
        let role = Role::Image {
            num,
            url: url.clone(),
            out: config.image_dir.clone(),
            clock_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        let spawned = config
            .program
            .command(role.to_args())
            .and_then(|mut command| Ok(command.spawn()?));
        match spawned {
            Ok(child) => {
                debug!("unit {num} started as pid {}", child.id());
                group.push(num, child);
            }
            Err(e) => {
                clock.say(&tag(num), format!("Could not start the process: {e}"));
                slots[num] = Some(Err(e));
            }
        }
    }

    for (num, status) in group.wait_all() {
        slots[num] = Some(status.and_then(|status| {
            debug!("unit {num} exited with {status}");
            if status.success() {
                Ok(())
            } else {
                Err(Error::UnitExit { unit: num, status })
            }
        }));
    }

    let report = Report {
        elapsed: clock.elapsed(),
        units: slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(Error::Worker("unit was never started".into()))))
            .collect(),
    };
    clock.note(format!("Total: {} seconds", report.secs()));
    Ok(report)
}

/// Children that are killed and reaped unless explicitly waited for.
#[derive(Default)]
struct ProcessGroup {
    children: Vec<(usize, Child)>,
}

impl ProcessGroup {
    fn push(&mut self, num: usize, child: Child) {
        self.children.push((num, child));
    }

    fn wait_all(mut self) -> Vec<(usize, Result<ExitStatus>)> {
        let mut statuses = Vec::with_capacity(self.children.len());
        while !self.children.is_empty() {
            let (num, mut child) = self.children.remove(0);
            statuses.push((num, child.wait().map_err(Error::from)));
        }
        statuses
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        for (num, child) in &mut self.children {
            debug!("killing unit {num} (pid {})", child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Child-process body: download one image and store it at half size.
///
/// Prints its own progress lines on `clock` and returns the size of the
/// saved file.
pub fn download_image(num: usize, url: &str, out: &Path, clock: Stopwatch) -> Result<u64> {
    let tag = tag(num);
    clock.say(&tag, format!("Downloading image from {url}"));
    match fetch_and_halve(url, out) {
        Ok(size) => {
            clock.say(&tag, format!("Download completed! ({size} bytes)"));
            Ok(size)
        }
        Err(e) => {
            clock.say(&tag, format!("Error while downloading the file: {e}"));
            warn!("{tag} {url}: {e}");
            Err(e)
        }
    }
}

fn fetch_and_halve(url: &str, out: &Path) -> Result<u64> {
    let response = blocking_client()?.get(url).send()?.error_for_status()?;
    let kind = content_type(response.headers());
    ensure_allowed(&kind, IMAGE_TYPES)?;

    let image = image::load_from_memory(&response.bytes()?)?;
    let subtype = kind.rsplit('/').next().unwrap_or("png");
    let halved = match subtype {
        // JPEG has no alpha channel.
        "jpeg" | "jpg" => DynamicImage::ImageRgb8(halve(&image).to_rgb8()),
        _ => halve(&image),
    };

    std::fs::create_dir_all(out)?;
    let path = unique_path(out, subtype);
    halved.save(&path)?;
    Ok(std::fs::metadata(&path)?.len())
}

/// Half the width and height, never below one pixel.
pub fn halve(image: &DynamicImage) -> DynamicImage {
    let width = (image.width() / 2).max(1);
    let height = (image.height() / 2).max(1);
    image.resize_exact(width, height, FilterType::Triangle)
}
