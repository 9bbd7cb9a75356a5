//! Child-process side of the process-based runners.
//!
//! The parallel runner and the worker pool re-invoke an executable with a
//! leading `worker` argument. Any binary that calls [`intercept`] first
//! thing in `main` can serve as that executable.

use std::ffi::OsString;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::Stopwatch;
use crate::error::Result;
use crate::parallel::download_image;
use crate::pool::serve;
use crate::training::{TrainJob, train_model};

pub const WORKER_ARG: &str = "worker";

/// Exit code of a child whose unit failed.
pub const EXIT_UNIT_FAILED: i32 = 1;
/// Exit code of a child started with arguments it does not understand.
pub const EXIT_USAGE: i32 = 2;

/// The executable started for every child process.
#[derive(Debug, Clone, Default)]
pub struct WorkerProgram {
    /// `None` re-runs the current executable.
    exe: Option<PathBuf>,
}

impl WorkerProgram {
    pub fn at(exe: impl Into<PathBuf>) -> Self {
        WorkerProgram {
            exe: Some(exe.into()),
        }
    }

    /// A `Command` for `<exe> worker <args...>`.
    pub fn command<I, S>(&self, args: I) -> Result<Command>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let exe = match &self.exe {
            Some(exe) => exe.clone(),
            None => std::env::current_exe()?,
        };
        let mut command = Command::new(exe);
        command.arg(WORKER_ARG);
        command.args(args.into_iter().map(Into::into));
        Ok(command)
    }
}

#[derive(Debug, Parser)]
#[command(name = "worker", about = "Run one unit of work in a child process")]
pub struct WorkerArgs {
    #[command(subcommand)]
    pub role: Role,
}

#[derive(Debug, Subcommand)]
pub enum Role {
    /// Download one image and save it at half resolution.
    Image {
        #[arg(long)]
        num: usize,
        #[arg(long)]
        url: String,
        #[arg(long)]
        out: PathBuf,
        /// Reading of the parent's clock when this child was started.
        #[arg(long, default_value_t = 0)]
        clock_ms: u64,
    },
    /// Serve training jobs from stdin until it closes.
    Train,
}

impl Role {
    /// Arguments that select this role on a child command line.
    pub fn to_args(&self) -> Vec<OsString> {
        match self {
            Role::Image {
                num,
                url,
                out,
                clock_ms,
            } => vec![
                "image".into(),
                "--num".into(),
                num.to_string().into(),
                "--url".into(),
                url.into(),
                "--out".into(),
                out.clone().into_os_string(),
                "--clock-ms".into(),
                clock_ms.to_string().into(),
            ],
            Role::Train => vec!["train".into()],
        }
    }
}

/// If this process was started as a worker, do the work and exit.
pub fn intercept() {
    let mut args = std::env::args_os();
    let exe = args.next().unwrap_or_default();
    let Some(first) = args.next() else {
        return;
    };
    if first != WORKER_ARG {
        return;
    }

    let code = match WorkerArgs::try_parse_from(std::iter::once(exe).chain(args)) {
        Ok(parsed) => run(parsed),
        Err(e) => {
            let _ = e.print();
            EXIT_USAGE
        }
    };
    std::process::exit(code);
}

/// Run a worker role to completion and return the process exit code.
pub fn run(args: WorkerArgs) -> i32 {
    match args.role {
        Role::Image {
            num,
            url,
            out,
            clock_ms,
        } => {
            let clock = Stopwatch::resume(Duration::from_millis(clock_ms));
            match download_image(num, &url, &out, clock) {
                Ok(_) => 0,
                Err(_) => EXIT_UNIT_FAILED,
            }
        }
        Role::Train => match serve_training() {
            Ok(()) => 0,
            Err(e) => {
                log::error!("training worker {}: {e}", std::process::id());
                EXIT_UNIT_FAILED
            }
        },
    }
}

fn serve_training() -> Result<()> {
    let stdin = BufReader::new(io::stdin().lock());
    let stdout = io::stdout().lock();
    serve(stdin, stdout, |job: TrainJob| Ok::<_, String>(train_model(&job)))
}
