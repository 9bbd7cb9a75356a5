//! A fixed pool of long-lived worker processes.
//!
//! Jobs wait in one shared queue. Each pool thread owns exactly one child
//! process and keeps feeding it the next queued job until the queue is
//! empty, so a slow job only holds up its own worker. Jobs and replies
//! travel as one JSON document per line over the child's stdin and stdout.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Stdio};
use std::thread;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::training::TrainReport;
use crate::worker::{Role, WorkerProgram};
use crate::{Report, Stopwatch};

pub struct WorkerPool {
    size: usize,
    program: WorkerProgram,
    role_args: Vec<OsString>,
}

impl WorkerPool {
    pub fn new(size: usize, program: WorkerProgram, role: &Role) -> Self {
        WorkerPool {
            size,
            program,
            role_args: role.to_args(),
        }
    }

    /// Run every job on the pool and return the results in job order.
    ///
    /// `on_result(worker, index, result)` is called as each job finishes,
    /// in completion order.
    pub fn map<J, R, F>(&self, jobs: Vec<J>, on_result: F) -> Vec<Result<R>>
    where
        J: Serialize + Send,
        R: DeserializeOwned + Send,
        F: Fn(usize, usize, &Result<R>) + Sync,
    {
        let total = jobs.len();
        let queue = Mutex::new(jobs.into_iter().enumerate().collect::<VecDeque<_>>());
        let workers = self.size.clamp(1, total.max(1));

        let finished = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker_id| {
                    let (queue, on_result) = (&queue, &on_result);
                    s.spawn(move || self.worker_loop(worker_id, queue, on_result))
                })
                .collect();

            let mut finished = Vec::with_capacity(total);
            for (worker_id, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(done) => finished.extend(done),
                    Err(payload) => {
                        warn!("pool worker {worker_id}: {}", Error::from_panic(payload));
                    }
                }
            }
            finished
        });

        let mut slots: Vec<Option<Result<R>>> = (0..total).map(|_| None).collect();
        for (index, result) in finished {
            slots[index] = Some(result);
        }
        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(Error::Worker("job was lost".into()))))
            .collect()
    }

    fn worker_loop<J, R, F>(
        &self,
        worker_id: usize,
        queue: &Mutex<VecDeque<(usize, J)>>,
        on_result: &F,
    ) -> Vec<(usize, Result<R>)>
    where
        J: Serialize,
        R: DeserializeOwned,
        F: Fn(usize, usize, &Result<R>),
    {
        let mut done = Vec::new();
        let mut process = None;

        loop {
            // The guard must be released before the job runs.
            let next = queue.lock().pop_front();
            let Some((index, job)) = next else {
                break;
            };
            let result = self.dispatch(&mut process, &job);
            on_result(worker_id, index, &result);
            done.push((index, result));
        }

        if let Some(process) = process {
            process.close();
        }
        debug!("[Worker {worker_id}] Shutting down");
        done
    }

    fn dispatch<J, R>(&self, slot: &mut Option<WorkerProcess>, job: &J) -> Result<R>
    where
        J: Serialize,
        R: DeserializeOwned,
    {
        let mut line = serde_json::to_string(job)?;
        line.push('\n');

        if let Err(e) = self.live_process(slot)?.send(&line) {
            // The child died between jobs, so this job never reached it.
            debug!("pool worker gone before the job was sent: {e}");
            discard(slot);
            if let Err(e) = self.live_process(slot)?.send(&line) {
                discard(slot);
                return Err(e.into());
            }
        }

        let Some(process) = slot.as_mut() else {
            return Err(Error::Worker("no worker process".into()));
        };
        match process.receive::<R>() {
            Ok(reply) => reply.map_err(Error::Worker),
            Err(e) => {
                // The job fails with its child; the next job gets a new one.
                discard(slot);
                Err(e)
            }
        }
    }

    /// The current child, replaced first if it has already exited.
    fn live_process<'a>(
        &self,
        slot: &'a mut Option<WorkerProcess>,
    ) -> Result<&'a mut WorkerProcess> {
        if slot.as_mut().is_some_and(WorkerProcess::has_exited) {
            discard(slot);
        }
        if slot.is_none() {
            *slot = Some(WorkerProcess::spawn(&self.program, &self.role_args)?);
        }
        slot.as_mut().ok_or_else(|| Error::Worker("no worker process".into()))
    }
}

fn discard(slot: &mut Option<WorkerProcess>) {
    if let Some(process) = slot.take() {
        process.kill();
    }
}

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    fn spawn(program: &WorkerProgram, args: &[OsString]) -> Result<Self> {
        let mut child = program
            .command(args)?
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Worker("worker pipes unavailable".into()));
        };
        debug!("pool worker started as pid {}", child.id());
        Ok(WorkerProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn send(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.flush()
    }

    fn receive<R: DeserializeOwned>(&mut self) -> Result<Result<R, String>> {
        let mut reply = String::new();
        if self.stdout.read_line(&mut reply)? == 0 {
            return Err(Error::Worker(format!(
                "worker {} exited in the middle of a job",
                self.child.id()
            )));
        }
        Ok(serde_json::from_str(reply.trim_end())?)
    }

    /// Close stdin so the child finishes, then reap it.
    fn close(self) {
        let WorkerProcess {
            mut child, stdin, ..
        } = self;
        drop(stdin);
        match child.wait() {
            Ok(status) => debug!("pool worker {} exited with {status}", child.id()),
            Err(e) => warn!("pool worker {}: {e}", child.id()),
        }
    }

    fn kill(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Child side of the pool protocol: answer one line per job line.
///
/// Returns when `input` reaches end of file.
pub fn serve<J, R, I, O, F>(input: I, mut output: O, mut handle: F) -> Result<()>
where
    J: DeserializeOwned,
    R: Serialize,
    I: BufRead,
    O: Write,
    F: FnMut(J) -> Result<R, String>,
{
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<J>(&line) {
            Ok(job) => handle(job),
            Err(e) => Err(format!("malformed job: {e}")),
        };
        serde_json::to_writer(&mut output, &reply)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}

pub fn run(config: &PoolConfig) -> Result<Report<TrainReport>> {
    let clock = Stopwatch::start();
    let pool = WorkerPool::new(config.workers, config.program.clone(), &Role::Train);

    let units = pool.map(config.jobs.clone(), |worker, _, result: &Result<TrainReport>| {
        let tag = format!("WORKER-{worker}");
        match result {
            Ok(report) => clock.say(
                &tag,
                format!(
                    "Iterations: {}, Accuracy: {}",
                    report.max_iter, report.accuracy
                ),
            ),
            Err(e) => {
                clock.say(&tag, format!("Training failed: {e}"));
                warn!("{tag}: {e}");
            }
        }
    });

    let report = Report {
        elapsed: clock.elapsed(),
        units,
    };
    clock.note(format!("Total: {} seconds", report.secs()));
    Ok(report)
}
