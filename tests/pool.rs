mod common;

use std::time::Duration;

use common::WORKER_EXE;
use parking_lot::Mutex;
use paradigms::config::PoolConfig;
use paradigms::pool::{self, WorkerPool};
use paradigms::training::{TrainJob, TrainReport};
use paradigms::worker::{Role, WorkerProgram};
use paradigms::Result;

/// Later jobs are shorter, so they finish before earlier ones.
fn jobs() -> Vec<TrainJob> {
    (1..=6)
        .map(|n| TrainJob {
            max_iter: n * 10,
            pause_ms: 700 - u64::from(n) * 100,
        })
        .collect()
}

#[test]
fn results_come_back_in_job_order() {
    let pool = WorkerPool::new(3, WorkerProgram::at(WORKER_EXE), &Role::Train);
    let completed = Mutex::new(Vec::new());

    let results: Vec<Result<TrainReport>> = pool.map(jobs(), |_, index, result| {
        assert!(result.is_ok(), "{result:?}");
        completed.lock().push(index);
    });

    let iters: Vec<u32> = results
        .iter()
        .map(|r| r.as_ref().unwrap().max_iter)
        .collect();
    assert_eq!(iters, vec![10, 20, 30, 40, 50, 60]);

    let completed = completed.into_inner();
    assert_eq!(completed.len(), 6);
    assert_ne!(completed, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn three_workers_overlap_the_pauses() {
    let config = PoolConfig {
        workers: 3,
        jobs: jobs(),
        program: WorkerProgram::at(WORKER_EXE),
    };
    let total_pause: u64 = config.jobs.iter().map(|j| j.pause_ms).sum();

    let report = pool::run(&config).unwrap();

    assert_eq!(report.succeeded(), 6);
    for result in report.values() {
        assert!(result.accuracy > 0.5);
        assert!(result.epochs <= result.max_iter);
    }
    // one worker alone would need the sum of all pauses
    assert!(report.elapsed < Duration::from_millis(total_pause * 3 / 4));
}

#[test]
fn more_workers_than_jobs() {
    let config = PoolConfig {
        workers: 8,
        jobs: jobs().into_iter().take(2).collect(),
        program: WorkerProgram::at(WORKER_EXE),
    };

    let report = pool::run(&config).unwrap();

    assert_eq!(report.units.len(), 2);
    assert_eq!(report.succeeded(), 2);
}

/// A stand-in worker executable whose every start is logged next to it.
#[cfg(unix)]
fn scripted_worker(dir: &std::path::Path, body: &str) -> (WorkerProgram, std::path::PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("worker.sh");
    std::fs::write(&script, format!("#!/bin/sh\necho start >> \"$0.starts\"\n{body}\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let starts = dir.join("worker.sh.starts");
    (WorkerProgram::at(script), starts)
}

#[cfg(unix)]
fn starts(log: &std::path::Path) -> usize {
    std::fs::read_to_string(log).unwrap().lines().count()
}

#[cfg(unix)]
#[test]
fn child_that_quits_between_jobs_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    // answers one job, then stops reading and exits
    let (program, log) = scripted_worker(
        dir.path(),
        r#"read -r job
exec 0<&-
echo '{"Ok":{"max_iter":1,"epochs":1,"accuracy":1.0}}'"#,
    );
    let pool = WorkerPool::new(1, program, &Role::Train);
    let jobs = vec![
        TrainJob {
            max_iter: 1,
            pause_ms: 0,
        };
        4
    ];

    let results: Vec<Result<TrainReport>> = pool.map(jobs, |_, _, _| {});

    assert!(results.iter().all(|r| r.is_ok()), "{results:?}");
    assert_eq!(starts(&log), 4);
}

#[cfg(unix)]
#[test]
fn child_dying_mid_job_fails_only_that_job() {
    let dir = tempfile::tempdir().unwrap();
    let (program, log) = scripted_worker(dir.path(), "read -r job\nexit 3");
    let pool = WorkerPool::new(1, program, &Role::Train);
    let jobs = vec![
        TrainJob {
            max_iter: 1,
            pause_ms: 0,
        };
        3
    ];

    let results: Vec<Result<TrainReport>> = pool.map(jobs, |_, _, _| {});

    assert_eq!(results.len(), 3);
    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert!(err.to_string().contains("exited in the middle of a job"), "{err}");
    }
    // one fresh child per job
    assert_eq!(starts(&log), 3);
}
