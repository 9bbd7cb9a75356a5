mod common;

use std::io::Write;
use std::process::{Command, Output, Stdio};

use common::WORKER_EXE;

fn run_with_input(args: &[&str], input: &str) -> Output {
    let mut child = Command::new(WORKER_EXE)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn exit_from_menu_is_clean() {
    let output = run_with_input(&[], "0\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Concurrency paradigms ==="));
    assert!(stdout.contains("6) Run all examples"));
}

#[test]
fn unknown_choice_then_end_of_input() {
    let output = run_with_input(&[], "9\n");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Unknown option \"9\""));
}

#[test]
fn worker_with_bad_arguments_reports_usage() {
    let output = run_with_input(&["worker", "juggle"], "");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn train_worker_answers_jobs_over_pipes() {
    let output = run_with_input(&["worker", "train"], "{\"max_iter\":5,\"pause_ms\":0}\n");
    assert!(output.status.success());
    let reply: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(reply["Ok"]["max_iter"], 5);
}
