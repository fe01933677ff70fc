//! `pl simulate` specs

use crate::prelude::*;

#[test]
fn duplicate_attempts_charge_once_per_order() {
    let summary = Project::empty()
        .pl()
        .args(&["simulate", "--orders", "3", "--attempts", "5", "--latency", "5"])
        .passes()
        .json();

    assert_eq!(summary["orders"], 3);
    assert_eq!(summary["attempts"], 15);
    assert_eq!(summary["gateway_calls"], 3);
    assert_eq!(summary["paid"], 3);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["in_progress"], 0);
    assert_eq!(summary["lock_timeouts"], 0);
}

#[test]
fn every_declined_charge_is_reported() {
    let summary = Project::empty()
        .pl()
        .args(&[
            "simulate",
            "--orders",
            "1",
            "--attempts",
            "2",
            "--fail-every",
            "1",
            "--latency",
            "1",
        ])
        .passes()
        .json();

    assert_eq!(summary["gateway_calls"], 2);
    assert_eq!(summary["failed"], 2);
    assert_eq!(summary["paid"], 0);
}

#[test]
fn short_lock_wait_times_out_waiters() {
    let project = Project::empty();
    project.file(
        "pl.toml",
        "[lock]\nretry_interval = \"5ms\"\n\n[payment]\nlock_wait = \"20ms\"\n",
    );

    let summary = project
        .pl()
        .args(&[
            "simulate",
            "--config",
            "pl.toml",
            "--orders",
            "1",
            "--attempts",
            "3",
            "--latency",
            "300",
        ])
        .passes()
        .json();

    assert_eq!(summary["gateway_calls"], 1);
    assert_eq!(summary["paid"], 1);
    assert_eq!(summary["lock_timeouts"], 2);
}

#[test]
fn logs_go_to_stderr_and_log_file() {
    let project = Project::empty();

    project
        .pl()
        .args(&[
            "simulate",
            "--orders",
            "1",
            "--attempts",
            "1",
            "--latency",
            "1",
            "--log-file",
            "logs/pl.log",
        ])
        .passes()
        .stderr_has("simulation finished");

    assert!(project.read("logs/pl.log").contains("payment succeeded"));
}
