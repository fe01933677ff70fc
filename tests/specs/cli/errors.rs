//! Error reporting specs

use crate::prelude::*;

#[test]
fn unknown_command_fails() {
    Project::empty()
        .pl()
        .args(&["refund"])
        .fails()
        .stderr_has("unrecognized subcommand");
}

#[test]
fn missing_config_file_fails() {
    Project::empty()
        .pl()
        .args(&["config", "--config", "absent.toml"])
        .fails()
        .stderr_has("failed to load config absent.toml");
}

#[test]
fn malformed_config_fails() {
    let project = Project::empty();
    project.file("pl.toml", "[lock\nretry_interval = ");

    project
        .pl()
        .args(&["config", "--config", "pl.toml"])
        .fails()
        .stderr_has("failed to load config");
}

#[test]
fn invalid_duration_fails() {
    let project = Project::empty();
    project.file("pl.toml", "[payment]\nlock_wait = \"soon\"\n");

    project
        .pl()
        .args(&["simulate", "--config", "pl.toml", "--latency", "1"])
        .fails()
        .stderr_has("failed to load config");
}

#[test]
fn zero_lease_is_rejected() {
    let project = Project::empty();
    project.file("pl.toml", "[payment]\nlock_lease = \"0s\"\n");

    project
        .pl()
        .args(&["config", "--config", "pl.toml"])
        .fails()
        .stderr_has("lock_lease");
}
