//! `pl config` specs

use crate::prelude::*;

#[test]
fn defaults_are_printed_as_toml() {
    Project::empty()
        .pl()
        .args(&["config"])
        .passes()
        .stdout_has("[lock]")
        .stdout_has("retry_interval = \"100ms\"")
        .stdout_has("[idempotency]")
        .stdout_has("processing_timeout = \"5m\"")
        .stdout_has("retention = \"1day\"")
        .stdout_has("[payment]")
        .stdout_has("lock_wait = \"10s\"")
        .stdout_has("on_lock_timeout = \"fail\"")
        .stdout_has("[maintenance]");
}

#[test]
fn file_values_override_defaults() {
    let project = Project::empty();
    project.file(
        "pl.toml",
        "[payment]\nlock_wait = \"250ms\"\non_lock_timeout = \"proceed-unguarded\"\n",
    );

    project
        .pl()
        .args(&["config", "--config", "pl.toml"])
        .passes()
        .stdout_has("lock_wait = \"250ms\"")
        .stdout_has("on_lock_timeout = \"proceed-unguarded\"")
        .stdout_has("lock_lease = \"30s\"");
}
