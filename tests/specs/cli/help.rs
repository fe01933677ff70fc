//! Help output specs

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    Project::empty()
        .pl()
        .args(&["--help"])
        .passes()
        .stdout_has("simulate")
        .stdout_has("config");
}

#[test]
fn simulate_help_lists_flags() {
    Project::empty()
        .pl()
        .args(&["simulate", "--help"])
        .passes()
        .stdout_has("--orders")
        .stdout_has("--attempts")
        .stdout_has("--fail-every")
        .stdout_has("--latency");
}
