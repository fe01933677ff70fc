// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loading and the `config` command

use anyhow::{Context, Result};
use pl_payments::Settings;
use std::path::Path;

/// Settings from `path`, or the defaults when no file is given
pub fn load(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Settings::default()),
    }
}

pub fn handle(settings: &Settings) -> Result<()> {
    print!("{}", settings.to_toml()?);
    Ok(())
}
