// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration
//!
//! One TOML document with a section per component. Every key is optional.

use pl_core::{
    load_toml, AcquireFailurePolicy, ConfigError, GuardOptions, IdempotencyConfig, LockConfig,
    MaintenanceConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Lock policy for the payment path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    #[serde(with = "humantime_serde")]
    pub lock_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub lock_lease: Duration,
    pub on_lock_timeout: AcquireFailurePolicy,
    /// Renew the lease while the gateway call is in flight
    pub watchdog: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(10),
            lock_lease: Duration::from_secs(30),
            on_lock_timeout: AcquireFailurePolicy::Fail,
            watchdog: true,
        }
    }
}

impl PaymentConfig {
    pub fn guard_options(&self) -> GuardOptions {
        GuardOptions::new(self.lock_wait, self.lock_lease)
            .with_on_timeout(self.on_lock_timeout)
            .with_watchdog(self.watchdog)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_lease.is_zero() {
            return Err(ConfigError::Invalid(
                "payment.lock_lease must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lock: LockConfig,
    pub idempotency: IdempotencyConfig,
    pub payment: PaymentConfig,
    pub maintenance: MaintenanceConfig,
}

impl Settings {
    /// Load from a TOML file and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = load_toml(path)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lock.validate()?;
        self.idempotency.validate()?;
        self.payment.validate()?;
        self.maintenance.validate()
    }

    /// Render as TOML, durations in humantime form
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
