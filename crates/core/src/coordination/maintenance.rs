// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic maintenance for coordination state
//!
//! Expiry timers and lazy checks already keep locks correct; this sweep keeps
//! memory bounded by dropping leases whose timers never ran and idempotency
//! records past their windows.

use super::manager::LockManager;
use crate::clock::Clock;
use crate::config::ConfigError;
use crate::idempotency::{IdempotencyCounts, IdempotencyRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// How often to run maintenance
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

impl MaintenanceConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "maintenance.interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A store of records that age out
pub trait Sweepable: Send + Sync + 'static {
    fn purge_expired(&self) -> usize;
    fn counts(&self) -> IdempotencyCounts;
}

impl<T: Clone + Send + 'static, C: Clock> Sweepable for IdempotencyRegistry<T, C> {
    fn purge_expired(&self) -> usize {
        IdempotencyRegistry::purge_expired(self)
    }

    fn counts(&self) -> IdempotencyCounts {
        IdempotencyRegistry::counts(self)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoordinationStats {
    pub held_locks: usize,
    /// Leases past expiry whose record is still in the table
    pub expired_locks: usize,
    pub processing: usize,
    pub completed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub locks_swept: usize,
    pub records_purged: usize,
}

impl CoordinationStats {
    /// Snapshot lock occupancy plus the given registry counts
    pub fn collect<C: Clock>(
        locks: &LockManager<C>,
        registries: impl IntoIterator<Item = IdempotencyCounts>,
    ) -> Self {
        let snapshots = locks.snapshots();
        let expired_locks = snapshots.iter().filter(|s| s.expired).count();
        let mut stats = CoordinationStats {
            held_locks: snapshots.len() - expired_locks,
            expired_locks,
            ..CoordinationStats::default()
        };
        for counts in registries {
            stats.processing += counts.processing;
            stats.completed += counts.completed;
        }
        stats
    }
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.locks_swept == 0 && self.records_purged == 0
    }
}

pub struct MaintenanceTask<C: Clock> {
    config: MaintenanceConfig,
    locks: LockManager<C>,
    registries: Vec<Arc<dyn Sweepable>>,
}

impl<C: Clock> MaintenanceTask<C> {
    pub fn new(config: MaintenanceConfig, locks: LockManager<C>) -> Self {
        Self {
            config,
            locks,
            registries: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: impl Sweepable) -> Self {
        self.registries.push(Arc::new(registry));
        self
    }

    /// Run a single maintenance cycle
    pub fn tick(&self) -> SweepReport {
        SweepReport {
            locks_swept: self.locks.sweep_expired(),
            records_purged: self.registries.iter().map(|r| r.purge_expired()).sum(),
        }
    }

    pub fn stats(&self) -> CoordinationStats {
        CoordinationStats::collect(&self.locks, self.registries.iter().map(|r| r.counts()))
    }

    /// Run `tick` every `interval` on the current tokio runtime until the
    /// returned handle is stopped or dropped
    pub fn spawn(self) -> MaintenanceHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = self.tick();
                if !report.is_empty() {
                    tracing::info!(
                        locks_swept = report.locks_swept,
                        records_purged = report.records_purged,
                        "maintenance sweep"
                    );
                }
            }
        });
        MaintenanceHandle { task }
    }
}

/// Stops the maintenance loop when dropped
pub struct MaintenanceHandle {
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
