// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency registry: request deduplication by client-supplied key
//!
//! A key is `Processing` from first sight until its owner calls `complete`
//! (result cached for the retention window) or `abandon` (record removed so a
//! retry starts fresh). Stuck `Processing` records and stale results are
//! restarted on the next `check`. All transitions happen under one mutex, so
//! the registry is safe to use without any external lock.

use crate::clock::{Clock, SystemClock};
use crate::config::IdempotencyConfig;
use crate::event::{Event, RestartReason};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq)]
enum RecordStatus<T> {
    Processing,
    Completed { result: T, completed_at: Instant },
}

#[derive(Clone, Debug)]
struct Record<T> {
    status: RecordStatus<T>,
    created_at: Instant,
}

impl<T> Record<T> {
    fn processing(now: Instant) -> Self {
        Self {
            status: RecordStatus::Processing,
            created_at: now,
        }
    }

    /// Why this record may be restarted at `now`, if it may
    fn restart_reason(&self, now: Instant, config: &IdempotencyConfig) -> Option<RestartReason> {
        match &self.status {
            RecordStatus::Processing
                if now.saturating_duration_since(self.created_at) > config.processing_timeout =>
            {
                Some(RestartReason::ProcessingTimeout)
            }
            RecordStatus::Completed { completed_at, .. }
                if now.saturating_duration_since(*completed_at) > config.retention =>
            {
                Some(RestartReason::RetentionExpired)
            }
            _ => None,
        }
    }
}

/// Outcome of [`IdempotencyRegistry::check`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdempotencyCheck<T> {
    /// First sight (or restart): the caller owns the key and must complete or abandon it
    Fresh,
    /// Another caller is still working on this key
    InProgress,
    /// Already done; replay this result
    Completed(T),
}

impl<T> IdempotencyCheck<T> {
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, IdempotencyCheck::Fresh)
    }

    pub fn cached_result(&self) -> Option<&T> {
        match self {
            IdempotencyCheck::Completed(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdempotencyPhase {
    Processing,
    Completed,
}

/// Operator view of one record
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdempotencySnapshot {
    pub key: String,
    pub phase: IdempotencyPhase,
    /// Time since the current generation started
    #[serde(with = "humantime_serde")]
    pub age: Duration,
    /// The next `check` would restart this record
    pub stale: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IdempotencyCounts {
    pub processing: usize,
    pub completed: usize,
}

/// Shared registry handle; clones see the same records
#[derive(Clone)]
pub struct IdempotencyRegistry<T, C: Clock = SystemClock> {
    records: Arc<Mutex<HashMap<String, Record<T>>>>,
    clock: C,
    config: IdempotencyConfig,
}

impl<T: Clone + Send + 'static> IdempotencyRegistry<T, SystemClock> {
    pub fn with_system_clock(config: IdempotencyConfig) -> Self {
        Self::new(config, SystemClock)
    }
}

impl<T: Clone + Send + 'static, C: Clock> IdempotencyRegistry<T, C> {
    pub fn new(config: IdempotencyConfig, clock: C) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Atomically classify `key` and claim it when fresh
    pub fn check(&self, key: &str) -> IdempotencyCheck<T> {
        let now = self.clock.now();
        let (outcome, event) = {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            match records.get(key) {
                None => {
                    records.insert(key.to_string(), Record::processing(now));
                    (
                        IdempotencyCheck::Fresh,
                        Event::IdempotencyStarted {
                            key: key.to_string(),
                        },
                    )
                }
                Some(record) => match record.restart_reason(now, &self.config) {
                    Some(reason) => {
                        records.insert(key.to_string(), Record::processing(now));
                        (
                            IdempotencyCheck::Fresh,
                            Event::IdempotencyRestarted {
                                key: key.to_string(),
                                reason,
                            },
                        )
                    }
                    None => match &record.status {
                        RecordStatus::Processing => (
                            IdempotencyCheck::InProgress,
                            Event::IdempotencyInProgress {
                                key: key.to_string(),
                            },
                        ),
                        RecordStatus::Completed { result, .. } => (
                            IdempotencyCheck::Completed(result.clone()),
                            Event::IdempotencyReplayed {
                                key: key.to_string(),
                            },
                        ),
                    },
                },
            }
        };
        event.log();
        outcome
    }

    /// Record the result for a `Processing` key.
    ///
    /// Returns `false` (and changes nothing) if the key is unknown or was
    /// already completed in this generation.
    pub fn complete(&self, key: &str, result: T) -> bool {
        let now = self.clock.now();
        let completed = {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.get_mut(key).map(|record| {
                let processing = matches!(record.status, RecordStatus::Processing);
                if processing {
                    record.status = RecordStatus::Completed {
                        result,
                        completed_at: now,
                    };
                }
                processing
            })
        };

        match completed {
            Some(true) => {
                Event::IdempotencyCompleted {
                    key: key.to_string(),
                }
                .log();
                true
            }
            Some(false) => {
                tracing::warn!(key, "idempotency key already completed, result kept");
                false
            }
            None => {
                Event::IdempotencyCompleteUnknown {
                    key: key.to_string(),
                }
                .log();
                false
            }
        }
    }

    /// Tie a key `check` just returned `Fresh` for to a scope.
    ///
    /// Unless settled with `complete` or `abandon`, the key is abandoned when
    /// the claim drops, so a cancelled caller does not leave it `Processing`.
    pub fn claim<'a>(&'a self, key: &'a str) -> IdempotencyClaim<'a, T, C> {
        IdempotencyClaim {
            registry: self,
            key,
            settled: false,
        }
    }

    /// Drop the record so the next `check` is fresh
    pub fn abandon(&self, key: &str) -> bool {
        let removed = {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.remove(key).is_some()
        };
        if removed {
            Event::IdempotencyAbandoned {
                key: key.to_string(),
            }
            .log();
        }
        removed
    }

    pub fn state(&self, key: &str) -> Option<IdempotencySnapshot> {
        let now = self.clock.now();
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records.get(key)?;
        let phase = match record.status {
            RecordStatus::Processing => IdempotencyPhase::Processing,
            RecordStatus::Completed { .. } => IdempotencyPhase::Completed,
        };
        Some(IdempotencySnapshot {
            key: key.to_string(),
            phase,
            age: self.clock.since(record.created_at),
            stale: record.restart_reason(now, &self.config).is_some(),
        })
    }

    /// Remove every record the next `check` would restart. Returns how many.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let purged = {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            let before = records.len();
            records.retain(|_, record| record.restart_reason(now, &self.config).is_none());
            before - records.len()
        };
        if purged > 0 {
            Event::IdempotencyPurged { count: purged }.log();
        }
        purged
    }

    pub fn counts(&self) -> IdempotencyCounts {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .values()
            .fold(IdempotencyCounts::default(), |mut counts, record| {
                match record.status {
                    RecordStatus::Processing => counts.processing += 1,
                    RecordStatus::Completed { .. } => counts.completed += 1,
                }
                counts
            })
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scope of a `Fresh` key; see [`IdempotencyRegistry::claim`]
#[must_use = "dropping a claim abandons the key"]
pub struct IdempotencyClaim<'a, T: Clone + Send + 'static, C: Clock> {
    registry: &'a IdempotencyRegistry<T, C>,
    key: &'a str,
    settled: bool,
}

impl<T: Clone + Send + 'static, C: Clock> IdempotencyClaim<'_, T, C> {
    pub fn key(&self) -> &str {
        self.key
    }

    pub fn complete(mut self, result: T) -> bool {
        self.settled = true;
        self.registry.complete(self.key, result)
    }

    pub fn abandon(mut self) -> bool {
        self.settled = true;
        self.registry.abandon(self.key)
    }
}

impl<T: Clone + Send + 'static, C: Clock> Drop for IdempotencyClaim<'_, T, C> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(key = self.key, "idempotency claim dropped unsettled");
            self.registry.abandon(self.key);
        }
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
