// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guarded execution: run a unit of work while holding a keyed lock
//!
//! Acquire (bounded wait), run, release on every exit path. Release is bound
//! to a drop guard, so an early return, a panic unwinding through the future,
//! or the future being dropped mid-await all give the key back.

use super::lock::OwnerToken;
use super::manager::LockManager;
use crate::clock::{Clock, SystemClock};
use crate::id::{IdGen, UuidIdGen};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("timed out after {wait:?} waiting for lock {key}")]
    LockAcquisitionTimeout { key: String, wait: Duration },
}

/// What to do when the lock cannot be acquired within the wait time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquireFailurePolicy {
    /// Fail the call with `GuardError::LockAcquisitionTimeout`
    #[default]
    Fail,
    /// Run the work without the lock and log the degradation
    ProceedUnguarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOptions {
    pub wait: Duration,
    pub lease: Duration,
    pub on_timeout: AcquireFailurePolicy,
    /// Renew the lease every `lease / 3` while the work runs
    pub watchdog: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(10),
            lease: Duration::from_secs(30),
            on_timeout: AcquireFailurePolicy::Fail,
            watchdog: false,
        }
    }
}

impl GuardOptions {
    pub fn new(wait: Duration, lease: Duration) -> Self {
        Self {
            wait,
            lease,
            ..Self::default()
        }
    }

    pub fn with_on_timeout(mut self, policy: AcquireFailurePolicy) -> Self {
        self.on_timeout = policy;
        self
    }

    pub fn with_watchdog(mut self, enabled: bool) -> Self {
        self.watchdog = enabled;
        self
    }
}

/// Releases the lock when dropped, unless the guarded call was a reentry
struct LockGuard<'a, C: Clock> {
    locks: &'a LockManager<C>,
    key: &'a str,
    owner: &'a OwnerToken,
    reentered: bool,
}

impl<C: Clock> Drop for LockGuard<'_, C> {
    fn drop(&mut self) {
        if !self.reentered {
            self.locks.release(self.key, self.owner);
        }
    }
}

/// Wraps work in acquire/release against a shared [`LockManager`]
#[derive(Clone)]
pub struct GuardedExecutor<C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    locks: LockManager<C>,
    ids: I,
}

impl<C: Clock> GuardedExecutor<C, UuidIdGen> {
    pub fn new(locks: LockManager<C>) -> Self {
        Self::with_ids(locks, UuidIdGen)
    }
}

impl<C: Clock, I: IdGen> GuardedExecutor<C, I> {
    pub fn with_ids(locks: LockManager<C>, ids: I) -> Self {
        Self { locks, ids }
    }

    pub fn locks(&self) -> &LockManager<C> {
        &self.locks
    }

    /// A token no other call context shares
    pub fn new_owner(&self) -> OwnerToken {
        OwnerToken::new(self.ids.next())
    }

    /// Run `work` under the lock on `key` with a fresh owner token
    pub async fn run_guarded<T, E, F>(&self, key: &str, options: &GuardOptions, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<GuardError>,
    {
        let owner = self.new_owner();
        self.run_guarded_as(key, &owner, options, work).await
    }

    /// Run `work` under the lock on `key` as `owner`.
    ///
    /// If `owner` already holds the key (nested call in the same context) the
    /// work runs inside the existing grant and the outer call keeps ownership
    /// of the release.
    pub async fn run_guarded_as<T, E, F>(
        &self,
        key: &str,
        owner: &OwnerToken,
        options: &GuardOptions,
        work: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<GuardError>,
    {
        let reentered = self.locks.is_held_by(key, owner);

        if !self
            .locks
            .try_acquire(key, owner, options.wait, options.lease)
            .await
        {
            return match options.on_timeout {
                AcquireFailurePolicy::Fail => Err(GuardError::LockAcquisitionTimeout {
                    key: key.to_string(),
                    wait: options.wait,
                }
                .into()),
                AcquireFailurePolicy::ProceedUnguarded => {
                    tracing::warn!(
                        key,
                        owner = %owner,
                        wait_ms = options.wait.as_millis() as u64,
                        "lock not acquired, running unguarded"
                    );
                    work.await
                }
            };
        }

        let _guard = LockGuard {
            locks: &self.locks,
            key,
            owner,
            reentered,
        };

        let result = if options.watchdog && !reentered {
            self.watch(key, owner, options.lease, work).await
        } else {
            work.await
        };

        if !self.locks.is_held_by(key, owner) {
            tracing::error!(
                key,
                owner = %owner,
                lease_ms = options.lease.as_millis() as u64,
                "lease expired before guarded work finished; critical section was not exclusive"
            );
        }
        result
    }

    /// Drive `work` to completion while renewing the lease
    async fn watch<T, F>(&self, key: &str, owner: &OwnerToken, lease: Duration, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let period = (lease / 3).max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(work);

        let mut lost = false;
        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = ticker.tick(), if !lost => {
                    if !self.locks.renew(key, owner, lease) {
                        lost = true;
                        tracing::error!(key, owner = %owner, "lease lost while guarded work still running");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
