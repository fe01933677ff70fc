// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock manager: keyed leases with expiry timers
//!
//! Emulates a networked lock service (`SET key owner PX lease NX` plus
//! compare-and-delete release) in process memory. All slot mutation happens
//! under one mutex; each held lease has a tokio timer that frees it at expiry
//! unless the grant was released, renewed or replaced first. Expiry is also
//! checked against the clock on every read, so a missing runtime only delays
//! cleanup, never correctness.

use super::lock::{Lease, LockInput, LockSlot, LockState, OwnerToken};
use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::event::Event;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

struct LockEntry {
    slot: LockSlot,
    timer: Option<AbortHandle>,
}

impl LockEntry {
    fn new(key: &str) -> Self {
        Self {
            slot: LockSlot::new(key),
            timer: None,
        }
    }
}

type LockTable = HashMap<String, LockEntry>;

/// Point-in-time view of a key's lock, for operators
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockSnapshot {
    pub key: String,
    pub owner: OwnerToken,
    pub fence: u64,
    /// Zero once the lease has run out
    pub remaining: Duration,
    /// Lease ran out but the record has not been cleaned up yet
    pub expired: bool,
}

/// Owns every lock key in the process
///
/// Cloning is cheap and yields a handle to the same table.
#[derive(Clone)]
pub struct LockManager<C: Clock = SystemClock> {
    table: Arc<Mutex<LockTable>>,
    fences: Arc<AtomicU64>,
    clock: C,
    config: LockConfig,
}

impl LockManager<SystemClock> {
    pub fn with_system_clock(config: LockConfig) -> Self {
        Self::new(config, SystemClock)
    }
}

impl<C: Clock> LockManager<C> {
    pub fn new(config: LockConfig, clock: C) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            fences: Arc::new(AtomicU64::new(0)),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Poll for the lock every `retry_interval` until `wait` elapses.
    ///
    /// Always makes at least one attempt. Returns `true` as soon as the lock is
    /// granted (or re-entered by the same owner), `false` on timeout.
    pub async fn try_acquire(
        &self,
        key: &str,
        owner: &OwnerToken,
        wait: Duration,
        lease: Duration,
    ) -> bool {
        let started = tokio::time::Instant::now();
        let deadline = started + wait;

        loop {
            if self.try_acquire_once(key, owner, lease) {
                return true;
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                tracing::debug!(
                    key,
                    owner = %owner,
                    waited_ms = now.duration_since(started).as_millis() as u64,
                    "lock acquisition timed out"
                );
                return false;
            }
            tokio::time::sleep(self.config.retry_interval.min(deadline - now)).await;
        }
    }

    /// Single acquisition attempt
    pub fn try_acquire_once(&self, key: &str, owner: &OwnerToken, lease: Duration) -> bool {
        let fence = self.fences.fetch_add(1, Ordering::SeqCst) + 1;
        let events = self.apply(
            key,
            LockInput::Acquire {
                owner: owner.clone(),
                fence,
                lease,
            },
        );

        let acquired = events.iter().any(|e| {
            matches!(
                e,
                Event::LockAcquired { owner: o, .. } | Event::LockReentered { owner: o, .. }
                    if o == owner.as_str()
            )
        });
        log_all(&events);
        acquired
    }

    /// Release the lock if `owner` holds it. Returns whether a lease was removed.
    pub fn release(&self, key: &str, owner: &OwnerToken) -> bool {
        let events = self.apply(
            key,
            LockInput::Release {
                owner: owner.clone(),
            },
        );
        let released = events
            .iter()
            .any(|e| matches!(e, Event::LockReleased { .. }));
        log_all(&events);
        released
    }

    /// Extend a live lease held by `owner` to `now + lease`
    pub fn renew(&self, key: &str, owner: &OwnerToken, lease: Duration) -> bool {
        let events = self.apply(
            key,
            LockInput::Renew {
                owner: owner.clone(),
                lease,
            },
        );
        let renewed = events.iter().any(|e| matches!(e, Event::LockRenewed { .. }));
        log_all(&events);
        renewed
    }

    /// Administrative: drop whatever lease exists on `key`
    pub fn force_release(&self, key: &str) -> bool {
        let events = self.apply(key, LockInput::ForceRelease);
        let released = !events.is_empty();
        log_all(&events);
        released
    }

    /// True iff an unexpired lease exists on `key`
    pub fn is_locked(&self, key: &str) -> bool {
        let now = self.clock.now();
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.get(key).is_some_and(|e| e.slot.is_locked(now))
    }

    /// Whether `owner` currently holds a live lease on `key`
    pub fn is_held_by(&self, key: &str, owner: &OwnerToken) -> bool {
        let now = self.clock.now();
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.get(key).is_some_and(|e| e.slot.is_held_by(owner, now))
    }

    pub fn lock_state(&self, key: &str) -> Option<LockSnapshot> {
        let now = self.clock.now();
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.get(key).and_then(|e| snapshot(&e.slot, now))
    }

    pub fn snapshots(&self) -> Vec<LockSnapshot> {
        let now = self.clock.now();
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let mut snapshots: Vec<_> = table.values().filter_map(|e| snapshot(&e.slot, now)).collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    /// Keys with a live lease
    pub fn held_keys(&self) -> Vec<String> {
        self.snapshots()
            .into_iter()
            .filter(|s| !s.expired)
            .map(|s| s.key)
            .collect()
    }

    /// Remove leases that ran out without their timer firing. Returns how many.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<(String, u64)> = {
            let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table
                .iter()
                .filter_map(|(key, e)| match &e.slot.state {
                    LockState::Held(lease) if lease.is_expired(now) => {
                        Some((key.clone(), lease.fence))
                    }
                    _ => None,
                })
                .collect()
        };

        let mut swept = 0;
        for (key, fence) in expired {
            let events = self.apply(&key, LockInput::Expire { fence });
            if !events.is_empty() {
                swept += 1;
            }
            log_all(&events);
        }
        swept
    }

    /// Run one transition under the table mutex and keep timers in step with it
    fn apply(&self, key: &str, input: LockInput) -> Vec<Event> {
        let now = self.clock.now();
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        apply_to_table(&mut table, key, input, now, |fence, after| {
            schedule_expiry(Arc::downgrade(&self.table), self.clock.clone(), key, fence, after)
        })
    }
}

fn apply_to_table(
    table: &mut LockTable,
    key: &str,
    input: LockInput,
    now: Instant,
    schedule: impl FnOnce(u64, Duration) -> Option<AbortHandle>,
) -> Vec<Event> {
    let entry = table.remove(key).unwrap_or_else(|| LockEntry::new(key));
    let before = grant(&entry.slot);
    let (slot, events) = entry.slot.transition(input, now);
    let after = grant(&slot);

    let mut timer = entry.timer;
    if before != after {
        if let Some(old) = timer.take() {
            old.abort();
        }
        if let LockState::Held(lease) = &slot.state {
            timer = schedule(lease.fence, lease.remaining(now));
        }
    }

    if !slot.is_free() {
        table.insert(key.to_string(), LockEntry { slot, timer });
    }
    events
}

/// The identity of the current grant: which fence, until when
fn grant(slot: &LockSlot) -> Option<(u64, Instant)> {
    match &slot.state {
        LockState::Held(Lease {
            fence, expires_at, ..
        }) => Some((*fence, *expires_at)),
        LockState::Free => None,
    }
}

fn schedule_expiry<C: Clock>(
    table: Weak<Mutex<LockTable>>,
    clock: C,
    key: &str,
    fence: u64,
    after: Duration,
) -> Option<AbortHandle> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::trace!(key, fence, "no runtime, expiry enforced lazily");
        return None;
    };
    let key = key.to_string();
    let task = runtime.spawn(async move {
        tokio::time::sleep(after).await;
        let Some(table) = table.upgrade() else {
            return;
        };
        let events = {
            let mut table = table.lock().unwrap_or_else(|e| e.into_inner());
            apply_to_table(
                &mut table,
                &key,
                LockInput::Expire { fence },
                clock.now(),
                |_, _| None,
            )
        };
        log_all(&events);
    });
    Some(task.abort_handle())
}

fn snapshot(slot: &LockSlot, now: Instant) -> Option<LockSnapshot> {
    match &slot.state {
        LockState::Held(lease) => Some(LockSnapshot {
            key: slot.key.clone(),
            owner: lease.owner.clone(),
            fence: lease.fence,
            remaining: lease.remaining(now),
            expired: lease.is_expired(now),
        }),
        LockState::Free => None,
    }
}

fn log_all(events: &[Event]) {
    for event in events {
        event.log();
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
