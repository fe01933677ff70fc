// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator inspection and cleanup

use crate::domain::PaymentResult;
use pl_core::{
    Clock, CoordinationStats, IdempotencyRegistry, IdempotencySnapshot, LockManager,
    LockSnapshot, SystemClock,
};

/// Read-mostly view over the coordination state of a running payment flow
#[derive(Clone)]
pub struct AdminSurface<C: Clock = SystemClock> {
    locks: LockManager<C>,
    idempotency: IdempotencyRegistry<PaymentResult, C>,
}

impl<C: Clock> AdminSurface<C> {
    pub fn new(locks: LockManager<C>, idempotency: IdempotencyRegistry<PaymentResult, C>) -> Self {
        Self { locks, idempotency }
    }

    /// Drop a lock regardless of who holds it.
    ///
    /// The evicted holder keeps running; only use this for a holder known to
    /// be gone.
    pub fn force_release_lock(&self, key: &str) -> bool {
        let holder = self.locks.lock_state(key).map(|s| s.owner);
        let released = self.locks.force_release(key);
        if released {
            tracing::warn!(
                key,
                owner = holder.as_ref().map(|o| o.as_str()).unwrap_or("-"),
                "lock force-released by operator"
            );
        }
        released
    }

    pub fn lock_state(&self, key: &str) -> Option<LockSnapshot> {
        self.locks.lock_state(key)
    }

    pub fn idempotency_state(&self, key: &str) -> Option<IdempotencySnapshot> {
        self.idempotency.state(key)
    }

    pub fn stats(&self) -> CoordinationStats {
        CoordinationStats::collect(&self.locks, [self.idempotency.counts()])
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
