// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events emitted by lock and idempotency transitions
//!
//! State machines return these instead of logging directly, so transitions
//! stay pure and tests can assert on exactly what happened. The owning
//! component hands each event to [`Event::log`].

use serde::{Deserialize, Serialize};

/// Why an idempotency record was reset to a fresh `Processing` generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartReason {
    /// The previous holder stayed `Processing` past the processing timeout
    ProcessingTimeout,
    /// The completed result outlived the retention window
    RetentionExpired,
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartReason::ProcessingTimeout => write!(f, "processing-timeout"),
            RestartReason::RetentionExpired => write!(f, "retention-expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // -- lock --
    LockAcquired {
        key: String,
        owner: String,
        fence: u64,
        lease_ms: u64,
    },
    LockReentered {
        key: String,
        owner: String,
    },
    LockDenied {
        key: String,
        owner: String,
        holder: String,
    },
    LockReleased {
        key: String,
        owner: String,
    },
    /// Release attempted by someone other than the current holder
    LockReleaseIgnored {
        key: String,
        owner: String,
        holder: Option<String>,
    },
    LockRenewed {
        key: String,
        owner: String,
        lease_ms: u64,
    },
    LockExpired {
        key: String,
        owner: String,
        fence: u64,
    },
    LockForceReleased {
        key: String,
        owner: String,
    },

    // -- idempotency --
    IdempotencyStarted {
        key: String,
    },
    IdempotencyRestarted {
        key: String,
        reason: RestartReason,
    },
    IdempotencyInProgress {
        key: String,
    },
    IdempotencyReplayed {
        key: String,
    },
    IdempotencyCompleted {
        key: String,
    },
    /// `complete` called for a key the registry does not know
    IdempotencyCompleteUnknown {
        key: String,
    },
    IdempotencyAbandoned {
        key: String,
    },
    IdempotencyPurged {
        count: usize,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::LockAcquired { .. } => "lock:acquired",
            Event::LockReentered { .. } => "lock:reentered",
            Event::LockDenied { .. } => "lock:denied",
            Event::LockReleased { .. } => "lock:released",
            Event::LockReleaseIgnored { .. } => "lock:release-ignored",
            Event::LockRenewed { .. } => "lock:renewed",
            Event::LockExpired { .. } => "lock:expired",
            Event::LockForceReleased { .. } => "lock:force-released",

            Event::IdempotencyStarted { .. } => "idempotency:started",
            Event::IdempotencyRestarted { .. } => "idempotency:restarted",
            Event::IdempotencyInProgress { .. } => "idempotency:in-progress",
            Event::IdempotencyReplayed { .. } => "idempotency:replayed",
            Event::IdempotencyCompleted { .. } => "idempotency:completed",
            Event::IdempotencyCompleteUnknown { .. } => "idempotency:complete-unknown",
            Event::IdempotencyAbandoned { .. } => "idempotency:abandoned",
            Event::IdempotencyPurged { .. } => "idempotency:purged",
        }
    }

    /// Emit the event through `tracing` at the level it deserves
    pub fn log(&self) {
        let event = self.name();
        match self {
            Event::LockAcquired {
                key,
                owner,
                fence,
                lease_ms,
            } => tracing::debug!(event, key = %key, owner = %owner, fence, lease_ms),
            Event::LockReentered { key, owner } | Event::LockReleased { key, owner } => {
                tracing::debug!(event, key = %key, owner = %owner)
            }
            Event::LockDenied { key, owner, holder } => {
                tracing::trace!(event, key = %key, owner = %owner, holder = %holder)
            }
            Event::LockReleaseIgnored { key, owner, holder } => tracing::warn!(
                event,
                key = %key,
                owner = %owner,
                holder = ?holder,
                "release by non-owner ignored"
            ),
            Event::LockRenewed {
                key,
                owner,
                lease_ms,
            } => tracing::trace!(event, key = %key, owner = %owner, lease_ms),
            Event::LockExpired { key, owner, fence } => tracing::warn!(
                event,
                key = %key,
                owner = %owner,
                fence,
                "lease expired without release"
            ),
            Event::LockForceReleased { key, owner } => {
                tracing::warn!(event, key = %key, owner = %owner, "lock force-released")
            }
            Event::IdempotencyRestarted { key, reason } => {
                tracing::warn!(event, key = %key, %reason, "idempotency key restarted")
            }
            Event::IdempotencyCompleteUnknown { key } => {
                tracing::warn!(event, key = %key, "no record to complete")
            }
            Event::IdempotencyPurged { count } => tracing::debug!(event, count),
            Event::IdempotencyStarted { key }
            | Event::IdempotencyInProgress { key }
            | Event::IdempotencyReplayed { key }
            | Event::IdempotencyCompleted { key }
            | Event::IdempotencyAbandoned { key } => tracing::debug!(event, key = %key),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
