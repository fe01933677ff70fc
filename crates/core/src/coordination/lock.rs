// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease state machine for a single lock key
//!
//! A held lock is a lease: it carries an absolute expiry and a fence number.
//! Transitions are pure; the `LockManager` owns timers and storage.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Identifies one acquisition context (one guarded call, not one process)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerToken(pub String);

impl OwnerToken {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ownership grant on a key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lease {
    pub owner: OwnerToken,
    /// Strictly increasing per manager; identifies this grant for its expiry timer
    pub fence: u64,
    pub acquired_at: Instant,
    pub expires_at: Instant,
}

impl Lease {
    /// Expired once `now` has passed `expires_at`
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockState {
    Free,
    Held(Lease),
}

/// Inputs that drive a lock slot
#[derive(Clone, Debug)]
pub enum LockInput {
    Acquire {
        owner: OwnerToken,
        fence: u64,
        lease: Duration,
    },
    Release {
        owner: OwnerToken,
    },
    Renew {
        owner: OwnerToken,
        lease: Duration,
    },
    /// Expiry timer fired for the grant with this fence
    Expire {
        fence: u64,
    },
    ForceRelease,
}

/// One key's lock
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockSlot {
    pub key: String,
    pub state: LockState,
}

impl LockSlot {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: LockState::Free,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, LockState::Free)
    }

    /// The lease, if one exists and has not expired at `now`
    pub fn live_lease(&self, now: Instant) -> Option<&Lease> {
        match &self.state {
            LockState::Held(lease) if !lease.is_expired(now) => Some(lease),
            _ => None,
        }
    }

    pub fn is_locked(&self, now: Instant) -> bool {
        self.live_lease(now).is_some()
    }

    pub fn is_held_by(&self, owner: &OwnerToken, now: Instant) -> bool {
        self.live_lease(now).is_some_and(|l| &l.owner == owner)
    }

    pub fn fence(&self) -> Option<u64> {
        match &self.state {
            LockState::Free => None,
            LockState::Held(lease) => Some(lease.fence),
        }
    }

    /// Pure state transition function
    pub fn transition(&self, input: LockInput, now: Instant) -> (LockSlot, Vec<Event>) {
        let mut next = self.clone();
        let mut events = Vec::new();

        match input {
            LockInput::Acquire {
                owner,
                fence,
                lease,
            } => match &self.state {
                LockState::Held(current) if !current.is_expired(now) => {
                    if current.owner == owner {
                        // Reentrant: same grant, lease untouched
                        events.push(Event::LockReentered {
                            key: self.key.clone(),
                            owner: owner.0,
                        });
                    } else {
                        events.push(Event::LockDenied {
                            key: self.key.clone(),
                            owner: owner.0,
                            holder: current.owner.0.clone(),
                        });
                    }
                }
                state => {
                    if let LockState::Held(stale) = state {
                        events.push(Event::LockExpired {
                            key: self.key.clone(),
                            owner: stale.owner.0.clone(),
                            fence: stale.fence,
                        });
                    }
                    events.push(Event::LockAcquired {
                        key: self.key.clone(),
                        owner: owner.0.clone(),
                        fence,
                        lease_ms: lease.as_millis() as u64,
                    });
                    next.state = LockState::Held(Lease {
                        owner,
                        fence,
                        acquired_at: now,
                        expires_at: now + lease,
                    });
                }
            },

            LockInput::Release { owner } => match &self.state {
                LockState::Held(current) if current.owner == owner => {
                    next.state = LockState::Free;
                    events.push(Event::LockReleased {
                        key: self.key.clone(),
                        owner: owner.0,
                    });
                }
                state => {
                    let holder = match state {
                        LockState::Held(current) => Some(current.owner.0.clone()),
                        LockState::Free => None,
                    };
                    events.push(Event::LockReleaseIgnored {
                        key: self.key.clone(),
                        owner: owner.0,
                        holder,
                    });
                }
            },

            LockInput::Renew { owner, lease } => {
                if let LockState::Held(current) = &self.state {
                    if current.owner == owner && !current.is_expired(now) {
                        next.state = LockState::Held(Lease {
                            expires_at: now + lease,
                            ..current.clone()
                        });
                        events.push(Event::LockRenewed {
                            key: self.key.clone(),
                            owner: owner.0,
                            lease_ms: lease.as_millis() as u64,
                        });
                    }
                }
            }

            LockInput::Expire { fence } => {
                if let LockState::Held(current) = &self.state {
                    // A timer from an older grant, or one that fired before a
                    // renewal landed, must not free a live lease
                    if current.fence == fence && current.is_expired(now) {
                        next.state = LockState::Free;
                        events.push(Event::LockExpired {
                            key: self.key.clone(),
                            owner: current.owner.0.clone(),
                            fence,
                        });
                    }
                }
            }

            LockInput::ForceRelease => {
                if let LockState::Held(current) = &self.state {
                    next.state = LockState::Free;
                    events.push(Event::LockForceReleased {
                        key: self.key.clone(),
                        owner: current.owner.0.clone(),
                    });
                }
            }
        }

        (next, events)
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
