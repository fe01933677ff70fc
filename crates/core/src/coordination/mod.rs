// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination primitives for keyed mutual exclusion
//!
//! This module provides:
//! - **Lock** - Pure lease state machine for a single key
//! - **LockManager** - Keyed leases with expiry timers
//! - **GuardedExecutor** - Acquire, run, always release
//! - **MaintenanceTask** - Periodic sweep of expired state

pub mod guard;
pub mod lock;
pub mod maintenance;
pub mod manager;

pub use guard::{AcquireFailurePolicy, GuardError, GuardOptions, GuardedExecutor};
pub use lock::{Lease, LockInput, LockSlot, LockState, OwnerToken};
pub use maintenance::{
    CoordinationStats, MaintenanceConfig, MaintenanceHandle, MaintenanceTask, SweepReport,
    Sweepable,
};
pub use manager::{LockManager, LockSnapshot};
