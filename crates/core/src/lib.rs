// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pl-core: in-process concurrency control for exactly-once side effects
//!
//! This crate provides:
//! - Lease-based keyed locks with expiry timers
//! - Guarded execution with guaranteed release
//! - An idempotency registry for request deduplication
//! - Clock and id abstractions for deterministic tests

pub mod clock;
pub mod config;
pub mod coordination;
pub mod event;
pub mod id;
pub mod idempotency;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{load_toml, ConfigError, IdempotencyConfig, LockConfig};
pub use coordination::{
    AcquireFailurePolicy, CoordinationStats, GuardError, GuardOptions, GuardedExecutor,
    LockManager, LockSnapshot, MaintenanceConfig, MaintenanceHandle, MaintenanceTask,
    OwnerToken, SweepReport,
};
pub use event::{Event, RestartReason};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use idempotency::{
    IdempotencyCheck, IdempotencyClaim, IdempotencyCounts, IdempotencyPhase, IdempotencyRegistry,
    IdempotencySnapshot,
};
