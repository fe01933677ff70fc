// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pl-payments: exactly-once order payments
//!
//! Orders and payments, the stores and gateway they sit behind, and the
//! guarded idempotent protocol that charges each order at most once.

pub mod admin;
pub mod backend;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod protocol;
pub mod settings;
pub mod store;
pub mod system;

#[cfg(test)]
mod testing;

pub use admin::AdminSurface;
pub use backend::{PaymentAdapters, PaymentBackend};
pub use domain::{
    MemberId, Order, OrderDraft, OrderId, OrderLine, OrderStatus, Payment, PaymentId,
    PaymentResult, PaymentStatus,
};
pub use error::{GatewayError, OrderError, PaymentError, StoreError};
pub use gateway::{PaymentGateway, SimulatedGateway, TracedPaymentGateway};
pub use orders::OrderService;
pub use protocol::{PaymentExecutionProtocol, DEFAULT_PAYMENT_METHOD};
pub use settings::{PaymentConfig, Settings};
pub use store::{MemoryOrderStore, MemoryPaymentStore, OrderStore, PaymentStore};
pub use system::PaymentSystem;

#[cfg(any(test, feature = "test-support"))]
pub use gateway::{FakeGateway, GatewayCall};
