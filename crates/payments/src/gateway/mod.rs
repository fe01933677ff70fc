// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External payment gateway port

mod simulated;
mod traced;

pub use simulated::SimulatedGateway;
pub use traced::TracedPaymentGateway;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGateway, GatewayCall};

use crate::domain::PaymentId;
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Charges money. The one step of a payment expected to be slow.
#[async_trait]
pub trait PaymentGateway: Clone + Send + Sync + 'static {
    /// `Ok(true)` when charged, `Ok(false)` when declined
    async fn charge(&self, payment_id: PaymentId, amount: Decimal) -> Result<bool, GatewayError>;
}
