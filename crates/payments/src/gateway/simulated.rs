// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulated gateway: fixed latency and a deterministic decline pattern

use super::PaymentGateway;
use crate::domain::PaymentId;
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SimulatedGateway {
    latency: Duration,
    /// Decline every Nth charge
    fail_every: Option<u64>,
    calls: Arc<AtomicU64>,
}

impl Default for SimulatedGateway {
    /// Two seconds per charge, one in ten declined
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Some(10))
    }
}

impl SimulatedGateway {
    pub fn new(latency: Duration, fail_every: Option<u64>) -> Self {
        Self {
            latency,
            fail_every: fail_every.filter(|n| *n > 0),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Charges attempted so far, across clones
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, _payment_id: PaymentId, _amount: Decimal) -> Result<bool, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(!matches!(self.fail_every, Some(every) if n % every == 0))
    }
}

#[cfg(test)]
#[path = "simulated_tests.rs"]
mod tests;
