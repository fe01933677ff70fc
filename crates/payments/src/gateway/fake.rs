// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake payment gateway for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::PaymentGateway;
use crate::domain::PaymentId;
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub payment_id: PaymentId,
    pub amount: Decimal,
}

/// Scripted gateway: pops queued outcomes, approves once the script runs out
#[derive(Clone, Default)]
pub struct FakeGateway {
    script: Arc<Mutex<VecDeque<Result<bool, GatewayError>>>>,
    calls: Arc<Mutex<Vec<GatewayCall>>>,
    latency: Arc<Mutex<Duration>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of a future charge
    pub fn push_outcome(&self, outcome: Result<bool, GatewayError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    pub fn decline_next(&self) {
        self.push_outcome(Ok(false));
    }

    /// Make every charge take `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(&self, payment_id: PaymentId, amount: Decimal) -> Result<bool, GatewayError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(GatewayCall { payment_id, amount });

        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Ok(true))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
