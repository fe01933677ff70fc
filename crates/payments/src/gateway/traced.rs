// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced gateway wrapper for consistent observability

use super::PaymentGateway;
use crate::domain::PaymentId;
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::Instrument;

/// Wrapper that adds tracing to any PaymentGateway
#[derive(Clone)]
pub struct TracedPaymentGateway<G> {
    inner: G,
}

impl<G> TracedPaymentGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: PaymentGateway> PaymentGateway for TracedPaymentGateway<G> {
    async fn charge(&self, payment_id: PaymentId, amount: Decimal) -> Result<bool, GatewayError> {
        let span = tracing::info_span!("gateway.charge", %payment_id, %amount);

        async {
            tracing::debug!("charging");
            let start = std::time::Instant::now();
            let result = self.inner.charge(payment_id, amount).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(true) => tracing::info!(elapsed_ms, "charged"),
                Ok(false) => tracing::warn!(elapsed_ms, "declined"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "charge failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
