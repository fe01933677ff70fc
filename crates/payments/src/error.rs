// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for payment execution and order handling

use crate::domain::{OrderId, OrderStatus, PaymentId};
use pl_core::GuardError;
use std::time::Duration;
use thiserror::Error;

/// Errors from order and payment stores
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("order {order_id} was modified concurrently (read version {expected}, stored {actual})")]
    VersionConflict {
        order_id: OrderId,
        expected: u64,
        actual: u64,
    },
    #[error("idempotency key already used by order {existing}: {key}")]
    DuplicateIdempotencyKey { key: String, existing: OrderId },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the external payment gateway (a declined charge is not an error)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("gateway timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure modes of a guarded payment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("timed out after {wait:?} waiting for lock {key}")]
    LockAcquisitionTimeout { key: String, wait: Duration },
    #[error("payment already in progress for idempotency key {idempotency_key}")]
    ProcessingInProgress { idempotency_key: String },
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("order {order_id} cannot be paid in status {status:?}")]
    OrderNotPayable {
        order_id: OrderId,
        status: OrderStatus,
    },
    #[error("payment {payment_id} for order {order_id} failed: {reason}")]
    PaymentGatewayFailure {
        order_id: OrderId,
        payment_id: PaymentId,
        reason: String,
    },
    #[error(
        "order {order_id} changed while payment {payment_id} ({transaction_id}) was charged; needs reconciliation"
    )]
    ConcurrentModification {
        order_id: OrderId,
        payment_id: PaymentId,
        transaction_id: String,
    },
    #[error("inconsistent state for idempotency key {idempotency_key} (order {order_id}): {detail}")]
    InternalInconsistency {
        idempotency_key: String,
        order_id: OrderId,
        detail: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    /// Whether the caller may retry the same request after a delay
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::LockAcquisitionTimeout { .. } | PaymentError::ProcessingInProgress { .. }
        )
    }
}

impl From<GuardError> for PaymentError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::LockAcquisitionTimeout { key, wait } => {
                PaymentError::LockAcquisitionTimeout { key, wait }
            }
        }
    }
}

/// Errors from order creation and cancellation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("order not found: {0}")]
    NotFound(OrderId),
    #[error("order {0} is already cancelled")]
    AlreadyCancelled(OrderId),
    #[error("idempotency key {0} belongs to another member")]
    KeyConflict(String),
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
