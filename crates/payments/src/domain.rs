// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Order and payment aggregates

use crate::error::OrderError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(OrderId);
numeric_id!(PaymentId);
numeric_id!(MemberId);

/// Lock key serializing every payment attempt for one order
pub fn payment_lock_key(order_id: OrderId) -> String {
    format!("payment:order:{order_id}")
}

/// Lock key serializing order creation for one client idempotency key
pub fn order_lock_key(idempotency_key: &str) -> String {
    format!("order:idempotency:{idempotency_key}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: u64,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn new(product_id: u64, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// `None` when the line total does not fit in a `Decimal`
    pub fn total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A validated order that has not been stored yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderDraft {
    pub member_id: MemberId,
    pub idempotency_key: String,
    pub lines: Vec<OrderLine>,
    pub total_amount: Decimal,
}

impl OrderDraft {
    pub fn new(
        member_id: MemberId,
        idempotency_key: impl Into<String>,
        lines: Vec<OrderLine>,
    ) -> Result<Self, OrderError> {
        let idempotency_key = idempotency_key.into();
        if idempotency_key.trim().is_empty() {
            return Err(OrderError::InvalidOrder(
                "idempotency key is required".to_string(),
            ));
        }
        if lines.is_empty() {
            return Err(OrderError::InvalidOrder(
                "order must have at least one line".to_string(),
            ));
        }
        if let Some(line) = lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidOrder(format!(
                "quantity must be at least 1 (product {})",
                line.product_id
            )));
        }
        if let Some(line) = lines.iter().find(|l| l.unit_price <= Decimal::ZERO) {
            return Err(OrderError::InvalidOrder(format!(
                "unit price must be positive (product {})",
                line.product_id
            )));
        }

        let total_amount = lines
            .iter()
            .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.total()?))
            .ok_or_else(|| OrderError::InvalidOrder("order total overflows".to_string()))?;
        Ok(Self {
            member_id,
            idempotency_key,
            lines,
            total_amount,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub member_id: MemberId,
    pub idempotency_key: String,
    pub lines: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_id: Option<PaymentId>,
    /// Optimistic concurrency counter, bumped by every successful save
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a stored order from its draft
    pub fn from_draft(id: OrderId, draft: OrderDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            member_id: draft.member_id,
            idempotency_key: draft.idempotency_key,
            lines: draft.lines,
            total_amount: draft.total_amount,
            status: OrderStatus::Pending,
            payment_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentDraft {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub method: String,
    pub transaction_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub method: String,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn from_draft(id: PaymentId, draft: PaymentDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            order_id: draft.order_id,
            amount: draft.amount,
            method: draft.method,
            status: PaymentStatus::Pending,
            transaction_id: draft.transaction_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }
}

/// Snapshot of a finished payment, cached against its idempotency key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub transaction_id: String,
}

impl From<&Payment> for PaymentResult {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            order_id: payment.order_id,
            amount: payment.amount,
            status: payment.status,
            transaction_id: payment.transaction_id.clone(),
        }
    }
}

#[cfg(test)]
#[path = "domain_tests.rs"]
mod tests;
