// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence ports for orders and payments

mod memory;

pub use memory::{MemoryOrderStore, MemoryPaymentStore};

use crate::domain::{Order, OrderDraft, OrderId, Payment, PaymentDraft, PaymentId};
use crate::error::StoreError;
use async_trait::async_trait;

/// Order aggregate storage with optimistic concurrency on `version`
#[async_trait]
pub trait OrderStore: Clone + Send + Sync + 'static {
    /// Store a new order; assigns its id. Fails if the idempotency key is taken.
    async fn insert(&self, draft: OrderDraft) -> Result<Order, StoreError>;

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, StoreError>;

    /// Write `order` if its `version` still matches the stored one.
    ///
    /// Returns the stored order with the bumped version, or
    /// `StoreError::VersionConflict` when someone else saved first.
    async fn save(&self, order: &Order) -> Result<Order, StoreError>;
}

#[async_trait]
pub trait PaymentStore: Clone + Send + Sync + 'static {
    /// Store a new pending payment; assigns its id
    async fn insert(&self, draft: PaymentDraft) -> Result<Payment, StoreError>;

    /// Overwrite an existing payment
    async fn update(&self, payment: &Payment) -> Result<(), StoreError>;

    async fn find(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;

    /// The successful payment for `order_id`, if any
    async fn find_successful(&self, order_id: OrderId) -> Result<Option<Payment>, StoreError>;
}
