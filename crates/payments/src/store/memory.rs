// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory stores
//!
//! `Arc<RwLock<..>>` tables shared by every clone, suitable for tests and the
//! simulator.

use super::{OrderStore, PaymentStore};
use crate::domain::{Order, OrderDraft, OrderId, Payment, PaymentDraft, PaymentId, PaymentStatus};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    by_key: HashMap<String, OrderId>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.orders.len()
    }

    pub async fn all(&self) -> Vec<Order> {
        let table = self.table.read().await;
        let mut orders: Vec<_> = table.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.id);
        orders
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        let mut table = self.table.write().await;
        if let Some(existing) = table.by_key.get(&draft.idempotency_key) {
            return Err(StoreError::DuplicateIdempotencyKey {
                key: draft.idempotency_key,
                existing: *existing,
            });
        }

        table.next_id += 1;
        let order = Order::from_draft(OrderId(table.next_id), draft, Utc::now());
        table.by_key.insert(order.idempotency_key.clone(), order.id);
        table.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.table.read().await.orders.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .by_key
            .get(key)
            .and_then(|id| table.orders.get(id))
            .cloned())
    }

    async fn save(&self, order: &Order) -> Result<Order, StoreError> {
        let mut table = self.table.write().await;
        let stored = table.orders.get_mut(&order.id).ok_or(StoreError::NotFound {
            entity: "order",
            id: order.id.0,
        })?;

        if stored.version != order.version {
            return Err(StoreError::VersionConflict {
                order_id: order.id,
                expected: order.version,
                actual: stored.version,
            });
        }

        *stored = Order {
            version: order.version + 1,
            updated_at: Utc::now(),
            ..order.clone()
        };
        Ok(stored.clone())
    }
}

#[derive(Default)]
struct PaymentTable {
    payments: HashMap<PaymentId, Payment>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct MemoryPaymentStore {
    table: Arc<RwLock<PaymentTable>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn for_order(&self, order_id: OrderId) -> Vec<Payment> {
        let table = self.table.read().await;
        let mut payments: Vec<_> = table
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.id);
        payments
    }

    /// Administrative removal, used to exercise replay verification
    pub async fn remove(&self, id: PaymentId) -> Option<Payment> {
        self.table.write().await.payments.remove(&id)
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, draft: PaymentDraft) -> Result<Payment, StoreError> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let payment = Payment::from_draft(PaymentId(table.next_id), draft, Utc::now());
        table.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn update(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        match table.payments.get_mut(&payment.id) {
            Some(stored) => {
                *stored = payment.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "payment",
                id: payment.id.0,
            }),
        }
    }

    async fn find(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.table.read().await.payments.get(&id).cloned())
    }

    async fn find_successful(&self, order_id: OrderId) -> Result<Option<Payment>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .payments
            .values()
            .filter(|p| p.order_id == order_id && p.status == PaymentStatus::Success)
            .min_by_key(|p| p.id)
            .cloned())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
