// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Order creation and cancellation on top of the payment protocol

use crate::backend::PaymentAdapters;
use crate::domain::{
    order_lock_key, payment_lock_key, MemberId, Order, OrderDraft, OrderId, OrderLine,
    OrderStatus,
};
use crate::error::OrderError;
use crate::protocol::{PaymentExecutionProtocol, DEFAULT_PAYMENT_METHOD};
use crate::store::{OrderStore, PaymentStore};
use pl_core::{Clock, IdGen, SystemClock, UuidIdGen};

#[derive(Clone)]
pub struct OrderService<A: PaymentAdapters, C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    protocol: PaymentExecutionProtocol<A, C, I>,
}

/// Idempotency key of the payment made on behalf of an order
pub fn payment_key_for(order_key: &str) -> String {
    format!("{order_key}:payment")
}

impl<A: PaymentAdapters, C: Clock, I: IdGen> OrderService<A, C, I> {
    pub fn new(protocol: PaymentExecutionProtocol<A, C, I>) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> &PaymentExecutionProtocol<A, C, I> {
        &self.protocol
    }

    /// Create and pay for an order, once per `idempotency_key`.
    ///
    /// A repeated key returns the stored order; if its payment never went
    /// through, the payment is attempted again under the same derived key.
    pub async fn create_order(
        &self,
        member_id: MemberId,
        idempotency_key: &str,
        lines: Vec<OrderLine>,
    ) -> Result<Order, OrderError> {
        let orders = self.protocol.adapters().orders();

        self.protocol
            .guard()
            .run_guarded(&order_lock_key(idempotency_key), self.protocol.options(), async {
                if let Some(existing) = orders.find_by_idempotency_key(idempotency_key).await? {
                    if existing.member_id != member_id {
                        return Err(OrderError::KeyConflict(idempotency_key.to_string()));
                    }
                    if existing.status != OrderStatus::Pending {
                        tracing::info!(order_id = %existing.id, "order already exists for key");
                        return Ok(existing);
                    }
                    tracing::info!(order_id = %existing.id, "retrying payment for pending order");
                    return self.pay(existing).await;
                }

                let order = orders
                    .insert(OrderDraft::new(member_id, idempotency_key, lines)?)
                    .await?;
                tracing::info!(
                    order_id = %order.id,
                    %member_id,
                    total_amount = %order.total_amount,
                    "order created"
                );
                self.pay(order).await
            })
            .await
    }

    async fn pay(&self, order: Order) -> Result<Order, OrderError> {
        let result = self
            .protocol
            .run_guarded_payment(
                order.id,
                &payment_key_for(&order.idempotency_key),
                DEFAULT_PAYMENT_METHOD,
            )
            .await?;

        let paid = self
            .protocol
            .adapters()
            .orders()
            .find(order.id)
            .await?
            .ok_or(OrderError::NotFound(order.id))?;
        tracing::info!(
            order_id = %paid.id,
            payment_id = %result.payment_id,
            total_amount = %paid.total_amount,
            "order paid"
        );
        Ok(paid)
    }

    /// Cancel an order owned by `member_id`, cancelling its payment first
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        member_id: MemberId,
    ) -> Result<Order, OrderError> {
        self.protocol
            .guard()
            .run_guarded(&payment_lock_key(order_id), self.protocol.options(), async {
                let orders = self.protocol.adapters().orders();
                let order = orders
                    .find(order_id)
                    .await?
                    .filter(|o| o.member_id == member_id)
                    .ok_or(OrderError::NotFound(order_id))?;

                match order.status {
                    OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled(order_id)),
                    OrderStatus::Pending | OrderStatus::Paid => {}
                }

                let payment_id = match order.payment_id {
                    Some(id) => Some(id),
                    // A charge whose order write lost a race still has to be undone
                    None => self
                        .protocol
                        .adapters()
                        .payments()
                        .find_successful(order_id)
                        .await?
                        .map(|p| p.id),
                };
                if let Some(payment_id) = payment_id {
                    self.protocol.cancel_payment(payment_id).await?;
                }

                let cancelled = orders
                    .save(&Order {
                        status: OrderStatus::Cancelled,
                        ..order
                    })
                    .await?;
                tracing::info!(%order_id, "order cancelled");
                Ok(cancelled)
            })
            .await
    }
}

#[cfg(test)]
#[path = "orders_tests.rs"]
mod tests;
