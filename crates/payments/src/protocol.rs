// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payment execution protocol
//!
//! One guarded, idempotent, optimistically-written charge per order:
//!
//! 1. lock `payment:order:{id}` through the guarded executor
//! 2. classify the idempotency key (replay, in progress, fresh)
//! 3. load the order, reuse an existing successful payment if there is one,
//!    refuse anything but a `Pending` order
//! 4. insert a pending payment, charge it, record the outcome
//! 5. write the order status against the version read in step 3
//! 6. complete the key on success, abandon it on any failure
//!
//! A lost version check after a successful charge cannot be retried away: the
//! money already moved. It surfaces as `ConcurrentModification` and is logged
//! for reconciliation.

use crate::backend::PaymentAdapters;
use crate::domain::{
    payment_lock_key, Order, OrderId, OrderStatus, Payment, PaymentDraft, PaymentId,
    PaymentResult, PaymentStatus,
};
use crate::error::{PaymentError, StoreError};
use crate::gateway::PaymentGateway;
use crate::store::{OrderStore, PaymentStore};
use pl_core::{
    Clock, GuardOptions, GuardedExecutor, IdGen, IdempotencyCheck, IdempotencyRegistry,
    LockManager, SystemClock, UuidIdGen,
};
use tracing::Instrument;

pub const DEFAULT_PAYMENT_METHOD: &str = "DEFAULT";

#[derive(Clone)]
pub struct PaymentExecutionProtocol<A: PaymentAdapters, C: Clock = SystemClock, I: IdGen = UuidIdGen>
{
    adapters: A,
    guard: GuardedExecutor<C, I>,
    idempotency: IdempotencyRegistry<PaymentResult, C>,
    options: GuardOptions,
    ids: I,
}

impl<A: PaymentAdapters, C: Clock, I: IdGen> PaymentExecutionProtocol<A, C, I> {
    pub fn new(
        adapters: A,
        locks: LockManager<C>,
        idempotency: IdempotencyRegistry<PaymentResult, C>,
        ids: I,
    ) -> Self {
        Self {
            adapters,
            guard: GuardedExecutor::with_ids(locks, ids.clone()),
            idempotency,
            options: GuardOptions::default(),
            ids,
        }
    }

    pub fn with_options(mut self, options: GuardOptions) -> Self {
        self.options = options;
        self
    }

    pub fn adapters(&self) -> &A {
        &self.adapters
    }

    pub fn guard(&self) -> &GuardedExecutor<C, I> {
        &self.guard
    }

    pub fn locks(&self) -> &LockManager<C> {
        self.guard.locks()
    }

    pub fn idempotency(&self) -> &IdempotencyRegistry<PaymentResult, C> {
        &self.idempotency
    }

    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    /// Charge `order_id` at most once per `idempotency_key`
    pub async fn run_guarded_payment(
        &self,
        order_id: OrderId,
        idempotency_key: &str,
        payment_method: &str,
    ) -> Result<PaymentResult, PaymentError> {
        let span = tracing::info_span!("payment", %order_id, idempotency_key);
        let lock_key = payment_lock_key(order_id);

        self.guard
            .run_guarded(
                &lock_key,
                &self.options,
                self.execute(order_id, idempotency_key, payment_method),
            )
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        order_id: OrderId,
        idempotency_key: &str,
        payment_method: &str,
    ) -> Result<PaymentResult, PaymentError> {
        match self.idempotency.check(idempotency_key) {
            IdempotencyCheck::Completed(cached) => {
                return self.replay(cached, order_id, idempotency_key).await;
            }
            IdempotencyCheck::InProgress => {
                return Err(PaymentError::ProcessingInProgress {
                    idempotency_key: idempotency_key.to_string(),
                });
            }
            IdempotencyCheck::Fresh => {}
        }

        // Abandoned on drop if this future is cancelled mid-charge
        let claim = self.idempotency.claim(idempotency_key);
        match self.charge_order(order_id, payment_method).await {
            Ok(result) => {
                claim.complete(result.clone());
                Ok(result)
            }
            Err(e) => {
                claim.abandon();
                tracing::error!(error = %e, "payment failed");
                Err(e)
            }
        }
    }

    /// Serve a cached result after checking it still points at a real payment
    async fn replay(
        &self,
        cached: PaymentResult,
        order_id: OrderId,
        idempotency_key: &str,
    ) -> Result<PaymentResult, PaymentError> {
        let detail = if cached.order_id != order_id {
            format!("key already completed for order {}", cached.order_id)
        } else {
            match self.adapters.payments().find(cached.payment_id).await? {
                Some(_) => {
                    tracing::debug!(payment_id = %cached.payment_id, "replaying cached payment");
                    return Ok(cached);
                }
                None => format!("cached payment {} missing from store", cached.payment_id),
            }
        };

        tracing::error!(idempotency_key, %order_id, %detail, "idempotency record inconsistent");
        Err(PaymentError::InternalInconsistency {
            idempotency_key: idempotency_key.to_string(),
            order_id,
            detail,
        })
    }

    async fn charge_order(
        &self,
        order_id: OrderId,
        payment_method: &str,
    ) -> Result<PaymentResult, PaymentError> {
        let orders = self.adapters.orders();
        let payments = self.adapters.payments();

        let order = orders
            .find(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        if let Some(existing) = payments.find_successful(order_id).await? {
            tracing::warn!(payment_id = %existing.id, "order already paid, reusing payment");
            if order.status == OrderStatus::Pending {
                self.mark_order_paid(order, &existing).await?;
            }
            return Ok(PaymentResult::from(&existing));
        }

        if order.status != OrderStatus::Pending {
            tracing::warn!(status = ?order.status, "order is not payable");
            return Err(PaymentError::OrderNotPayable {
                order_id,
                status: order.status,
            });
        }

        let payment = payments
            .insert(PaymentDraft {
                order_id,
                amount: order.total_amount,
                method: payment_method.to_string(),
                transaction_id: self.transaction_id(),
            })
            .await?;

        let declined = match self.adapters.gateway().charge(payment.id, payment.amount).await {
            Ok(true) => None,
            Ok(false) => Some("declined by gateway".to_string()),
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = declined {
            let failed = payment.with_status(PaymentStatus::Failed);
            payments.update(&failed).await?;
            return Err(PaymentError::PaymentGatewayFailure {
                order_id,
                payment_id: failed.id,
                reason,
            });
        }

        let charged = payment.with_status(PaymentStatus::Success);
        payments.update(&charged).await?;
        self.mark_order_paid(order, &charged).await?;

        tracing::info!(
            payment_id = %charged.id,
            transaction_id = %charged.transaction_id,
            amount = %charged.amount,
            "payment succeeded"
        );
        Ok(PaymentResult::from(&charged))
    }

    /// Optimistic write of `Paid` against the version `order` was read at
    async fn mark_order_paid(&self, order: Order, payment: &Payment) -> Result<(), PaymentError> {
        let order_id = order.id;
        let paid = Order {
            status: OrderStatus::Paid,
            payment_id: Some(payment.id),
            ..order
        };

        match self.adapters.orders().save(&paid).await {
            Ok(_) => Ok(()),
            Err(StoreError::VersionConflict {
                expected, actual, ..
            }) => {
                tracing::error!(
                    reconciliation = true,
                    %order_id,
                    payment_id = %payment.id,
                    transaction_id = %payment.transaction_id,
                    expected_version = expected,
                    actual_version = actual,
                    "order modified after successful charge"
                );
                Err(PaymentError::ConcurrentModification {
                    order_id,
                    payment_id: payment.id,
                    transaction_id: payment.transaction_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a successful payment cancelled. Other statuses are left alone.
    pub async fn cancel_payment(&self, payment_id: PaymentId) -> Result<PaymentResult, PaymentError> {
        let payments = self.adapters.payments();
        let payment = payments
            .find(payment_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "payment",
                id: payment_id.0,
            })?;

        if payment.status != PaymentStatus::Success {
            tracing::debug!(%payment_id, status = ?payment.status, "nothing to cancel");
            return Ok(PaymentResult::from(&payment));
        }

        let cancelled = payment.with_status(PaymentStatus::Cancelled);
        payments.update(&cancelled).await?;
        tracing::info!(
            %payment_id,
            transaction_id = %cancelled.transaction_id,
            "payment cancelled"
        );
        Ok(PaymentResult::from(&cancelled))
    }

    /// `TXN_` followed by 16 upper-case characters
    fn transaction_id(&self) -> String {
        format!("TXN_{}", self.ids.next_compact(16))
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
