// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::PaymentBackend;
use crate::domain::{MemberId, OrderDraft, OrderLine};
use crate::error::GatewayError;
use crate::gateway::FakeGateway;
use crate::store::{MemoryOrderStore, MemoryPaymentStore};
use crate::testing::with_tracing;
use pl_core::{IdempotencyConfig, IdempotencyPhase, LockConfig, OwnerToken};
use rust_decimal_macros::dec;
use std::time::Duration;

type Backend = PaymentBackend<MemoryOrderStore, MemoryPaymentStore, FakeGateway>;

struct Harness {
    protocol: PaymentExecutionProtocol<Backend>,
    orders: MemoryOrderStore,
    payments: MemoryPaymentStore,
    gateway: FakeGateway,
}

fn harness() -> Harness {
    harness_with(GuardOptions::new(Duration::from_secs(2), Duration::from_secs(30)))
}

fn harness_with(options: GuardOptions) -> Harness {
    let orders = MemoryOrderStore::new();
    let payments = MemoryPaymentStore::new();
    let gateway = FakeGateway::new();
    let locks = LockManager::with_system_clock(
        LockConfig::default().with_retry_interval(Duration::from_millis(5)),
    );
    let protocol = PaymentExecutionProtocol::new(
        PaymentBackend::new(orders.clone(), payments.clone(), gateway.clone()),
        locks,
        IdempotencyRegistry::with_system_clock(IdempotencyConfig::default()),
        UuidIdGen,
    )
    .with_options(options);

    Harness {
        protocol,
        orders,
        payments,
        gateway,
    }
}

impl Harness {
    async fn seed_order(&self, key: &str) -> Order {
        let draft = OrderDraft::new(
            MemberId(1),
            key,
            vec![OrderLine::new(100, 2, dec!(15.00))],
        )
        .unwrap();
        self.orders.insert(draft).await.unwrap()
    }

    async fn order(&self, id: OrderId) -> Order {
        self.orders.find(id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn first_payment_charges_and_marks_order_paid() {
    let h = harness();
    let order = h.seed_order("order-1").await;

    let result = h
        .protocol
        .run_guarded_payment(order.id, "X", "CARD")
        .await
        .unwrap();

    assert_eq!(result.order_id, order.id);
    assert_eq!(result.amount, dec!(30.00));
    assert_eq!(result.status, PaymentStatus::Success);
    let suffix = result.transaction_id.strip_prefix("TXN_").unwrap();
    assert_eq!(suffix.len(), 16);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

    let stored = h.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::Paid);
    assert_eq!(stored.payment_id, Some(result.payment_id));
    assert_eq!(stored.version, 1);

    assert_eq!(h.gateway.call_count(), 1);
    assert_eq!(
        h.protocol.idempotency().state("X").unwrap().phase,
        IdempotencyPhase::Completed
    );
    assert!(!h.protocol.locks().is_locked("payment:order:1"));
}

#[tokio::test]
async fn retry_with_same_key_replays_without_charging() {
    let h = harness();
    let order = h.seed_order("order-1").await;

    let first = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();
    let second = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.gateway.call_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_calls_share_one_charge() {
    let h = harness();
    h.gateway.set_latency(Duration::from_millis(100));
    let order = h.seed_order("order-7").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let protocol = h.protocol.clone();
        tasks.push(tokio::spawn(async move {
            protocol.run_guarded_payment(order.id, "X", "CARD").await
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().unwrap());
    }

    assert_eq!(h.gateway.call_count(), 1);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(h.payments.for_order(order.id).await.len(), 1);
}

#[tokio::test]
async fn key_held_elsewhere_reports_in_progress() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    assert!(!h.protocol.idempotency().check("X").is_duplicate());

    let err = h
        .protocol
        .run_guarded_payment(order.id, "X", "CARD")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PaymentError::ProcessingInProgress {
            idempotency_key: "X".into()
        }
    );
    assert!(err.is_retryable());
    assert_eq!(h.gateway.call_count(), 0);
    // The owner's marker is left alone
    assert_eq!(
        h.protocol.idempotency().state("X").unwrap().phase,
        IdempotencyPhase::Processing
    );
}

#[tokio::test]
async fn missing_order_abandons_key() {
    let h = harness();

    let err = h
        .protocol
        .run_guarded_payment(OrderId(404), "X", "CARD")
        .await
        .unwrap_err();

    assert_eq!(err, PaymentError::OrderNotFound(OrderId(404)));
    assert_eq!(h.protocol.idempotency().state("X"), None);
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn cancelled_order_is_never_charged() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    h.orders
        .save(&Order {
            status: OrderStatus::Cancelled,
            ..order.clone()
        })
        .await
        .unwrap();

    let err = h
        .protocol
        .run_guarded_payment(order.id, "fresh-key", "CARD")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PaymentError::OrderNotPayable {
            order_id: order.id,
            status: OrderStatus::Cancelled,
        }
    );
    assert_eq!(h.gateway.call_count(), 0);
    assert!(h.payments.for_order(order.id).await.is_empty());
    assert_eq!(h.order(order.id).await.status, OrderStatus::Cancelled);
    assert_eq!(h.protocol.idempotency().state("fresh-key"), None);
}

#[tokio::test]
async fn refunded_order_is_not_charged_under_new_key() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    let paid = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();
    h.protocol.cancel_payment(paid.payment_id).await.unwrap();
    let stored = h.order(order.id).await;
    h.orders
        .save(&Order {
            status: OrderStatus::Cancelled,
            ..stored
        })
        .await
        .unwrap();

    let err = h
        .protocol
        .run_guarded_payment(order.id, "Y", "CARD")
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::OrderNotPayable { .. }));
    assert_eq!(h.gateway.call_count(), 1);
    assert_eq!(h.order(order.id).await.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn cancelled_payment_future_frees_key_and_lock() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    h.gateway.set_latency(Duration::from_millis(500));

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        h.protocol.run_guarded_payment(order.id, "X", "CARD"),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(h.protocol.idempotency().state("X"), None);
    assert!(!h.protocol.locks().is_locked(&payment_lock_key(order.id)));

    h.gateway.set_latency(Duration::ZERO);
    let result = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();
    assert_eq!(result.status, PaymentStatus::Success);
    assert_eq!(h.order(order.id).await.status, OrderStatus::Paid);
    assert_eq!(
        h.protocol.idempotency().state("X").map(|s| s.phase),
        Some(IdempotencyPhase::Completed)
    );
}

#[tokio::test]
async fn declined_charge_fails_then_retry_succeeds() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    h.gateway.decline_next();

    let err = h
        .protocol
        .run_guarded_payment(order.id, "X", "CARD")
        .await
        .unwrap_err();

    let PaymentError::PaymentGatewayFailure { payment_id, .. } = err else {
        panic!("expected gateway failure, got {err:?}");
    };
    assert!(!err.is_retryable());
    let failed = h.payments.find(payment_id).await.unwrap().unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert_eq!(h.order(order.id).await.status, OrderStatus::Pending);
    assert_eq!(h.protocol.idempotency().state("X"), None);

    let retried = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();
    assert_eq!(retried.status, PaymentStatus::Success);
    assert_ne!(retried.payment_id, payment_id);
    assert_eq!(h.gateway.call_count(), 2);
    assert_eq!(h.order(order.id).await.status, OrderStatus::Paid);
}

#[tokio::test]
async fn gateway_error_is_reported_as_failure() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    h.gateway
        .push_outcome(Err(GatewayError::Unavailable("card network down".into())));

    let err = h
        .protocol
        .run_guarded_payment(order.id, "X", "CARD")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::PaymentGatewayFailure { ref reason, .. } if reason.contains("card network down")
    ));
}

#[tokio::test]
async fn second_key_for_paid_order_reuses_payment() {
    let h = harness();
    let order = h.seed_order("order-1").await;

    let first = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();
    let second = h.protocol.run_guarded_payment(order.id, "Z", "CARD").await.unwrap();

    assert_eq!(first.payment_id, second.payment_id);
    assert_eq!(h.gateway.call_count(), 1);
    assert_eq!(h.order(order.id).await.version, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_keys_for_same_order_serialize() {
    let h = harness();
    h.gateway.set_latency(Duration::from_millis(50));
    let order = h.seed_order("order-1").await;

    let a = {
        let protocol = h.protocol.clone();
        tokio::spawn(async move { protocol.run_guarded_payment(order.id, "A", "CARD").await })
    };
    let b = {
        let protocol = h.protocol.clone();
        tokio::spawn(async move { protocol.run_guarded_payment(order.id, "B", "CARD").await })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert_eq!(a.payment_id, b.payment_id);
    assert_eq!(h.gateway.call_count(), 1);
}

#[test]
fn order_changed_during_charge_needs_reconciliation() {
    let (logs, ()) = with_tracing(|| async {
        let h = harness();
        h.gateway.set_latency(Duration::from_millis(200));
        let order = h.seed_order("order-1").await;

        let payment = {
            let protocol = h.protocol.clone();
            tokio::spawn(async move { protocol.run_guarded_payment(order.id, "X", "CARD").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Any save bumps the version the payment read
        let concurrent = h.order(order.id).await;
        h.orders.save(&concurrent).await.unwrap();

        let err = payment.await.unwrap().unwrap_err();
        let PaymentError::ConcurrentModification { payment_id, .. } = err else {
            panic!("expected concurrent modification, got {err:?}");
        };

        // The charge went through; the order write did not
        let charged = h.payments.find(payment_id).await.unwrap().unwrap();
        assert_eq!(charged.status, PaymentStatus::Success);
        assert_eq!(h.order(order.id).await.status, OrderStatus::Pending);
        assert_eq!(h.protocol.idempotency().state("X"), None);

        // A retry repairs the order status without charging again
        let retried = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();
        assert_eq!(retried.payment_id, payment_id);
        assert_eq!(h.gateway.call_count(), 1);
        let repaired = h.order(order.id).await;
        assert_eq!(repaired.status, OrderStatus::Paid);
        assert_eq!(repaired.payment_id, Some(payment_id));
    });

    assert!(logs.contains("reconciliation=true"), "Logs:\n{logs}");
    assert!(logs.contains("order modified after successful charge"), "Logs:\n{logs}");
}

#[tokio::test]
async fn replay_of_missing_payment_is_inconsistent() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    let first = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();
    h.payments.remove(first.payment_id).await;

    let err = h
        .protocol
        .run_guarded_payment(order.id, "X", "CARD")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::InternalInconsistency { ref idempotency_key, order_id, .. }
            if idempotency_key == "X" && order_id == order.id
    ));
}

#[tokio::test]
async fn key_reused_for_another_order_is_inconsistent() {
    let h = harness();
    let first = h.seed_order("order-1").await;
    let second = h.seed_order("order-2").await;
    h.protocol.run_guarded_payment(first.id, "X", "CARD").await.unwrap();

    let err = h
        .protocol
        .run_guarded_payment(second.id, "X", "CARD")
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::InternalInconsistency { order_id, .. } if order_id == second.id));
    assert_eq!(h.gateway.call_count(), 1);
    assert_eq!(h.order(second.id).await.status, OrderStatus::Pending);
}

#[tokio::test]
async fn lock_timeout_surfaces_before_idempotency_check() {
    let h = harness_with(GuardOptions::new(Duration::from_millis(50), Duration::from_secs(30)));
    let order = h.seed_order("order-1").await;
    assert!(h.protocol.locks().try_acquire_once(
        &payment_lock_key(order.id),
        &OwnerToken::new("other"),
        Duration::from_secs(30),
    ));

    let err = h
        .protocol
        .run_guarded_payment(order.id, "X", "CARD")
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::LockAcquisitionTimeout { .. }));
    assert!(err.is_retryable());
    assert_eq!(h.protocol.idempotency().state("X"), None);
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn cancel_payment_marks_success_cancelled() {
    let h = harness();
    let order = h.seed_order("order-1").await;
    let paid = h.protocol.run_guarded_payment(order.id, "X", "CARD").await.unwrap();

    let cancelled = h.protocol.cancel_payment(paid.payment_id).await.unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);
    assert_eq!(
        h.payments.find(paid.payment_id).await.unwrap().unwrap().status,
        PaymentStatus::Cancelled
    );

    let again = h.protocol.cancel_payment(paid.payment_id).await.unwrap();
    assert_eq!(again.status, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn cancel_unknown_payment_is_not_found() {
    let h = harness();
    let err = h.protocol.cancel_payment(PaymentId(9)).await.unwrap_err();
    assert_eq!(
        err,
        PaymentError::Store(StoreError::NotFound {
            entity: "payment",
            id: 9,
        })
    );
}
