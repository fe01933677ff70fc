// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent duplicate payment requests against in-memory orders

use anyhow::Result;
use pl_payments::{
    orders::payment_key_for, MemberId, MemoryOrderStore, MemoryPaymentStore, OrderDraft,
    OrderLine, OrderStatus, OrderStore, PaymentBackend, PaymentError, PaymentResult,
    PaymentSystem, Settings, SimulatedGateway, TracedPaymentGateway, DEFAULT_PAYMENT_METHOD,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::{Duration, Instant};

type Backend =
    PaymentBackend<MemoryOrderStore, MemoryPaymentStore, TracedPaymentGateway<SimulatedGateway>>;

#[derive(clap::Args)]
pub struct SimulateArgs {
    /// Orders to seed
    #[arg(long, default_value = "3")]
    pub orders: u64,

    /// Concurrent payment attempts per order, all sharing one idempotency key
    #[arg(long, default_value = "5")]
    pub attempts: u32,

    /// Decline every Nth gateway charge
    #[arg(long)]
    pub fail_every: Option<u64>,

    /// Gateway latency (milliseconds)
    #[arg(long, default_value = "2000")]
    pub latency: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    pub orders: u64,
    pub attempts: u64,
    pub gateway_calls: u64,
    pub paid: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub in_progress: u64,
    pub lock_timeouts: u64,
    pub other_errors: u64,
    pub elapsed_ms: u64,
}

impl SimulationSummary {
    /// Count one attempt's outcome
    pub fn record(&mut self, outcome: &Result<PaymentResult, PaymentError>) {
        self.attempts += 1;
        match outcome {
            Ok(_) => self.succeeded += 1,
            Err(PaymentError::PaymentGatewayFailure { .. }) => self.failed += 1,
            Err(PaymentError::ProcessingInProgress { .. }) => self.in_progress += 1,
            Err(PaymentError::LockAcquisitionTimeout { .. }) => self.lock_timeouts += 1,
            Err(_) => self.other_errors += 1,
        }
    }
}

pub async fn handle(args: SimulateArgs, settings: &Settings) -> Result<()> {
    let summary = run(&args, settings).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub async fn run(args: &SimulateArgs, settings: &Settings) -> Result<SimulationSummary> {
    let gateway = SimulatedGateway::new(Duration::from_millis(args.latency), args.fail_every);
    let orders = MemoryOrderStore::new();
    let system: PaymentSystem<Backend> = PaymentSystem::new(
        settings,
        PaymentBackend::new(
            orders.clone(),
            MemoryPaymentStore::new(),
            TracedPaymentGateway::new(gateway.clone()),
        ),
    );
    let _maintenance = system.start_maintenance();

    let started = Instant::now();
    let mut tasks = Vec::new();
    for n in 1..=args.orders {
        let key = format!("sim-{n}");
        let draft = OrderDraft::new(
            MemberId(n),
            key.as_str(),
            vec![OrderLine::new(n, 1, Decimal::new(1999, 2))],
        )?;
        let order = orders.insert(draft).await?;

        for _ in 0..args.attempts {
            let protocol = system.protocol().clone();
            let payment_key = payment_key_for(&key);
            tasks.push(tokio::spawn(async move {
                protocol
                    .run_guarded_payment(order.id, &payment_key, DEFAULT_PAYMENT_METHOD)
                    .await
            }));
        }
    }
    tracing::info!(
        orders = args.orders,
        attempts = tasks.len(),
        "payment attempts started"
    );

    let mut summary = SimulationSummary {
        orders: args.orders,
        ..SimulationSummary::default()
    };
    for task in tasks {
        summary.record(&task.await?);
    }
    summary.gateway_calls = gateway.calls();
    summary.paid = orders
        .all()
        .await
        .iter()
        .filter(|o| o.status == OrderStatus::Paid)
        .count() as u64;
    summary.elapsed_ms = started.elapsed().as_millis() as u64;

    let stats = system.admin().stats();
    tracing::info!(
        gateway_calls = summary.gateway_calls,
        paid = summary.paid,
        held_locks = stats.held_locks,
        completed_keys = stats.completed,
        elapsed_ms = summary.elapsed_ms,
        "simulation finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "simulate_tests.rs"]
mod tests;
