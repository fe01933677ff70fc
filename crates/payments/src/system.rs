// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring of settings into one shared set of coordination components

use crate::admin::AdminSurface;
use crate::backend::PaymentAdapters;
use crate::domain::PaymentResult;
use crate::orders::OrderService;
use crate::protocol::PaymentExecutionProtocol;
use crate::settings::Settings;
use pl_core::{
    IdempotencyRegistry, LockManager, MaintenanceConfig, MaintenanceHandle, MaintenanceTask,
    UuidIdGen,
};

/// Every service in the process shares these locks and this registry
#[derive(Clone)]
pub struct PaymentSystem<A: PaymentAdapters> {
    protocol: PaymentExecutionProtocol<A>,
    maintenance: MaintenanceConfig,
}

impl<A: PaymentAdapters> PaymentSystem<A> {
    pub fn new(settings: &Settings, adapters: A) -> Self {
        let locks = LockManager::with_system_clock(settings.lock.clone());
        let idempotency: IdempotencyRegistry<PaymentResult> =
            IdempotencyRegistry::with_system_clock(settings.idempotency.clone());
        let protocol = PaymentExecutionProtocol::new(adapters, locks, idempotency, UuidIdGen)
            .with_options(settings.payment.guard_options());

        tracing::debug!(
            lock_wait = ?settings.payment.lock_wait,
            lock_lease = ?settings.payment.lock_lease,
            watchdog = settings.payment.watchdog,
            "payment system ready"
        );
        Self {
            protocol,
            maintenance: settings.maintenance.clone(),
        }
    }

    pub fn protocol(&self) -> &PaymentExecutionProtocol<A> {
        &self.protocol
    }

    pub fn orders(&self) -> OrderService<A> {
        OrderService::new(self.protocol.clone())
    }

    pub fn admin(&self) -> AdminSurface {
        AdminSurface::new(self.protocol.locks().clone(), self.protocol.idempotency().clone())
    }

    /// Start the background sweep; it stops when the handle is dropped
    pub fn start_maintenance(&self) -> MaintenanceHandle {
        MaintenanceTask::new(self.maintenance.clone(), self.protocol.locks().clone())
            .with_registry(self.protocol.idempotency().clone())
            .spawn()
    }
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod tests;
