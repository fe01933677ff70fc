// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The collaborators a payment flow talks to, bundled

use crate::gateway::PaymentGateway;
use crate::store::{MemoryOrderStore, MemoryPaymentStore, OrderStore, PaymentStore};

/// Bundle of stores and gateway used by the payment protocol
pub trait PaymentAdapters: Clone + Send + Sync + 'static {
    type Orders: OrderStore;
    type Payments: PaymentStore;
    type Gateway: PaymentGateway;

    fn orders(&self) -> Self::Orders;
    fn payments(&self) -> Self::Payments;
    fn gateway(&self) -> Self::Gateway;
}

#[derive(Clone)]
pub struct PaymentBackend<O, P, G> {
    orders: O,
    payments: P,
    gateway: G,
}

impl<O, P, G> PaymentBackend<O, P, G> {
    pub fn new(orders: O, payments: P, gateway: G) -> Self {
        Self {
            orders,
            payments,
            gateway,
        }
    }
}

impl<G> PaymentBackend<MemoryOrderStore, MemoryPaymentStore, G> {
    /// Fresh in-memory stores in front of `gateway`
    pub fn in_memory(gateway: G) -> Self {
        Self::new(MemoryOrderStore::new(), MemoryPaymentStore::new(), gateway)
    }
}

impl<O: OrderStore, P: PaymentStore, G: PaymentGateway> PaymentAdapters for PaymentBackend<O, P, G> {
    type Orders = O;
    type Payments = P;
    type Gateway = G;

    fn orders(&self) -> O {
        self.orders.clone()
    }

    fn payments(&self) -> P {
        self.payments.clone()
    }

    fn gateway(&self) -> G {
        self.gateway.clone()
    }
}
