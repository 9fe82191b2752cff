//! In-memory store implementations.
//!
//! Back the persistence ports with `RwLock`-guarded maps. Used by tests and
//! single-node deployments; the dedupe insert in [`MemoryPaymentEvents`] is
//! atomic under its write lock, matching what a unique index gives a real
//! store.

use crate::allocation::AllocationSeed;
use crate::error::Result;
use crate::store::{
    AllocationSeedRepository, OrderRepository, PaymentEventRepository, RaffleCatalog,
};
use crate::types::{
    Order, OrderId, PaymentEventRecord, PaymentProvider, PromoCode, Raffle, RaffleId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory raffle catalog.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    raffles: Arc<RwLock<HashMap<RaffleId, Raffle>>>,
    promos: Arc<RwLock<HashMap<(RaffleId, String), PromoCode>>>,
}

impl MemoryCatalog {
    /// Creates an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raffle
    pub async fn insert_raffle(&self, raffle: Raffle) {
        self.raffles.write().await.insert(raffle.id, raffle);
    }

    /// Adds a promo code for a raffle
    pub async fn insert_promo(&self, raffle_id: RaffleId, promo: PromoCode) {
        let key = (raffle_id, promo.code.to_ascii_uppercase());
        self.promos.write().await.insert(key, promo);
    }
}

#[async_trait]
impl RaffleCatalog for MemoryCatalog {
    async fn raffle(&self, id: RaffleId) -> Result<Option<Raffle>> {
        Ok(self.raffles.read().await.get(&id).cloned())
    }

    async fn promo(&self, raffle_id: RaffleId, code: &str) -> Result<Option<PromoCode>> {
        let key = (raffle_id, code.trim().to_ascii_uppercase());
        Ok(self.promos.read().await.get(&key).cloned())
    }
}

/// In-memory order store.
#[derive(Clone, Debug, Default)]
pub struct MemoryOrders {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl MemoryOrders {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrders {
    async fn insert(&self, order: Order) -> Result<()> {
        self.orders.write().await.insert(order.id, order);
        Ok(())
    }

    async fn update(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id) {
            return Err(crate::error::CoreError::order_not_found(order.id));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn expired_candidates(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.is_open() && order.expires_at <= now)
            .map(|order| order.id)
            .collect())
    }
}

/// In-memory payment event store with an atomic dedupe index.
#[derive(Clone, Debug, Default)]
pub struct MemoryPaymentEvents {
    events: Arc<RwLock<HashMap<(PaymentProvider, String), PaymentEventRecord>>>,
}

impl MemoryPaymentEvents {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentEventRepository for MemoryPaymentEvents {
    async fn record(&self, record: PaymentEventRecord) -> Result<bool> {
        let key = (record.provider, record.provider_event_id.clone());
        let mut events = self.events.write().await;
        if events.contains_key(&key) {
            return Ok(false);
        }
        events.insert(key, record);
        Ok(true)
    }

    async fn find(
        &self,
        provider: PaymentProvider,
        provider_event_id: &str,
    ) -> Result<Option<PaymentEventRecord>> {
        let key = (provider, provider_event_id.to_string());
        Ok(self.events.read().await.get(&key).cloned())
    }

    async fn for_order(
        &self,
        order_id: OrderId,
        provider: Option<PaymentProvider>,
        limit: usize,
    ) -> Result<Vec<PaymentEventRecord>> {
        let events = self.events.read().await;
        let mut matching: Vec<_> = events
            .values()
            .filter(|record| record.order_id == Some(order_id))
            .filter(|record| provider.is_none_or(|p| record.provider == p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

/// In-memory allocation seed store.
#[derive(Clone, Debug, Default)]
pub struct MemorySeeds {
    seeds: Arc<RwLock<HashMap<RaffleId, AllocationSeed>>>,
}

impl MemorySeeds {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AllocationSeedRepository for MemorySeeds {
    async fn get(&self, raffle_id: RaffleId) -> Result<Option<AllocationSeed>> {
        Ok(self.seeds.read().await.get(&raffle_id).copied())
    }

    async fn put(&self, seed: AllocationSeed) -> Result<()> {
        self.seeds.write().await.insert(seed.raffle_id, seed);
        Ok(())
    }
}
