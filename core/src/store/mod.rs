//! Persistence ports.
//!
//! The core specifies the data model and required operations; the storage
//! engine is unconstrained. Each trait has an in-memory implementation in
//! [`memory`] suitable for tests and single-node deployments; a production
//! deployment puts a durable store behind the same traits.

pub mod memory;

use crate::allocation::AllocationSeed;
use crate::error::Result;
use crate::types::{
    Order, OrderId, PaymentEventRecord, PaymentProvider, PromoCode, Raffle, RaffleId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-only access to the raffle catalog (owned by an external service).
#[async_trait]
pub trait RaffleCatalog: Send + Sync {
    /// Looks up a raffle by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] when the catalog is
    /// unreachable.
    async fn raffle(&self, id: RaffleId) -> Result<Option<Raffle>>;

    /// Looks up a promo code valid for a raffle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] when the catalog is
    /// unreachable.
    async fn promo(&self, raffle_id: RaffleId, code: &str) -> Result<Option<PromoCode>>;
}

/// Durable storage for orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a freshly created order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn insert(&self, order: Order) -> Result<()>;

    /// Replaces a stored order after a transition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] when the order does not
    /// exist, [`crate::error::CoreError::Transient`] on storage failure.
    async fn update(&self, order: Order) -> Result<()>;

    /// Fetches an order by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn find(&self, id: OrderId) -> Result<Option<Order>>;

    /// Ids of non-terminal orders whose expiry is at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn expired_candidates(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>>;
}

/// Durable storage for payment event audit records and the dedupe index.
#[async_trait]
pub trait PaymentEventRepository: Send + Sync {
    /// Records an event if its (`provider`, `provider_event_id`) key is
    /// unseen. Returns `false` (and stores nothing) when the key exists;
    /// the check and the insert are one atomic operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn record(&self, record: PaymentEventRecord) -> Result<bool>;

    /// Fetches a recorded event by its dedupe key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn find(
        &self,
        provider: PaymentProvider,
        provider_event_id: &str,
    ) -> Result<Option<PaymentEventRecord>>;

    /// The most recent events recorded for an order, newest first,
    /// optionally filtered by provider.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn for_order(
        &self,
        order_id: OrderId,
        provider: Option<PaymentProvider>,
        limit: usize,
    ) -> Result<Vec<PaymentEventRecord>>;
}

/// Durable storage for per-raffle allocation seeds.
#[async_trait]
pub trait AllocationSeedRepository: Send + Sync {
    /// Fetches the stored seed for a raffle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn get(&self, raffle_id: RaffleId) -> Result<Option<AllocationSeed>>;

    /// Stores (or replaces) the seed for a raffle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Transient`] on storage failure.
    async fn put(&self, seed: AllocationSeed) -> Result<()>;
}
