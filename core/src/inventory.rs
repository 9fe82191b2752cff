//! Authoritative ticket occupancy.
//!
//! Occupancy has three layers: the deterministic baseline regenerated from
//! the raffle's [`AllocationSeed`], tickets *reserved* by open orders, and
//! tickets *sold* by completed orders. A ticket is occupied when it is in any
//! layer. Reservation checks and claims all requested numbers under one lock
//! so overlapping concurrent orders cannot double-sell.

use crate::allocation::AllocationSeed;
use crate::error::{CoreError, Result};
use crate::store::{AllocationSeedRepository, RaffleCatalog};
use crate::types::{RaffleId, TicketNumber};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Port to the authoritative ticket inventory.
#[async_trait]
pub trait TicketInventory: Send + Sync {
    /// Whether a single ticket is occupied (baseline, reserved, or sold).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown raffle.
    async fn is_occupied(&self, raffle_id: RaffleId, ticket: TicketNumber) -> Result<bool>;

    /// Snapshot of every occupied number in a raffle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown raffle.
    async fn occupied_snapshot(&self, raffle_id: RaffleId) -> Result<HashSet<TicketNumber>>;

    /// Atomically checks and reserves all of `tickets` for an order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InventoryConflict`] listing the numbers already
    /// taken (none are reserved in that case), or [`CoreError::Validation`]
    /// for out-of-range numbers.
    async fn reserve(&self, raffle_id: RaffleId, tickets: &[TicketNumber]) -> Result<()>;

    /// Releases a reservation (order cancelled or expired).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown raffle.
    async fn release(&self, raffle_id: RaffleId, tickets: &[TicketNumber]) -> Result<()>;

    /// Converts a reservation into a permanent sale (order completed).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown raffle.
    async fn mark_occupied(&self, raffle_id: RaffleId, tickets: &[TicketNumber]) -> Result<()>;
}

#[derive(Debug)]
struct RaffleOccupancy {
    total: u32,
    baseline: HashSet<TicketNumber>,
    reserved: HashSet<TicketNumber>,
    sold: HashSet<TicketNumber>,
}

impl RaffleOccupancy {
    fn is_occupied(&self, ticket: TicketNumber) -> bool {
        self.baseline.contains(&ticket)
            || self.reserved.contains(&ticket)
            || self.sold.contains(&ticket)
    }

    fn snapshot(&self) -> HashSet<TicketNumber> {
        let mut all = self.baseline.clone();
        all.extend(&self.reserved);
        all.extend(&self.sold);
        all
    }
}

/// In-memory inventory combining the allocation baseline with live
/// reservations and sales.
pub struct MemoryInventory {
    catalog: Arc<dyn RaffleCatalog>,
    seeds: Arc<dyn AllocationSeedRepository>,
    state: Mutex<HashMap<RaffleId, RaffleOccupancy>>,
}

impl MemoryInventory {
    /// Creates an inventory backed by the given catalog and seed store
    pub fn new(catalog: Arc<dyn RaffleCatalog>, seeds: Arc<dyn AllocationSeedRepository>) -> Self {
        Self {
            catalog,
            seeds,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Loads raffle metadata and regenerates the baseline when this raffle is
    /// seen for the first time. Concurrent first loads regenerate identical
    /// sets, so last-write-wins is harmless.
    async fn load(&self, raffle_id: RaffleId) -> Result<(u32, HashSet<TicketNumber>)> {
        let raffle = self
            .catalog
            .raffle(raffle_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: "raffle",
                id: raffle_id.to_string(),
            })?;
        let baseline = match self.seeds.get(raffle_id).await? {
            Some(seed) => seed.occupied_set(raffle.total_tickets)?,
            None => {
                let seed = AllocationSeed::generate(raffle_id, 0);
                self.seeds.put(seed).await?;
                HashSet::new()
            }
        };
        Ok((raffle.total_tickets, baseline))
    }

    async fn with_occupancy<T>(
        &self,
        raffle_id: RaffleId,
        f: impl FnOnce(&mut RaffleOccupancy) -> Result<T>,
    ) -> Result<T> {
        // Fetch outside the lock; insert under it.
        let loaded = {
            let state = self.state.lock().await;
            state.contains_key(&raffle_id)
        };
        let fetched = if loaded {
            None
        } else {
            Some(self.load(raffle_id).await?)
        };

        let mut state = self.state.lock().await;
        let occupancy = match state.entry(raffle_id) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let (total, baseline) = fetched.ok_or_else(|| {
                    CoreError::Transient("raffle occupancy evicted during load".to_string())
                })?;
                entry.insert(RaffleOccupancy {
                    total,
                    baseline,
                    reserved: HashSet::new(),
                    sold: HashSet::new(),
                })
            }
        };
        f(occupancy)
    }
}

#[async_trait]
impl TicketInventory for MemoryInventory {
    async fn is_occupied(&self, raffle_id: RaffleId, ticket: TicketNumber) -> Result<bool> {
        self.with_occupancy(raffle_id, |occupancy| Ok(occupancy.is_occupied(ticket)))
            .await
    }

    async fn occupied_snapshot(&self, raffle_id: RaffleId) -> Result<HashSet<TicketNumber>> {
        self.with_occupancy(raffle_id, |occupancy| Ok(occupancy.snapshot()))
            .await
    }

    async fn reserve(&self, raffle_id: RaffleId, tickets: &[TicketNumber]) -> Result<()> {
        self.with_occupancy(raffle_id, |occupancy| {
            if let Some(out_of_range) = tickets.iter().find(|t| t.value() >= occupancy.total) {
                return Err(CoreError::Validation(format!(
                    "ticket {out_of_range} is outside the raffle range 0..{}",
                    occupancy.total
                )));
            }
            let conflicts: Vec<String> = tickets
                .iter()
                .filter(|t| occupancy.is_occupied(**t))
                .map(ToString::to_string)
                .collect();
            if !conflicts.is_empty() {
                return Err(CoreError::InventoryConflict(conflicts.join(", ")));
            }
            occupancy.reserved.extend(tickets.iter().copied());
            Ok(())
        })
        .await
    }

    async fn release(&self, raffle_id: RaffleId, tickets: &[TicketNumber]) -> Result<()> {
        self.with_occupancy(raffle_id, |occupancy| {
            for ticket in tickets {
                occupancy.reserved.remove(ticket);
            }
            Ok(())
        })
        .await
    }

    async fn mark_occupied(&self, raffle_id: RaffleId, tickets: &[TicketNumber]) -> Result<()> {
        self.with_occupancy(raffle_id, |occupancy| {
            for ticket in tickets {
                occupancy.reserved.remove(ticket);
                occupancy.sold.insert(*ticket);
            }
            Ok(())
        })
        .await
    }
}
