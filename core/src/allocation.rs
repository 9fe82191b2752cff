//! Deterministic occupied-ticket allocation.
//!
//! Raffles can have tens of thousands of tickets; materializing a row per
//! ticket just to answer "is this number taken?" is wasteful. Instead each
//! raffle stores an [`AllocationSeed`], `(occupied_count, seed)`, and the
//! occupied set is regenerated on demand as a pure function of those inputs.
//! Memory is proportional to `occupied_count`, never to the raffle size.

use crate::error::{CoreError, Result};
use crate::types::{RaffleId, TicketNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// Knuth's 64-bit MMIX constants; the generator must stay bit-for-bit stable
// because regenerating a stored seed has to yield the same set forever.
const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// The stored parameters from which a raffle's occupied set is regenerated.
///
/// Once persisted, `occupied_count` changes meaning: regenerating with a
/// different count yields a different set, so the record is written once per
/// raffle and updated only when tickets are genuinely added to the baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSeed {
    /// Raffle this seed belongs to
    pub raffle_id: RaffleId,
    /// How many tickets the seed marks as occupied
    pub occupied_count: u32,
    /// Generator seed
    pub seed: u64,
}

impl AllocationSeed {
    /// Creates a seed record with fresh random seed material.
    #[must_use]
    pub fn generate(raffle_id: RaffleId, occupied_count: u32) -> Self {
        Self {
            raffle_id,
            occupied_count,
            seed: rand::random(),
        }
    }

    /// Regenerates this raffle's occupied set for a raffle of `total` tickets.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when `occupied_count >= total`.
    pub fn occupied_set(&self, total: u32) -> Result<HashSet<TicketNumber>> {
        occupied_set(total, self.occupied_count, self.seed)
    }
}

/// Derives the set of occupied ticket numbers for a raffle.
///
/// Pure function of its inputs: every call with the same `(total,
/// occupied_count, seed)` returns the identical set of exactly
/// `occupied_count` distinct numbers in `[0, total)`.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] when `occupied_count >= total`; drawing
/// modulo `total` is undefined at zero and a fully-occupied raffle would
/// never terminate the collision retry loop.
pub fn occupied_set(total: u32, occupied_count: u32, seed: u64) -> Result<HashSet<TicketNumber>> {
    if occupied_count >= total {
        return Err(CoreError::Validation(format!(
            "occupied count {occupied_count} must be less than total tickets {total}"
        )));
    }
    if occupied_count == 0 {
        return Ok(HashSet::new());
    }

    let mut occupied = HashSet::with_capacity(occupied_count as usize);
    let mut state = seed;
    while occupied.len() < occupied_count as usize {
        state = state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        // High bits have the better statistical quality in an LCG.
        #[allow(clippy::cast_possible_truncation)]
        let candidate = ((state >> 33) % u64::from(total)) as u32;
        occupied.insert(TicketNumber::new(candidate));
    }
    Ok(occupied)
}
