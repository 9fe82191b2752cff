//! Shared fixtures for unit and integration tests.

use crate::types::{
    BuyerInfo, Currency, DiscountTier, Money, Raffle, RaffleId, RaffleStatus,
};
use chrono::{Duration, Utc};

/// An active raffle with `total` tickets at 150.00/ticket, tiers
/// [(5-9, 5%), (10-19, 10%)], and generous purchase limits.
#[must_use]
pub fn sample_raffle(total: u32) -> Raffle {
    let now = Utc::now();
    Raffle {
        id: RaffleId::new(),
        name: "Gran Sorteo de Verano".to_string(),
        total_tickets: total,
        unit_price: Money::from_cents(15_000),
        currency: Currency::new("MXN"),
        max_per_buyer: 20,
        min_per_order: 1,
        max_per_order: 20,
        discount_tiers: vec![
            DiscountTier::new(5, Some(9), 5),
            DiscountTier::new(10, Some(19), 10),
        ],
        starts_at: now - Duration::days(1),
        ends_at: now + Duration::days(30),
        draw_at: now + Duration::days(31),
        status: RaffleStatus::Active,
    }
}

/// A buyer that passes contact validation.
#[must_use]
pub fn sample_buyer() -> BuyerInfo {
    BuyerInfo {
        name: "Ana Morales".to_string(),
        email: "ana@example.com".to_string(),
        phone: "+52 55 1234 5678".to_string(),
    }
}
