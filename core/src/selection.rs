//! Buyer ticket selection and pricing.
//!
//! A [`Selection`] is ephemeral, owned by one buyer session, and holds ticket
//! *numbers* only; authoritative occupancy is re-validated at order creation,
//! never trusted from session state. Mutation never takes the selection over
//! the per-buyer limit; checkout-time rules are enforced separately by
//! [`validate_for_checkout`], which reports violations instead of truncating.

use crate::error::{CoreError, Result};
use crate::types::{DiscountTier, Money, PromoCode, Raffle, TicketNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Selection
// ============================================================================

/// An ordered set of distinct ticket numbers chosen by one buyer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    tickets: Vec<TicketNumber>,
}

impl Selection {
    /// Creates an empty selection
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tickets: Vec::new(),
        }
    }

    /// Builds a selection from a list of numbers.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the list contains duplicates;
    /// a checkout request naming the same ticket twice is malformed, not a
    /// convenience flow.
    pub fn from_tickets(tickets: Vec<TicketNumber>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(tickets.len());
        for ticket in &tickets {
            if !seen.insert(*ticket) {
                return Err(CoreError::Validation(format!(
                    "ticket {ticket} appears more than once in the selection"
                )));
            }
        }
        Ok(Self { tickets })
    }

    /// Number of selected tickets
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Whether the selection is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Selected tickets in selection order
    #[must_use]
    pub fn tickets(&self) -> &[TicketNumber] {
        &self.tickets
    }

    /// Whether `ticket` is already selected
    #[must_use]
    pub fn contains(&self, ticket: TicketNumber) -> bool {
        self.tickets.contains(&ticket)
    }

    /// Checks whether `ticket` could be added right now.
    ///
    /// False when the ticket is occupied, already selected, or the selection
    /// is at the buyer limit.
    #[must_use]
    pub fn can_select(
        &self,
        ticket: TicketNumber,
        occupied: &HashSet<TicketNumber>,
        max_per_buyer: u32,
    ) -> bool {
        self.tickets.len() < max_per_buyer as usize
            && !occupied.contains(&ticket)
            && !self.contains(ticket)
    }

    /// Adds `ticket` if eligible. Returns whether the selection changed.
    pub fn select(
        &mut self,
        ticket: TicketNumber,
        occupied: &HashSet<TicketNumber>,
        max_per_buyer: u32,
    ) -> bool {
        if self.can_select(ticket, occupied, max_per_buyer) {
            self.tickets.push(ticket);
            true
        } else {
            false
        }
    }

    /// Removes `ticket` if present. Returns whether the selection changed.
    pub fn deselect(&mut self, ticket: TicketNumber) -> bool {
        if let Some(position) = self.tickets.iter().position(|t| *t == ticket) {
            self.tickets.remove(position);
            true
        } else {
            false
        }
    }

    /// Toggles `ticket`: deselects it when present, selects it when eligible.
    ///
    /// Toggling an occupied ticket is a no-op, not an error; the buyer's
    /// grid may be stale and the tap should simply do nothing.
    pub fn toggle(
        &mut self,
        ticket: TicketNumber,
        occupied: &HashSet<TicketNumber>,
        max_per_buyer: u32,
    ) {
        if !self.deselect(ticket) {
            self.select(ticket, occupied, max_per_buyer);
        }
    }

    /// Adds as many eligible candidates as fit under the buyer limit,
    /// silently skipping occupied or duplicate numbers. Returns how many were
    /// added. Backs both "pick N consecutive" and "pick N random" flows.
    pub fn bulk_select(
        &mut self,
        candidates: &[TicketNumber],
        occupied: &HashSet<TicketNumber>,
        max_per_buyer: u32,
    ) -> usize {
        let mut added = 0;
        for ticket in candidates {
            if self.select(*ticket, occupied, max_per_buyer) {
                added += 1;
            }
        }
        added
    }

    /// Empties the selection
    pub fn clear(&mut self) {
        self.tickets.clear();
    }

    /// Consumes the selection, yielding the frozen ticket list
    #[must_use]
    pub fn into_tickets(self) -> Vec<TicketNumber> {
        self.tickets
    }
}

/// Validates a finalized selection against a raffle's purchase rules.
///
/// Unlike the bulk convenience operations, checkout never truncates: each
/// violated constraint is surfaced by name so the buyer can correct it.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] naming the violated constraint.
pub fn validate_for_checkout(selection: &Selection, raffle: &Raffle) -> Result<()> {
    let quantity = selection.len() as u64;
    if selection.is_empty() {
        return Err(CoreError::Validation(
            "selection is empty; pick at least one ticket".to_string(),
        ));
    }
    if quantity < u64::from(raffle.min_per_order) {
        return Err(CoreError::Validation(format!(
            "selection of {quantity} is below the minimum of {} per purchase",
            raffle.min_per_order
        )));
    }
    if quantity > u64::from(raffle.max_per_order) {
        return Err(CoreError::Validation(format!(
            "selection of {quantity} exceeds the maximum of {} per purchase",
            raffle.max_per_order
        )));
    }
    if quantity > u64::from(raffle.max_per_buyer) {
        return Err(CoreError::Validation(format!(
            "selection of {quantity} exceeds the per-buyer maximum of {}",
            raffle.max_per_buyer
        )));
    }
    if let Some(out_of_range) = selection.tickets().iter().find(|t| !raffle.in_range(**t)) {
        return Err(CoreError::Validation(format!(
            "ticket {out_of_range} is outside the raffle range 0..{}",
            raffle.total_tickets
        )));
    }
    Ok(())
}

// ============================================================================
// Pricing
// ============================================================================

/// Priced breakdown of a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Quantity × unit price
    pub subtotal: Money,
    /// Resolved discount percentage
    pub discount_percent: u32,
    /// Discount in money, floor-rounded to the cent
    pub discount_amount: Money,
    /// Amount due
    pub total: Money,
}

/// Percentage of the tier band containing `quantity`, or 0 when the quantity
/// sits below the lowest band.
#[must_use]
pub fn tier_percent_for(quantity: u32, tiers: &[DiscountTier]) -> u32 {
    tiers
        .iter()
        .find(|tier| tier.contains(quantity))
        .map_or(0, |tier| tier.percent)
}

/// Validates the tier-list invariant: ascending by `min_qty`, non-overlapping,
/// and every band non-empty.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] describing the first broken band.
pub fn validate_tiers(tiers: &[DiscountTier]) -> Result<()> {
    for window in tiers.windows(2) {
        let (lower, upper) = (&window[0], &window[1]);
        let Some(lower_max) = lower.max_qty else {
            return Err(CoreError::Validation(
                "only the last discount tier may be unbounded".to_string(),
            ));
        };
        if lower_max < lower.min_qty || upper.min_qty <= lower_max {
            return Err(CoreError::Validation(format!(
                "discount tiers must be ascending and non-overlapping near quantity {}",
                upper.min_qty
            )));
        }
    }
    if let Some(last) = tiers.last() {
        if last.max_qty.is_some_and(|max| max < last.min_qty) {
            return Err(CoreError::Validation(
                "last discount tier is empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Prices a selection of `quantity` tickets.
///
/// The automatic tier percentage and the promo percentage (when the code is
/// inside its validity window) combine by taking the **maximum**, never the
/// sum. Anti-stacking is a business invariant, not an implementation detail.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the amounts overflow.
pub fn price_for(
    quantity: u32,
    unit_price: Money,
    tiers: &[DiscountTier],
    promo: Option<&PromoCode>,
    now: DateTime<Utc>,
) -> Result<Quote> {
    let subtotal = unit_price
        .checked_multiply(quantity)
        .ok_or_else(|| CoreError::Validation("order subtotal overflows".to_string()))?;

    let tier_percent = tier_percent_for(quantity, tiers);
    let promo_percent = promo
        .filter(|p| p.is_active(now))
        .map_or(0, |p| p.percent);
    let discount_percent = tier_percent.max(promo_percent);

    let discount_amount = subtotal
        .checked_percent_of(discount_percent)
        .ok_or_else(|| CoreError::Validation("discount amount overflows".to_string()))?;
    let total = subtotal
        .checked_sub(discount_amount)
        .ok_or_else(|| CoreError::Validation("discount exceeds subtotal".to_string()))?;

    Ok(Quote {
        subtotal,
        discount_percent,
        discount_amount,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn occupied(numbers: &[u32]) -> HashSet<TicketNumber> {
        numbers.iter().copied().map(TicketNumber::new).collect()
    }

    fn tiers() -> Vec<DiscountTier> {
        vec![
            DiscountTier::new(5, Some(9), 5),
            DiscountTier::new(10, Some(19), 10),
        ]
    }

    #[test]
    fn select_respects_occupancy_and_limit() {
        let occupied = occupied(&[3]);
        let mut selection = Selection::new();

        assert!(selection.select(TicketNumber::new(1), &occupied, 2));
        assert!(!selection.select(TicketNumber::new(1), &occupied, 2), "duplicate");
        assert!(!selection.select(TicketNumber::new(3), &occupied, 2), "occupied");
        assert!(selection.select(TicketNumber::new(2), &occupied, 2));
        assert!(!selection.select(TicketNumber::new(4), &occupied, 2), "at limit");
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn toggle_occupied_is_noop() {
        let occupied = occupied(&[7]);
        let mut selection = Selection::new();
        selection.toggle(TicketNumber::new(7), &occupied, 10);
        assert!(selection.is_empty());

        selection.toggle(TicketNumber::new(8), &occupied, 10);
        assert!(selection.contains(TicketNumber::new(8)));
        selection.toggle(TicketNumber::new(8), &occupied, 10);
        assert!(selection.is_empty());
    }

    #[test]
    fn bulk_select_skips_ineligible_silently() {
        let occupied = occupied(&[2, 4]);
        let mut selection = Selection::new();
        let candidates: Vec<_> = (0..8).map(TicketNumber::new).collect();

        let added = selection.bulk_select(&candidates, &occupied, 4);
        assert_eq!(added, 4);
        assert_eq!(
            selection.tickets(),
            &[0, 1, 3, 5].map(TicketNumber::new)
        );
    }

    #[test]
    fn from_tickets_rejects_duplicates() {
        let result = Selection::from_tickets(vec![
            TicketNumber::new(1),
            TicketNumber::new(2),
            TicketNumber::new(1),
        ]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn bulk_pricing_scenario() {
        // 12 tickets at 150 with tiers [(5,9,5%),(10,19,10%)]:
        // subtotal 1800, discount 180, total 1620.
        let unit = Money::checked_from_major(150).unwrap();
        let quote = price_for(12, unit, &tiers(), None, Utc::now()).unwrap();
        assert_eq!(quote.subtotal, Money::from_cents(180_000));
        assert_eq!(quote.discount_percent, 10);
        assert_eq!(quote.discount_amount, Money::from_cents(18_000));
        assert_eq!(quote.total, Money::from_cents(162_000));
    }

    #[test]
    fn below_lowest_tier_is_full_price() {
        let unit = Money::checked_from_major(150).unwrap();
        let quote = price_for(4, unit, &tiers(), None, Utc::now()).unwrap();
        assert_eq!(quote.discount_percent, 0);
        assert_eq!(quote.total, quote.subtotal);
    }

    #[test]
    fn promo_and_tier_take_max_never_sum() {
        let unit = Money::checked_from_major(100).unwrap();
        let promo = PromoCode {
            code: "AMIGOS7".to_string(),
            percent: 7,
            valid_from: None,
            valid_until: None,
        };

        // Tier 10% beats promo 7%: resolved 10, not 17.
        let quote = price_for(12, unit, &tiers(), Some(&promo), Utc::now()).unwrap();
        assert_eq!(quote.discount_percent, 10);

        // Promo 7% beats tier 5%.
        let quote = price_for(6, unit, &tiers(), Some(&promo), Utc::now()).unwrap();
        assert_eq!(quote.discount_percent, 7);
    }

    #[test]
    fn expired_promo_contributes_zero() {
        let unit = Money::checked_from_major(100).unwrap();
        let promo = PromoCode {
            code: "VIEJO20".to_string(),
            percent: 20,
            valid_from: None,
            valid_until: Some(Utc::now() - chrono::Duration::days(1)),
        };
        let quote = price_for(3, unit, &tiers(), Some(&promo), Utc::now()).unwrap();
        assert_eq!(quote.discount_percent, 0);
    }

    #[test]
    fn tier_validation_catches_overlap() {
        let overlapping = vec![
            DiscountTier::new(5, Some(10), 5),
            DiscountTier::new(10, Some(19), 10),
        ];
        assert!(validate_tiers(&overlapping).is_err());
        assert!(validate_tiers(&tiers()).is_ok());

        let unbounded_last = vec![
            DiscountTier::new(5, Some(9), 5),
            DiscountTier::new(10, None, 10),
        ];
        assert!(validate_tiers(&unbounded_last).is_ok());
    }

    #[test]
    fn checkout_validation_names_the_constraint() {
        let raffle = crate::testing::sample_raffle(100);
        let selection = Selection::from_tickets(
            (0..30).map(TicketNumber::new).collect(),
        )
        .unwrap();
        let err = validate_for_checkout(&selection, &raffle).unwrap_err();
        assert!(err.to_string().contains("maximum"), "got: {err}");

        let empty = Selection::new();
        assert!(validate_for_checkout(&empty, &raffle).is_err());
    }

    proptest! {
        #[test]
        fn size_never_exceeds_buyer_limit(
            ops in prop::collection::vec((0u32..50, 0u8..3), 0..200),
            max_per_buyer in 0u32..12,
        ) {
            let occupied = occupied(&[5, 15, 25, 35, 45]);
            let mut selection = Selection::new();
            for (ticket, op) in ops {
                let ticket = TicketNumber::new(ticket);
                match op {
                    0 => { selection.select(ticket, &occupied, max_per_buyer); }
                    1 => { selection.deselect(ticket); }
                    _ => { selection.toggle(ticket, &occupied, max_per_buyer); }
                }
                prop_assert!(selection.len() <= max_per_buyer as usize);
            }
        }

        #[test]
        fn resolved_discount_is_max_of_sources(tier_pct in 0u32..40, promo_pct in 0u32..40) {
            let bands = vec![DiscountTier::new(1, None, tier_pct)];
            let promo = PromoCode {
                code: "P".to_string(),
                percent: promo_pct,
                valid_from: None,
                valid_until: None,
            };
            let quote = price_for(
                3,
                Money::from_cents(10_000),
                &bands,
                Some(&promo),
                Utc::now(),
            ).unwrap();
            prop_assert_eq!(quote.discount_percent, tier_pct.max(promo_pct));
        }
    }
}
