//! Domain types for the raffle sales core.
//!
//! Value objects, entities, and state types shared by the allocation,
//! selection, order, and payment modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a raffle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaffleId(Uuid);

impl RaffleId {
    /// Creates a new random `RaffleId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RaffleId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RaffleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RaffleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random `OrderId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrderId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A numbered raffle ticket in `[0, total)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TicketNumber(pub u32);

impl TicketNumber {
    /// Creates a new `TicketNumber`
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// Returns the raw ticket number
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from major units (e.g. whole pesos or dollars),
    /// returning `None` on overflow
    #[must_use]
    pub const fn checked_from_major(major: u64) -> Option<Self> {
        match major.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Creates a `Money` value from a decimal amount in major units, rounding
    /// to the nearest cent. Returns `None` for negative or non-finite input.
    #[must_use]
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents > u64::MAX as f64 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(Self(cents as u64))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount as a decimal in major units
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Returns `percent` of this amount, rounded down to the cent.
    ///
    /// Used for discount amounts; the discount never exceeds the base.
    #[must_use]
    pub const fn checked_percent_of(self, percent: u32) -> Option<Self> {
        let portion = match self.0.checked_mul(percent as u64) {
            Some(product) => product / 100,
            None => return None,
        };
        if portion > self.0 {
            return None;
        }
        Some(Self(portion))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// ISO-4217-style currency code (e.g. "MXN", "USD").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Creates a `Currency`, normalizing to upper case
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    /// Returns the code as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Raffle (catalog entity, read-only for the core)
// ============================================================================

/// Raffle lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaffleStatus {
    /// Announced, sales not yet open
    Upcoming,
    /// Sales are open
    Active,
    /// Sales temporarily suspended
    Paused,
    /// Sales closed (drawn or past end date)
    Ended,
}

/// A raffle as published by the catalog service.
///
/// The core reads raffles through the [`crate::store::RaffleCatalog`] port and
/// never mutates them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Raffle {
    /// Unique raffle identifier
    pub id: RaffleId,
    /// Display name (e.g. "Gran Sorteo de Verano")
    pub name: String,
    /// Total number of tickets, numbered `[0, total_tickets)`
    pub total_tickets: u32,
    /// Price of a single ticket
    pub unit_price: Money,
    /// Currency all amounts are denominated in
    pub currency: Currency,
    /// Maximum tickets a single buyer may hold
    pub max_per_buyer: u32,
    /// Minimum tickets per transaction
    pub min_per_order: u32,
    /// Maximum tickets per transaction
    pub max_per_order: u32,
    /// Quantity-based discount tiers, ascending by `min_qty`
    pub discount_tiers: Vec<DiscountTier>,
    /// When sales open
    pub starts_at: DateTime<Utc>,
    /// When sales close
    pub ends_at: DateTime<Utc>,
    /// When the draw takes place
    pub draw_at: DateTime<Utc>,
    /// Current status
    pub status: RaffleStatus,
}

impl Raffle {
    /// Checks whether a ticket number is inside this raffle's range
    #[must_use]
    pub const fn in_range(&self, ticket: TicketNumber) -> bool {
        ticket.value() < self.total_tickets
    }
}

// ============================================================================
// Discounts
// ============================================================================

/// A quantity-based discount band.
///
/// `max_qty == None` means the band is unbounded above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Smallest quantity the band applies to
    pub min_qty: u32,
    /// Largest quantity the band applies to, inclusive
    pub max_qty: Option<u32>,
    /// Discount percentage for the band
    pub percent: u32,
}

impl DiscountTier {
    /// Creates a new `DiscountTier`
    #[must_use]
    pub const fn new(min_qty: u32, max_qty: Option<u32>, percent: u32) -> Self {
        Self {
            min_qty,
            max_qty,
            percent,
        }
    }

    /// Checks whether `quantity` falls inside this band
    #[must_use]
    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.min_qty && self.max_qty.is_none_or(|max| quantity <= max)
    }
}

/// A promotional discount code.
///
/// A promo percentage and the automatic tier percentage combine by taking the
/// maximum, never by summing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    /// Code as entered by the buyer
    pub code: String,
    /// Discount percentage
    pub percent: u32,
    /// Start of the validity window, if bounded
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity window, if bounded
    pub valid_until: Option<DateTime<Utc>>,
}

impl PromoCode {
    /// Checks whether the code is inside its validity window at `now`
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.is_none_or(|from| now >= from)
            && self.valid_until.is_none_or(|until| now <= until)
    }
}

// ============================================================================
// Buyer
// ============================================================================

/// Contact information for the buyer of an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerInfo {
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
}

impl BuyerInfo {
    /// Validates the contact fields with provider-agnostic rules.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Validation`] naming the first field
    /// that fails.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CoreError;

        if self.name.trim().len() < 3 {
            return Err(CoreError::Validation(
                "buyer name must be at least 3 characters".to_string(),
            ));
        }
        let email = self.email.trim();
        let valid_email = email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
        if !valid_email {
            return Err(CoreError::Validation(format!(
                "buyer email {email:?} is not a valid address"
            )));
        }
        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        if !(7..=15).contains(&digits) {
            return Err(CoreError::Validation(
                "buyer phone must contain 7 to 15 digits".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Payment providers and canonical statuses
// ============================================================================

/// The four supported external payment providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// Crypto-pay gateway (signed webhooks, business status codes)
    CryptoPay,
    /// Cash voucher network (signed webhooks, `charge.*` event types)
    CashVoucher,
    /// Domestic bank transfer (back-office confirmed, unsigned webhooks)
    BankTransfer,
    /// International bank transfer (same shape as [`Self::BankTransfer`])
    BankTransferIntl,
}

impl PaymentProvider {
    /// All supported providers
    pub const ALL: [Self; 4] = [
        Self::CryptoPay,
        Self::CashVoucher,
        Self::BankTransfer,
        Self::BankTransferIntl,
    ];

    /// Name used in webhook selectors and API payloads
    #[must_use]
    pub const fn wire_name(&self) -> &'static str {
        match self {
            Self::CryptoPay => "cryptopay",
            Self::CashVoucher => "voucher",
            Self::BankTransfer => "transfer",
            Self::BankTransferIntl => "transfer-intl",
        }
    }

    /// Parses a wire name, case-insensitively
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.wire_name() == name)
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Provider-agnostic payment status after normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Payment reported but not yet final
    Pending,
    /// Payment confirmed by the provider
    Confirmed,
    /// Payment rejected or abandoned
    Rejected,
}

impl PaymentStatus {
    /// Stable string form used in dedupe hashes and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Order lifecycle state.
///
/// `Completed`, `Cancelled`, and `Expired` are terminal: no transition leaves
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Created, waiting for the buyer to pay
    PendingPayment,
    /// Payment reported (or proof attached), waiting for confirmation
    PendingVerification,
    /// Payment confirmed; tickets permanently occupied
    Completed,
    /// Cancelled by the buyer, an operator, or a rejected payment
    Cancelled,
    /// Expiry window elapsed without a confirmed payment
    Expired,
}

impl OrderState {
    /// Whether this state permits no further transitions
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Stable string form for notifications and API responses
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::PendingVerification => "pending_verification",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchase order.
///
/// The ticket list and price are frozen at creation and never change
/// afterwards; only `state` and `proof_reference` move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier
    pub id: OrderId,
    /// Raffle the tickets belong to
    pub raffle_id: RaffleId,
    /// Buyer contact information
    pub buyer: BuyerInfo,
    /// Frozen ticket numbers, in selection order
    pub tickets: Vec<TicketNumber>,
    /// Price before discount
    pub subtotal: Money,
    /// Resolved discount percentage (max of tier and promo)
    pub discount_percent: u32,
    /// Discount amount in money
    pub discount_amount: Money,
    /// Amount due
    pub total: Money,
    /// Currency of all amounts
    pub currency: Currency,
    /// Payment provider chosen at checkout
    pub provider: PaymentProvider,
    /// Current lifecycle state
    pub state: OrderState,
    /// Provider-facing reference code (`SORTEO-<order id>`)
    pub reference: String,
    /// Payment proof attached by the buyer, if any
    pub proof_reference: Option<String>,
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// When the order expires if unpaid
    pub expires_at: DateTime<Utc>,
}

impl Order {
    /// Prefix of provider-facing reference codes
    pub const REFERENCE_PREFIX: &'static str = "SORTEO-";

    /// Builds the reference code for an order id
    #[must_use]
    pub fn reference_for(id: OrderId) -> String {
        format!("{}{}", Self::REFERENCE_PREFIX, id)
    }

    /// Whether the order may still transition
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }
}

// ============================================================================
// Payment event audit records
// ============================================================================

/// What the ingestor did with a received payment event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Event advanced (or re-affirmed) the order state
    Applied,
    /// Order was terminal; event recorded, state untouched
    IgnoredTerminal,
    /// Signature verification failed; event never reached the order
    AuthenticityFailure,
}

impl IngestOutcome {
    /// Stable string form for API responses and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::IgnoredTerminal => "ignored_terminal",
            Self::AuthenticityFailure => "authenticity_failure",
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit record of one inbound payment notification.
///
/// The pair (`provider`, `provider_event_id`) is the idempotency key: the
/// same pair must never apply twice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentEventRecord {
    /// Provider that sent the event
    pub provider: PaymentProvider,
    /// Provider's own event identifier, or a stable payload hash
    pub provider_event_id: String,
    /// SHA-256 of the raw request body, base64-encoded
    pub payload_hash: String,
    /// Order the event claimed to be about, when it could be determined
    pub order_id: Option<OrderId>,
    /// Canonical status the event carried
    pub status: Option<PaymentStatus>,
    /// Amount the provider claimed was paid
    pub amount: Option<Money>,
    /// Currency of the claimed amount
    pub currency: Option<Currency>,
    /// What the ingestor did with the event
    pub outcome: IngestOutcome,
    /// When the event was received
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn money_percent_of_rounds_down() {
        let subtotal = Money::from_cents(180_000);
        assert_eq!(
            subtotal.checked_percent_of(10).unwrap(),
            Money::from_cents(18_000)
        );
        assert_eq!(Money::from_cents(99).checked_percent_of(5).unwrap(), Money::from_cents(4));
    }

    #[test]
    fn money_from_decimal_rejects_bad_input() {
        assert_eq!(Money::from_decimal(1620.00).unwrap(), Money::from_cents(162_000));
        assert!(Money::from_decimal(-1.0).is_none());
        assert!(Money::from_decimal(f64::NAN).is_none());
    }

    #[test]
    fn provider_wire_names_round_trip() {
        for provider in PaymentProvider::ALL {
            assert_eq!(
                PaymentProvider::from_wire_name(provider.wire_name()),
                Some(provider)
            );
        }
        assert_eq!(PaymentProvider::from_wire_name("CRYPTOPAY"), Some(PaymentProvider::CryptoPay));
        assert_eq!(PaymentProvider::from_wire_name("paypal"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderState::PendingPayment.is_terminal());
        assert!(!OrderState::PendingVerification.is_terminal());
        assert!(OrderState::Completed.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(OrderState::Expired.is_terminal());
    }

    #[test]
    fn buyer_info_validation() {
        let good = BuyerInfo {
            name: "Ana Morales".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+52 55 1234 5678".to_string(),
        };
        assert!(good.validate().is_ok());

        let bad_email = BuyerInfo {
            email: "not-an-address".to_string(),
            ..good.clone()
        };
        assert!(bad_email.validate().is_err());

        let bad_phone = BuyerInfo {
            phone: "12345".to_string(),
            ..good
        };
        assert!(bad_phone.validate().is_err());
    }

    #[test]
    fn promo_validity_window() {
        let now = Utc::now();
        let open = PromoCode {
            code: "VERANO10".to_string(),
            percent: 10,
            valid_from: None,
            valid_until: None,
        };
        assert!(open.is_active(now));

        let expired = PromoCode {
            valid_until: Some(now - chrono::Duration::hours(1)),
            ..open
        };
        assert!(!expired.is_active(now));
    }
}
