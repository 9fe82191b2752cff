//! Configuration for the sorteo server.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use sorteo_core::types::DiscountTier;
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Order lifecycle configuration
    pub orders: OrdersConfig,
    /// Per-provider webhook authenticity configuration
    pub webhooks: WebhooksConfig,
    /// Demo raffle seeded at startup (the catalog is an external service in
    /// production; this stands in for it on single-node deployments)
    pub raffle: RaffleBootstrapConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Order lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersConfig {
    /// Hours an order may sit unpaid before it expires
    pub expiry_hours: i64,
    /// Seconds between expiry sweep runs
    pub sweep_interval_secs: u64,
}

/// Authenticity settings for one webhook provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAuthConfig {
    /// Shared secret for HMAC verification
    pub secret: Option<String>,
    /// Whether inbound events must carry a valid signature
    pub verify: bool,
}

/// Webhook settings for all four providers.
///
/// The bank-transfer providers default to unverified: the source systems
/// confirm transfers through the back office and sign nothing. Flip the
/// `*_VERIFY_SIGNATURES` variables to harden a provider that starts signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// Crypto-pay gateway
    pub cryptopay: ProviderAuthConfig,
    /// Cash voucher network
    pub voucher: ProviderAuthConfig,
    /// Domestic bank transfer
    pub transfer: ProviderAuthConfig,
    /// International bank transfer
    pub transfer_intl: ProviderAuthConfig,
}

/// Demo raffle seeded into the in-memory catalog at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleBootstrapConfig {
    /// Fixed raffle id (UUID), random when unset
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// Total ticket count
    pub total_tickets: u32,
    /// Ticket price in cents
    pub unit_price_cents: u64,
    /// Currency code
    pub currency: String,
    /// Per-buyer ticket maximum
    pub max_per_buyer: u32,
    /// Per-transaction minimum
    pub min_per_order: u32,
    /// Per-transaction maximum
    pub max_per_order: u32,
    /// Discount tiers, e.g. `"5-9:5,10-19:10"` (`"20-:15"` for unbounded)
    pub discount_tiers: String,
    /// Tickets already occupied before sales opened (regenerated from the
    /// allocation seed)
    pub presold: u32,
    /// Fixed allocation seed, random when unset
    pub allocation_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
            },
            orders: OrdersConfig {
                expiry_hours: env::var("ORDER_EXPIRY_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(48),
                sweep_interval_secs: env::var("EXPIRY_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            },
            webhooks: WebhooksConfig {
                cryptopay: provider_auth("CRYPTOPAY", true),
                voucher: provider_auth("VOUCHER", true),
                transfer: provider_auth("TRANSFER", false),
                transfer_intl: provider_auth("TRANSFER_INTL", false),
            },
            raffle: RaffleBootstrapConfig {
                id: env::var("RAFFLE_ID").ok(),
                name: env::var("RAFFLE_NAME")
                    .unwrap_or_else(|_| "Gran Sorteo".to_string()),
                total_tickets: env::var("RAFFLE_TOTAL_TICKETS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
                unit_price_cents: env::var("RAFFLE_UNIT_PRICE_CENTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15_000),
                currency: env::var("RAFFLE_CURRENCY").unwrap_or_else(|_| "MXN".to_string()),
                max_per_buyer: env::var("RAFFLE_MAX_PER_BUYER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
                min_per_order: env::var("RAFFLE_MIN_PER_ORDER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
                max_per_order: env::var("RAFFLE_MAX_PER_ORDER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
                discount_tiers: env::var("RAFFLE_DISCOUNT_TIERS")
                    .unwrap_or_else(|_| "5-9:5,10-19:10".to_string()),
                presold: env::var("RAFFLE_PRESOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                allocation_seed: env::var("RAFFLE_ALLOCATION_SEED")
                    .ok()
                    .and_then(|s| s.parse().ok()),
            },
        }
    }
}

fn provider_auth(prefix: &str, verify_default: bool) -> ProviderAuthConfig {
    let secret = env::var(format!("{prefix}_WEBHOOK_SECRET")).ok().or_else(|| {
        verify_default.then(|| format!("dev-{}-secret-change-in-production", prefix.to_lowercase()))
    });
    ProviderAuthConfig {
        secret,
        verify: env::var(format!("{prefix}_VERIFY_SIGNATURES"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(verify_default),
    }
}

/// Parses a tier spec like `"5-9:5,10-19:10,20-:15"`.
///
/// Malformed entries are skipped with a warning rather than aborting
/// startup; an empty result means no automatic discounts.
#[must_use]
pub fn parse_tiers(spec: &str) -> Vec<DiscountTier> {
    let mut tiers = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((range, percent)) = entry.split_once(':') else {
            tracing::warn!(entry, "discount tier entry missing percentage; skipped");
            continue;
        };
        let Some((min, max)) = range.split_once('-') else {
            tracing::warn!(entry, "discount tier entry missing range; skipped");
            continue;
        };
        let (Ok(min), Ok(percent)) = (min.trim().parse(), percent.trim().parse()) else {
            tracing::warn!(entry, "discount tier entry is not numeric; skipped");
            continue;
        };
        let max = match max.trim() {
            "" => None,
            value => match value.parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    tracing::warn!(entry, "discount tier upper bound is not numeric; skipped");
                    continue;
                }
            },
        };
        tiers.push(DiscountTier::new(min, max, percent));
    }
    tiers
}
