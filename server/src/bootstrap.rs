//! Wires the in-memory application together from configuration.
//!
//! In production the catalog and stores live behind external services; this
//! module stands them up in memory for single-node deployments and tests,
//! seeding one raffle from config.

use crate::config::{parse_tiers, Config, ProviderAuthConfig};
use crate::state::AppState;
use anyhow::Context;
use chrono::{Duration, Utc};
use sorteo_core::allocation::AllocationSeed;
use sorteo_core::inventory::MemoryInventory;
use sorteo_core::notify::TracingNotifier;
use sorteo_core::order::OrderService;
use sorteo_core::payment::{ProviderConfig, WebhookConfig, WebhookIngestor};
use sorteo_core::selection::validate_tiers;
use sorteo_core::store::memory::{MemoryCatalog, MemoryOrders, MemoryPaymentEvents, MemorySeeds};
use sorteo_core::store::AllocationSeedRepository;
use sorteo_core::types::{Currency, Money, PaymentProvider, Raffle, RaffleId, RaffleStatus};
use std::sync::Arc;
use uuid::Uuid;

/// Builds the application state, seeding the demo raffle.
///
/// # Errors
///
/// Returns an error when the raffle bootstrap configuration is invalid
/// (bad id, broken tier spec, presold count at or above the total).
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let catalog = Arc::new(MemoryCatalog::new());
    let seeds = Arc::new(MemorySeeds::new());

    let raffle = seed_raffle(config, &catalog, &seeds).await?;
    tracing::info!(
        raffle_id = %raffle.id,
        total_tickets = raffle.total_tickets,
        unit_price = %raffle.unit_price,
        "raffle seeded"
    );

    let inventory = Arc::new(MemoryInventory::new(catalog.clone(), seeds.clone()));
    let events = Arc::new(MemoryPaymentEvents::new());
    let orders = Arc::new(OrderService::new(
        catalog.clone(),
        Arc::new(MemoryOrders::new()),
        events.clone(),
        inventory.clone(),
        Arc::new(TracingNotifier::new()),
        Duration::hours(config.orders.expiry_hours),
    ));
    let webhooks = Arc::new(WebhookIngestor::new(
        orders.clone(),
        events,
        webhook_config(config),
    ));

    Ok(AppState {
        orders,
        webhooks,
        catalog,
        inventory,
    })
}

async fn seed_raffle(
    config: &Config,
    catalog: &MemoryCatalog,
    seeds: &Arc<MemorySeeds>,
) -> anyhow::Result<Raffle> {
    let bootstrap = &config.raffle;
    let id = match &bootstrap.id {
        Some(raw) => RaffleId::from_uuid(
            Uuid::parse_str(raw).context("RAFFLE_ID is not a valid UUID")?,
        ),
        None => RaffleId::new(),
    };

    let discount_tiers = parse_tiers(&bootstrap.discount_tiers);
    validate_tiers(&discount_tiers).context("RAFFLE_DISCOUNT_TIERS invalid")?;

    if bootstrap.presold > 0 {
        anyhow::ensure!(
            bootstrap.presold < bootstrap.total_tickets,
            "RAFFLE_PRESOLD ({}) must be below RAFFLE_TOTAL_TICKETS ({})",
            bootstrap.presold,
            bootstrap.total_tickets
        );
        let seed = match bootstrap.allocation_seed {
            Some(value) => AllocationSeed {
                raffle_id: id,
                occupied_count: bootstrap.presold,
                seed: value,
            },
            None => AllocationSeed::generate(id, bootstrap.presold),
        };
        seeds.put(seed).await?;
    }

    let now = Utc::now();
    let raffle = Raffle {
        id,
        name: bootstrap.name.clone(),
        total_tickets: bootstrap.total_tickets,
        unit_price: Money::from_cents(bootstrap.unit_price_cents),
        currency: Currency::new(bootstrap.currency.clone()),
        max_per_buyer: bootstrap.max_per_buyer,
        min_per_order: bootstrap.min_per_order,
        max_per_order: bootstrap.max_per_order,
        discount_tiers,
        starts_at: now,
        ends_at: now + Duration::days(60),
        draw_at: now + Duration::days(61),
        status: RaffleStatus::Active,
    };
    catalog.insert_raffle(raffle.clone()).await;
    Ok(raffle)
}

fn webhook_config(config: &Config) -> WebhookConfig {
    let auth = |auth: &ProviderAuthConfig| ProviderConfig {
        secret: auth.secret.clone(),
        verify_signatures: auth.verify,
    };
    WebhookConfig::new()
        .with_provider(PaymentProvider::CryptoPay, auth(&config.webhooks.cryptopay))
        .with_provider(PaymentProvider::CashVoucher, auth(&config.webhooks.voucher))
        .with_provider(PaymentProvider::BankTransfer, auth(&config.webhooks.transfer))
        .with_provider(
            PaymentProvider::BankTransferIntl,
            auth(&config.webhooks.transfer_intl),
        )
}
