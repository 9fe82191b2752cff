//! Application state shared across HTTP handlers.

use sorteo_core::inventory::TicketInventory;
use sorteo_core::order::OrderService;
use sorteo_core::payment::WebhookIngestor;
use sorteo_core::store::RaffleCatalog;
use std::sync::Arc;

/// Shared resources for the HTTP layer. Cloned (cheaply, via `Arc`) per
/// request.
#[derive(Clone)]
pub struct AppState {
    /// Order lifecycle engine
    pub orders: Arc<OrderService>,
    /// Webhook ingestion pipeline
    pub webhooks: Arc<WebhookIngestor>,
    /// Raffle catalog (read-only)
    pub catalog: Arc<dyn RaffleCatalog>,
    /// Authoritative ticket occupancy
    pub inventory: Arc<dyn TicketInventory>,
}
