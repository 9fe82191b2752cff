//! Periodic order expiry sweep.
//!
//! No strict timing guarantee beyond "eventually after `expires_at`"; the
//! sweep runs on a fixed interval and each due order is expired under its
//! own lock.

use chrono::Utc;
use sorteo_core::order::OrderService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawns the expiry sweep loop. The task runs until the process exits.
pub fn spawn_expiry_sweeper(orders: Arc<OrderService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; that is fine, an empty sweep is
        // cheap.
        loop {
            ticker.tick().await;
            match orders.sweep_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(expired) => tracing::info!(expired, "expiry sweep released orders"),
                Err(error) => tracing::warn!(%error, "expiry sweep failed"),
            }
        }
    })
}
