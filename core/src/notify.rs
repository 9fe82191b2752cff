//! Notification port.
//!
//! The core decides *that* a notification must fire and with what payload;
//! delivery (email, chat message, push) belongs to the external dispatcher.

use crate::error::Result;
use crate::types::{BuyerInfo, OrderId, OrderState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Payload emitted on every order state transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Order that transitioned
    pub order_id: OrderId,
    /// State the order entered
    pub new_state: OrderState,
    /// Who to tell
    pub buyer: BuyerInfo,
}

/// Consumer of order state changes.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Delivers one state change to the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error when the dispatcher could not accept the event;
    /// retry policy is the dispatcher's concern, not the core's.
    async fn order_state_changed(&self, change: StateChange) -> Result<()>;
}

/// Notifier that emits structured log lines instead of delivering anywhere.
///
/// The default wiring for local runs; a deployment swaps in a real
/// dispatcher client behind the same trait.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Creates a new `TracingNotifier`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderNotifier for TracingNotifier {
    async fn order_state_changed(&self, change: StateChange) -> Result<()> {
        tracing::info!(
            order_id = %change.order_id,
            new_state = %change.new_state,
            buyer_email = %change.buyer.email,
            "order state changed"
        );
        Ok(())
    }
}

/// In-memory notifier that records every change, for tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    changes: Arc<RwLock<Vec<StateChange>>>,
}

impl RecordingNotifier {
    /// Creates an empty `RecordingNotifier`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded changes, oldest first
    pub async fn changes(&self) -> Vec<StateChange> {
        self.changes.read().await.clone()
    }

    /// Number of recorded changes
    pub async fn count(&self) -> usize {
        self.changes.read().await.len()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn order_state_changed(&self, change: StateChange) -> Result<()> {
        self.changes.write().await.push(change);
        Ok(())
    }
}
