//! Error taxonomy for the raffle sales core.

use crate::types::{OrderId, PaymentProvider};
use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the core.
///
/// The HTTP layer maps these onto response codes; the variants mirror what a
/// caller can do about them: fix the input (`Validation`), re-select tickets
/// (`InventoryConflict`), re-sign the request (`Authenticity`), or retry later
/// (`Transient`).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input or a violated business rule; user-correctable.
    #[error("validation failed: {0}")]
    Validation(String),

    /// One or more tickets were taken between selection and order freeze.
    #[error("tickets no longer available: {0}")]
    InventoryConflict(String),

    /// Webhook signature verification failed for a provider.
    #[error("authenticity check failed for {provider}: {reason}")]
    Authenticity {
        /// Provider whose signature check failed
        provider: PaymentProvider,
        /// Why verification failed
        reason: String,
    },

    /// A referenced order, raffle, or provider does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource looked up
        resource: &'static str,
        /// Identifier that missed
        id: String,
    },

    /// A downstream dependency failed; safe for the caller to retry.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl CoreError {
    /// Shorthand for an unknown-order error
    #[must_use]
    pub fn order_not_found(id: OrderId) -> Self {
        Self::NotFound {
            resource: "order",
            id: id.to_string(),
        }
    }
}
