//! Multi-provider payment webhook ingestion.
//!
//! Four providers deliver payment notifications with different payload
//! shapes, status vocabularies, and signing schemes. This module verifies
//! authenticity ([`signature`]), normalizes each shape into a canonical
//! [`PaymentNotice`] ([`providers`]), and applies it exactly once to the
//! matching order ([`ingestor`]).

pub mod ingestor;
pub mod providers;
pub mod signature;

pub use ingestor::{ProviderConfig, WebhookConfig, WebhookIngestor};
pub use providers::{normalize, payload_hash, PaymentNotice};
