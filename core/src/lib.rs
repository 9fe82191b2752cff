//! Raffle ticket sales core: allocation, selection, order lifecycle, and
//! multi-provider payment reconciliation.
//!
//! # Architecture
//!
//! ```text
//! Browsing / selection:
//! ┌──────────────────┐      ┌──────────────────┐
//! │    Allocation    │─────▶│    Selection     │
//! │ (seeded occupied │      │ (per-buyer picks │
//! │   set, O(count)) │      │   + pricing)     │
//! └──────────────────┘      └────────┬─────────┘
//!                                    │ checkout
//!                                    ▼
//! ┌──────────────────┐      ┌──────────────────┐      ┌───────────────┐
//! │ PaymentWebhook   │─────▶│  OrderLifecycle  │─────▶│ Notification  │
//! │ Ingestor         │      │ (per-order FSM,  │      │ port          │
//! │ (verify/normal-  │      │  idempotent)     │      └───────────────┘
//! │  ize/dedupe)     │      └────────┬─────────┘
//! └──────────────────┘               │
//!                                    ▼
//!                           ┌──────────────────┐
//!                           │ TicketInventory  │
//!                           │ (atomic reserve) │
//!                           └──────────────────┘
//! ```
//!
//! Persistence and the raffle catalog sit behind traits in [`store`]; the
//! crate ships in-memory implementations and no storage engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocation;
pub mod error;
pub mod inventory;
pub mod notify;
pub mod order;
pub mod payment;
pub mod selection;
pub mod store;
pub mod testing;
pub mod types;

pub use allocation::{occupied_set, AllocationSeed};
pub use error::{CoreError, Result};
pub use inventory::{MemoryInventory, TicketInventory};
pub use notify::{OrderNotifier, RecordingNotifier, StateChange, TracingNotifier};
pub use order::{CreateOrder, OrderService};
pub use payment::{PaymentNotice, ProviderConfig, WebhookConfig, WebhookIngestor};
pub use selection::{price_for, validate_for_checkout, Quote, Selection};
pub use types::*;
