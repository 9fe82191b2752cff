//! HTTP application for the sorteo raffle sales core.
//!
//! Exposes the webhook ingestion endpoint, checkout and status endpoints,
//! and the availability read side over [`sorteo_core`], plus the periodic
//! expiry sweep. See `bin/server.rs` for the entrypoint.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod health;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
