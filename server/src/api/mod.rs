//! HTTP API endpoints.
//!
//! - [`webhooks`]: inbound payment notifications from the four providers
//! - [`orders`]: checkout, status queries, proof attachment, cancellation
//! - [`availability`]: paged ticket occupancy for the selection grid

pub mod availability;
pub mod orders;
pub mod webhooks;
