//! Paged ticket availability for the selection grid.
//!
//! Derived on demand from the allocation baseline plus live reservations;
//! no row per ticket exists anywhere; only the requested page is
//! materialized.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sorteo_core::types::{RaffleId, TicketNumber};
use uuid::Uuid;

const DEFAULT_PAGE: u32 = 100;
const MAX_PAGE: u32 = 500;

/// Query parameters for the availability page.
#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    /// First ticket number of the page
    pub offset: Option<u32>,
    /// Page size (default 100, capped at 500)
    pub limit: Option<u32>,
}

/// One ticket in the page.
#[derive(Debug, Serialize)]
pub struct TicketAvailability {
    /// Ticket number
    pub number: u32,
    /// Whether the ticket is taken (baseline, reserved, or sold)
    pub occupied: bool,
}

/// Availability page response.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    /// Raffle id
    pub raffle_id: Uuid,
    /// Total tickets in the raffle
    pub total_tickets: u32,
    /// Occupied count across the whole raffle
    pub occupied_count: usize,
    /// Requested page
    pub tickets: Vec<TicketAvailability>,
}

/// Returns one page of ticket occupancy for a raffle.
pub async fn get_availability(
    State(state): State<AppState>,
    Path(raffle_id): Path<Uuid>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let raffle_id = RaffleId::from_uuid(raffle_id);
    let raffle = state
        .catalog
        .raffle(raffle_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("raffle {raffle_id} not found")))?;

    let occupied = state.inventory.occupied_snapshot(raffle_id).await?;

    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let end = offset.saturating_add(limit).min(raffle.total_tickets);

    let tickets = (offset..end)
        .map(|number| TicketAvailability {
            occupied: occupied.contains(&TicketNumber::new(number)),
            number,
        })
        .collect();

    Ok(Json(AvailabilityResponse {
        raffle_id: *raffle_id.as_uuid(),
        total_tickets: raffle.total_tickets,
        occupied_count: occupied.len(),
        tickets,
    }))
}
