//! Order endpoints: checkout, status, proof attachment, cancellation.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sorteo_core::order::CreateOrder;
use sorteo_core::types::{
    BuyerInfo, Order, OrderId, PaymentEventRecord, PaymentProvider, RaffleId, TicketNumber,
};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Raffle to buy from
    pub raffle_id: Uuid,
    /// Selected ticket numbers
    pub tickets: Vec<u32>,
    /// Buyer contact info
    pub buyer: BuyerRequest,
    /// Payment provider wire name (`cryptopay`, `voucher`, `transfer`,
    /// `transfer-intl`)
    pub provider: String,
    /// Optional promo code
    pub promo_code: Option<String>,
}

/// Buyer contact info from the client.
#[derive(Debug, Deserialize)]
pub struct BuyerRequest {
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
}

/// Order snapshot returned by checkout and status queries.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// Order id
    pub id: Uuid,
    /// Raffle id
    pub raffle_id: Uuid,
    /// Lifecycle state
    pub state: String,
    /// Frozen ticket numbers
    pub tickets: Vec<u32>,
    /// Price before discount
    pub subtotal: f64,
    /// Resolved discount percentage
    pub discount_percent: u32,
    /// Discount amount
    pub discount_amount: f64,
    /// Amount due
    pub total: f64,
    /// Currency code
    pub currency: String,
    /// Chosen payment provider
    pub provider: String,
    /// Provider-facing reference code
    pub reference: String,
    /// Attached payment proof, if any
    pub proof_reference: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: *order.id.as_uuid(),
            raffle_id: *order.raffle_id.as_uuid(),
            state: order.state.to_string(),
            tickets: order.tickets.iter().map(TicketNumber::value).collect(),
            subtotal: order.subtotal.as_decimal(),
            discount_percent: order.discount_percent,
            discount_amount: order.discount_amount.as_decimal(),
            total: order.total.as_decimal(),
            currency: order.currency.to_string(),
            provider: order.provider.to_string(),
            reference: order.reference,
            proof_reference: order.proof_reference,
            created_at: order.created_at,
            expires_at: order.expires_at,
        }
    }
}

/// One recorded payment event in a status response.
#[derive(Debug, Serialize)]
pub struct PaymentEventResponse {
    /// Provider that sent the event
    pub provider: String,
    /// Provider event id (idempotency key)
    pub provider_event_id: String,
    /// Canonical status the event carried
    pub status: Option<String>,
    /// Claimed amount
    pub amount: Option<f64>,
    /// Claimed currency
    pub currency: Option<String>,
    /// What the ingestor did with the event
    pub outcome: String,
    /// When the event was received
    pub received_at: DateTime<Utc>,
}

impl From<PaymentEventRecord> for PaymentEventResponse {
    fn from(record: PaymentEventRecord) -> Self {
        Self {
            provider: record.provider.to_string(),
            provider_event_id: record.provider_event_id,
            status: record.status.map(|s| s.to_string()),
            amount: record.amount.map(|a| a.as_decimal()),
            currency: record.currency.map(|c| c.to_string()),
            outcome: record.outcome.to_string(),
            received_at: record.received_at,
        }
    }
}

/// Status query response: snapshot plus recent payment events.
#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    /// Order snapshot
    pub order: OrderResponse,
    /// Most recent payment events, newest first
    pub events: Vec<PaymentEventResponse>,
}

/// Query parameters for the status endpoint.
#[derive(Debug, Deserialize)]
pub struct StatusParams {
    /// Filter events to one provider
    pub provider: Option<String>,
    /// Maximum events to return (default 10, capped at 50)
    pub limit: Option<usize>,
}

/// Proof attachment request.
#[derive(Debug, Deserialize)]
pub struct AttachProofRequest {
    /// Receipt/reference the buyer submitted
    pub proof_reference: String,
}

/// Cancellation request.
#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    /// Why the order is being cancelled
    pub reason: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Creates an order from a finalized selection.
///
/// 201 with the frozen order; 409 when a selected ticket was taken in the
/// meantime (re-select and retry); 422 for violated purchase rules.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let provider = PaymentProvider::from_wire_name(&request.provider).ok_or_else(|| {
        AppError::validation(format!(
            "unknown payment provider {:?}; expected one of cryptopay, voucher, transfer, transfer-intl",
            request.provider
        ))
    })?;

    let order = state
        .orders
        .create(CreateOrder {
            raffle_id: RaffleId::from_uuid(request.raffle_id),
            tickets: request.tickets.into_iter().map(TicketNumber::new).collect(),
            buyer: BuyerInfo {
                name: request.buyer.name,
                email: request.buyer.email,
                phone: request.buyer.phone,
            },
            provider,
            promo_code: request.promo_code,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// Returns an order snapshot and its recent payment events.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(params): Query<StatusParams>,
) -> Result<Json<OrderStatusResponse>, AppError> {
    let order_id = OrderId::from_uuid(order_id);
    let provider = match &params.provider {
        Some(name) => Some(PaymentProvider::from_wire_name(name).ok_or_else(|| {
            AppError::bad_request(format!("unknown payment provider {name:?}"))
        })?),
        None => None,
    };
    let limit = params.limit.unwrap_or(10).min(50);

    let order = state.orders.get(order_id).await?;
    let events = state.orders.events_for(order_id, provider, limit).await?;

    Ok(Json(OrderStatusResponse {
        order: order.into(),
        events: events.into_iter().map(Into::into).collect(),
    }))
}

/// Attaches a payment proof, moving the order to `pending_verification`.
/// Duplicate submissions are acknowledged without effect.
pub async fn attach_proof(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<AttachProofRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    if request.proof_reference.trim().is_empty() {
        return Err(AppError::validation("proof_reference must not be empty"));
    }
    let order = state
        .orders
        .attach_proof(OrderId::from_uuid(order_id), request.proof_reference)
        .await?;
    Ok(Json(order.into()))
}

/// Cancels an open order.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .orders
        .cancel(OrderId::from_uuid(order_id), &request.reason)
        .await?;
    Ok(Json(order.into()))
}
