//! Inbound payment webhook endpoint.
//!
//! One endpoint serves all four providers; the provider selector arrives as
//! the `provider` query parameter or the `X-Provider` header. Signed
//! providers put a base64 HMAC-SHA-256 of the raw body in `X-Signature`.
//!
//! Response contract (providers retry on non-2xx):
//! - 200 `{success, order_id, status}`: applied, including idempotent replays
//! - 400: missing/unknown selector, malformed payload
//! - 401: signature verification failed (event recorded, never applied)
//! - 404: payload references an unknown order
//! - 5xx: nothing was applied; safe to retry

use crate::error::AppError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use sorteo_core::CoreError;
use std::collections::HashMap;

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Whether the event was accepted
    pub success: bool,
    /// Order the event was applied to
    pub order_id: String,
    /// Order state after application
    pub status: String,
}

/// Receives one payment notification.
pub async fn receive_payment(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let provider = params
        .get("provider")
        .map(String::as_str)
        .or_else(|| headers.get("x-provider").and_then(|v| v.to_str().ok()));
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());

    let order = state
        .webhooks
        .ingest(provider, signature, &body)
        .await
        .map_err(|err| match err {
            // Providers expect plain 400 on payload problems, nothing finer.
            CoreError::Validation(message) => AppError::bad_request(message),
            other => AppError::from(other),
        })?;

    Ok(Json(WebhookAck {
        success: true,
        order_id: order.id.to_string(),
        status: order.state.to_string(),
    }))
}
