//! Order cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{CancelOrder, CancelledOrder};
use serde::Deserialize;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
    pub notes: Option<String>,
    /// Keep the items in transit until the cancellation is marked returned.
    #[serde(default)]
    pub hold_return: bool,
}

/// POST /orders/:id/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CancelledOrder>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let cmd = CancelOrder {
        order_id,
        reason: req.reason,
        notes: req.notes,
        hold_return: req.hold_return,
    };
    Ok(Json(state.orders.cancel_order(cmd).await?))
}

/// POST /orders/:id/uncancel: removes the cancellation record only.
#[tracing::instrument(skip(state))]
pub async fn uncancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    state.cancellations.uncancel(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
