//! Inventory overview, manual stock movements and movement history.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{LocationId, MovementType, ProductId, StockMovement};
use domain::{MovementView, ProductStock, StockMovementRequest};
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct StockMovementBody {
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub notes: Option<String>,
    pub stock_date: Option<DateTime<Utc>>,
}

impl From<StockMovementBody> for StockMovementRequest {
    fn from(body: StockMovementBody) -> Self {
        StockMovementRequest {
            product_id: body.product_id,
            movement_type: body.movement_type,
            quantity: body.quantity,
            location_id: body.location_id,
            from_location: body.from_location,
            to_location: body.to_location,
            notes: body.notes,
            stock_date: body.stock_date,
        }
    }
}

/// `movement` is null when a zero quantity left nothing to record.
#[derive(Debug, Serialize)]
pub struct StockMovementResponse {
    pub movement: Option<StockMovement>,
}

/// GET /inventory
#[tracing::instrument(skip(state))]
pub async fn overview<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductStock>>, ApiError> {
    Ok(Json(state.inventory.overview().await?))
}

/// POST /inventory/stock-movements
#[tracing::instrument(skip(state, body))]
pub async fn record_movement<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<StockMovementBody>,
) -> Result<(StatusCode, Json<StockMovementResponse>), ApiError> {
    let movement = state.inventory.record_movement(body.into()).await?;
    let status = if movement.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(StockMovementResponse { movement })))
}

/// GET /inventory/:product_id/history: movements newest first.
#[tracing::instrument(skip(state))]
pub async fn history<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<MovementView>>, ApiError> {
    let product_id: ProductId = parse_id(&product_id)?;
    Ok(Json(state.inventory.history(product_id).await?))
}
