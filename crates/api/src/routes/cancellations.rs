//! Cancellation record endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{CancellationId, CancellationStatus, OrderCancellation};
use serde::{Deserialize, Serialize};
use store::{CancellationQuery, DEFAULT_CANCELLATION_LIMIT, Store};

use super::{parse_id, parse_status};
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListCancellationsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct CancellationListResponse {
    pub cancellations: Vec<OrderCancellation>,
    pub total: u64,
    pub has_more: bool,
}

/// GET /cancellations: newest first, optionally filtered by status.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListCancellationsQuery>,
) -> Result<Json<CancellationListResponse>, ApiError> {
    let offset = params.offset.unwrap_or(0);
    let mut query = CancellationQuery::new()
        .limit(params.limit.unwrap_or(DEFAULT_CANCELLATION_LIMIT))
        .offset(offset);
    if let Some(raw) = params.status.as_deref() {
        let status: CancellationStatus = parse_status(raw, "cancellation status")?;
        query = query.status(status);
    }

    let result = state.cancellations.list(query).await?;
    Ok(Json(CancellationListResponse {
        has_more: result.has_more(offset),
        total: result.total,
        cancellations: result.items,
    }))
}

/// PATCH /cancellations/:id/status: marks the items returned.
#[tracing::instrument(skip(state))]
pub async fn advance_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AdvanceStatusRequest>,
) -> Result<Json<OrderCancellation>, ApiError> {
    let id: CancellationId = parse_id(&id)?;
    let status: CancellationStatus = parse_status(&req.status, "cancellation status")?;
    Ok(Json(state.cancellations.advance_status(id, status).await?))
}
