//! Location administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Location, LocationId};
use serde::Deserialize;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListLocationsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// GET /locations: active locations by name, or all with `include_inactive`.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListLocationsQuery>,
) -> Result<Json<Vec<Location>>, ApiError> {
    let locations = state
        .inventory
        .list_locations(!query.include_inactive)
        .await?;
    Ok(Json(locations))
}

/// POST /locations
#[tracing::instrument(skip(state))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    let location = state
        .inventory
        .create_location(&req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// POST /locations/seed: creates any missing canonical location.
#[tracing::instrument(skip(state))]
pub async fn seed<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Location>>, ApiError> {
    Ok(Json(state.inventory.seed_locations().await?))
}

/// PATCH /locations/:id
#[tracing::instrument(skip(state))]
pub async fn set_active<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<Location>, ApiError> {
    let id: LocationId = parse_id(&id)?;
    let location = state.inventory.set_location_active(id, req.is_active).await?;
    Ok(Json(location))
}
