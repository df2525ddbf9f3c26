//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, Product, ProductId};
use domain::{ProductDraft, ProductSummary};
use serde::Deserialize;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub code: String,
    pub price: Money,
    pub description: Option<String>,
}

impl From<ProductRequest> for ProductDraft {
    fn from(req: ProductRequest) -> Self {
        let draft = ProductDraft::new(req.name, req.code, req.price);
        match req.description {
            Some(description) => draft.description(description),
            None => draft,
        }
    }
}

/// GET /products: products with stock per location and available stock.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductSummary>>, ApiError> {
    Ok(Json(state.catalog.list_products().await?))
}

/// POST /products
#[tracing::instrument(skip(state))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.create_product(req.into()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/:id
#[tracing::instrument(skip(state))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    Ok(Json(state.catalog.update_product(id, req.into()).await?))
}

/// DELETE /products/:id
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ProductId = parse_id(&id)?;
    state.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
