//! HTTP API for the inventory and order lifecycle engine.
//!
//! Provides REST endpoints for locations, stock movements, products,
//! customers, orders and cancellation records, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use domain::{
    CancellationService, CatalogService, InventoryService, LocationRegistry, OrderEditPolicy,
    OrderService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
///
/// Every service shares one [`LocationRegistry`] so that location changes
/// invalidate the cache for all of them.
pub struct AppState<S: Store> {
    pub inventory: InventoryService<S>,
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
    pub cancellations: CancellationService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/locations",
            get(routes::locations::list::<S>).post(routes::locations::create::<S>),
        )
        .route("/locations/seed", post(routes::locations::seed::<S>))
        .route("/locations/{id}", patch(routes::locations::set_active::<S>))
        .route("/inventory", get(routes::inventory::overview::<S>))
        .route(
            "/inventory/stock-movements",
            post(routes::inventory::record_movement::<S>),
        )
        .route(
            "/inventory/{product_id}/history",
            get(routes::inventory::history::<S>),
        )
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            put(routes::products::update::<S>).delete(routes::products::delete::<S>),
        )
        .route(
            "/customers",
            get(routes::customers::list::<S>).post(routes::customers::create::<S>),
        )
        .route(
            "/customers/{id}",
            get(routes::customers::get::<S>)
                .put(routes::customers::update::<S>)
                .delete(routes::customers::delete::<S>),
        )
        .route(
            "/customers/{id}/orders",
            post(routes::customers::create_order::<S>),
        )
        .route(
            "/customers/{id}/orders/{order_id}/status",
            put(routes::customers::change_status::<S>),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/uncancel", post(routes::orders::uncancel::<S>))
        .route("/cancellations", get(routes::cancellations::list::<S>))
        .route(
            "/cancellations/{id}/status",
            patch(routes::cancellations::advance_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state, wiring every service to one store.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    edit_policy: OrderEditPolicy,
) -> Arc<AppState<S>> {
    let registry = LocationRegistry::new();

    Arc::new(AppState {
        inventory: InventoryService::new(store.clone(), registry.clone()),
        catalog: CatalogService::new(store.clone(), registry.clone()),
        orders: OrderService::new(store.clone(), registry.clone()).with_edit_policy(edit_policy),
        cancellations: CancellationService::new(store, registry),
    })
}
