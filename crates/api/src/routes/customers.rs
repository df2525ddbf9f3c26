//! Customer endpoints, including order placement and status changes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Customer, CustomerId, Money, Order, OrderId, OrderStatus, ProductId};
use domain::{
    ChangeStatus, CreateCustomer, CustomerDetails, CustomerWithOrders, OrderLine, UpdateCustomer,
};
use serde::{Deserialize, Serialize};
use store::{CustomerQuery, DEFAULT_CUSTOMER_LIMIT, Store};

use super::{parse_id, parse_status};
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Option<Money>,
}

impl From<OrderLineRequest> for OrderLine {
    fn from(req: OrderLineRequest) -> Self {
        match req.unit_price {
            Some(price) => OrderLine::priced(req.product_id, req.quantity, price),
            None => OrderLine::new(req.product_id, req.quantity),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub phone: String,
    pub location: String,
    pub preferred_delivery_time: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<OrderLineRequest>>,
}

impl CustomerRequest {
    fn into_parts(self) -> (CustomerDetails, Option<Vec<OrderLine>>) {
        let mut details = CustomerDetails::new(self.name, self.phone, self.location);
        details.preferred_delivery_time = self.preferred_delivery_time;
        details.notes = self.notes;
        let items = self
            .items
            .map(|items| items.into_iter().map(OrderLine::from).collect());
        (details, items)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<Customer>,
    pub total: u64,
    pub page: usize,
    pub limit: usize,
    pub has_more: bool,
}

// -- Handlers --

/// GET /customers: newest first, filtered by name or phone.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListCustomersQuery>,
) -> Result<Json<CustomerListResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_CUSTOMER_LIMIT);
    let mut query = CustomerQuery::new().page(page, limit);
    if let Some(search) = params.search {
        query = query.search(search);
    }
    let (offset, limit) = (query.offset, query.limit);

    let result = state.orders.list_customers(query).await?;
    Ok(Json(CustomerListResponse {
        has_more: result.has_more(offset),
        total: result.total,
        customers: result.items,
        page,
        limit,
    }))
}

/// POST /customers: registers a customer, placing an order when items are given.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CustomerRequest>,
) -> Result<(StatusCode, Json<CustomerWithOrders>), ApiError> {
    let (details, items) = req.into_parts();
    let cmd = CreateCustomer { details, items };
    let created = state.orders.create_customer(cmd).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /customers/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CustomerWithOrders>, ApiError> {
    let id: CustomerId = parse_id(&id)?;
    Ok(Json(state.orders.get_customer(id).await?))
}

/// PUT /customers/:id: updates contact fields; items replace the latest order's lines.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<CustomerWithOrders>, ApiError> {
    let customer_id: CustomerId = parse_id(&id)?;
    let (details, items) = req.into_parts();
    let cmd = UpdateCustomer {
        customer_id,
        details,
        items,
    };
    Ok(Json(state.orders.update_customer(cmd).await?))
}

/// DELETE /customers/:id
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: CustomerId = parse_id(&id)?;
    state.orders.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /customers/:id/orders
#[tracing::instrument(skip(state, req))]
pub async fn create_order<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let customer_id: CustomerId = parse_id(&id)?;
    let lines = req.items.into_iter().map(OrderLine::from).collect();
    let order = state.orders.create_order(customer_id, lines).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /customers/:id/orders/:order_id/status
#[tracing::instrument(skip(state))]
pub async fn change_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, order_id)): Path<(String, String)>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let customer_id: CustomerId = parse_id(&id)?;
    let order_id: OrderId = parse_id(&order_id)?;
    let status: OrderStatus = parse_status(&req.status, "order status")?;

    let order = state
        .orders
        .change_status(ChangeStatus::new(customer_id, order_id, status))
        .await?;
    Ok(Json(order))
}
