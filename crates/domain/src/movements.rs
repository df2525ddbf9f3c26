//! The append-only stock movement log.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{LocationId, MovementId, MovementType, OrderId, ProductId, StockMovement};
use serde::Serialize;
use store::{LocationRepository, MovementRepository};

use crate::error::Result;

/// Builds a transfer entry carrying both locations and a positive magnitude.
pub fn transfer_entry(
    product_id: ProductId,
    from: LocationId,
    to: LocationId,
    quantity: i64,
    notes: Option<String>,
    order_id: Option<OrderId>,
) -> StockMovement {
    let now = Utc::now();
    StockMovement {
        id: MovementId::new(),
        product_id,
        movement_type: MovementType::Transfer,
        quantity,
        location_id: None,
        from_location: Some(from),
        to_location: Some(to),
        notes,
        order_id,
        stock_date: now,
        created_at: now,
    }
}

/// Builds a single-location entry with a signed quantity.
pub fn location_entry(
    product_id: ProductId,
    location_id: LocationId,
    movement_type: MovementType,
    quantity: i64,
    notes: Option<String>,
    stock_date: Option<DateTime<Utc>>,
    order_id: Option<OrderId>,
) -> StockMovement {
    let now = Utc::now();
    StockMovement {
        id: MovementId::new(),
        product_id,
        movement_type,
        quantity,
        location_id: Some(location_id),
        from_location: None,
        to_location: None,
        notes,
        order_id,
        stock_date: stock_date.unwrap_or(now),
        created_at: now,
    }
}

/// Appends an entry to the log.
pub async fn append<T: MovementRepository>(tx: &mut T, movement: &StockMovement) -> Result<()> {
    tx.insert_movement(movement).await?;
    metrics::counter!("stock_movements_total", "type" => movement.movement_type.as_str())
        .increment(1);
    Ok(())
}

/// A log entry with its location ids resolved to names.
#[derive(Debug, Clone, Serialize)]
pub struct MovementView {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub location_name: Option<String>,
    pub from_location_name: Option<String>,
    pub to_location_name: Option<String>,
}

/// Lists a product's movements, newest first, with location names.
pub async fn history<T>(tx: &mut T, product_id: ProductId) -> Result<Vec<MovementView>>
where
    T: MovementRepository + LocationRepository,
{
    let names: HashMap<LocationId, String> = tx
        .list_locations(false)
        .await?
        .into_iter()
        .map(|l| (l.id, l.name))
        .collect();
    let name_of = |id: Option<LocationId>| id.and_then(|id| names.get(&id).cloned());

    let movements = tx.list_movements_for_product(product_id).await?;
    Ok(movements
        .into_iter()
        .map(|movement| MovementView {
            location_name: name_of(movement.location_id),
            from_location_name: name_of(movement.from_location),
            to_location_name: name_of(movement.to_location),
            movement,
        })
        .collect())
}
