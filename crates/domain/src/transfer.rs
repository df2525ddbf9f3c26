//! The stock transfer engine.
//!
//! Both operations run inside the caller's transaction and update the ledger
//! and the movement log together. A failure leaves the transaction to be
//! dropped by the caller, which discards every write made so far.

use chrono::{DateTime, Utc};
use common::{LocationId, MovementType, OrderId, ProductId, StockMovement};
use store::{InventoryRepository, MovementRepository};

use crate::error::{DomainError, Result};
use crate::{ledger, movements};

/// Move `quantity` of a product from one location to another.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub product_id: ProductId,
    pub from: LocationId,
    pub to: LocationId,
    pub quantity: i64,
    pub notes: Option<String>,
    pub order_id: Option<OrderId>,
}

impl TransferRequest {
    pub fn new(product_id: ProductId, from: LocationId, to: LocationId, quantity: i64) -> Self {
        Self {
            product_id,
            from,
            to,
            quantity,
            notes: None,
            order_id: None,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

/// Increment or decrement a product at a single location.
///
/// Sales and negative adjustments deduct; production and positive
/// adjustments add.
#[derive(Debug, Clone)]
pub struct AdjustRequest {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub notes: Option<String>,
    pub stock_date: Option<DateTime<Utc>>,
    pub order_id: Option<OrderId>,
}

impl AdjustRequest {
    pub fn new(
        product_id: ProductId,
        location_id: LocationId,
        movement_type: MovementType,
        quantity: i64,
    ) -> Self {
        Self {
            product_id,
            location_id,
            movement_type,
            quantity,
            notes: None,
            stock_date: None,
            order_id: None,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn stock_date(mut self, stock_date: DateTime<Utc>) -> Self {
        self.stock_date = Some(stock_date);
        self
    }

    pub fn order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    fn is_deduction(&self) -> bool {
        self.movement_type == MovementType::Sale
            || (self.movement_type == MovementType::Adjustment && self.quantity < 0)
    }
}

/// Moves stock between two locations.
///
/// Returns the logged movement, or None for a zero quantity.
pub async fn transfer<T>(tx: &mut T, req: &TransferRequest) -> Result<Option<StockMovement>>
where
    T: InventoryRepository + MovementRepository,
{
    if req.quantity < 0 {
        return Err(DomainError::validation("Transfer quantity cannot be negative"));
    }
    if req.from == req.to {
        return Err(DomainError::validation(
            "Source and destination locations must differ",
        ));
    }
    if req.quantity == 0 {
        return Ok(None);
    }

    ledger::adjust_quantity(tx, req.product_id, req.from, -req.quantity).await?;
    ledger::adjust_quantity(tx, req.product_id, req.to, req.quantity).await?;

    let movement = movements::transfer_entry(
        req.product_id,
        req.from,
        req.to,
        req.quantity,
        req.notes.clone(),
        req.order_id,
    );
    movements::append(tx, &movement).await?;

    tracing::debug!(
        product_id = %req.product_id,
        from = %req.from,
        to = %req.to,
        quantity = req.quantity,
        "stock transferred"
    );
    Ok(Some(movement))
}

/// Applies a single-location movement.
///
/// Returns the logged movement, or None for a zero quantity.
pub async fn adjust<T>(tx: &mut T, req: &AdjustRequest) -> Result<Option<StockMovement>>
where
    T: InventoryRepository + MovementRepository,
{
    if req.movement_type == MovementType::Transfer {
        return Err(DomainError::validation(
            "Transfers need a source and a destination location",
        ));
    }
    if req.quantity == 0 {
        return Ok(None);
    }

    let magnitude = req
        .quantity
        .checked_abs()
        .ok_or_else(|| DomainError::validation("Quantity out of range"))?;
    let signed = if req.is_deduction() {
        -magnitude
    } else {
        magnitude
    };

    ledger::adjust_quantity(tx, req.product_id, req.location_id, signed).await?;

    let movement = movements::location_entry(
        req.product_id,
        req.location_id,
        req.movement_type,
        signed,
        req.notes.clone(),
        req.stock_date,
        req.order_id,
    );
    movements::append(tx, &movement).await?;
    Ok(Some(movement))
}
