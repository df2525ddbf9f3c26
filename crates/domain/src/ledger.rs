//! Per (product, location) quantity counters.
//!
//! A missing row reads as zero. No operation here ever leaves a row negative:
//! deductions check the locked quantity first and fail before writing.

use common::{LocationId, ProductId};
use store::InventoryRepository;

use crate::error::{DomainError, Result};

/// Returns the quantity held, locking the row for the rest of the transaction.
pub async fn get_quantity<T: InventoryRepository>(
    tx: &mut T,
    product_id: ProductId,
    location_id: LocationId,
) -> Result<i64> {
    Ok(tx
        .lock_inventory(product_id, location_id)
        .await?
        .unwrap_or(0))
}

/// Applies a signed delta and returns the new quantity.
pub async fn adjust_quantity<T: InventoryRepository>(
    tx: &mut T,
    product_id: ProductId,
    location_id: LocationId,
    delta: i64,
) -> Result<i64> {
    if delta >= 0 {
        let current = get_quantity(tx, product_id, location_id).await?;
        if current.checked_add(delta).is_none() {
            return Err(DomainError::validation(format!(
                "Quantity out of range: {current} units held, {delta} added"
            )));
        }
        return Ok(tx
            .increment_inventory(product_id, location_id, delta)
            .await?);
    }

    let required = delta
        .checked_neg()
        .ok_or_else(|| DomainError::validation("Quantity out of range"))?;
    let available = get_quantity(tx, product_id, location_id).await?;
    if available < required {
        metrics::counter!("insufficient_stock_total").increment(1);
        tracing::warn!(%product_id, %location_id, available, required, "insufficient stock");
        return Err(DomainError::InsufficientStock {
            product_id,
            location_id,
            available,
            required,
        });
    }

    Ok(tx
        .decrement_inventory(product_id, location_id, required)
        .await?)
}
