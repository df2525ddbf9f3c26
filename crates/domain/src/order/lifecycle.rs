//! Order status transition rules.
//!
//! These checks are pure. The service applies the inventory effect they
//! select inside its transaction.

use std::collections::BTreeMap;

use common::{Order, OrderItem, OrderStatus, ProductId};

use crate::error::{DomainError, Result};

/// Inventory effect of an accepted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEffect {
    /// Same status requested; nothing to write.
    Unchanged,
    /// Status changes, stock stays where it is.
    Relabel,
    /// Stock in transit is sold.
    Deliver,
}

/// Fails if the order has been delivered.
pub fn ensure_mutable(order: &Order) -> Result<()> {
    if order.is_delivered() {
        return Err(DomainError::ImmutableOrder { order_id: order.id });
    }
    Ok(())
}

/// Decides whether `order` may move to `to` and with what effect.
///
/// Cancellation is not a plain status change: it goes through the cancel
/// operation, which records a reason and a cancellation record. A cancelled
/// order with an open cancellation record must be uncancelled before it can
/// re-enter the pipeline.
pub fn plan_status_change(
    order: &Order,
    to: OrderStatus,
    has_cancellation: bool,
) -> Result<StatusEffect> {
    ensure_mutable(order)?;

    if order.status == to {
        return Ok(StatusEffect::Unchanged);
    }

    match (order.status, to) {
        (_, OrderStatus::Cancelled) => Err(DomainError::validation(
            "Use the cancel operation to cancel an order",
        )),
        (OrderStatus::Cancelled, OrderStatus::Delivered) => Err(DomainError::validation(
            "A cancelled order cannot be delivered",
        )),
        (OrderStatus::Cancelled, _) if has_cancellation => Err(DomainError::validation(
            "Order has a cancellation record; uncancel it before changing its status",
        )),
        (from, OrderStatus::Delivered) if from.is_in_pipeline() => Ok(StatusEffect::Deliver),
        (_, OrderStatus::Pending | OrderStatus::OnHold) => Ok(StatusEffect::Relabel),
        (from, to) => Err(DomainError::validation(format!(
            "Invalid status transition from {from} to {to}"
        ))),
    }
}

/// Fails unless the order can be cancelled.
pub fn plan_cancellation(order: &Order) -> Result<()> {
    ensure_mutable(order)?;
    if order.status == OrderStatus::Cancelled {
        return Err(DomainError::validation("Order is already cancelled"));
    }
    Ok(())
}

/// Per-product quantity change from `old` to `new` lines.
///
/// Products are compared by summed quantity; unchanged products are omitted.
/// Results are ordered by product id.
pub fn item_deltas(old: &[OrderItem], new: &[OrderItem]) -> Vec<(ProductId, i64)> {
    let mut deltas: BTreeMap<ProductId, i64> = BTreeMap::new();
    for item in old {
        *deltas.entry(item.product_id).or_default() -= i64::from(item.quantity);
    }
    for item in new {
        *deltas.entry(item.product_id).or_default() += i64::from(item.quantity);
    }
    deltas.into_iter().filter(|(_, delta)| *delta != 0).collect()
}
