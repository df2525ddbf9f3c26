//! Shared types for the inventory and order lifecycle engine.

mod ids;
mod model;
mod money;

pub use ids::{CancellationId, CustomerId, LocationId, MovementId, OrderId, ProductId};
pub use model::{
    CancellationItem, CancellationStatus, Customer, InventoryItem, Location, MovementType, Order,
    OrderCancellation, OrderItem, OrderStatus, ParseEnumError, Product, StockMovement,
};
pub use money::Money;
