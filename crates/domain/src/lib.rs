//! Inventory and order lifecycle engine.
//!
//! Stock for every product is tracked per location in a ledger, and every
//! change is logged as a stock movement. Orders pull stock from Fulfillment
//! into In Transit, deliveries sell it, and cancellations send it back.
//!
//! Each service operation runs in a single store transaction. Either the
//! ledger, the movement log and the order rows all change together or none
//! of them do.

pub mod cancellation;
pub mod catalog;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod locations;
pub mod movements;
pub mod order;
pub mod transfer;

use std::time::Instant;

pub use cancellation::CancellationService;
pub use catalog::{CatalogService, ProductDraft, ProductSummary};
pub use error::{DomainError, Result};
pub use inventory::{InventoryService, LocationStock, ProductStock, StockMovementRequest};
pub use locations::{
    DEFAULT_LOCATIONS, FULFILLMENT, IN_TRANSIT, LocationMap, LocationRegistry, PRODUCTION,
};
pub use movements::MovementView;
pub use order::{
    CancelOrder, CancelledOrder, ChangeStatus, CreateCustomer, CustomerDetails,
    CustomerWithOrders, OrderEditPolicy, OrderLine, OrderService, UpdateCustomer,
};
pub use transfer::{AdjustRequest, TransferRequest};

/// Records how long a service operation took.
pub(crate) fn record_duration(operation: &'static str, start: Instant) {
    metrics::histogram!("operation_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
