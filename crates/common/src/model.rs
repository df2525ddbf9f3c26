//! Relational row types shared by the store and the domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CancellationId, CustomerId, LocationId, Money, MovementId, OrderId, ProductId};

/// Error returned when a stored or requested enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// A named place where stock can sit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub code: String,
    pub price: Money,
    pub description: Option<String>,
}

/// Quantity counter for one product at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
}

/// Classification of a stock movement log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock manufactured into a location.
    Production,
    /// Stock moved between two locations.
    Transfer,
    /// Manual correction, positive or negative.
    Adjustment,
    /// Stock removed by a delivery.
    Sale,
}

impl MovementType {
    /// Returns the persisted name of the movement type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Production => "production",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
            MovementType::Sale => "sale",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MovementType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(MovementType::Production),
            "transfer" => Ok(MovementType::Transfer),
            "adjustment" => Ok(MovementType::Adjustment),
            "sale" => Ok(MovementType::Sale),
            other => Err(ParseEnumError {
                kind: "movement type",
                value: other.to_string(),
            }),
        }
    }
}

/// One entry in the append-only stock movement log.
///
/// Transfers carry `from_location`/`to_location` and a positive magnitude.
/// Every other type carries `location_id` and a signed quantity: negative for
/// deductions, positive for increments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub notes: Option<String>,
    pub order_id: Option<OrderId>,
    pub stock_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A delivery customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub location: String,
    pub preferred_delivery_time: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Out for delivery.
    #[default]
    Pending,
    /// Delivery confirmed (terminal, immutable).
    Delivered,
    /// Delivery paused; stock stays in transit.
    OnHold,
    /// Cancelled; see the cancellation record for return status.
    Cancelled,
}

impl OrderStatus {
    /// Returns the persisted name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Delivered => "delivered",
            OrderStatus::OnHold => "on_hold",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true for statuses that represent stock in the delivery pipeline.
    pub fn is_in_pipeline(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::OnHold)
    }

    /// Returns true if no further change is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "delivered" => Ok(OrderStatus::Delivered),
            "on_hold" => Ok(OrderStatus::OnHold),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseEnumError {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// A line on an order. The unit price is a snapshot taken at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A customer order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub cancellation_reason: Option<String>,
    pub cancellation_notes: Option<String>,
    pub hold_return: bool,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Returns true once the order has been delivered.
    pub fn is_delivered(&self) -> bool {
        self.status == OrderStatus::Delivered
    }

    /// Sums the line totals of the given items.
    pub fn total_for(items: &[OrderItem]) -> Money {
        items.iter().map(OrderItem::line_total).sum()
    }
}

/// Status of a cancellation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CancellationStatus {
    /// Items are still physically in transit.
    #[default]
    Cancelled,
    /// Items were confirmed back in stock.
    Returned,
}

impl CancellationStatus {
    /// Returns the persisted name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationStatus::Cancelled => "cancelled",
            CancellationStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for CancellationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CancellationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancelled" => Ok(CancellationStatus::Cancelled),
            "returned" => Ok(CancellationStatus::Returned),
            other => Err(ParseEnumError {
                kind: "cancellation status",
                value: other.to_string(),
            }),
        }
    }
}

/// Denormalized copy of an order line taken at cancellation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_code: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Audit record of a cancelled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancellation {
    pub id: CancellationId,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub cancellation_reason: String,
    pub cancellation_notes: Option<String>,
    pub status: CancellationStatus,
    pub cancelled_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub items: Vec<CancellationItem>,
}
