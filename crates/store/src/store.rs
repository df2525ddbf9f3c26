use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CancellationId, CancellationStatus, Customer, CustomerId, InventoryItem, Location, LocationId,
    Order, OrderCancellation, OrderId, OrderItem, Product, ProductId, StockMovement,
};

use crate::{CancellationQuery, CustomerQuery, Page, Result};

/// Entry point to the datastore.
///
/// Every mutating operation in the engine runs inside exactly one
/// [`Transaction`] obtained from [`Store::begin`]. Implementations must be
/// thread-safe (Send + Sync) and cheap to clone.
#[async_trait]
pub trait Store: Send + Sync {
    /// The unit-of-work type handed out by this store.
    type Tx: Transaction;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work against the store.
///
/// All reads and writes go through the repository supertraits. Changes become
/// visible to other transactions only after [`Transaction::commit`]; dropping
/// a transaction without committing rolls every change back.
#[async_trait]
pub trait Transaction:
    LocationRepository
    + ProductRepository
    + InventoryRepository
    + MovementRepository
    + CustomerRepository
    + OrderRepository
    + CancellationRepository
    + Send
{
    /// Commits every change made in this transaction.
    async fn commit(self) -> Result<()>;
}

/// Inventory location rows.
#[async_trait]
pub trait LocationRepository: Send {
    async fn find_location_by_name(&mut self, name: &str) -> Result<Option<Location>>;

    async fn get_location(&mut self, id: LocationId) -> Result<Option<Location>>;

    /// Inserts the location unless one with the same name exists.
    ///
    /// Returns true if a row was inserted. Never touches an existing row.
    async fn insert_location_if_absent(&mut self, location: &Location) -> Result<bool>;

    /// Inserts the location, failing with `UniqueViolation` on a duplicate name.
    async fn insert_location(&mut self, location: &Location) -> Result<()>;

    /// Lists locations ordered by name.
    async fn list_locations(&mut self, active_only: bool) -> Result<Vec<Location>>;

    async fn set_location_active(
        &mut self,
        id: LocationId,
        is_active: bool,
    ) -> Result<Option<Location>>;
}

/// Catalog rows.
#[async_trait]
pub trait ProductRepository: Send {
    /// Inserts the product, failing with `UniqueViolation` on a duplicate code.
    async fn insert_product(&mut self, product: &Product) -> Result<()>;

    /// Overwrites name, code, price and description. Returns false if absent.
    async fn update_product(&mut self, product: &Product) -> Result<bool>;

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products ordered by name.
    async fn list_products(&mut self) -> Result<Vec<Product>>;

    /// Deletes the product together with its ledger rows and movement log.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool>;

    /// Counts order lines referencing the product.
    async fn count_order_items_for_product(&mut self, id: ProductId) -> Result<u64>;
}

/// The per (product, location) quantity ledger.
#[async_trait]
pub trait InventoryRepository: Send {
    /// Reads the quantity and locks the row until the transaction ends.
    ///
    /// Returns None if no row exists.
    async fn lock_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<i64>>;

    /// Adds `amount` (>= 0), creating the row if absent. Returns the new quantity.
    async fn increment_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        amount: i64,
    ) -> Result<i64>;

    /// Subtracts `amount` only if the row holds at least that much.
    ///
    /// Fails with `StockGuard` otherwise. Returns the new quantity.
    async fn decrement_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        amount: i64,
    ) -> Result<i64>;

    async fn list_inventory_for_product(&mut self, product_id: ProductId)
    -> Result<Vec<InventoryItem>>;

    async fn list_inventory(&mut self) -> Result<Vec<InventoryItem>>;
}

/// The append-only stock movement log.
#[async_trait]
pub trait MovementRepository: Send {
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<()>;

    /// Lists movements of a product, newest first.
    async fn list_movements_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<StockMovement>>;

    /// Returns the creation time of the newest movement of a product.
    async fn latest_movement_at(&mut self, product_id: ProductId)
    -> Result<Option<DateTime<Utc>>>;
}

/// Customer rows.
#[async_trait]
pub trait CustomerRepository: Send {
    async fn insert_customer(&mut self, customer: &Customer) -> Result<()>;

    /// Overwrites the editable fields. Returns false if absent.
    async fn update_customer(&mut self, customer: &Customer) -> Result<bool>;

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>>;

    async fn list_customers(&mut self, query: &CustomerQuery) -> Result<Page<Customer>>;

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool>;
}

/// Order rows and their lines.
#[async_trait]
pub trait OrderRepository: Send {
    /// Inserts the order together with its items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Reads the order and locks its row until the transaction ends.
    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Reads and locks the customer's most recent order by order date.
    async fn latest_order_for_customer(&mut self, customer_id: CustomerId)
    -> Result<Option<Order>>;

    /// Lists the customer's orders, newest first.
    async fn list_orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Writes status, total, cancellation fields and hold flag. Items are untouched.
    async fn update_order(&mut self, order: &Order) -> Result<bool>;

    /// Replaces every line of the order.
    async fn replace_order_items(&mut self, id: OrderId, items: &[OrderItem]) -> Result<()>;

    async fn has_delivered_order(&mut self, customer_id: CustomerId) -> Result<bool>;

    /// Deletes every order line, then every order of the customer.
    ///
    /// Returns the number of orders deleted.
    async fn delete_orders_for_customer(&mut self, customer_id: CustomerId) -> Result<u64>;
}

/// Cancellation audit records and their item snapshots.
#[async_trait]
pub trait CancellationRepository: Send {
    /// Inserts the record with its items, failing with `UniqueViolation` if
    /// the order already has one.
    async fn insert_cancellation(&mut self, cancellation: &OrderCancellation) -> Result<()>;

    /// Reads the record and locks its row until the transaction ends.
    async fn get_cancellation_for_update(
        &mut self,
        id: CancellationId,
    ) -> Result<Option<OrderCancellation>>;

    async fn get_cancellation_by_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<OrderCancellation>>;

    async fn update_cancellation_status(
        &mut self,
        id: CancellationId,
        status: CancellationStatus,
        returned_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Deletes the item snapshots, then the record.
    async fn delete_cancellation(&mut self, id: CancellationId) -> Result<bool>;

    async fn list_cancellations(
        &mut self,
        query: &CancellationQuery,
    ) -> Result<Page<OrderCancellation>>;
}
