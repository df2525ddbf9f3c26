use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CancellationId, CancellationStatus, Customer, CustomerId, InventoryItem, Location, LocationId,
    Order, OrderCancellation, OrderId, OrderItem, OrderStatus, Product, ProductId, StockMovement,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CancellationQuery, CustomerQuery, Page, Result, StoreError,
    store::{
        CancellationRepository, CustomerRepository, InventoryRepository, LocationRepository,
        MovementRepository, OrderRepository, ProductRepository, Store, Transaction,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    locations: HashMap<LocationId, Location>,
    products: HashMap<ProductId, Product>,
    inventory: HashMap<(ProductId, LocationId), i64>,
    movements: Vec<StockMovement>,
    customers: HashMap<CustomerId, Customer>,
    orders: HashMap<OrderId, Order>,
    cancellations: HashMap<CancellationId, OrderCancellation>,
}

/// In-memory store implementation for testing and local runs.
///
/// A transaction holds the store-wide lock from `begin` until it is committed
/// or dropped, so transactions are fully serialized. Writes go to a private
/// working copy that replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of committed stock movements.
    pub async fn movement_count(&self) -> usize {
        self.state.lock().await.movements.len()
    }

    /// Returns every committed ledger row.
    pub async fn inventory_rows(&self) -> Vec<InventoryItem> {
        let state = self.state.lock().await;
        state
            .inventory
            .iter()
            .map(|(&(product_id, location_id), &quantity)| InventoryItem {
                product_id,
                location_id,
                quantity,
            })
            .collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<()> {
        let InMemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

fn page<T>(rows: Vec<T>, offset: usize, limit: usize) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows.into_iter().skip(offset).take(limit).collect();
    Page { items, total }
}

#[async_trait]
impl LocationRepository for InMemoryTransaction {
    async fn find_location_by_name(&mut self, name: &str) -> Result<Option<Location>> {
        Ok(self
            .working
            .locations
            .values()
            .find(|l| l.name == name)
            .cloned())
    }

    async fn get_location(&mut self, id: LocationId) -> Result<Option<Location>> {
        Ok(self.working.locations.get(&id).cloned())
    }

    async fn insert_location_if_absent(&mut self, location: &Location) -> Result<bool> {
        if self
            .working
            .locations
            .values()
            .any(|l| l.name == location.name)
        {
            return Ok(false);
        }
        self.working
            .locations
            .insert(location.id, location.clone());
        Ok(true)
    }

    async fn insert_location(&mut self, location: &Location) -> Result<()> {
        if !self.insert_location_if_absent(location).await? {
            return Err(StoreError::UniqueViolation {
                constraint: "unique_location_name".to_string(),
            });
        }
        Ok(())
    }

    async fn list_locations(&mut self, active_only: bool) -> Result<Vec<Location>> {
        let mut locations: Vec<_> = self
            .working
            .locations
            .values()
            .filter(|l| !active_only || l.is_active)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn set_location_active(
        &mut self,
        id: LocationId,
        is_active: bool,
    ) -> Result<Option<Location>> {
        Ok(self.working.locations.get_mut(&id).map(|location| {
            location.is_active = is_active;
            location.clone()
        }))
    }
}

#[async_trait]
impl ProductRepository for InMemoryTransaction {
    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        if self
            .working
            .products
            .values()
            .any(|p| p.code == product.code)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "unique_product_code".to_string(),
            });
        }
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<bool> {
        if self
            .working
            .products
            .values()
            .any(|p| p.code == product.code && p.id != product.id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "unique_product_code".to_string(),
            });
        }
        match self.working.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn list_products(&mut self) -> Result<Vec<Product>> {
        let mut products: Vec<_> = self.working.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        if self.working.products.remove(&id).is_none() {
            return Ok(false);
        }
        self.working.inventory.retain(|(product_id, _), _| *product_id != id);
        self.working.movements.retain(|m| m.product_id != id);
        Ok(true)
    }

    async fn count_order_items_for_product(&mut self, id: ProductId) -> Result<u64> {
        Ok(self
            .working
            .orders
            .values()
            .flat_map(|o| o.items.iter())
            .filter(|item| item.product_id == id)
            .count() as u64)
    }
}

#[async_trait]
impl InventoryRepository for InMemoryTransaction {
    async fn lock_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<i64>> {
        Ok(self
            .working
            .inventory
            .get(&(product_id, location_id))
            .copied())
    }

    async fn increment_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        amount: i64,
    ) -> Result<i64> {
        let quantity = self
            .working
            .inventory
            .entry((product_id, location_id))
            .or_insert(0);
        *quantity = quantity
            .checked_add(amount)
            .ok_or(StoreError::QuantityOverflow {
                product_id,
                location_id,
            })?;
        Ok(*quantity)
    }

    async fn decrement_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        amount: i64,
    ) -> Result<i64> {
        match self.working.inventory.get_mut(&(product_id, location_id)) {
            Some(quantity) if *quantity >= amount => {
                *quantity -= amount;
                Ok(*quantity)
            }
            _ => Err(StoreError::StockGuard {
                product_id,
                location_id,
                requested: amount,
            }),
        }
    }

    async fn list_inventory_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryItem>> {
        Ok(self
            .working
            .inventory
            .iter()
            .filter(|((p, _), _)| *p == product_id)
            .map(|(&(product_id, location_id), &quantity)| InventoryItem {
                product_id,
                location_id,
                quantity,
            })
            .collect())
    }

    async fn list_inventory(&mut self) -> Result<Vec<InventoryItem>> {
        Ok(self
            .working
            .inventory
            .iter()
            .map(|(&(product_id, location_id), &quantity)| InventoryItem {
                product_id,
                location_id,
                quantity,
            })
            .collect())
    }
}

#[async_trait]
impl MovementRepository for InMemoryTransaction {
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<()> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn list_movements_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<StockMovement>> {
        // Later inserts win ties on equal timestamps.
        let mut movements: Vec<_> = self
            .working
            .movements
            .iter()
            .rev()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect();
        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(movements)
    }

    async fn latest_movement_at(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .working
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .map(|m| m.created_at)
            .max())
    }
}

#[async_trait]
impl CustomerRepository for InMemoryTransaction {
    async fn insert_customer(&mut self, customer: &Customer) -> Result<()> {
        self.working.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<bool> {
        match self.working.customers.get_mut(&customer.id) {
            Some(existing) => {
                existing.name = customer.name.clone();
                existing.phone = customer.phone.clone();
                existing.location = customer.location.clone();
                existing.preferred_delivery_time = customer.preferred_delivery_time.clone();
                existing.notes = customer.notes.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.working.customers.get(&id).cloned())
    }

    async fn list_customers(&mut self, query: &CustomerQuery) -> Result<Page<Customer>> {
        let mut customers: Vec<_> = self
            .working
            .customers
            .values()
            .filter(|c| query.matches(&c.name, &c.phone))
            .cloned()
            .collect();
        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(customers, query.offset, query.limit))
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool> {
        Ok(self.working.customers.remove(&id).is_some())
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.get_order(id).await
    }

    async fn latest_order_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .max_by_key(|o| o.order_date)
            .cloned())
    }

    async fn list_orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let mut orders: Vec<_> = self
            .working
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn update_order(&mut self, order: &Order) -> Result<bool> {
        match self.working.orders.get_mut(&order.id) {
            Some(existing) => {
                existing.status = order.status;
                existing.total_amount = order.total_amount;
                existing.cancellation_reason = order.cancellation_reason.clone();
                existing.cancellation_notes = order.cancellation_notes.clone();
                existing.hold_return = order.hold_return;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_order_items(&mut self, id: OrderId, items: &[OrderItem]) -> Result<()> {
        if let Some(order) = self.working.orders.get_mut(&id) {
            order.items = items.to_vec();
        }
        Ok(())
    }

    async fn has_delivered_order(&mut self, customer_id: CustomerId) -> Result<bool> {
        Ok(self
            .working
            .orders
            .values()
            .any(|o| o.customer_id == customer_id && o.status == OrderStatus::Delivered))
    }

    async fn delete_orders_for_customer(&mut self, customer_id: CustomerId) -> Result<u64> {
        let before = self.working.orders.len();
        self.working
            .orders
            .retain(|_, o| o.customer_id != customer_id);
        Ok((before - self.working.orders.len()) as u64)
    }
}

#[async_trait]
impl CancellationRepository for InMemoryTransaction {
    async fn insert_cancellation(&mut self, cancellation: &OrderCancellation) -> Result<()> {
        if self
            .working
            .cancellations
            .values()
            .any(|c| c.order_id == cancellation.order_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "unique_cancellation_order".to_string(),
            });
        }
        self.working
            .cancellations
            .insert(cancellation.id, cancellation.clone());
        Ok(())
    }

    async fn get_cancellation_for_update(
        &mut self,
        id: CancellationId,
    ) -> Result<Option<OrderCancellation>> {
        Ok(self.working.cancellations.get(&id).cloned())
    }

    async fn get_cancellation_by_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<OrderCancellation>> {
        Ok(self
            .working
            .cancellations
            .values()
            .find(|c| c.order_id == order_id)
            .cloned())
    }

    async fn update_cancellation_status(
        &mut self,
        id: CancellationId,
        status: CancellationStatus,
        returned_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        match self.working.cancellations.get_mut(&id) {
            Some(cancellation) => {
                cancellation.status = status;
                cancellation.returned_at = returned_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cancellation(&mut self, id: CancellationId) -> Result<bool> {
        Ok(self.working.cancellations.remove(&id).is_some())
    }

    async fn list_cancellations(
        &mut self,
        query: &CancellationQuery,
    ) -> Result<Page<OrderCancellation>> {
        let mut cancellations: Vec<_> = self
            .working
            .cancellations
            .values()
            .filter(|c| query.status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        cancellations.sort_by(|a, b| b.cancelled_at.cmp(&a.cancelled_at));
        Ok(page(cancellations, query.offset, query.limit))
    }
}
