//! Order service: customers, orders and their lifecycle.

use std::time::Instant;

use chrono::Utc;
use common::{
    CancellationId, CancellationItem, CancellationStatus, Customer, CustomerId, MovementType,
    Order, OrderCancellation, OrderId, OrderItem, OrderStatus,
};
use serde::Serialize;
use store::{
    CancellationRepository, CustomerQuery, CustomerRepository, OrderRepository, Page,
    ProductRepository, Store, Transaction,
};

use crate::error::{DomainError, Result};
use crate::locations::{LocationMap, LocationRegistry};
use crate::transfer::{self, AdjustRequest, TransferRequest};

use super::{
    CancelOrder, ChangeStatus, CreateCustomer, CustomerDetails, OrderEditPolicy, OrderLine,
    StatusEffect, UpdateCustomer, ensure_mutable, item_deltas, plan_cancellation,
    plan_status_change,
};

/// A customer with their orders, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerWithOrders {
    #[serde(flatten)]
    pub customer: Customer,
    pub orders: Vec<Order>,
}

/// Result of cancelling an order.
#[derive(Debug, Clone, Serialize)]
pub struct CancelledOrder {
    pub order: Order,
    pub cancellation: OrderCancellation,
}

/// Service for managing customers and orders.
///
/// Every mutating method runs in one transaction: the order row is locked
/// first, inventory moves through the transfer engine, and nothing is kept
/// unless every step succeeds.
pub struct OrderService<S: Store> {
    store: S,
    registry: LocationRegistry,
    edit_policy: OrderEditPolicy,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service.
    pub fn new(store: S, registry: LocationRegistry) -> Self {
        Self {
            store,
            registry,
            edit_policy: OrderEditPolicy::default(),
        }
    }

    /// Sets how edits to an existing order are reconciled with inventory.
    pub fn with_edit_policy(mut self, edit_policy: OrderEditPolicy) -> Self {
        self.edit_policy = edit_policy;
        self
    }

    pub fn edit_policy(&self) -> OrderEditPolicy {
        self.edit_policy
    }

    /// Registers a customer, optionally placing a first order.
    #[tracing::instrument(skip(self))]
    pub async fn create_customer(&self, cmd: CreateCustomer) -> Result<CustomerWithOrders> {
        cmd.details.validate()?;
        let customer = new_customer(CustomerId::new(), cmd.details);

        let mut tx = self.store.begin().await?;
        tx.insert_customer(&customer).await?;

        let mut orders = Vec::new();
        if let Some(lines) = cmd.items.filter(|lines| !lines.is_empty()) {
            let locations = self.registry.ensure_and_resolve(&mut tx).await?;
            orders.push(place_order(&mut tx, &locations, customer.id, &lines).await?);
        }
        tx.commit().await?;

        tracing::info!(customer_id = %customer.id, orders = orders.len(), "customer created");
        Ok(CustomerWithOrders { customer, orders })
    }

    /// Places a new order for an existing customer.
    ///
    /// Ordered stock moves from Fulfillment to In Transit.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
    ) -> Result<Order> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        if tx.get_customer(customer_id).await?.is_none() {
            return Err(DomainError::not_found("Customer", customer_id));
        }
        let locations = self.registry.ensure_and_resolve(&mut tx).await?;
        let order = place_order(&mut tx, &locations, customer_id, &lines).await?;
        tx.commit().await?;

        crate::record_duration("create_order", start);
        Ok(order)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<CustomerWithOrders> {
        let mut tx = self.store.begin().await?;
        let customer = tx
            .get_customer(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer", id))?;
        let orders = tx.list_orders_for_customer(id).await?;
        Ok(CustomerWithOrders { customer, orders })
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        tx.get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", id))
    }

    /// Lists customers, newest first.
    pub async fn list_customers(&self, query: CustomerQuery) -> Result<Page<Customer>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_customers(&query).await?)
    }

    /// Updates a customer and, with items, edits their latest order.
    ///
    /// The edit is ignored when the customer has no order. A delivered latest
    /// order is immutable, which is reported ahead of any validation error; a
    /// cancelled one cannot be edited.
    #[tracing::instrument(skip(self))]
    pub async fn update_customer(&self, cmd: UpdateCustomer) -> Result<CustomerWithOrders> {
        let customer_id = cmd.customer_id;

        let mut tx = self.store.begin().await?;
        let existing = tx
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer", customer_id))?;

        let edit = match cmd.items.filter(|lines| !lines.is_empty()) {
            Some(lines) => tx
                .latest_order_for_customer(customer_id)
                .await?
                .map(|order| (order, lines)),
            None => None,
        };
        if let Some((order, _)) = &edit {
            ensure_mutable(order)?;
        }
        cmd.details.validate()?;

        if let Some((order, lines)) = edit {
            self.edit_order(&mut tx, order, &lines).await?;
        }

        let mut customer = new_customer(customer_id, cmd.details);
        customer.created_at = existing.created_at;
        tx.update_customer(&customer).await?;

        let orders = tx.list_orders_for_customer(customer_id).await?;
        tx.commit().await?;
        Ok(CustomerWithOrders { customer, orders })
    }

    /// Deletes a customer with their orders and cancellation records.
    ///
    /// Refused if any of the customer's orders has been delivered. Inventory
    /// is not moved.
    #[tracing::instrument(skip(self))]
    pub async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if tx.get_customer(id).await?.is_none() {
            return Err(DomainError::not_found("Customer", id));
        }

        let orders = tx.list_orders_for_customer(id).await?;
        for order in &orders {
            ensure_mutable(order)?;
        }
        for order in &orders {
            if let Some(record) = tx.get_cancellation_by_order(order.id).await? {
                tx.delete_cancellation(record.id).await?;
            }
        }
        tx.delete_orders_for_customer(id).await?;
        tx.delete_customer(id).await?;
        tx.commit().await?;

        tracing::info!(customer_id = %id, orders = orders.len(), "customer deleted");
        Ok(())
    }

    /// Moves an order to a new status.
    ///
    /// Delivery sells the order's items out of In Transit. Moving to
    /// cancelled is refused; use [`OrderService::cancel_order`].
    #[tracing::instrument(skip(self))]
    pub async fn change_status(&self, cmd: ChangeStatus) -> Result<Order> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .get_order_for_update(cmd.order_id)
            .await?
            .filter(|order| order.customer_id == cmd.customer_id)
            .ok_or_else(|| DomainError::not_found("Order", cmd.order_id))?;

        let has_cancellation = order.status == OrderStatus::Cancelled
            && tx.get_cancellation_by_order(order.id).await?.is_some();
        match plan_status_change(&order, cmd.status, has_cancellation)? {
            StatusEffect::Unchanged => return Ok(order),
            StatusEffect::Relabel => {}
            StatusEffect::Deliver => {
                let locations = self.registry.resolve(&mut tx).await?;
                let note = format!("Order {} delivered", order.id);
                for item in &order.items {
                    let req = AdjustRequest::new(
                        item.product_id,
                        locations.in_transit,
                        MovementType::Sale,
                        i64::from(item.quantity),
                    )
                    .notes(note.clone())
                    .order(order.id);
                    transfer::adjust(&mut tx, &req).await?;
                }
            }
        }

        let from = order.status;
        order.status = cmd.status;
        tx.update_order(&order).await?;
        tx.commit().await?;

        metrics::counter!("order_status_changes_total", "to" => cmd.status.as_str()).increment(1);
        crate::record_duration("change_status", start);
        tracing::info!(order_id = %order.id, %from, to = %order.status, "order status changed");
        Ok(order)
    }

    /// Cancels an order and writes its cancellation record.
    ///
    /// Items return from In Transit to Fulfillment unless `hold_return` is
    /// set, in which case they stay in transit until the record is marked
    /// returned.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<CancelledOrder> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .get_order_for_update(cmd.order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", cmd.order_id))?;

        plan_cancellation(&order)?;
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("Cancellation reason is required"));
        }
        if tx.get_cancellation_by_order(order.id).await?.is_some() {
            return Err(DomainError::validation(
                "Order already has a cancellation record",
            ));
        }
        let customer = tx
            .get_customer(order.customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer", order.customer_id))?;

        if !cmd.hold_return {
            let locations = self.registry.resolve(&mut tx).await?;
            let note = format!("Order {} cancelled - auto returned to fulfillment", order.id);
            for item in &order.items {
                let req = TransferRequest::new(
                    item.product_id,
                    locations.in_transit,
                    locations.fulfillment,
                    i64::from(item.quantity),
                )
                .notes(note.clone())
                .order(order.id);
                transfer::transfer(&mut tx, &req).await?;
            }
        }

        order.status = OrderStatus::Cancelled;
        order.cancellation_reason = Some(reason.to_string());
        order.cancellation_notes = cmd.notes.clone();
        order.hold_return = cmd.hold_return;
        tx.update_order(&order).await?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product = tx
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Product", item.product_id))?;
            items.push(CancellationItem {
                product_id: product.id,
                product_name: product.name,
                product_code: product.code,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        let cancellation = OrderCancellation {
            id: CancellationId::new(),
            order_id: order.id,
            customer_id: customer.id,
            customer_name: customer.name,
            cancellation_reason: reason.to_string(),
            cancellation_notes: cmd.notes,
            status: CancellationStatus::Cancelled,
            cancelled_at: Utc::now(),
            returned_at: None,
            items,
        };
        tx.insert_cancellation(&cancellation).await.map_err(|e| {
            DomainError::on_duplicate(e, "Order already has a cancellation record")
        })?;
        tx.commit().await?;

        metrics::counter!("cancellations_total").increment(1);
        crate::record_duration("cancel_order", start);
        tracing::info!(
            order_id = %order.id,
            cancellation_id = %cancellation.id,
            hold_return = order.hold_return,
            "order cancelled"
        );
        Ok(CancelledOrder {
            order,
            cancellation,
        })
    }

    /// Replaces the lines of `order`, moving stock for the difference.
    async fn edit_order(
        &self,
        tx: &mut S::Tx,
        mut order: Order,
        lines: &[OrderLine],
    ) -> Result<()> {
        ensure_mutable(&order)?;
        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::validation("Cannot edit a cancelled order"));
        }

        let items = price_lines(tx, lines).await?;
        let deltas = item_deltas(&order.items, &items);

        if !deltas.is_empty() {
            let locations = self.registry.resolve(tx).await?;
            for (product_id, delta) in deltas {
                let req = if delta > 0 {
                    TransferRequest::new(
                        product_id,
                        locations.fulfillment,
                        locations.in_transit,
                        delta,
                    )
                    .notes(format!(
                        "Order {} updated - additional items moved to transit",
                        order.id
                    ))
                } else if self.edit_policy == OrderEditPolicy::Reconcile {
                    TransferRequest::new(
                        product_id,
                        locations.in_transit,
                        locations.fulfillment,
                        -delta,
                    )
                    .notes(format!(
                        "Order {} updated - removed items returned to fulfillment",
                        order.id
                    ))
                } else {
                    continue;
                };
                transfer::transfer(tx, &req.order(order.id)).await?;
            }
        }

        tx.replace_order_items(order.id, &items).await?;
        order.total_amount = Order::total_for(&items);
        order.items = items;
        tx.update_order(&order).await?;

        tracing::info!(order_id = %order.id, policy = %self.edit_policy, "order items updated");
        Ok(())
    }
}

fn new_customer(id: CustomerId, details: CustomerDetails) -> Customer {
    Customer {
        id,
        name: details.name.trim().to_string(),
        phone: details.phone.trim().to_string(),
        location: details.location.trim().to_string(),
        preferred_delivery_time: details.preferred_delivery_time.filter(|s| !s.trim().is_empty()),
        notes: details.notes.filter(|s| !s.trim().is_empty()),
        created_at: Utc::now(),
    }
}

/// Validates requested lines and snapshots their unit prices.
async fn price_lines<T: ProductRepository>(
    tx: &mut T,
    lines: &[OrderLine],
) -> Result<Vec<OrderItem>> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "Order must contain at least one item",
        ));
    }

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(DomainError::validation(
                "Item quantity must be greater than zero",
            ));
        }
        if i32::try_from(line.quantity).is_err() {
            return Err(DomainError::validation(format!(
                "Item quantity cannot exceed {}",
                i32::MAX
            )));
        }
        let product = tx
            .get_product(line.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", line.product_id))?;
        let unit_price = line.unit_price.unwrap_or(product.price);
        if unit_price.is_negative() {
            return Err(DomainError::validation("Unit price cannot be negative"));
        }
        items.push(OrderItem::new(product.id, line.quantity, unit_price));
    }
    Ok(items)
}

/// Inserts a pending order and moves its items into transit.
async fn place_order<T: Transaction>(
    tx: &mut T,
    locations: &LocationMap,
    customer_id: CustomerId,
    lines: &[OrderLine],
) -> Result<Order> {
    let items = price_lines(tx, lines).await?;
    let order = Order {
        id: OrderId::new(),
        customer_id,
        order_date: Utc::now(),
        status: OrderStatus::Pending,
        total_amount: Order::total_for(&items),
        cancellation_reason: None,
        cancellation_notes: None,
        hold_return: false,
        items,
    };
    tx.insert_order(&order).await?;

    let note = format!("Order {} created - auto moved to transit", order.id);
    for item in &order.items {
        let req = TransferRequest::new(
            item.product_id,
            locations.fulfillment,
            locations.in_transit,
            i64::from(item.quantity),
        )
        .notes(note.clone())
        .order(order.id);
        transfer::transfer(tx, &req).await?;
    }

    metrics::counter!("orders_created_total").increment(1);
    tracing::info!(
        order_id = %order.id,
        %customer_id,
        total = %order.total_amount,
        "order created"
    );
    Ok(order)
}

#[cfg(test)]
mod tests {
    use common::{Money, Product, ProductId};
    use store::InMemoryStore;

    use super::*;
    use crate::ledger;

    struct Fixture {
        store: InMemoryStore,
        service: OrderService<InMemoryStore>,
        registry: LocationRegistry,
        product: Product,
    }

    impl Fixture {
        async fn new(policy: OrderEditPolicy) -> Self {
            let store = InMemoryStore::new();
            let registry = LocationRegistry::new();
            let product = Product {
                id: ProductId::new(),
                name: "Widget".to_string(),
                code: "W-1".to_string(),
                price: Money::from_cents(500),
                description: None,
            };

            let mut tx = store.begin().await.unwrap();
            tx.insert_product(&product).await.unwrap();
            let locations = registry.ensure_and_resolve(&mut tx).await.unwrap();
            let req = AdjustRequest::new(
                product.id,
                locations.fulfillment,
                MovementType::Production,
                10,
            );
            transfer::adjust(&mut tx, &req).await.unwrap();
            tx.commit().await.unwrap();

            let service =
                OrderService::new(store.clone(), registry.clone()).with_edit_policy(policy);
            Self {
                store,
                service,
                registry,
                product,
            }
        }

        /// Returns (fulfillment, in transit) quantities of the product.
        async fn stock(&self) -> (i64, i64) {
            let mut tx = self.store.begin().await.unwrap();
            let locations = self.registry.resolve(&mut tx).await.unwrap();
            let product_id = self.product.id;
            (
                ledger::get_quantity(&mut tx, product_id, locations.fulfillment)
                    .await
                    .unwrap(),
                ledger::get_quantity(&mut tx, product_id, locations.in_transit)
                    .await
                    .unwrap(),
            )
        }

        async fn customer_with_order(&self, quantity: u32) -> (CustomerId, Order) {
            let created = self
                .service
                .create_customer(CreateCustomer::with_order(
                    CustomerDetails::new("Ana", "555-0100", "North"),
                    vec![OrderLine::new(self.product.id, quantity)],
                ))
                .await
                .unwrap();
            (created.customer.id, created.orders[0].clone())
        }
    }

    fn details() -> CustomerDetails {
        CustomerDetails::new("Ana", "555-0100", "North")
    }

    #[tokio::test]
    async fn new_order_moves_stock_into_transit() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (_, order) = fx.customer_with_order(4).await;

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Money::from_cents(2000));
        assert_eq!(order.items[0].unit_price, Money::from_cents(500));
        assert_eq!(fx.stock().await, (6, 4));
    }

    #[tokio::test]
    async fn order_beyond_fulfillment_stock_is_rejected_whole() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let err = fx
            .service
            .create_customer(CreateCustomer::with_order(
                details(),
                vec![OrderLine::new(fx.product.id, 11)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 10,
                required: 11,
                ..
            }
        ));
        assert_eq!(fx.stock().await, (10, 0));
        let page = fx.service.list_customers(CustomerQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn customer_fields_are_required() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let err = fx
            .service
            .create_customer(CreateCustomer::new(CustomerDetails::new("Ana", " ", "North")))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn increase_only_keeps_removed_items_in_transit() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (customer_id, _) = fx.customer_with_order(4).await;

        fx.service
            .update_customer(
                UpdateCustomer::new(customer_id, details())
                    .items(vec![OrderLine::new(fx.product.id, 6)]),
            )
            .await
            .unwrap();
        assert_eq!(fx.stock().await, (4, 6));

        let updated = fx
            .service
            .update_customer(
                UpdateCustomer::new(customer_id, details())
                    .items(vec![OrderLine::new(fx.product.id, 2)]),
            )
            .await
            .unwrap();
        assert_eq!(fx.stock().await, (4, 6));
        assert_eq!(updated.orders[0].items[0].quantity, 2);
        assert_eq!(updated.orders[0].total_amount, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn reconcile_returns_removed_items() {
        let fx = Fixture::new(OrderEditPolicy::Reconcile).await;
        let (customer_id, _) = fx.customer_with_order(4).await;

        fx.service
            .update_customer(
                UpdateCustomer::new(customer_id, details())
                    .items(vec![OrderLine::new(fx.product.id, 1)]),
            )
            .await
            .unwrap();
        assert_eq!(fx.stock().await, (9, 1));
    }

    #[tokio::test]
    async fn items_edit_without_orders_is_ignored() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let created = fx
            .service
            .create_customer(CreateCustomer::new(details()))
            .await
            .unwrap();

        let updated = fx
            .service
            .update_customer(
                UpdateCustomer::new(created.customer.id, details().notes("gate code 12"))
                    .items(vec![OrderLine::new(fx.product.id, 3)]),
            )
            .await
            .unwrap();
        assert!(updated.orders.is_empty());
        assert_eq!(updated.customer.notes.as_deref(), Some("gate code 12"));
        assert_eq!(fx.stock().await, (10, 0));
    }

    #[tokio::test]
    async fn delivery_sells_from_transit_and_freezes_the_order() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (customer_id, order) = fx.customer_with_order(3).await;

        let delivered = fx
            .service
            .change_status(ChangeStatus::new(customer_id, order.id, OrderStatus::Delivered))
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(fx.stock().await, (7, 0));

        let movements = fx.store.movement_count().await;
        let err = fx
            .service
            .change_status(ChangeStatus::new(customer_id, order.id, OrderStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ImmutableOrder { .. }));
        let err = fx
            .service
            .cancel_order(CancelOrder::new(order.id, "late"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ImmutableOrder { .. }));
        let err = fx.service.delete_customer(customer_id).await.unwrap_err();
        assert!(matches!(err, DomainError::ImmutableOrder { order_id } if order_id == order.id));
        assert_eq!(fx.store.movement_count().await, movements);
    }

    #[tokio::test]
    async fn delivered_edit_is_reported_before_invalid_details() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (customer_id, order) = fx.customer_with_order(3).await;
        fx.service
            .change_status(ChangeStatus::new(customer_id, order.id, OrderStatus::Delivered))
            .await
            .unwrap();

        let err = fx
            .service
            .update_customer(
                UpdateCustomer::new(customer_id, CustomerDetails::new(" ", "555-0100", "North"))
                    .items(vec![OrderLine::new(fx.product.id, 5)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ImmutableOrder { order_id } if order_id == order.id));

        let err = fx
            .service
            .update_customer(UpdateCustomer::new(
                customer_id,
                CustomerDetails::new(" ", "555-0100", "North"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn line_quantity_must_fit_the_item_column() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let err = fx
            .service
            .create_customer(CreateCustomer::with_order(
                details(),
                vec![OrderLine::new(fx.product.id, u32::MAX)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(fx.stock().await, (10, 0));
    }

    #[tokio::test]
    async fn status_change_checks_the_owning_customer() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (_, order) = fx.customer_with_order(1).await;

        let err = fx
            .service
            .change_status(ChangeStatus::new(CustomerId::new(), order.id, OrderStatus::OnHold))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cancel_returns_stock_and_writes_a_record() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (_, order) = fx.customer_with_order(4).await;

        let cancelled = fx
            .service
            .cancel_order(CancelOrder::new(order.id, "customer changed mind").notes("call back"))
            .await
            .unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation.status, CancellationStatus::Cancelled);
        assert_eq!(cancelled.cancellation.customer_name, "Ana");
        assert_eq!(cancelled.cancellation.items[0].product_code, "W-1");
        assert_eq!(fx.stock().await, (10, 0));

        let err = fx
            .service
            .cancel_order(CancelOrder::new(order.id, "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn held_cancellation_leaves_stock_in_transit() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (_, order) = fx.customer_with_order(4).await;

        let cancelled = fx
            .service
            .cancel_order(CancelOrder::new(order.id, "damaged").hold_return(true))
            .await
            .unwrap();
        assert!(cancelled.order.hold_return);
        assert_eq!(fx.stock().await, (6, 4));
    }

    #[tokio::test]
    async fn cancel_requires_a_reason() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (_, order) = fx.customer_with_order(1).await;

        let err = fx
            .service
            .cancel_order(CancelOrder::new(order.id, "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(fx.stock().await, (9, 1));
    }

    #[tokio::test]
    async fn delete_customer_removes_orders_and_records() {
        let fx = Fixture::new(OrderEditPolicy::IncreaseOnly).await;
        let (customer_id, order) = fx.customer_with_order(2).await;
        fx.service
            .cancel_order(CancelOrder::new(order.id, "moved away"))
            .await
            .unwrap();

        fx.service.delete_customer(customer_id).await.unwrap();
        assert!(matches!(
            fx.service.get_customer(customer_id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            fx.service.get_order(order.id).await,
            Err(DomainError::NotFound { .. })
        ));
        let mut tx = fx.store.begin().await.unwrap();
        assert!(tx.get_cancellation_by_order(order.id).await.unwrap().is_none());
    }
}
