//! Integration tests for the order lifecycle against the in-memory store.
//!
//! These tests drive the public services end to end and check the ledger,
//! the movement log and the cancellation records after each step.

use std::sync::Arc;

use common::{
    CancellationStatus, LocationId, Money, MovementType, OrderStatus, Product, ProductId,
};
use domain::{
    CancelOrder, CancellationService, CatalogService, ChangeStatus, CreateCustomer,
    CustomerDetails, DomainError, InventoryService, LocationMap, LocationRegistry,
    OrderEditPolicy, OrderLine, OrderService, ProductDraft, StockMovementRequest, UpdateCustomer,
};
use store::{InMemoryStore, Store};

struct Engine {
    store: InMemoryStore,
    catalog: CatalogService<InMemoryStore>,
    inventory: InventoryService<InMemoryStore>,
    orders: OrderService<InMemoryStore>,
    cancellations: CancellationService<InMemoryStore>,
    locations: LocationMap,
}

impl Engine {
    async fn new(policy: OrderEditPolicy) -> Self {
        let store = InMemoryStore::new();
        let registry = LocationRegistry::new();
        let inventory = InventoryService::new(store.clone(), registry.clone());
        inventory.seed_locations().await.unwrap();

        let locations = {
            let mut tx = store.begin().await.unwrap();
            registry.resolve(&mut tx).await.unwrap()
        };

        Self {
            catalog: CatalogService::new(store.clone(), registry.clone()),
            orders: OrderService::new(store.clone(), registry.clone()).with_edit_policy(policy),
            cancellations: CancellationService::new(store.clone(), registry),
            inventory,
            store,
            locations,
        }
    }

    /// Creates a product and produces `quantity` units into Fulfillment.
    async fn product_in_fulfillment(&self, code: &str, quantity: i64) -> Product {
        let product = self
            .catalog
            .create_product(ProductDraft::new("Widget", code, Money::from_cents(1250)))
            .await
            .unwrap();
        self.inventory
            .record_movement(StockMovementRequest {
                product_id: product.id,
                movement_type: MovementType::Production,
                quantity,
                location_id: Some(self.locations.fulfillment),
                from_location: None,
                to_location: None,
                notes: Some("initial stock".to_string()),
                stock_date: None,
            })
            .await
            .unwrap();
        product
    }

    async fn qty(&self, product_id: ProductId, location_id: LocationId) -> i64 {
        self.inventory.quantity(product_id, location_id).await.unwrap()
    }

    /// Returns (production, fulfillment, in transit).
    async fn stock(&self, product_id: ProductId) -> (i64, i64, i64) {
        (
            self.qty(product_id, self.locations.production).await,
            self.qty(product_id, self.locations.fulfillment).await,
            self.qty(product_id, self.locations.in_transit).await,
        )
    }

    async fn movements_of(&self, product_id: ProductId, kind: MovementType) -> Vec<i64> {
        self.inventory
            .history(product_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|view| view.movement.movement_type == kind)
            .map(|view| view.movement.quantity)
            .collect()
    }

    async fn place(&self, product_id: ProductId, quantity: u32) -> domain::CustomerWithOrders {
        self.orders
            .create_customer(CreateCustomer::with_order(
                CustomerDetails::new("Carla", "555-0142", "Downtown"),
                vec![OrderLine::new(product_id, quantity)],
            ))
            .await
            .unwrap()
    }

    async fn assert_non_negative(&self) {
        for row in self.store.inventory_rows().await {
            assert!(row.quantity >= 0, "negative ledger row: {row:?}");
        }
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn order_moves_stock_into_transit() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("P-A", 10).await;

        engine.place(product.id, 3).await;

        assert_eq!(engine.stock(product.id).await, (0, 7, 3));
        assert_eq!(
            engine.movements_of(product.id, MovementType::Transfer).await,
            vec![3]
        );
    }

    #[tokio::test]
    async fn delivery_sells_out_of_transit() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("P-B", 10).await;
        let placed = engine.place(product.id, 3).await;

        engine
            .orders
            .change_status(ChangeStatus::new(
                placed.customer.id,
                placed.orders[0].id,
                OrderStatus::Delivered,
            ))
            .await
            .unwrap();

        assert_eq!(engine.stock(product.id).await, (0, 7, 0));
        assert_eq!(
            engine.movements_of(product.id, MovementType::Sale).await,
            vec![-3]
        );
    }

    #[tokio::test]
    async fn cancellation_returns_stock_to_fulfillment() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("P-C", 10).await;
        let placed = engine.place(product.id, 3).await;

        let cancelled = engine
            .orders
            .cancel_order(CancelOrder::new(placed.orders[0].id, "wrong address"))
            .await
            .unwrap();

        assert_eq!(engine.stock(product.id).await, (0, 10, 0));
        assert_eq!(
            engine.movements_of(product.id, MovementType::Transfer).await,
            vec![3, 3]
        );
        let history = engine.inventory.history(product.id).await.unwrap();
        assert_eq!(
            history[0].movement.from_location,
            Some(engine.locations.in_transit)
        );
        assert_eq!(
            history[0].movement.to_location,
            Some(engine.locations.fulfillment)
        );
        assert_eq!(cancelled.cancellation.status, CancellationStatus::Cancelled);
    }

    #[tokio::test]
    async fn held_cancellation_keeps_stock_in_transit() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("P-D", 10).await;
        let placed = engine.place(product.id, 3).await;

        let cancelled = engine
            .orders
            .cancel_order(CancelOrder::new(placed.orders[0].id, "damaged box").hold_return(true))
            .await
            .unwrap();

        assert_eq!(engine.stock(product.id).await, (0, 7, 3));
        assert_eq!(
            engine.movements_of(product.id, MovementType::Transfer).await,
            vec![3]
        );
        assert_eq!(cancelled.cancellation.status, CancellationStatus::Cancelled);
    }

    #[tokio::test]
    async fn short_transfer_fails_without_writes() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("P-E", 2).await;
        let movements = engine.store.movement_count().await;

        let err = engine
            .inventory
            .record_movement(StockMovementRequest {
                product_id: product.id,
                movement_type: MovementType::Transfer,
                quantity: 5,
                location_id: None,
                from_location: Some(engine.locations.fulfillment),
                to_location: Some(engine.locations.in_transit),
                notes: None,
                stock_date: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 2,
                required: 5,
                ..
            }
        ));
        assert_eq!(engine.stock(product.id).await, (0, 2, 0));
        assert_eq!(engine.store.movement_count().await, movements);
    }
}

mod invariants {
    use super::*;

    #[tokio::test]
    async fn production_beyond_the_counter_range_is_rejected() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("MAX-1", i64::MAX).await;
        let movements = engine.store.movement_count().await;

        let err = engine
            .inventory
            .record_movement(StockMovementRequest {
                product_id: product.id,
                movement_type: MovementType::Production,
                quantity: i64::MAX,
                location_id: Some(engine.locations.fulfillment),
                from_location: None,
                to_location: None,
                notes: None,
                stock_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(engine.stock(product.id).await, (0, i64::MAX, 0));
        assert_eq!(engine.store.movement_count().await, movements);
    }

    #[tokio::test]
    async fn only_production_and_sales_change_totals() {
        let engine = Engine::new(OrderEditPolicy::Reconcile).await;
        let product = engine.product_in_fulfillment("INV-1", 20).await;
        let total = |s: (i64, i64, i64)| s.0 + s.1 + s.2;

        let first = engine.place(product.id, 5).await;
        let second = engine.place(product.id, 4).await;
        assert_eq!(total(engine.stock(product.id).await), 20);

        engine
            .orders
            .update_customer(
                UpdateCustomer::new(
                    second.customer.id,
                    CustomerDetails::new("Carla", "555-0142", "Downtown"),
                )
                .items(vec![OrderLine::new(product.id, 1)]),
            )
            .await
            .unwrap();
        engine
            .orders
            .cancel_order(CancelOrder::new(second.orders[0].id, "duplicate"))
            .await
            .unwrap();
        assert_eq!(total(engine.stock(product.id).await), 20);

        engine
            .orders
            .change_status(ChangeStatus::new(
                first.customer.id,
                first.orders[0].id,
                OrderStatus::Delivered,
            ))
            .await
            .unwrap();
        assert_eq!(total(engine.stock(product.id).await), 15);
        engine.assert_non_negative().await;

        let history = engine.inventory.history(product.id).await.unwrap();
        let net: i64 = history
            .iter()
            .filter(|view| view.movement.movement_type != MovementType::Transfer)
            .map(|view| view.movement.quantity)
            .sum();
        assert_eq!(net, 15);
    }

    #[tokio::test]
    async fn seeding_twice_keeps_three_locations() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let first = engine.inventory.seed_locations().await.unwrap();
        let second = engine.inventory.seed_locations().await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert!(second.iter().all(|l| l.is_active));
    }

    #[tokio::test]
    async fn delivered_orders_reject_every_mutation_without_writes() {
        let engine = Engine::new(OrderEditPolicy::Reconcile).await;
        let product = engine.product_in_fulfillment("IMM-1", 10).await;
        let placed = engine.place(product.id, 2).await;
        let (customer_id, order_id) = (placed.customer.id, placed.orders[0].id);

        engine
            .orders
            .change_status(ChangeStatus::new(customer_id, order_id, OrderStatus::Delivered))
            .await
            .unwrap();
        let movements = engine.store.movement_count().await;
        let stock = engine.stock(product.id).await;

        let immutable = |result: Result<_, DomainError>| {
            matches!(result, Err(DomainError::ImmutableOrder { .. }))
        };
        assert!(immutable(
            engine
                .orders
                .change_status(ChangeStatus::new(customer_id, order_id, OrderStatus::OnHold))
                .await
                .map(|_| ())
        ));
        assert!(immutable(
            engine
                .orders
                .update_customer(
                    UpdateCustomer::new(
                        customer_id,
                        CustomerDetails::new("Carla", "555-0142", "Uptown"),
                    )
                    .items(vec![OrderLine::new(product.id, 5)]),
                )
                .await
                .map(|_| ())
        ));
        assert!(immutable(
            engine
                .orders
                .cancel_order(CancelOrder::new(order_id, "too late"))
                .await
                .map(|_| ())
        ));
        assert!(immutable(engine.orders.delete_customer(customer_id).await));

        assert_eq!(engine.store.movement_count().await, movements);
        assert_eq!(engine.stock(product.id).await, stock);
        let customer = engine.orders.get_customer(customer_id).await.unwrap();
        assert_eq!(customer.customer.location, "Downtown");
    }
}

mod cancellations {
    use super::*;

    #[tokio::test]
    async fn held_return_restocks_production_once() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("RET-1", 10).await;
        let placed = engine.place(product.id, 3).await;
        let cancelled = engine
            .orders
            .cancel_order(CancelOrder::new(placed.orders[0].id, "refused").hold_return(true))
            .await
            .unwrap();
        let id = cancelled.cancellation.id;

        engine
            .cancellations
            .advance_status(id, CancellationStatus::Returned)
            .await
            .unwrap();
        assert_eq!(engine.stock(product.id).await, (3, 7, 0));

        assert!(
            engine
                .cancellations
                .advance_status(id, CancellationStatus::Returned)
                .await
                .is_err()
        );
        assert_eq!(engine.stock(product.id).await, (3, 7, 0));
    }

    #[tokio::test]
    async fn revived_order_cannot_return_stock_twice() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("RET-2", 10).await;
        let first = engine.place(product.id, 3).await;
        let second = engine.place(product.id, 3).await;
        let order_id = first.orders[0].id;
        let cancelled = engine
            .orders
            .cancel_order(CancelOrder::new(order_id, "refused").hold_return(true))
            .await
            .unwrap();

        let revive = ChangeStatus::new(first.customer.id, order_id, OrderStatus::Pending);
        let err = engine.orders.change_status(revive.clone()).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        engine.cancellations.uncancel(order_id).await.unwrap();
        engine.orders.change_status(revive).await.unwrap();
        engine
            .orders
            .change_status(ChangeStatus::new(
                first.customer.id,
                order_id,
                OrderStatus::Delivered,
            ))
            .await
            .unwrap();

        let err = engine
            .cancellations
            .advance_status(cancelled.cancellation.id, CancellationStatus::Returned)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(engine.stock(product.id).await, (0, 4, 3));

        engine
            .orders
            .change_status(ChangeStatus::new(
                second.customer.id,
                second.orders[0].id,
                OrderStatus::Delivered,
            ))
            .await
            .unwrap();
        assert_eq!(engine.stock(product.id).await, (0, 4, 0));
    }

    #[tokio::test]
    async fn uncancel_leaves_inventory_alone() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("UNC-1", 10).await;
        let placed = engine.place(product.id, 3).await;
        let order_id = placed.orders[0].id;
        engine
            .orders
            .cancel_order(CancelOrder::new(order_id, "mistake"))
            .await
            .unwrap();
        let movements = engine.store.movement_count().await;

        engine.cancellations.uncancel(order_id).await.unwrap();

        assert_eq!(engine.stock(product.id).await, (0, 10, 0));
        assert_eq!(engine.store.movement_count().await, movements);
        let order = engine.orders.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }
}

mod edits {
    use super::*;

    async fn edit_down(policy: OrderEditPolicy) -> (i64, i64, i64) {
        let engine = Engine::new(policy).await;
        let product = engine.product_in_fulfillment("EDIT-1", 10).await;
        let placed = engine.place(product.id, 6).await;

        engine
            .orders
            .update_customer(
                UpdateCustomer::new(
                    placed.customer.id,
                    CustomerDetails::new("Carla", "555-0142", "Downtown"),
                )
                .items(vec![OrderLine::new(product.id, 2)]),
            )
            .await
            .unwrap();
        engine.stock(product.id).await
    }

    #[tokio::test]
    async fn increase_only_never_returns_stock() {
        assert_eq!(edit_down(OrderEditPolicy::IncreaseOnly).await, (0, 4, 6));
    }

    #[tokio::test]
    async fn reconcile_returns_the_difference() {
        assert_eq!(edit_down(OrderEditPolicy::Reconcile).await, (0, 8, 2));
    }

    #[tokio::test]
    async fn increase_beyond_stock_rolls_back_the_edit() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("EDIT-2", 5).await;
        let placed = engine.place(product.id, 4).await;

        let err = engine
            .orders
            .update_customer(
                UpdateCustomer::new(
                    placed.customer.id,
                    CustomerDetails::new("Carla", "555-0142", "Elsewhere"),
                )
                .items(vec![OrderLine::new(product.id, 9)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));

        assert_eq!(engine.stock(product.id).await, (0, 1, 4));
        let customer = engine.orders.get_customer(placed.customer.id).await.unwrap();
        assert_eq!(customer.customer.location, "Downtown");
        assert_eq!(customer.orders[0].items[0].quantity, 4);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_cannot_oversell() {
        let engine = Engine::new(OrderEditPolicy::default()).await;
        let product = engine.product_in_fulfillment("RACE-1", 10).await;
        let orders = Arc::new(engine.orders);

        let mut handles = Vec::new();
        for i in 0..8 {
            let orders = Arc::clone(&orders);
            let product_id = product.id;
            handles.push(tokio::spawn(async move {
                orders
                    .create_customer(CreateCustomer::with_order(
                        CustomerDetails::new(format!("Racer {i}"), "555-0000", "Track"),
                        vec![OrderLine::new(product_id, 3)],
                    ))
                    .await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(DomainError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(placed, 3);
        let fulfillment = engine
            .inventory
            .quantity(product.id, engine.locations.fulfillment)
            .await
            .unwrap();
        let in_transit = engine
            .inventory
            .quantity(product.id, engine.locations.in_transit)
            .await
            .unwrap();
        assert_eq!((fulfillment, in_transit), (1, 9));
    }
}
