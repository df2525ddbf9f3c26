//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{
    CancellationId, CancellationItem, CancellationStatus, Customer, CustomerId, Location,
    LocationId, Money, MovementId, MovementType, Order, OrderCancellation, OrderId, OrderItem,
    OrderStatus, Product, ProductId, StockMovement,
};
use sqlx::PgPool;
use store::{
    CancellationQuery, CancellationRepository, CustomerQuery, CustomerRepository,
    InventoryRepository, LocationRepository, MovementRepository, OrderRepository, PostgresStore,
    ProductRepository, Store, StoreError, Transaction,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE order_cancellation_items, order_cancellations, stock_movements, \
         order_items, orders, customers, inventory_items, products, inventory_locations",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn location(name: &str) -> Location {
    Location {
        id: LocationId::new(),
        name: name.to_string(),
        description: None,
        is_active: true,
    }
}

fn product(code: &str) -> Product {
    Product {
        id: ProductId::new(),
        name: format!("Product {code}"),
        code: code.to_string(),
        price: Money::from_cents(1250),
        description: Some("test".to_string()),
    }
}

fn customer(name: &str, phone: &str) -> Customer {
    Customer {
        id: CustomerId::new(),
        name: name.to_string(),
        phone: phone.to_string(),
        location: "Downtown".to_string(),
        preferred_delivery_time: None,
        notes: None,
        created_at: Utc::now(),
    }
}

fn order(customer_id: CustomerId, items: Vec<OrderItem>) -> Order {
    Order {
        id: OrderId::new(),
        customer_id,
        order_date: Utc::now(),
        status: OrderStatus::Pending,
        total_amount: Order::total_for(&items),
        cancellation_reason: None,
        cancellation_notes: None,
        hold_return: false,
        items,
    }
}

#[tokio::test]
async fn ledger_round_trip_and_guarded_decrement() {
    let store = get_test_store().await;
    let loc = location("Production");
    let prod = product("P-1");

    let mut tx = store.begin().await.unwrap();
    tx.insert_location(&loc).await.unwrap();
    tx.insert_product(&prod).await.unwrap();
    assert_eq!(tx.increment_inventory(prod.id, loc.id, 10).await.unwrap(), 10);
    assert_eq!(tx.increment_inventory(prod.id, loc.id, 5).await.unwrap(), 15);
    assert_eq!(tx.decrement_inventory(prod.id, loc.id, 15).await.unwrap(), 0);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.lock_inventory(prod.id, loc.id).await.unwrap(), Some(0));
    let result = tx.decrement_inventory(prod.id, loc.id, 1).await;
    assert!(matches!(result, Err(StoreError::StockGuard { .. })));
}

#[tokio::test]
async fn rollback_on_drop() {
    let store = get_test_store().await;
    let loc = location("Production");

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_location(&loc).await.unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_location(loc.id).await.unwrap().is_none());
}

#[tokio::test]
async fn unique_constraints_are_mapped() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();

    tx.insert_product(&product("DUP")).await.unwrap();
    let result = tx.insert_product(&product("DUP")).await;
    assert!(matches!(
        result,
        Err(StoreError::UniqueViolation { constraint }) if constraint == "unique_product_code"
    ));
}

#[tokio::test]
async fn insert_location_if_absent_keeps_existing_row() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();

    let mut original = location("Fulfillment");
    original.description = Some("custom".to_string());
    assert!(tx.insert_location_if_absent(&original).await.unwrap());
    assert!(
        !tx.insert_location_if_absent(&location("Fulfillment"))
            .await
            .unwrap()
    );

    let found = tx
        .find_location_by_name("Fulfillment")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, original.id);
    assert_eq!(found.description.as_deref(), Some("custom"));
}

#[tokio::test]
async fn orders_keep_their_lines() {
    let store = get_test_store().await;
    let prod = product("P-1");
    let cust = customer("Alice", "555-0100");
    let items = vec![
        OrderItem::new(prod.id, 2, prod.price),
        OrderItem::new(prod.id, 1, Money::from_cents(999)),
    ];
    let ord = order(cust.id, items.clone());

    let mut tx = store.begin().await.unwrap();
    tx.insert_product(&prod).await.unwrap();
    tx.insert_customer(&cust).await.unwrap();
    tx.insert_order(&ord).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.get_order_for_update(ord.id).await.unwrap().unwrap();
    assert_eq!(loaded.items, items);
    assert_eq!(loaded.total_amount, Money::from_cents(3499));
    assert_eq!(tx.count_order_items_for_product(prod.id).await.unwrap(), 2);

    let latest = tx.latest_order_for_customer(cust.id).await.unwrap().unwrap();
    assert_eq!(latest.id, ord.id);

    tx.replace_order_items(ord.id, &items[..1]).await.unwrap();
    let loaded = tx.get_order(ord.id).await.unwrap().unwrap();
    assert_eq!(loaded.items.len(), 1);
}

#[tokio::test]
async fn movements_round_trip() {
    let store = get_test_store().await;
    let from = location("Fulfillment");
    let to = location("In Transit");
    let prod = product("P-1");
    let now = Utc::now();
    let movement = StockMovement {
        id: MovementId::new(),
        product_id: prod.id,
        movement_type: MovementType::Transfer,
        quantity: 3,
        location_id: None,
        from_location: Some(from.id),
        to_location: Some(to.id),
        notes: Some("moved".to_string()),
        order_id: Some(OrderId::new()),
        stock_date: now,
        created_at: now,
    };

    let mut tx = store.begin().await.unwrap();
    tx.insert_location(&from).await.unwrap();
    tx.insert_location(&to).await.unwrap();
    tx.insert_product(&prod).await.unwrap();
    tx.insert_movement(&movement).await.unwrap();

    let listed = tx.list_movements_for_product(prod.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].movement_type, MovementType::Transfer);
    assert_eq!(listed[0].from_location, Some(from.id));
    assert_eq!(listed[0].order_id, movement.order_id);
    assert!(tx.latest_movement_at(prod.id).await.unwrap().is_some());
}

#[tokio::test]
async fn customer_search_and_paging() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    tx.insert_customer(&customer("Alice", "555-0100")).await.unwrap();
    tx.insert_customer(&customer("Alicia", "555-0101")).await.unwrap();
    tx.insert_customer(&customer("Bob", "555-0102")).await.unwrap();

    let page = tx
        .list_customers(&CustomerQuery::new().search("ALI").page(1, 1))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert!(page.has_more(0));

    let page = tx
        .list_customers(&CustomerQuery::new().search("0102"))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].name, "Bob");
}

#[tokio::test]
async fn cancellation_records_round_trip() {
    let store = get_test_store().await;
    let prod = product("P-1");
    let cust = customer("Alice", "555-0100");
    let ord = order(cust.id, vec![OrderItem::new(prod.id, 2, prod.price)]);
    let record = OrderCancellation {
        id: CancellationId::new(),
        order_id: ord.id,
        customer_id: cust.id,
        customer_name: cust.name.clone(),
        cancellation_reason: "changed mind".to_string(),
        cancellation_notes: None,
        status: CancellationStatus::Cancelled,
        cancelled_at: Utc::now(),
        returned_at: None,
        items: vec![CancellationItem {
            product_id: prod.id,
            product_name: prod.name.clone(),
            product_code: prod.code.clone(),
            quantity: 2,
            unit_price: prod.price,
        }],
    };

    let mut tx = store.begin().await.unwrap();
    tx.insert_product(&prod).await.unwrap();
    tx.insert_customer(&cust).await.unwrap();
    tx.insert_order(&ord).await.unwrap();
    tx.insert_cancellation(&record).await.unwrap();

    let duplicate = OrderCancellation {
        id: CancellationId::new(),
        ..record.clone()
    };
    let result = tx.insert_cancellation(&duplicate).await;
    assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));
}

#[tokio::test]
async fn cancellation_status_filter_and_delete() {
    let store = get_test_store().await;
    let cust = customer("Alice", "555-0100");
    let ord = order(cust.id, vec![]);
    let record = OrderCancellation {
        id: CancellationId::new(),
        order_id: ord.id,
        customer_id: cust.id,
        customer_name: cust.name.clone(),
        cancellation_reason: "late".to_string(),
        cancellation_notes: Some("call first".to_string()),
        status: CancellationStatus::Cancelled,
        cancelled_at: Utc::now(),
        returned_at: None,
        items: vec![],
    };

    let mut tx = store.begin().await.unwrap();
    tx.insert_customer(&cust).await.unwrap();
    tx.insert_order(&ord).await.unwrap();
    tx.insert_cancellation(&record).await.unwrap();
    assert!(
        tx.update_cancellation_status(record.id, CancellationStatus::Returned, Some(Utc::now()))
            .await
            .unwrap()
    );

    let returned = tx
        .list_cancellations(&CancellationQuery::new().status(CancellationStatus::Returned))
        .await
        .unwrap();
    assert_eq!(returned.total, 1);
    assert!(returned.items[0].returned_at.is_some());

    assert!(tx.delete_cancellation(record.id).await.unwrap());
    assert!(tx.get_cancellation_by_order(ord.id).await.unwrap().is_none());
}
