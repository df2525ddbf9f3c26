use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CancellationId, CancellationItem, CancellationStatus, Customer, CustomerId, InventoryItem,
    Location, LocationId, Money, MovementId, MovementType, Order, OrderCancellation, OrderId,
    OrderItem, OrderStatus, Product, ProductId, StockMovement,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, postgres::PgPoolOptions, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CancellationQuery, CustomerQuery, Page, Result, StoreError,
    store::{
        CancellationRepository, CustomerRepository, InventoryRepository, LocationRepository,
        MovementRepository, OrderRepository, ProductRepository, Store, Transaction,
    },
};

const ORDER_COLUMNS: &str = "id, customer_id, order_date, status, total_amount, \
     cancellation_reason, cancellation_notes, hold_return";

const CANCELLATION_COLUMNS: &str = "id, order_id, customer_id, customer_name, \
     cancellation_reason, cancellation_notes, status, cancelled_at, returned_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, location_id, \
     from_location, to_location, notes, order_id, stock_date, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to the given database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }
}

/// Transaction over a [`PostgresStore`].
///
/// Rows read through the `*_for_update` and `lock_*` methods stay locked
/// until the transaction commits or is dropped.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
        && let Some(constraint) = db_err.constraint()
    {
        return StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        };
    }
    StoreError::Database(e)
}

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("quantity {quantity} out of range")))
}

fn from_db_quantity(quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))
}

/// Escapes LIKE wildcards so the term matches as a plain substring.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn row_to_location(row: PgRow) -> Result<Location> {
    Ok(Location {
        id: LocationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        price: Money::new(row.try_get::<Decimal, _>("price")?),
        description: row.try_get("description")?,
    })
}

fn row_to_inventory(row: PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        location_id: LocationId::from_uuid(row.try_get::<Uuid, _>("location_id")?),
        quantity: row.try_get("quantity")?,
    })
}

fn row_to_movement(row: PgRow) -> Result<StockMovement> {
    Ok(StockMovement {
        id: MovementId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        movement_type: row
            .try_get::<String, _>("movement_type")?
            .parse::<MovementType>()?,
        quantity: row.try_get("quantity")?,
        location_id: row
            .try_get::<Option<Uuid>, _>("location_id")?
            .map(LocationId::from_uuid),
        from_location: row
            .try_get::<Option<Uuid>, _>("from_location")?
            .map(LocationId::from_uuid),
        to_location: row
            .try_get::<Option<Uuid>, _>("to_location")?
            .map(LocationId::from_uuid),
        notes: row.try_get("notes")?,
        order_id: row
            .try_get::<Option<Uuid>, _>("order_id")?
            .map(OrderId::from_uuid),
        stock_date: row.try_get("stock_date")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_customer(row: PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        location: row.try_get("location")?,
        preferred_delivery_time: row.try_get("preferred_delivery_time")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Builds an order without its items.
fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        order_date: row.try_get("order_date")?,
        status: row.try_get::<String, _>("status")?.parse::<OrderStatus>()?,
        total_amount: Money::new(row.try_get::<Decimal, _>("total_amount")?),
        cancellation_reason: row.try_get("cancellation_reason")?,
        cancellation_notes: row.try_get("cancellation_notes")?,
        hold_return: row.try_get("hold_return")?,
        items: Vec::new(),
    })
}

fn row_to_order_item(row: &PgRow) -> Result<(OrderId, OrderItem)> {
    let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?);
    let item = OrderItem {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: from_db_quantity(row.try_get("quantity")?)?,
        unit_price: Money::new(row.try_get::<Decimal, _>("unit_price")?),
    };
    Ok((order_id, item))
}

/// Builds a cancellation record without its items.
fn row_to_cancellation(row: PgRow) -> Result<OrderCancellation> {
    Ok(OrderCancellation {
        id: CancellationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        customer_name: row.try_get("customer_name")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        cancellation_notes: row.try_get("cancellation_notes")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<CancellationStatus>()?,
        cancelled_at: row.try_get("cancelled_at")?,
        returned_at: row.try_get("returned_at")?,
        items: Vec::new(),
    })
}

fn row_to_cancellation_item(row: &PgRow) -> Result<(CancellationId, CancellationItem)> {
    let cancellation_id = CancellationId::from_uuid(row.try_get::<Uuid, _>("cancellation_id")?);
    let item = CancellationItem {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        product_code: row.try_get("product_code")?,
        quantity: from_db_quantity(row.try_get("quantity")?)?,
        unit_price: Money::new(row.try_get::<Decimal, _>("unit_price")?),
    };
    Ok((cancellation_id, item))
}

impl PostgresTransaction {
    /// Loads the lines of every given order, keeping line order.
    async fn attach_order_items(&mut self, orders: &mut [Order]) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let (order_id, item) = row_to_order_item(row)?;
            by_order.entry(order_id).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn attach_cancellation_items(
        &mut self,
        cancellations: &mut [OrderCancellation],
    ) -> Result<()> {
        if cancellations.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = cancellations.iter().map(|c| c.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT cancellation_id, product_id, product_name, product_code, quantity, unit_price
            FROM order_cancellation_items
            WHERE cancellation_id = ANY($1)
            ORDER BY cancellation_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_record: HashMap<CancellationId, Vec<CancellationItem>> = HashMap::new();
        for row in &rows {
            let (cancellation_id, item) = row_to_cancellation_item(row)?;
            by_record.entry(cancellation_id).or_default().push(item);
        }
        for cancellation in cancellations.iter_mut() {
            cancellation.items = by_record.remove(&cancellation.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn fetch_one_order(&mut self, sql: &str, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => {
                let mut orders = [row_to_order(row)?];
                self.attach_order_items(&mut orders).await?;
                let [order] = orders;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn fetch_one_cancellation(
        &mut self,
        sql: &str,
        id: Uuid,
    ) -> Result<Option<OrderCancellation>> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => {
                let mut records = [row_to_cancellation(row)?];
                self.attach_cancellation_items(&mut records).await?;
                let [record] = records;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn insert_order_items(&mut self, id: OrderId, items: &[OrderItem]) -> Result<()> {
        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_uuid())
            .bind(to_db_quantity(item.quantity)?)
            .bind(item.unit_price.amount())
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LocationRepository for PostgresTransaction {
    async fn find_location_by_name(&mut self, name: &str) -> Result<Option<Location>> {
        let row = sqlx::query(
            "SELECT id, name, description, is_active FROM inventory_locations WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_location).transpose()
    }

    async fn get_location(&mut self, id: LocationId) -> Result<Option<Location>> {
        let row = sqlx::query(
            "SELECT id, name, description, is_active FROM inventory_locations WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_location).transpose()
    }

    async fn insert_location_if_absent(&mut self, location: &Location) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_locations (id, name, description, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(&location.description)
        .bind(location.is_active)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_location(&mut self, location: &Location) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_locations (id, name, description, is_active)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(&location.description)
        .bind(location.is_active)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn list_locations(&mut self, active_only: bool) -> Result<Vec<Location>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, is_active
            FROM inventory_locations
            WHERE is_active OR NOT $1
            ORDER BY name
            "#,
        )
        .bind(active_only)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_location).collect()
    }

    async fn set_location_active(
        &mut self,
        id: LocationId,
        is_active: bool,
    ) -> Result<Option<Location>> {
        let row = sqlx::query(
            r#"
            UPDATE inventory_locations SET is_active = $2
            WHERE id = $1
            RETURNING id, name, description, is_active
            "#,
        )
        .bind(id.as_uuid())
        .bind(is_active)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_location).transpose()
    }
}

#[async_trait]
impl ProductRepository for PostgresTransaction {
    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, code, price, description)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.code)
        .bind(product.price.amount())
        .bind(&product.description)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products SET name = $2, code = $3, price = $4, description = $5
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.code)
        .bind(product.price.amount())
        .bind(&product.description)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row =
            sqlx::query("SELECT id, name, code, price, description FROM products WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(row_to_product).transpose()
    }

    async fn list_products(&mut self) -> Result<Vec<Product>> {
        let rows =
            sqlx::query("SELECT id, name, code, price, description FROM products ORDER BY name")
                .fetch_all(&mut *self.tx)
                .await?;
        rows.into_iter().map(row_to_product).collect()
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        // Ledger rows and movements go with the product through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_order_items_for_product(&mut self, id: ProductId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE product_id = $1")
                .bind(id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl InventoryRepository for PostgresTransaction {
    async fn lock_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<i64>> {
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM inventory_items
            WHERE product_id = $1 AND location_id = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(quantity)
    }

    async fn increment_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        amount: i64,
    ) -> Result<i64> {
        let quantity: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO inventory_items (product_id, location_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, location_id)
            DO UPDATE SET quantity = inventory_items.quantity + EXCLUDED.quantity
            RETURNING quantity
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location_id.as_uuid())
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(quantity)
    }

    async fn decrement_inventory(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        amount: i64,
    ) -> Result<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE inventory_items SET quantity = quantity - $3
            WHERE product_id = $1 AND location_id = $2 AND quantity >= $3
            RETURNING quantity
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location_id.as_uuid())
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await?;

        quantity.ok_or(StoreError::StockGuard {
            product_id,
            location_id,
            requested: amount,
        })
    }

    async fn list_inventory_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(
            "SELECT product_id, location_id, quantity FROM inventory_items WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_inventory).collect()
    }

    async fn list_inventory(&mut self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query("SELECT product_id, location_id, quantity FROM inventory_items")
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_inventory).collect()
    }
}

#[async_trait]
impl MovementRepository for PostgresTransaction {
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, movement_type, quantity, location_id,
                from_location, to_location, notes, order_id, stock_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.location_id.map(|id| id.as_uuid()))
        .bind(movement.from_location.map(|id| id.as_uuid()))
        .bind(movement.to_location.map(|id| id.as_uuid()))
        .bind(&movement.notes)
        .bind(movement.order_id.map(|id| id.as_uuid()))
        .bind(movement.stock_date)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_movements_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_movement).collect()
    }

    async fn latest_movement_at(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(created_at) FROM stock_movements WHERE product_id = $1")
                .bind(product_id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(latest)
    }
}

#[async_trait]
impl CustomerRepository for PostgresTransaction {
    async fn insert_customer(&mut self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, location, preferred_delivery_time, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.location)
        .bind(&customer.preferred_delivery_time)
        .bind(&customer.notes)
        .bind(customer.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, phone = $3, location = $4, preferred_delivery_time = $5, notes = $6
            WHERE id = $1
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.location)
        .bind(&customer.preferred_delivery_time)
        .bind(&customer.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, phone, location, preferred_delivery_time, notes, created_at
            FROM customers WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_customer).transpose()
    }

    async fn list_customers(&mut self, query: &CustomerQuery) -> Result<Page<Customer>> {
        let pattern = query.search.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM customers
            WHERE $1::TEXT IS NULL OR name ILIKE $1 OR phone ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, name, phone, location, preferred_delivery_time, notes, created_at
            FROM customers
            WHERE $1::TEXT IS NULL OR name ILIKE $1 OR phone ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        let items = rows
            .into_iter()
            .map(row_to_customer)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, order_date, status, total_amount,
                cancellation_reason, cancellation_notes, hold_return)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.order_date)
        .bind(order.status.as_str())
        .bind(order.total_amount.amount())
        .bind(&order.cancellation_reason)
        .bind(&order.cancellation_notes)
        .bind(order.hold_return)
        .execute(&mut *self.tx)
        .await?;

        self.insert_order_items(order.id, &order.items).await
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        self.fetch_one_order(&sql, id.as_uuid()).await
    }

    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        self.fetch_one_order(&sql, id.as_uuid()).await
    }

    async fn latest_order_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 \
             ORDER BY order_date DESC LIMIT 1 FOR UPDATE"
        );
        self.fetch_one_order(&sql, customer_id.as_uuid()).await
    }

    async fn list_orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY order_date DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(customer_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        let mut orders = rows
            .into_iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_order_items(&mut orders).await?;
        Ok(orders)
    }

    async fn update_order(&mut self, order: &Order) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, total_amount = $3, cancellation_reason = $4,
                cancellation_notes = $5, hold_return = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_amount.amount())
        .bind(&order.cancellation_reason)
        .bind(&order.cancellation_notes)
        .bind(order.hold_return)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_order_items(&mut self, id: OrderId, items: &[OrderItem]) -> Result<()> {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        self.insert_order_items(id, items).await
    }

    async fn has_delivered_order(&mut self, customer_id: CustomerId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE customer_id = $1 AND status = 'delivered')",
        )
        .bind(customer_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn delete_orders_for_customer(&mut self, customer_id: CustomerId) -> Result<u64> {
        sqlx::query(
            "DELETE FROM order_items WHERE order_id IN (SELECT id FROM orders WHERE customer_id = $1)",
        )
        .bind(customer_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        let result = sqlx::query("DELETE FROM orders WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CancellationRepository for PostgresTransaction {
    async fn insert_cancellation(&mut self, cancellation: &OrderCancellation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_cancellations (id, order_id, customer_id, customer_name,
                cancellation_reason, cancellation_notes, status, cancelled_at, returned_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(cancellation.id.as_uuid())
        .bind(cancellation.order_id.as_uuid())
        .bind(cancellation.customer_id.as_uuid())
        .bind(&cancellation.customer_name)
        .bind(&cancellation.cancellation_reason)
        .bind(&cancellation.cancellation_notes)
        .bind(cancellation.status.as_str())
        .bind(cancellation.cancelled_at)
        .bind(cancellation.returned_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        for (position, item) in cancellation.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_cancellation_items (cancellation_id, position, product_id,
                    product_name, product_code, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(cancellation.id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(&item.product_code)
            .bind(to_db_quantity(item.quantity)?)
            .bind(item.unit_price.amount())
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn get_cancellation_for_update(
        &mut self,
        id: CancellationId,
    ) -> Result<Option<OrderCancellation>> {
        let sql = format!(
            "SELECT {CANCELLATION_COLUMNS} FROM order_cancellations WHERE id = $1 FOR UPDATE"
        );
        self.fetch_one_cancellation(&sql, id.as_uuid()).await
    }

    async fn get_cancellation_by_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<OrderCancellation>> {
        let sql =
            format!("SELECT {CANCELLATION_COLUMNS} FROM order_cancellations WHERE order_id = $1");
        self.fetch_one_cancellation(&sql, order_id.as_uuid()).await
    }

    async fn update_cancellation_status(
        &mut self,
        id: CancellationId,
        status: CancellationStatus,
        returned_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE order_cancellations SET status = $2, returned_at = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(returned_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cancellation(&mut self, id: CancellationId) -> Result<bool> {
        sqlx::query("DELETE FROM order_cancellation_items WHERE cancellation_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        let result = sqlx::query("DELETE FROM order_cancellations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_cancellations(
        &mut self,
        query: &CancellationQuery,
    ) -> Result<Page<OrderCancellation>> {
        let status = query.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_cancellations WHERE $1::TEXT IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await?;

        let sql = format!(
            "SELECT {CANCELLATION_COLUMNS} FROM order_cancellations \
             WHERE $1::TEXT IS NULL OR status = $1 \
             ORDER BY cancelled_at DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut items = rows
            .into_iter()
            .map(row_to_cancellation)
            .collect::<Result<Vec<_>>>()?;
        self.attach_cancellation_items(&mut items).await?;
        Ok(Page {
            items,
            total: total as u64,
        })
    }
}
