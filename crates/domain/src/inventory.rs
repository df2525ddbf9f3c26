//! Inventory service: manual stock movements, inventory views and location
//! administration.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{Location, LocationId, MovementType, Product, ProductId, StockMovement};
use serde::Serialize;
use store::{
    InventoryRepository, LocationRepository, MovementRepository, ProductRepository, Store,
    Transaction,
};

use crate::error::{DomainError, Result};
use crate::locations::{self, LocationRegistry};
use crate::movements::{self, MovementView};
use crate::transfer::{self, AdjustRequest, TransferRequest};

/// A manual stock movement as submitted by an operator.
///
/// Transfers need `from_location` and `to_location`; every other type needs
/// `location_id`.
#[derive(Debug, Clone)]
pub struct StockMovementRequest {
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub notes: Option<String>,
    pub stock_date: Option<DateTime<Utc>>,
}

/// Quantity of a product at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationStock {
    pub location_id: LocationId,
    pub location_name: String,
    pub quantity: i64,
}

/// Inventory overview row for one product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductStock {
    #[serde(flatten)]
    pub product: Product,
    pub location_stock: Vec<LocationStock>,
    pub total_stock: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Builds per-location stock for a product over the given locations.
pub(crate) fn stock_by_location(
    product_id: ProductId,
    locations: &[Location],
    quantities: &HashMap<(ProductId, LocationId), i64>,
) -> Vec<LocationStock> {
    locations
        .iter()
        .map(|location| LocationStock {
            location_id: location.id,
            location_name: location.name.clone(),
            quantity: quantities
                .get(&(product_id, location.id))
                .copied()
                .unwrap_or(0),
        })
        .collect()
}

/// Service for stock movements and inventory views.
pub struct InventoryService<S: Store> {
    store: S,
    registry: LocationRegistry,
}

impl<S: Store> InventoryService<S> {
    /// Creates a new inventory service sharing the given location registry.
    pub fn new(store: S, registry: LocationRegistry) -> Self {
        Self { store, registry }
    }

    /// Records a manual movement in its own transaction.
    ///
    /// Returns None when the quantity is zero and nothing was written.
    #[tracing::instrument(skip(self))]
    pub async fn record_movement(
        &self,
        req: StockMovementRequest,
    ) -> Result<Option<StockMovement>> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;

        if tx.get_product(req.product_id).await?.is_none() {
            return Err(DomainError::not_found("Product", req.product_id));
        }
        self.registry.ensure_and_resolve(&mut tx).await?;

        let movement = match req.movement_type {
            MovementType::Transfer => {
                let (Some(from), Some(to)) = (req.from_location, req.to_location) else {
                    return Err(DomainError::validation(
                        "Transfer requires from and to locations",
                    ));
                };
                self.require_location(&mut tx, from).await?;
                self.require_location(&mut tx, to).await?;
                let mut transfer_req = TransferRequest::new(req.product_id, from, to, req.quantity);
                transfer_req.notes = req.notes;
                transfer::transfer(&mut tx, &transfer_req).await?
            }
            movement_type => {
                let Some(location_id) = req.location_id else {
                    return Err(DomainError::validation("Location is required"));
                };
                self.require_location(&mut tx, location_id).await?;
                let mut adjust_req =
                    AdjustRequest::new(req.product_id, location_id, movement_type, req.quantity);
                adjust_req.notes = req.notes;
                adjust_req.stock_date = req.stock_date;
                transfer::adjust(&mut tx, &adjust_req).await?
            }
        };

        tx.commit().await?;
        crate::record_duration("record_movement", start);
        Ok(movement)
    }

    /// Runs a single transfer in its own transaction.
    #[tracing::instrument(skip(self))]
    pub async fn transfer(&self, req: TransferRequest) -> Result<Option<StockMovement>> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        let movement = transfer::transfer(&mut tx, &req).await?;
        tx.commit().await?;
        crate::record_duration("transfer", start);
        Ok(movement)
    }

    /// Runs a single-location adjustment in its own transaction.
    #[tracing::instrument(skip(self))]
    pub async fn adjust(&self, req: AdjustRequest) -> Result<Option<StockMovement>> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        let movement = transfer::adjust(&mut tx, &req).await?;
        tx.commit().await?;
        crate::record_duration("adjust", start);
        Ok(movement)
    }

    /// Returns the quantity held at one location.
    pub async fn quantity(&self, product_id: ProductId, location_id: LocationId) -> Result<i64> {
        let mut tx = self.store.begin().await?;
        Ok(tx
            .lock_inventory(product_id, location_id)
            .await?
            .unwrap_or(0))
    }

    /// Lists every product with its stock at each active location.
    #[tracing::instrument(skip(self))]
    pub async fn overview(&self) -> Result<Vec<ProductStock>> {
        let mut tx = self.store.begin().await?;
        self.registry.ensure_and_resolve(&mut tx).await?;

        let active = tx.list_locations(true).await?;
        let quantities: HashMap<_, _> = tx
            .list_inventory()
            .await?
            .into_iter()
            .map(|item| ((item.product_id, item.location_id), item.quantity))
            .collect();

        let mut rows = Vec::new();
        for product in tx.list_products().await? {
            let location_stock = stock_by_location(product.id, &active, &quantities);
            let total_stock = location_stock.iter().map(|s| s.quantity).sum();
            let last_activity = tx.latest_movement_at(product.id).await?;
            rows.push(ProductStock {
                product,
                location_stock,
                total_stock,
                last_activity,
            });
        }

        // Persists any locations seeded above.
        tx.commit().await?;
        Ok(rows)
    }

    /// Returns a product's movement history, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, product_id: ProductId) -> Result<Vec<MovementView>> {
        let mut tx = self.store.begin().await?;
        if tx.get_product(product_id).await?.is_none() {
            return Err(DomainError::not_found("Product", product_id));
        }
        movements::history(&mut tx, product_id).await
    }

    pub async fn list_locations(&self, active_only: bool) -> Result<Vec<Location>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_locations(active_only).await?)
    }

    /// Creates a new location. Names are unique.
    #[tracing::instrument(skip(self))]
    pub async fn create_location(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Location> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Location name is required"));
        }
        let location = Location {
            id: LocationId::new(),
            name: name.to_string(),
            description,
            is_active: true,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_location(&location)
            .await
            .map_err(|e| DomainError::on_duplicate(e, "Location name already exists"))?;
        tx.commit().await?;
        self.registry.invalidate().await;

        tracing::info!(location_id = %location.id, name = %location.name, "location created");
        Ok(location)
    }

    /// Activates or deactivates a location.
    #[tracing::instrument(skip(self))]
    pub async fn set_location_active(&self, id: LocationId, is_active: bool) -> Result<Location> {
        let mut tx = self.store.begin().await?;
        let location = tx
            .set_location_active(id, is_active)
            .await?
            .ok_or_else(|| DomainError::not_found("Location", id))?;
        tx.commit().await?;
        self.registry.invalidate().await;
        Ok(location)
    }

    /// Creates any missing canonical location and returns all locations.
    #[tracing::instrument(skip(self))]
    pub async fn seed_locations(&self) -> Result<Vec<Location>> {
        let mut tx = self.store.begin().await?;
        locations::ensure_default_locations(&mut tx).await?;
        let all = tx.list_locations(false).await?;
        tx.commit().await?;
        self.registry.invalidate().await;
        Ok(all)
    }

    async fn require_location(&self, tx: &mut S::Tx, id: LocationId) -> Result<()> {
        match tx.get_location(id).await? {
            Some(location) if location.is_active => Ok(()),
            Some(location) => Err(DomainError::validation(format!(
                "Location {} is inactive",
                location.name
            ))),
            None => Err(DomainError::not_found("Location", id)),
        }
    }
}
