//! Product catalog.

use std::collections::HashMap;

use common::{Money, Product, ProductId};
use serde::Serialize;
use store::{InventoryRepository, LocationRepository, ProductRepository, Store, Transaction};

use crate::error::{DomainError, Result};
use crate::inventory::{LocationStock, stock_by_location};
use crate::locations::{FULFILLMENT, LocationRegistry, PRODUCTION};

/// Fields of a product as submitted for create or update.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub code: String,
    pub price: Money,
    pub description: Option<String>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, code: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            price,
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("Product name is required"));
        }
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("Product code is required"));
        }
        if self.price.is_negative() {
            return Err(DomainError::validation("Price cannot be negative"));
        }
        Ok(())
    }

    fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name.trim().to_string(),
            code: self.code.trim().to_string(),
            price: self.price,
            description: self.description,
        }
    }
}

/// A product with its stock at every active location.
///
/// `available_stock` counts Production and Fulfillment; stock in transit is
/// already committed to orders.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: Product,
    pub stock: Vec<LocationStock>,
    pub available_stock: i64,
}

const DUPLICATE_CODE: &str = "Product code already exists";

/// Service for managing the product catalog.
pub struct CatalogService<S: Store> {
    store: S,
    registry: LocationRegistry,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S, registry: LocationRegistry) -> Self {
        Self { store, registry }
    }

    /// Creates a product with a zero ledger row at every active location.
    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        draft.validate()?;
        let product = draft.into_product(ProductId::new());

        let mut tx = self.store.begin().await?;
        self.registry.ensure_and_resolve(&mut tx).await?;
        tx.insert_product(&product)
            .await
            .map_err(|e| DomainError::on_duplicate(e, DUPLICATE_CODE))?;
        for location in tx.list_locations(true).await? {
            tx.increment_inventory(product.id, location.id, 0).await?;
        }
        tx.commit().await?;

        tracing::info!(product_id = %product.id, code = %product.code, "product created");
        Ok(product)
    }

    /// Replaces name, code, price and description.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        draft.validate()?;
        let product = draft.into_product(id);

        let mut tx = self.store.begin().await?;
        let updated = tx
            .update_product(&product)
            .await
            .map_err(|e| DomainError::on_duplicate(e, DUPLICATE_CODE))?;
        if !updated {
            return Err(DomainError::not_found("Product", id));
        }
        tx.commit().await?;
        Ok(product)
    }

    /// Deletes a product and its stock history.
    ///
    /// Refused while any order line references the product.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if tx.get_product(id).await?.is_none() {
            return Err(DomainError::not_found("Product", id));
        }
        if tx.count_order_items_for_product(id).await? > 0 {
            return Err(DomainError::validation(
                "Cannot delete product that is used in orders",
            ));
        }
        tx.delete_product(id).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        tx.get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    /// Lists products by name with per-location and available stock.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductSummary>> {
        let mut tx = self.store.begin().await?;
        let active = tx.list_locations(true).await?;
        let quantities: HashMap<_, _> = tx
            .list_inventory()
            .await?
            .into_iter()
            .map(|item| ((item.product_id, item.location_id), item.quantity))
            .collect();

        let summaries = tx
            .list_products()
            .await?
            .into_iter()
            .map(|product| {
                let stock = stock_by_location(product.id, &active, &quantities);
                let available_stock = stock
                    .iter()
                    .filter(|s| s.location_name == PRODUCTION || s.location_name == FULFILLMENT)
                    .map(|s| s.quantity)
                    .sum();
                ProductSummary {
                    product,
                    stock,
                    available_stock,
                }
            })
            .collect();
        Ok(summaries)
    }
}
