use common::{LocationId, ParseEnumError, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A guarded decrement matched no row because the stored quantity was
    /// lower than requested.
    #[error(
        "Stock guard rejected decrement of {requested} for product {product_id} at location {location_id}"
    )]
    StockGuard {
        product_id: ProductId,
        location_id: LocationId,
        requested: i64,
    },

    /// An increment would overflow the stored quantity.
    #[error("Quantity overflow for product {product_id} at location {location_id}")]
    QuantityOverflow {
        product_id: ProductId,
        location_id: LocationId,
    },

    /// A persisted value could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<ParseEnumError> for StoreError {
    fn from(e: ParseEnumError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
