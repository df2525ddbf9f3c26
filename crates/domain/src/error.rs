//! Domain error types.

use common::{LocationId, OrderId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A deduction would take a ledger row below zero.
    #[error("Insufficient stock in source location. Available: {available}, Required: {required}")]
    InsufficientStock {
        product_id: ProductId,
        location_id: LocationId,
        available: i64,
        required: i64,
    },

    /// Required locations are missing or inactive.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The order has been delivered and can no longer change.
    #[error("Order {order_id} has been delivered and cannot be modified")]
    ImmutableOrder { order_id: OrderId },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request is malformed or not allowed in the current state.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// Maps a unique-constraint violation to a validation error with the given
    /// message, passing any other store error through.
    pub(crate) fn on_duplicate(err: StoreError, message: &str) -> Self {
        match err {
            StoreError::UniqueViolation { .. } => DomainError::Validation(message.to_string()),
            other => DomainError::Store(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
