//! HTTP route handlers.

pub mod cancellations;
pub mod customers;
pub mod health;
pub mod inventory;
pub mod locations;
pub mod metrics;
pub mod orders;
pub mod products;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment into a typed identifier.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

/// Parses a status string, naming the field in the error.
pub(crate) fn parse_status<T>(raw: &str, field: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = common::ParseEnumError>,
{
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field}: {raw}")))
}
