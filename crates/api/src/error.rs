//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request from the client.
    BadRequest(String),
    /// Domain or store error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::InsufficientStock { .. } | DomainError::ImmutableOrder { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Configuration(_) => {
            tracing::error!(error = %err, "inventory locations misconfigured");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        DomainError::Store(_) => {
            tracing::error!(error = %err, "store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{LocationId, OrderId, ProductId};
    use store::StoreError;

    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(
            status_of(DomainError::InsufficientStock {
                product_id: ProductId::new(),
                location_id: LocationId::new(),
                available: 2,
                required: 5,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::ImmutableOrder {
                order_id: OrderId::new()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::not_found("Product", "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::Configuration("missing".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(DomainError::Store(StoreError::Corrupt("row".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_is_400() {
        let response = ApiError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
