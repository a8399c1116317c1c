//! Error types for the query core
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == Shelter Error Enum ==
/// Unified error type for the query core and its HTTP surface.
#[derive(Error, Debug)]
pub enum ShelterError {
    /// Caller passed a value of the wrong shape (e.g. a non-map filter)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Cursor token could not be decoded
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Store connection failure or deadline exceeded
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Write conflicts with stored data (e.g. a duplicate primary key)
    #[error("Store rejected operation: {0}")]
    Store(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ShelterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => {
                ShelterError::StoreUnavailable(err.to_string())
            }
            StoreError::Duplicate(_) => ShelterError::Store(err.to_string()),
            // the store refuses malformed caller input: unknown operators, bad ids
            StoreError::Rejected(_) => ShelterError::Validation(err.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ShelterError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShelterError::Validation(_) | ShelterError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
            ShelterError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ShelterError::Store(_) => StatusCode::CONFLICT,
            ShelterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the query core.
pub type Result<T> = std::result::Result<T, ShelterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_maps_to_store_unavailable() {
        let err: ShelterError = StoreError::Timeout(Duration::from_millis(50)).into();
        assert!(matches!(err, ShelterError::StoreUnavailable(_)));
    }

    #[test]
    fn test_duplicate_maps_to_store_rejection() {
        let err: ShelterError = StoreError::Duplicate(7).into();
        assert!(matches!(err, ShelterError::Store(_)));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_rejected_query_maps_to_validation() {
        let err: ShelterError = StoreError::Rejected("unsupported operator $regex".into()).into();
        assert!(matches!(err, ShelterError::Validation(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ShelterError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ShelterError::InvalidCursor("x".into()), StatusCode::BAD_REQUEST),
            (ShelterError::StoreUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ShelterError::Store("x".into()), StatusCode::CONFLICT),
            (ShelterError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
