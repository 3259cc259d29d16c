//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sales::SalesError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request input (ids, query parameters).
    #[error("{0}")]
    BadRequest(String),

    /// Error raised by a service.
    #[error(transparent)]
    Sales(#[from] SalesError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(msg) => {
                let body = serde_json::json!({ "error": msg });
                return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
            }
            ApiError::Sales(err) => err,
        };

        let status = status_for(&err);
        let mut body = match &err {
            SalesError::Store(store_err) => {
                tracing::error!(error = %store_err, "store failure");
                serde_json::json!({ "error": "The operation could not be completed." })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };

        match &err {
            SalesError::Validation(errors) => {
                body["field_errors"] = serde_json::json!(errors);
            }
            SalesError::InsufficientStock(shortage) => {
                body["shortfalls"] = serde_json::json!(shortage);
            }
            _ => {}
        }

        (status, axum::Json(body)).into_response()
    }
}

fn status_for(err: &SalesError) -> StatusCode {
    match err {
        SalesError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SalesError::InsufficientStock(_)
        | SalesError::InvalidTransition { .. }
        | SalesError::ReferentialIntegrity(_) => StatusCode::CONFLICT,
        SalesError::NotFound { .. } => StatusCode::NOT_FOUND,
        SalesError::Permission(_) => StatusCode::FORBIDDEN,
        SalesError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ValidationErrors;
    use sales::Capability;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            status_for(&SalesError::Validation(ValidationErrors::single("name", "x"))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&SalesError::Permission(Capability::ViewClient)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&SalesError::ReferentialIntegrity("in use".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SalesError::NotFound {
                entity: "order",
                id: "x".into()
            }),
            StatusCode::NOT_FOUND
        );
    }
}
