//! Service error types.

use common::OrderId;
use domain::{DomainError, OrderState, StockShortage, ValidationErrors};
use store::StoreError;
use thiserror::Error;

use crate::access::Capability;

/// Errors returned by the sales services.
///
/// Every variant is recoverable at the request boundary.
#[derive(Debug, Error)]
pub enum SalesError {
    /// Input failed field validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Requested quantities exceed available stock.
    #[error("{0}")]
    InsufficientStock(StockShortage),

    /// The order's state does not allow the action.
    #[error("Cannot {action} order {order_id} in state '{current_state}'")]
    InvalidTransition {
        order_id: OrderId,
        current_state: OrderState,
        action: &'static str,
    },

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller lacks a required capability.
    #[error("Missing capability '{0}'")]
    Permission(Capability),

    /// The record is still referenced by others.
    #[error("{0}")]
    ReferentialIntegrity(String),

    /// Unexpected storage failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<DomainError> for SalesError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(errors) => SalesError::Validation(errors),
            DomainError::InsufficientStock(shortage) => SalesError::InsufficientStock(shortage),
            DomainError::InvalidTransition {
                order_id,
                current_state,
                action,
            } => SalesError::InvalidTransition {
                order_id,
                current_state,
                action,
            },
        }
    }
}

impl From<StoreError> for SalesError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock(shortage) => SalesError::InsufficientStock(shortage),
            StoreError::NotFound { entity, id } => SalesError::NotFound { entity, id },
            StoreError::DuplicateSku(sku) => SalesError::Validation(ValidationErrors::single(
                "sku",
                format!("SKU '{sku}' is already in use"),
            )),
            StoreError::DuplicateLine { product_id, .. } => {
                SalesError::Validation(ValidationErrors::single(
                    "lines",
                    format!("product {product_id} appears on more than one line"),
                ))
            }
            err @ StoreError::Referenced { .. } => SalesError::ReferentialIntegrity(err.to_string()),
            StoreError::Domain(err) => err.into(),
            other => SalesError::Store(other),
        }
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, SalesError>;
