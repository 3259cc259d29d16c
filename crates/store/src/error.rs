use common::OrderId;
use domain::{DomainError, OrderState, StockShortage};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order left the state a transition was planned from before the
    /// transition could be committed.
    #[error(
        "Order {order_id} changed concurrently: expected state '{expected}', found '{actual}'"
    )]
    StateConflict {
        order_id: OrderId,
        expected: OrderState,
        actual: OrderState,
    },

    /// A decrement would take stock below zero. Nothing was applied.
    #[error("{0}")]
    InsufficientStock(StockShortage),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Another product already uses this SKU.
    #[error("SKU '{0}' is already in use")]
    DuplicateSku(String),

    /// An order may hold only one line per product.
    #[error("Order {order_id} already has a line for product {product_id}")]
    DuplicateLine { order_id: String, product_id: String },

    /// The record is still referenced and cannot be deleted.
    #[error("Cannot delete {entity} {id}: it is referenced by existing {referenced_by}")]
    Referenced {
        entity: &'static str,
        id: String,
        referenced_by: &'static str,
    },

    /// A domain rule rejected the write.
    #[error("Domain error: {0}")]
    Domain(DomainError),

    /// A stored value could not be mapped back into the domain.
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientStock(shortage) => StoreError::InsufficientStock(shortage),
            other => StoreError::Domain(other),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
