//! Domain error types.

use common::{OrderId, ProductId};
use serde::Serialize;
use thiserror::Error;

use crate::order::OrderState;

/// Errors produced by domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// One or more fields are malformed or out of range.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Requested quantities exceed available stock.
    #[error("{0}")]
    InsufficientStock(StockShortage),

    /// The order is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} order {order_id} in state '{current_state}'")]
    InvalidTransition {
        order_id: OrderId,
        current_state: OrderState,
        action: &'static str,
    },
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(errors)
    }
}

impl From<StockShortage> for DomainError {
    fn from(shortage: StockShortage) -> Self {
        DomainError::InsufficientStock(shortage)
    }
}

/// A validation failure attached to a single field.
///
/// Fields of order lines are addressed as `lines[<index>].<field>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Structured list of field-level validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a list holding exactly one error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if any error is attached to `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Converts the collected errors into a result: `Ok` when nothing was
    /// collected.
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// One product whose requested quantity exceeds its stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub product_id: ProductId,
    /// Display label of the product (`"<sku> - <name>"`).
    pub product: String,
    pub requested: u64,
    pub available: u32,
    /// Index of the offending entry line, when the shortfall is per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: requested {}, available {}",
            self.product, self.requested, self.available
        )
    }
}

/// Every shortfall found by one stock check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StockShortage {
    shortfalls: Vec<Shortfall>,
}

impl StockShortage {
    pub fn new(shortfalls: Vec<Shortfall>) -> Self {
        Self { shortfalls }
    }

    pub fn shortfalls(&self) -> &[Shortfall] {
        &self.shortfalls
    }

    /// Looks up the shortfall reported for a product.
    pub fn for_product(&self, product_id: ProductId) -> Option<&Shortfall> {
        self.shortfalls.iter().find(|s| s.product_id == product_id)
    }
}

impl std::fmt::Display for StockShortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Insufficient stock for one or more products")?;
        for shortfall in &self.shortfalls {
            write!(f, "\n- {shortfall}")?;
        }
        Ok(())
    }
}
