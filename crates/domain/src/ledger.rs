//! Stock ledger rules.
//!
//! An order decides *what* a transition means ([`crate::Order::process`],
//! [`crate::Order::cancel`]); a store decides *when* it happens. Every store
//! runs [`apply_movements`] inside one atomic section together with the
//! order's state change, so validation and application can never interleave
//! with another transition touching the same products.

use std::collections::{BTreeMap, HashMap};

use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::error::{DomainError, Shortfall, StockShortage, ValidationErrors};
use crate::order::OrderState;

/// Which way a movement moves stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    Decrement,
    Increment,
}

/// A change to one product's stock counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub quantity: u32,
    pub direction: StockDirection,
}

impl StockMovement {
    pub fn decrement(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            direction: StockDirection::Decrement,
        }
    }

    pub fn increment(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            direction: StockDirection::Increment,
        }
    }

    /// Signed change to apply to the counter.
    pub fn delta(&self) -> i64 {
        match self.direction {
            StockDirection::Decrement => -(self.quantity as i64),
            StockDirection::Increment => self.quantity as i64,
        }
    }
}

/// A planned order state change together with the stock it moves.
///
/// Commits are conditional: a store applies the transition only while the
/// order is still in `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub order_id: OrderId,
    pub from: OrderState,
    pub to: OrderState,
    pub movements: Vec<StockMovement>,
}

impl Transition {
    pub fn new(
        order_id: OrderId,
        from: OrderState,
        to: OrderState,
        movements: Vec<StockMovement>,
    ) -> Self {
        Self {
            order_id,
            from,
            to,
            movements,
        }
    }

    /// Name of the action, used in logs and messages.
    pub fn action(&self) -> &'static str {
        match self.to {
            OrderState::Processed => "process",
            OrderState::Cancelled => "cancel",
            OrderState::New => "reopen",
        }
    }

    /// Touched products, sorted and deduplicated.
    ///
    /// Stores lock product rows in this order so two transitions over
    /// overlapping products always acquire locks in the same sequence.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.movements.iter().map(|m| m.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Net signed change per product.
    pub fn net_deltas(&self) -> BTreeMap<ProductId, i64> {
        let mut deltas = BTreeMap::new();
        for movement in &self.movements {
            *deltas.entry(movement.product_id).or_insert(0) += movement.delta();
        }
        deltas
    }
}

/// Validation pass: every product must cover its requested decrements.
///
/// All shortfalls are reported, not just the first. A product missing from
/// `products` counts as having no stock.
pub fn check_stock(
    movements: &[StockMovement],
    products: &HashMap<ProductId, Product>,
) -> Result<(), DomainError> {
    let mut requested: BTreeMap<ProductId, u64> = BTreeMap::new();
    for movement in movements {
        if movement.direction == StockDirection::Decrement {
            *requested.entry(movement.product_id).or_insert(0) += movement.quantity as u64;
        }
    }

    let shortfalls: Vec<Shortfall> = requested
        .into_iter()
        .filter_map(|(product_id, requested)| {
            let (label, available) = products
                .get(&product_id)
                .map(|p| (p.label(), p.stock))
                .unwrap_or_else(|| (product_id.to_string(), 0));
            (requested > available as u64).then_some(Shortfall {
                product_id,
                product: label,
                requested,
                available,
                line: None,
            })
        })
        .collect();

    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(StockShortage::new(shortfalls).into())
    }
}

/// Validation pass followed by apply pass.
///
/// Either every movement is applied or none is: the check runs over all
/// movements before the first counter changes.
pub fn apply_movements(
    movements: &[StockMovement],
    products: &mut HashMap<ProductId, Product>,
) -> Result<(), DomainError> {
    check_stock(movements, products)?;

    let mut next: HashMap<ProductId, u32> = HashMap::new();
    for movement in movements {
        let current = match next.get(&movement.product_id) {
            Some(stock) => *stock,
            None => products
                .get(&movement.product_id)
                .map(|p| p.stock)
                .unwrap_or(0),
        };
        let updated = match movement.direction {
            StockDirection::Decrement => current.checked_sub(movement.quantity),
            StockDirection::Increment => current.checked_add(movement.quantity),
        }
        .ok_or_else(|| {
            DomainError::Validation(ValidationErrors::single(
                "stock",
                format!("stock of product {} would overflow", movement.product_id),
            ))
        })?;
        next.insert(movement.product_id, updated);
    }

    for (product_id, stock) in next {
        if let Some(product) = products.get_mut(&product_id) {
            product.stock = stock;
        }
    }
    Ok(())
}
