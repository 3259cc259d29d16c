//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{ClientId, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ledger::{StockMovement, Transition};
use crate::value_objects::Money;

use super::OrderState;

/// One product line within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,

    /// Always greater than zero.
    pub quantity: u32,

    /// Price snapshot taken when the order was entered.
    pub unit_price: Money,
}

impl LineItem {
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// Returns quantity * unit_price.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Display label, `"<product> x <qty>"`.
    pub fn label(&self, product: &str) -> String {
        format!("{product} x {}", self.quantity)
    }
}

/// Order aggregate root.
///
/// Owns its line items; holds at most one line per product. Totals are
/// computed from the lines on every call and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    client_id: ClientId,
    created_at: DateTime<Utc>,
    state: OrderState,
    note: Option<String>,
    lines: Vec<LineItem>,
}

impl Order {
    /// Starts a new order in state `new`, timestamped now.
    ///
    /// Lines are expected to come out of [`crate::validate_entry`], which
    /// guarantees one line per product.
    pub fn place(client_id: ClientId, note: Option<String>, lines: Vec<LineItem>) -> Self {
        Self {
            id: OrderId::new(),
            client_id,
            created_at: Utc::now(),
            state: OrderState::New,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            lines,
        }
    }

    /// Rebuilds an order from persisted parts.
    pub fn from_parts(
        id: OrderId,
        client_id: ClientId,
        created_at: DateTime<Utc>,
        state: OrderState,
        note: Option<String>,
        lines: Vec<LineItem>,
    ) -> Self {
        Self {
            id,
            client_id,
            created_at,
            state,
            note,
            lines,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Returns the line for a product, if the order has one.
    pub fn line_for(&self, product_id: ProductId) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Returns true if any line references the product.
    pub fn references_product(&self, product_id: ProductId) -> bool {
        self.line_for(product_id).is_some()
    }

    /// Sum of every line's subtotal.
    pub fn total(&self) -> Money {
        self.lines.iter().map(LineItem::subtotal).sum()
    }

    /// Sum of every line's quantity.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| l.quantity as u64).sum()
    }

    /// Display label, `"Order #<id>"`.
    pub fn label(&self) -> String {
        format!("Order #{}", self.id)
    }
}

// Ledger decisions
impl Order {
    /// Plans the `new → processed` transition: one decrement per line.
    pub fn process(&self) -> Result<Transition, DomainError> {
        if !self.state.can_process() {
            return Err(DomainError::InvalidTransition {
                order_id: self.id,
                current_state: self.state,
                action: "process",
            });
        }

        let movements = self
            .lines
            .iter()
            .map(|l| StockMovement::decrement(l.product_id, l.quantity))
            .collect();

        Ok(Transition::new(self.id, self.state, OrderState::Processed, movements))
    }

    /// Plans the cancellation.
    ///
    /// A processed order gives its stock back; a new order moves no stock;
    /// an already cancelled order yields `None` because there is nothing to
    /// do.
    pub fn cancel(&self) -> Option<Transition> {
        if !self.state.can_cancel() {
            return None;
        }

        let movements = if self.state.holds_stock() {
            self.lines
                .iter()
                .map(|l| StockMovement::increment(l.product_id, l.quantity))
                .collect()
        } else {
            Vec::new()
        };

        Some(Transition::new(self.id, self.state, OrderState::Cancelled, movements))
    }

    /// Moves the order into the transition's target state.
    ///
    /// Stores call this after the stock side of the transition has been
    /// applied in the same atomic section.
    pub fn apply(&mut self, transition: &Transition) {
        debug_assert_eq!(transition.order_id, self.id);
        self.state = transition.to;
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order #{}", self.id)
    }
}
