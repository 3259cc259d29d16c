//! Order entry validation.
//!
//! Runs before an order is persisted and never touches stock. Checks run in
//! three passes, each only if the previous one found nothing:
//! 1. field checks per line (product known and active, quantity, price)
//! 2. stock check per line
//! 3. stock check per product, after repeated lines are summed
//!
//! A last check rejects orders whose total does not fit in [`Money`].
//!
//! The result is one [`LineItem`] per product, with the unit price
//! snapshotted from the catalog where the draft left it unset or zero.

use std::collections::HashMap;

use common::{ClientId, ProductId};
use serde::{Deserialize, Serialize};

use crate::catalog::{Product, check_price};
use crate::error::{DomainError, Shortfall, StockShortage, ValidationErrors};
use crate::order::LineItem;
use crate::value_objects::Money;

/// A proposed order as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub client_id: ClientId,
    #[serde(default)]
    pub note: Option<String>,
    pub lines: Vec<LineDraft>,
}

impl OrderDraft {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            note: None,
            lines: Vec::new(),
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Adds a line priced from the catalog.
    pub fn line(mut self, product_id: ProductId, quantity: i64) -> Self {
        self.lines.push(LineDraft::new(product_id, quantity));
        self
    }

    /// Adds a line with an explicit unit price.
    pub fn priced_line(mut self, product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        self.lines.push(LineDraft::new(product_id, quantity).unit_price(unit_price));
        self
    }

    /// Distinct products referenced by the draft, in first-seen order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids = Vec::new();
        for line in &self.lines {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id);
            }
        }
        ids
    }
}

/// One proposed line.
///
/// The quantity is kept as submitted so out-of-range values surface as
/// field errors on the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<Money>,
}

impl LineDraft {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn unit_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    /// The quantity as a line item holds it, if it is in range.
    fn checked_quantity(&self) -> Option<u32> {
        u32::try_from(self.quantity).ok().filter(|q| *q > 0)
    }

    /// The price the line asks for, treating zero as unset.
    fn explicit_price(&self) -> Option<Money> {
        self.unit_price.filter(|p| !p.is_zero())
    }
}

/// Validates a draft against the current catalog and returns the merged
/// lines to persist.
pub fn validate_entry(
    draft: &OrderDraft,
    products: &HashMap<ProductId, Product>,
) -> Result<Vec<LineItem>, DomainError> {
    check_fields(draft, products)?;
    check_lines_against_stock(draft, products)?;

    let merged = merge_lines(draft, products)?;
    check_totals_against_stock(&merged, products)?;
    check_order_total(&merged)?;

    tracing::debug!(
        lines = draft.lines.len(),
        products = merged.len(),
        "order entry validated"
    );
    Ok(merged)
}

fn check_fields(
    draft: &OrderDraft,
    products: &HashMap<ProductId, Product>,
) -> Result<(), DomainError> {
    let mut errors = ValidationErrors::new();

    if draft.lines.is_empty() {
        errors.add("lines", "an order needs at least one line item");
    }

    for (i, line) in draft.lines.iter().enumerate() {
        match products.get(&line.product_id) {
            None => errors.add(format!("lines[{i}].product"), "unknown product"),
            Some(product) if !product.active => errors.add(
                format!("lines[{i}].product"),
                format!("{product} is not available"),
            ),
            Some(_) => {}
        }
        if line.quantity <= 0 {
            errors.add(format!("lines[{i}].quantity"), "quantity must be greater than 0");
        } else if line.checked_quantity().is_none() {
            errors.add(format!("lines[{i}].quantity"), format!("must be at most {}", u32::MAX));
        }
        if let Some(price) = line.unit_price {
            check_price(&mut errors, format!("lines[{i}].unit_price"), price);
        }
    }

    errors.into_result()
}

fn check_lines_against_stock(
    draft: &OrderDraft,
    products: &HashMap<ProductId, Product>,
) -> Result<(), DomainError> {
    let shortfalls: Vec<Shortfall> = draft
        .lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let product = products.get(&line.product_id)?;
            (line.quantity > i64::from(product.stock)).then(|| Shortfall {
                product_id: product.id,
                product: product.label(),
                requested: line.quantity.unsigned_abs(),
                available: product.stock,
                line: Some(i),
            })
        })
        .collect();

    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(StockShortage::new(shortfalls).into())
    }
}

/// Collapses repeated product lines into one, summing quantities.
///
/// Repeated lines may leave the price unset, but two different explicit
/// prices for the same product are rejected on the later line.
fn merge_lines(
    draft: &OrderDraft,
    products: &HashMap<ProductId, Product>,
) -> Result<Vec<LineItem>, DomainError> {
    let mut merged: Vec<LineItem> = Vec::new();
    let mut explicit: HashMap<ProductId, Money> = HashMap::new();
    let mut errors = ValidationErrors::new();

    for (i, line) in draft.lines.iter().enumerate() {
        let quantity = line.checked_quantity().ok_or_else(|| {
            DomainError::Validation(ValidationErrors::single(
                format!("lines[{i}].quantity"),
                "quantity must be greater than 0",
            ))
        })?;
        if let Some(price) = line.explicit_price() {
            match explicit.get(&line.product_id) {
                Some(first) if *first != price => errors.add(
                    format!("lines[{i}].unit_price"),
                    format!("conflicts with unit price {first} given earlier for the same product"),
                ),
                _ => {
                    explicit.insert(line.product_id, price);
                }
            }
        }

        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(quantity).ok_or_else(|| {
                    DomainError::Validation(ValidationErrors::single(
                        format!("lines[{i}].quantity"),
                        "combined quantity is too large",
                    ))
                })?;
            }
            None => merged.push(LineItem::new(line.product_id, quantity, Money::zero())),
        }
    }
    errors.into_result()?;

    for item in &mut merged {
        item.unit_price = match explicit.get(&item.product_id) {
            Some(price) => *price,
            None => products
                .get(&item.product_id)
                .map(|p| p.price)
                .unwrap_or_default(),
        };
    }
    Ok(merged)
}

fn check_totals_against_stock(
    merged: &[LineItem],
    products: &HashMap<ProductId, Product>,
) -> Result<(), DomainError> {
    let shortfalls: Vec<Shortfall> = merged
        .iter()
        .filter_map(|item| {
            let product = products.get(&item.product_id)?;
            (item.quantity > product.stock).then(|| Shortfall {
                product_id: product.id,
                product: product.label(),
                requested: item.quantity as u64,
                available: product.stock,
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

fn check_order_total(merged: &[LineItem]) -> Result<(), DomainError> {
    let total = merged.iter().try_fold(Money::zero(), |total, item| {
        item.unit_price
            .checked_multiply(item.quantity)
            .and_then(|subtotal| total.checked_add(subtotal))
    });

    match total {
        Some(_) => Ok(()),
        None => Err(DomainError::Validation(ValidationErrors::single(
            "lines",
            "order total is too large",
        ))),
    }
}
