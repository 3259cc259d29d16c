//! Catalog entities: clients and products.
//!
//! Catalog records carry no business logic beyond field validation. Stock is
//! set when a product is registered and afterwards only moves through the
//! stock ledger.

use common::{ClientId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, ValidationErrors};
use crate::value_objects::{MAX_PRICE_CENTS, Money};

const MAX_NAME_LEN: usize = 200;
const MAX_SKU_LEN: usize = 50;
const MAX_PHONE_LEN: usize = 30;

/// A customer that can place orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub active: bool,
}

impl Client {
    /// Validates a new client and assigns it an identifier.
    pub fn register(new: NewClient) -> Result<Client, DomainError> {
        new.validate()?;
        Ok(Client {
            id: ClientId::new(),
            name: new.name.trim().to_string(),
            email: non_blank(new.email),
            phone: non_blank(new.phone),
            address: non_blank(new.address),
            active: new.active,
        })
    }

    /// Case-insensitive substring match on name, email and phone.
    pub fn matches_search(&self, text: &str) -> bool {
        let needle = text.to_lowercase();
        contains_folded(&self.name, &needle)
            || self.email.as_deref().is_some_and(|e| contains_folded(e, &needle))
            || self.phone.as_deref().is_some_and(|p| contains_folded(p, &needle))
    }
}

impl std::fmt::Display for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Input for registering a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl NewClient {
    /// An active client with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            address: None,
            active: true,
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            let well_formed = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !well_formed {
                errors.add("email", "enter a valid email address");
            }
        }
        if let Some(phone) = &self.phone
            && phone.trim().chars().count() > MAX_PHONE_LEN
        {
            errors.add("phone", format!("must be at most {MAX_PHONE_LEN} characters"));
        }
        errors.into_result()
    }
}

/// A sellable product with its stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub active: bool,
}

impl Product {
    /// Validates a new product and assigns it an identifier.
    ///
    /// SKU uniqueness is enforced by the store.
    pub fn register(new: NewProduct) -> Result<Product, DomainError> {
        new.validate()?;
        Ok(Product {
            id: ProductId::new(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            price: new.price,
            // validated to fit above
            stock: new.stock as u32,
            active: new.active,
        })
    }

    /// Display label, `"<sku> - <name>"`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.sku, self.name)
    }

    /// Case-insensitive substring match on name and SKU.
    pub fn matches_search(&self, text: &str) -> bool {
        let needle = text.to_lowercase();
        contains_folded(&self.name, &needle) || contains_folded(&self.sku, &needle)
    }

    /// Applies a validated update. Stock is never touched here.
    pub fn apply_update(&mut self, update: &ProductUpdate) -> Result<(), DomainError> {
        update.validate()?;
        if let Some(name) = &update.name {
            self.name = name.trim().to_string();
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        Ok(())
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.sku, self.name)
    }
}

/// Input for registering a product.
///
/// `stock` is signed so that a negative request is reported as a field
/// error rather than rejected by the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl NewProduct {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Money, stock: i64) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            price,
            stock,
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "sku", &self.sku, MAX_SKU_LEN);
        check_required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        check_price(&mut errors, "price", self.price);
        if self.stock < 0 {
            errors.add("stock", "must not be negative");
        } else if self.stock > u32::MAX as i64 {
            errors.add("stock", format!("must be at most {}", u32::MAX));
        }
        errors.into_result()
    }
}

/// Partial update of a product's catalog fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ProductUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_required(&mut errors, "name", name, MAX_NAME_LEN);
        }
        if let Some(price) = self.price {
            check_price(&mut errors, "price", price);
        }
        errors.into_result()
    }
}

fn default_active() -> bool {
    true
}

pub(crate) fn check_price(errors: &mut ValidationErrors, field: impl Into<String>, price: Money) {
    if price.is_negative() {
        errors.add(field, "must not be negative");
    } else if !price.is_valid_price() {
        errors.add(field, format!("must be at most {}", Money::from_cents(MAX_PRICE_CENTS)));
    }
}

fn check_required(errors: &mut ValidationErrors, field: &str, value: &str, max_len: usize) {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "is required");
    } else if value.chars().count() > max_len {
        errors.add(field, format!("must be at most {max_len} characters"));
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn contains_folded(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}
