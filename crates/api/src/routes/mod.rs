//! HTTP route handlers.

pub mod clients;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use std::str::FromStr;

use axum::http::HeaderMap;
use common::Page;
use domain::{Money, ValidationErrors};
use sales::{Capabilities, CatalogService, OrderService};
use serde::Serialize;
use store::SalesStore;

use crate::error::ApiError;

/// Header carrying the caller's capabilities, comma-separated.
pub const CAPABILITIES_HEADER: &str = "x-capabilities";

/// Shared application state accessible from all handlers.
pub struct AppState<S: SalesStore> {
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
}

/// One page of a listing.
#[derive(Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
}

impl<T> PageResponse<T> {
    pub fn from_page<U>(page: Page<U>, convert: impl FnMut(U) -> T) -> Self {
        let total_pages = page.total_pages();
        let has_next = page.has_next();
        let page = page.map(convert);
        Self {
            items: page.items,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages,
            has_next,
        }
    }
}

/// Reads the caller's capabilities from the request headers.
pub fn capabilities(headers: &HeaderMap) -> Capabilities {
    headers
        .get(CAPABILITIES_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(Capabilities::parse_list)
        .unwrap_or_default()
}

/// Reads an amount given either as a decimal string (`"5.00"`) or as
/// integer cents. Problems are recorded against `field`.
pub fn money_field(
    errors: &mut ValidationErrors,
    field: &str,
    decimal: Option<&str>,
    cents: Option<i64>,
) -> Option<Money> {
    match (decimal, cents) {
        (Some(_), Some(_)) => {
            errors.add(field, format!("give either {field} or {field}_cents, not both"));
            None
        }
        (Some(raw), None) => match raw.parse::<Money>() {
            Ok(money) => Some(money),
            Err(e) => {
                errors.add(field, e.to_string());
                None
            }
        },
        (None, cents) => cents.map(Money::from_cents),
    }
}

/// Parses an id from a path or query parameter.
pub fn parse_id<T>(kind: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} id: {e}")))
}
