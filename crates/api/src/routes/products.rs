//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::{NewProduct, Product, ProductUpdate, ValidationErrors};
use sales::SalesError;
use serde::{Deserialize, Serialize};
use store::{ProductQuery, SalesStore};

use super::{AppState, PageResponse, money_field, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ListProductsParams {
    pub search: Option<String>,
    pub page: Option<u32>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    /// Decimal amount such as `"5.00"`.
    pub price: Option<String>,
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub stock: i64,
    pub active: Option<bool>,
}

/// Stock is not accepted here; it only moves through orders.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<String>,
    pub price_cents: Option<i64>,
    pub active: Option<bool>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub label: String,
    pub price_cents: i64,
    pub price: String,
    pub stock: u32,
    pub active: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            label: product.label(),
            price_cents: product.price.cents(),
            price: product.price.to_string(),
            stock: product.stock,
            active: product.active,
            sku: product.sku,
            name: product.name,
        }
    }
}

// -- Handlers --

/// GET /products — active products by name, 12 per page.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListProductsParams>,
) -> Result<Json<PageResponse<ProductResponse>>, ApiError> {
    let mut query = ProductQuery::new().page(params.page.unwrap_or(1));
    if let Some(search) = params.search {
        query = query.search(search);
    }
    if params.include_inactive {
        query = query.include_inactive();
    }

    let page = state.catalog.list_products(query).await?;
    Ok(Json(PageResponse::from_page(page, ProductResponse::from)))
}

/// POST /products — register a product with its opening stock.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let mut errors = ValidationErrors::new();
    let price = money_field(&mut errors, "price", req.price.as_deref(), req.price_cents);
    if price.is_none() && errors.is_empty() {
        errors.add("price", "is required");
    }
    errors.into_result().map_err(SalesError::from)?;

    let price = price.unwrap_or_default();
    let mut new = NewProduct::new(req.sku, req.name, price, req.stock);
    if req.active == Some(false) {
        new = new.inactive();
    }

    let product = state.catalog.create_product(new).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id: ProductId = parse_id("product", &id)?;
    let product = state.catalog.get_product(id).await?;
    Ok(Json(product.into()))
}

/// PATCH /products/{id} — change name, price or active flag.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id: ProductId = parse_id("product", &id)?;
    let mut errors = ValidationErrors::new();
    let price = money_field(&mut errors, "price", req.price.as_deref(), req.price_cents);
    errors.into_result().map_err(SalesError::from)?;

    let update = ProductUpdate {
        name: req.name,
        price,
        active: req.active,
    };

    let product = state.catalog.update_product(id, update).await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id} — fails while any order line references it.
#[tracing::instrument(skip(state))]
pub async fn delete<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ProductId = parse_id("product", &id)?;
    state.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
