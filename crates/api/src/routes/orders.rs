//! Order entry and stock ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ClientId, OrderId, ProductId};
use domain::{LineDraft, Order, OrderDraft, OrderState, ValidationErrors};
use sales::{OrderOutcome, SalesError};
use serde::{Deserialize, Serialize};
use store::{OrderQuery, SalesStore};

use super::{AppState, PageResponse, money_field, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub state: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub client_id: String,
    pub note: Option<String>,
    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    /// Any JSON number; fractions and out-of-range values are reported
    /// against the line.
    pub quantity: serde_json::Number,
    /// Unset or zero takes the catalog price.
    pub unit_price: Option<String>,
    pub unit_price_cents: Option<i64>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub label: String,
    pub client_id: String,
    pub created_at: String,
    pub state: String,
    pub note: Option<String>,
    pub lines: Vec<OrderLineResponse>,
    pub total_quantity: u64,
    pub total_cents: i64,
    pub total: String,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub label: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub label: String,
    pub client_id: String,
    pub created_at: String,
    pub state: String,
    pub line_count: usize,
    pub total_cents: i64,
}

impl From<Order> for OrderSummaryResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id().to_string(),
            label: order.label(),
            client_id: order.client_id().to_string(),
            created_at: order.created_at().to_rfc3339(),
            state: order.state().to_string(),
            line_count: order.lines().len(),
            total_cents: order.total().cents(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderActionResponse {
    pub message: String,
    pub order: OrderResponse,
}

// -- Handlers --

/// GET /orders — newest first, 20 per page, optionally by state or client.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<PageResponse<OrderSummaryResponse>>, ApiError> {
    let mut query = OrderQuery::new().page(params.page.unwrap_or(1));
    if let Some(raw) = params.state.as_deref() {
        let order_state: OrderState = raw
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
        query = query.state(order_state);
    }
    if let Some(raw) = params.client_id.as_deref() {
        let client_id: ClientId = parse_id("client", raw)?;
        query = query.client(client_id);
    }

    let page = state.orders.list_orders(query).await?;
    Ok(Json(PageResponse::from_page(page, OrderSummaryResponse::from)))
}

/// POST /orders — validate and persist a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderActionResponse>), ApiError> {
    let client_id: ClientId = parse_id("client", &req.client_id)?;
    let mut draft = OrderDraft::new(client_id);
    draft.note = req.note;
    let mut errors = ValidationErrors::new();
    for (i, line) in req.lines.iter().enumerate() {
        let product_id: ProductId = parse_id("product", &line.product_id)?;
        let quantity = line.quantity.as_i64().unwrap_or_else(|| {
            errors.add(format!("lines[{i}].quantity"), "must be a whole number");
            0
        });
        let mut draft_line = LineDraft::new(product_id, quantity);
        let field = format!("lines[{i}].unit_price");
        if let Some(price) = money_field(
            &mut errors,
            &field,
            line.unit_price.as_deref(),
            line.unit_price_cents,
        ) {
            draft_line = draft_line.unit_price(price);
        }
        draft.lines.push(draft_line);
    }
    errors.into_result().map_err(SalesError::from)?;

    let outcome = state.orders.create_order(draft).await?;
    let response = action_response(&state, outcome).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id} — order with its lines and total.
#[tracing::instrument(skip(state))]
pub async fn get<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id("order", &id)?;
    let order = state.orders.get_order(id).await?;
    Ok(Json(order_response(&state, order).await?))
}

/// POST /orders/{id}/process — decrement stock and mark processed.
#[tracing::instrument(skip(state))]
pub async fn process<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderActionResponse>, ApiError> {
    let id: OrderId = parse_id("order", &id)?;
    let outcome = state.orders.process_order(id).await?;
    Ok(Json(action_response(&state, outcome).await?))
}

/// POST /orders/{id}/cancel — cancel, restoring stock if processed.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderActionResponse>, ApiError> {
    let id: OrderId = parse_id("order", &id)?;
    let outcome = state.orders.cancel_order(id).await?;
    Ok(Json(action_response(&state, outcome).await?))
}

/// DELETE /orders/{id} — remove an order and its lines.
#[tracing::instrument(skip(state))]
pub async fn delete<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: OrderId = parse_id("order", &id)?;
    state.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn action_response<S: SalesStore + Clone + 'static>(
    state: &AppState<S>,
    outcome: OrderOutcome,
) -> Result<OrderActionResponse, ApiError> {
    Ok(OrderActionResponse {
        message: outcome.message,
        order: order_response(state, outcome.order).await?,
    })
}

async fn order_response<S: SalesStore + Clone + 'static>(
    state: &AppState<S>,
    order: Order,
) -> Result<OrderResponse, ApiError> {
    let labels = state.orders.line_labels(&order).await?;
    let lines = order
        .lines()
        .iter()
        .zip(labels)
        .map(|(line, label)| OrderLineResponse {
            product_id: line.product_id.to_string(),
            label,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal().cents(),
        })
        .collect();

    Ok(OrderResponse {
        id: order.id().to_string(),
        label: order.label(),
        client_id: order.client_id().to_string(),
        created_at: order.created_at().to_rfc3339(),
        state: order.state().to_string(),
        note: order.note().map(String::from),
        lines,
        total_quantity: order.total_quantity(),
        total_cents: order.total().cents(),
        total: order.total().to_string(),
    })
}
