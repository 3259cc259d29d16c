//! Client endpoints. Reading clients requires the `view_client` capability.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::ClientId;
use domain::{Client, NewClient};
use serde::{Deserialize, Serialize};
use store::{ClientQuery, SalesStore};

use super::{AppState, PageResponse, capabilities, parse_id};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ListClientsParams {
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub active: Option<bool>,
}

#[derive(Serialize)]
pub struct ClientResponse {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub active: bool,
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id.to_string(),
            name: client.name,
            email: client.email,
            phone: client.phone,
            address: client.address,
            active: client.active,
        }
    }
}

/// GET /clients — active clients by name, 20 per page.
#[tracing::instrument(skip(state, headers, params))]
pub async fn list<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Query(params): Query<ListClientsParams>,
) -> Result<Json<PageResponse<ClientResponse>>, ApiError> {
    let mut query = ClientQuery::new().page(params.page.unwrap_or(1));
    if let Some(search) = params.search {
        query = query.search(search);
    }

    let page = state
        .catalog
        .list_clients(&capabilities(&headers), query)
        .await?;
    Ok(Json(PageResponse::from_page(page, ClientResponse::from)))
}

/// POST /clients
#[tracing::instrument(skip(state, req))]
pub async fn create<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>), ApiError> {
    let new = NewClient {
        name: req.name,
        email: req.email,
        phone: req.phone,
        address: req.address,
        active: req.active.unwrap_or(true),
    };

    let client = state.catalog.create_client(new).await?;
    Ok((StatusCode::CREATED, Json(client.into())))
}

/// GET /clients/{id}
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let id: ClientId = parse_id("client", &id)?;
    let client = state.catalog.get_client(&capabilities(&headers), id).await?;
    Ok(Json(client.into()))
}

/// DELETE /clients/{id} — fails while the client has orders.
#[tracing::instrument(skip(state))]
pub async fn delete<S: SalesStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ClientId = parse_id("client", &id)?;
    state.catalog.delete_client(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
