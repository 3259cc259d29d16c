use std::collections::HashMap;

use async_trait::async_trait;
use common::{ClientId, OrderId, Page, ProductId};
use domain::{Client, Order, Product, ProductUpdate, Transition};

use crate::{ClientQuery, OrderQuery, ProductQuery, Result, StoreError};

/// Core trait for store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Every write is
/// all-or-nothing; a failed call leaves the store as it was.
#[async_trait]
pub trait SalesStore: Send + Sync {
    /// Inserts a validated client.
    async fn insert_client(&self, client: Client) -> Result<Client>;

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>>;

    /// Lists clients ordered by name.
    async fn list_clients(&self, query: ClientQuery) -> Result<Page<Client>>;

    /// Deletes a client.
    ///
    /// Fails with `Referenced` while any order points at the client.
    async fn delete_client(&self, id: ClientId) -> Result<()>;

    /// Inserts a validated product.
    ///
    /// Fails with `DuplicateSku` if any product, active or not, has the SKU.
    async fn insert_product(&self, product: Product) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads several products at once. Unknown ids are left out.
    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>>;

    /// Updates catalog fields. Stock is not editable here.
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product>;

    /// Lists products ordered by name.
    async fn list_products(&self, query: ProductQuery) -> Result<Page<Product>>;

    /// Deletes a product.
    ///
    /// Fails with `Referenced` while any order line points at the product.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    /// Inserts an order together with its lines.
    ///
    /// Fails with `NotFound` if the client or a product does not exist and
    /// with `DuplicateLine` if two lines share a product.
    async fn insert_order(&self, order: Order) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders, most recent first.
    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>>;

    /// Deletes an order and its lines.
    async fn delete_order(&self, id: OrderId) -> Result<()>;

    /// Commits an order transition atomically.
    ///
    /// Within one transaction or critical section:
    /// 1. the order must still be in `transition.from`, else `StateConflict`
    /// 2. every decrement must be covered by current stock, else
    ///    `InsufficientStock` listing every shortfall
    /// 3. all movements are applied and the order moves to `transition.to`
    ///
    /// Returns the order as committed.
    async fn apply_transition(&self, transition: &Transition) -> Result<Order>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait SalesStoreExt: SalesStore {
    /// Loads an order or fails with `NotFound`.
    async fn require_order(&self, id: OrderId) -> Result<Order> {
        self.get_order(id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    /// Loads a product or fails with `NotFound`.
    async fn require_product(&self, id: ProductId) -> Result<Product> {
        self.get_product(id)
            .await?
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    /// Checks if a client exists.
    async fn client_exists(&self, id: ClientId) -> Result<bool> {
        Ok(self.get_client(id).await?.is_some())
    }
}

// Blanket implementation for all SalesStore implementations
impl<T: SalesStore + ?Sized> SalesStoreExt for T {}
