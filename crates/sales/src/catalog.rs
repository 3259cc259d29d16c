//! Catalog service for clients and products.

use common::{ClientId, Page, ProductId};
use domain::{Client, NewClient, NewProduct, Product, ProductUpdate};
use store::{ClientQuery, ProductQuery, SalesStore, SalesStoreExt};

use crate::access::{Capabilities, Capability};
use crate::error::{Result, SalesError};

/// Service for managing clients and products.
#[derive(Clone)]
pub struct CatalogService<S: SalesStore> {
    store: S,
}

impl<S: SalesStore> CatalogService<S> {
    /// Creates a new catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a client.
    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create_client(&self, new: NewClient) -> Result<Client> {
        let client = Client::register(new)?;
        let client = self.store.insert_client(client).await?;
        tracing::info!(client_id = %client.id, "client created");
        Ok(client)
    }

    /// Loads a client. Requires `view_client`.
    #[tracing::instrument(skip(self, caps))]
    pub async fn get_client(&self, caps: &Capabilities, id: ClientId) -> Result<Client> {
        caps.require(Capability::ViewClient)?;
        self.store
            .get_client(id)
            .await?
            .ok_or_else(|| SalesError::NotFound {
                entity: "client",
                id: id.to_string(),
            })
    }

    /// Lists clients by name. Requires `view_client`.
    #[tracing::instrument(skip(self, caps))]
    pub async fn list_clients(&self, caps: &Capabilities, query: ClientQuery) -> Result<Page<Client>> {
        caps.require(Capability::ViewClient)?;
        Ok(self.store.list_clients(query).await?)
    }

    /// Deletes a client that has no orders.
    #[tracing::instrument(skip(self))]
    pub async fn delete_client(&self, id: ClientId) -> Result<()> {
        self.store.delete_client(id).await?;
        tracing::info!(client_id = %id, "client deleted");
        Ok(())
    }

    /// Registers a product with its opening stock.
    #[tracing::instrument(skip(self, new), fields(sku = %new.sku))]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let product = Product::register(new)?;
        let product = self.store.insert_product(product).await?;
        tracing::info!(product_id = %product.id, stock = product.stock, "product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        Ok(self.store.require_product(id).await?)
    }

    /// Changes name, price or active flag. Stock only moves through orders.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        update.validate()?;
        Ok(self.store.update_product(id, update).await?)
    }

    /// Lists products by name.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, query: ProductQuery) -> Result<Page<Product>> {
        Ok(self.store.list_products(query).await?)
    }

    /// Deletes a product that no order line references.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}
