use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ClientId, OrderId, Page, ProductId};
use domain::{Client, Order, Product, ProductUpdate, Transition, apply_movements};
use tokio::sync::RwLock;

use crate::{
    ClientQuery, OrderQuery, ProductQuery, Result, StoreError,
    store::SalesStore,
};

#[derive(Default)]
struct State {
    clients: HashMap<ClientId, Client>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store implementation for tests and local runs.
///
/// All data sits behind one lock. Transitions take the write lock for their
/// whole check-and-apply section, so they are serialized against each other
/// and against every other write.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.products.clear();
        state.clients.clear();
    }
}

#[async_trait]
impl SalesStore for InMemoryStore {
    async fn insert_client(&self, client: Client) -> Result<Client> {
        let mut state = self.state.write().await;
        state.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        Ok(self.state.read().await.clients.get(&id).cloned())
    }

    async fn list_clients(&self, query: ClientQuery) -> Result<Page<Client>> {
        let state = self.state.read().await;
        let mut clients: Vec<_> = state
            .clients
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Page::from_sorted(clients, query.page))
    }

    async fn delete_client(&self, id: ClientId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.clients.contains_key(&id) {
            return Err(StoreError::not_found("client", id));
        }
        if state.orders.values().any(|o| o.client_id() == id) {
            return Err(StoreError::Referenced {
                entity: "client",
                id: id.to_string(),
                referenced_by: "orders",
            });
        }
        state.clients.remove(&id);
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut state = self.state.write().await;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::DuplicateSku(product.sku));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        product.apply_update(&update)?;
        Ok(product.clone())
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Page<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.sku.cmp(&b.sku)));
        Ok(Page::from_sorted(products, query.page))
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&id) {
            return Err(StoreError::not_found("product", id));
        }
        if state.orders.values().any(|o| o.references_product(id)) {
            return Err(StoreError::Referenced {
                entity: "product",
                id: id.to_string(),
                referenced_by: "order lines",
            });
        }
        state.products.remove(&id);
        Ok(())
    }

    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut state = self.state.write().await;

        if !state.clients.contains_key(&order.client_id()) {
            return Err(StoreError::not_found("client", order.client_id()));
        }

        let mut seen = Vec::with_capacity(order.lines().len());
        for line in order.lines() {
            if !state.products.contains_key(&line.product_id) {
                return Err(StoreError::not_found("product", line.product_id));
            }
            // Same constraint the relational schema enforces
            if seen.contains(&line.product_id) {
                return Err(StoreError::DuplicateLine {
                    order_id: order.id().to_string(),
                    product_id: line.product_id.to_string(),
                });
            }
            seen.push(line.product_id);
        }

        state.orders.insert(order.id(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id().cmp(&a.id()))
        });
        Ok(Page::from_sorted(orders, query.page))
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn apply_transition(&self, transition: &Transition) -> Result<Order> {
        let mut state = self.state.write().await;

        let actual = state
            .orders
            .get(&transition.order_id)
            .map(|o| o.state())
            .ok_or_else(|| StoreError::not_found("order", transition.order_id))?;

        if actual != transition.from {
            return Err(StoreError::StateConflict {
                order_id: transition.order_id,
                expected: transition.from,
                actual,
            });
        }

        // Work on copies so a rejected transition leaves nothing behind
        let mut touched: HashMap<ProductId, Product> = transition
            .product_ids()
            .into_iter()
            .filter_map(|id| state.products.get(&id).map(|p| (id, p.clone())))
            .collect();
        apply_movements(&transition.movements, &mut touched)?;

        state.products.extend(touched);
        let order = state
            .orders
            .get_mut(&transition.order_id)
            .ok_or_else(|| StoreError::not_found("order", transition.order_id))?;
        order.apply(transition);
        tracing::debug!(
            order_id = %transition.order_id,
            action = transition.action(),
            "Transition committed"
        );
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SalesStoreExt;
    use domain::{LineItem, Money, NewClient, NewProduct, OrderState};

    async fn seed_client(store: &InMemoryStore) -> Client {
        let client = Client::register(NewClient::named("Ana")).unwrap();
        store.insert_client(client).await.unwrap()
    }

    async fn seed_product(store: &InMemoryStore, sku: &str, stock: i64) -> Product {
        let product =
            Product::register(NewProduct::new(sku, sku, Money::from_cents(1000), stock)).unwrap();
        store.insert_product(product).await.unwrap()
    }

    async fn seed_order(store: &InMemoryStore, lines: &[(ProductId, u32)]) -> Order {
        let client = seed_client(store).await;
        let lines = lines
            .iter()
            .map(|(id, qty)| LineItem::new(*id, *qty, Money::from_cents(1000)))
            .collect();
        store
            .insert_order(Order::place(client.id, None, lines))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_sku_is_rejected() {
        let store = InMemoryStore::new();
        seed_product(&store, "SKU-1", 1).await;

        let again = Product::register(NewProduct::new("SKU-1", "Other", Money::zero(), 0)).unwrap();
        let result = store.insert_product(again).await;
        assert!(matches!(result, Err(StoreError::DuplicateSku(sku)) if sku == "SKU-1"));
    }

    #[tokio::test]
    async fn update_product_never_touches_stock() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, "SKU-1", 7).await;

        let update = ProductUpdate {
            name: Some("Renamed".to_string()),
            price: Some(Money::from_cents(250)),
            active: Some(false),
        };
        let updated = store.update_product(product.id, update).await.unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.price, Money::from_cents(250));
        assert!(!updated.active);
        assert_eq!(updated.stock, 7);
    }

    #[tokio::test]
    async fn list_products_sorted_and_paged() {
        let store = InMemoryStore::new();
        for sku in ["C", "A", "B"] {
            seed_product(&store, sku, 1).await;
        }

        let page = store
            .list_products(ProductQuery::new().per_page(2))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(page.total, 3);
        assert!(page.has_next());

        let past_end = store
            .list_products(ProductQuery::new().per_page(2).page(5))
            .await
            .unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 3);
    }

    #[tokio::test]
    async fn insert_order_requires_existing_client() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, "SKU-1", 1).await;
        let order = Order::place(
            ClientId::new(),
            None,
            vec![LineItem::new(product.id, 1, Money::zero())],
        );

        let result = store.insert_order(order).await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "client", .. })));
    }

    #[tokio::test]
    async fn insert_order_rejects_duplicate_lines() {
        let store = InMemoryStore::new();
        let client = seed_client(&store).await;
        let product = seed_product(&store, "SKU-1", 5).await;
        let order = Order::place(
            client.id,
            None,
            vec![
                LineItem::new(product.id, 1, Money::zero()),
                LineItem::new(product.id, 2, Money::zero()),
            ],
        );

        let result = store.insert_order(order).await;
        assert!(matches!(result, Err(StoreError::DuplicateLine { .. })));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn referenced_records_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, "SKU-1", 5).await;
        let order = seed_order(&store, &[(product.id, 1)]).await;

        let result = store.delete_product(product.id).await;
        assert!(matches!(result, Err(StoreError::Referenced { entity: "product", .. })));

        let result = store.delete_client(order.client_id()).await;
        assert!(matches!(result, Err(StoreError::Referenced { entity: "client", .. })));

        store.delete_order(order.id()).await.unwrap();
        store.delete_product(product.id).await.unwrap();
        store.delete_client(order.client_id()).await.unwrap();
    }

    #[tokio::test]
    async fn apply_transition_moves_stock_and_state() {
        let store = InMemoryStore::new();
        let pen = seed_product(&store, "PEN", 5).await;
        let pad = seed_product(&store, "PAD", 2).await;
        let order = seed_order(&store, &[(pen.id, 3), (pad.id, 2)]).await;

        let committed = store
            .apply_transition(&order.process().unwrap())
            .await
            .unwrap();

        assert_eq!(committed.state(), OrderState::Processed);
        assert_eq!(store.require_product(pen.id).await.unwrap().stock, 2);
        assert_eq!(store.require_product(pad.id).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn rejected_transition_changes_nothing() {
        let store = InMemoryStore::new();
        let pen = seed_product(&store, "PEN", 5).await;
        let pad = seed_product(&store, "PAD", 1).await;
        let order = seed_order(&store, &[(pen.id, 3), (pad.id, 2)]).await;

        let result = store.apply_transition(&order.process().unwrap()).await;

        let shortage = match result {
            Err(StoreError::InsufficientStock(shortage)) => shortage,
            other => panic!("expected insufficient stock, got {other:?}"),
        };
        assert_eq!(shortage.shortfalls().len(), 1);
        assert_eq!(shortage.shortfalls()[0].product_id, pad.id);
        assert_eq!(store.require_product(pen.id).await.unwrap().stock, 5);
        assert_eq!(store.require_product(pad.id).await.unwrap().stock, 1);
        assert_eq!(
            store.require_order(order.id()).await.unwrap().state(),
            OrderState::New
        );
    }

    #[tokio::test]
    async fn stale_transition_is_a_state_conflict() {
        let store = InMemoryStore::new();
        let pen = seed_product(&store, "PEN", 10).await;
        let order = seed_order(&store, &[(pen.id, 3)]).await;

        let planned = order.process().unwrap();
        store.apply_transition(&planned).await.unwrap();

        let result = store.apply_transition(&planned).await;
        assert!(matches!(
            result,
            Err(StoreError::StateConflict {
                expected: OrderState::New,
                actual: OrderState::Processed,
                ..
            })
        ));
        assert_eq!(store.require_product(pen.id).await.unwrap().stock, 7);
    }

    #[tokio::test]
    async fn cancel_of_processed_order_restores_stock() {
        let store = InMemoryStore::new();
        let pen = seed_product(&store, "PEN", 4).await;
        let order = seed_order(&store, &[(pen.id, 4)]).await;

        let processed = store
            .apply_transition(&order.process().unwrap())
            .await
            .unwrap();
        assert_eq!(store.require_product(pen.id).await.unwrap().stock, 0);

        let cancelled = store
            .apply_transition(&processed.cancel().unwrap())
            .await
            .unwrap();
        assert_eq!(cancelled.state(), OrderState::Cancelled);
        assert_eq!(store.require_product(pen.id).await.unwrap().stock, 4);
    }
}
