//! Integration tests for order entry and the stock ledger protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{ClientId, OrderId, Page, ProductId};
use domain::{
    Client, Money, NewClient, NewProduct, Order, OrderDraft, OrderState, Product, ProductUpdate,
    Transition,
};
use sales::{CatalogService, OrderService, SalesError};
use store::{
    ClientQuery, InMemoryStore, OrderQuery, ProductQuery, SalesStore, SalesStoreExt, StoreError,
};

struct Shop<S: SalesStore> {
    catalog: CatalogService<S>,
    orders: OrderService<S>,
    store: S,
}

impl<S: SalesStore + Clone> Shop<S> {
    fn over(store: S) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    async fn client(&self) -> Client {
        self.catalog
            .create_client(NewClient::named("Ana").email("ana@example.com"))
            .await
            .unwrap()
    }

    async fn product(&self, sku: &str, cents: i64, stock: i64) -> Product {
        self.catalog
            .create_product(NewProduct::new(sku, sku, Money::from_cents(cents), stock))
            .await
            .unwrap()
    }

    async fn stock(&self, product: &Product) -> u32 {
        self.store.require_product(product.id).await.unwrap().stock
    }

    async fn state(&self, order_id: OrderId) -> OrderState {
        self.store.require_order(order_id).await.unwrap().state()
    }
}

fn shop() -> Shop<InMemoryStore> {
    Shop::over(InMemoryStore::new())
}

#[tokio::test]
async fn scenario_create_process_cancel() {
    let shop = shop();
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 10).await;

    let created = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 3))
        .await
        .unwrap();
    let order_id = created.order.id();
    assert_eq!(created.order.lines()[0].unit_price.to_string(), "5.00");
    assert_eq!(created.order.total().to_string(), "15.00");
    assert_eq!(created.order.state(), OrderState::New);
    assert_eq!(shop.stock(&p1).await, 10);

    let processed = shop.orders.process_order(order_id).await.unwrap();
    assert_eq!(processed.order.state(), OrderState::Processed);
    assert_eq!(shop.stock(&p1).await, 7);

    let cancelled = shop.orders.cancel_order(order_id).await.unwrap();
    assert_eq!(cancelled.order.state(), OrderState::Cancelled);
    assert_eq!(shop.stock(&p1).await, 10);
}

#[tokio::test]
async fn cancel_twice_equals_cancel_once() {
    let shop = shop();
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 10).await;
    let order_id = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 4))
        .await
        .unwrap()
        .order
        .id();
    shop.orders.process_order(order_id).await.unwrap();

    shop.orders.cancel_order(order_id).await.unwrap();
    let after_once = shop.stock(&p1).await;

    let again = shop.orders.cancel_order(order_id).await.unwrap();
    assert_eq!(again.order.state(), OrderState::Cancelled);
    assert_eq!(shop.stock(&p1).await, after_once);
    assert_eq!(after_once, 10);
}

#[tokio::test]
async fn entry_rejects_quantity_above_stock_without_persisting() {
    let shop = shop();
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 2).await;

    let result = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 5))
        .await;

    let Err(SalesError::InsufficientStock(shortage)) = result else {
        panic!("expected insufficient stock");
    };
    let shortfall = shortage.for_product(p1.id).unwrap();
    assert_eq!(shortfall.requested, 5);
    assert_eq!(shortfall.available, 2);
    assert!(shop.orders.list_orders(OrderQuery::new()).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn repeated_lines_are_checked_in_aggregate() {
    let shop = shop();
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 4).await;

    let result = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 2).line(p1.id, 3))
        .await;

    let Err(SalesError::InsufficientStock(shortage)) = result else {
        panic!("expected insufficient stock");
    };
    let shortfall = shortage.for_product(p1.id).unwrap();
    assert_eq!(shortfall.requested, 5);
    assert_eq!(shortfall.available, 4);
}

#[tokio::test]
async fn repeated_lines_are_merged_when_stock_allows() {
    let shop = shop();
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 10).await;

    let created = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 2).line(p1.id, 3))
        .await
        .unwrap();

    assert_eq!(created.order.lines().len(), 1);
    assert_eq!(created.order.lines()[0].quantity, 5);
}

#[tokio::test]
async fn inactive_product_cannot_be_ordered() {
    let shop = shop();
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 10).await;
    shop.catalog
        .update_product(
            p1.id,
            ProductUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 1))
        .await;
    assert!(matches!(result, Err(SalesError::Validation(e)) if e.has_field("lines[0].product")));
}

#[tokio::test]
async fn process_failure_leaves_every_product_untouched() {
    let shop = shop();
    let client = shop.client().await;
    let pen = shop.product("PEN", 100, 5).await;
    let pad = shop.product("PAD", 100, 3).await;

    let first = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(pen.id, 1).line(pad.id, 3))
        .await
        .unwrap();
    let second = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(pen.id, 2).line(pad.id, 1))
        .await
        .unwrap();
    shop.orders.process_order(first.order.id()).await.unwrap();

    let result = shop.orders.process_order(second.order.id()).await;

    let Err(SalesError::InsufficientStock(shortage)) = result else {
        panic!("expected insufficient stock");
    };
    assert_eq!(shortage.shortfalls().len(), 1);
    assert_eq!(shortage.shortfalls()[0].product_id, pad.id);
    assert_eq!(shop.stock(&pen).await, 4);
    assert_eq!(shop.stock(&pad).await, 0);
    assert_eq!(shop.state(second.order.id()).await, OrderState::New);
}

#[tokio::test]
async fn deleting_a_client_with_orders_changes_nothing() {
    let shop = shop();
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 10).await;
    let order_id = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 1))
        .await
        .unwrap()
        .order
        .id();

    let result = shop.catalog.delete_client(client.id).await;

    assert!(matches!(result, Err(SalesError::ReferentialIntegrity(_))));
    assert!(shop.store.client_exists(client.id).await.unwrap());
    assert_eq!(shop.state(order_id).await, OrderState::New);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_processing_sells_stock_once() {
    let shop = Arc::new(shop());
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 5).await;

    let mut order_ids = Vec::new();
    for _ in 0..2 {
        let created = shop
            .orders
            .create_order(OrderDraft::new(client.id).line(p1.id, 3))
            .await
            .unwrap();
        order_ids.push(created.order.id());
    }

    let handles: Vec<_> = order_ids
        .iter()
        .map(|&id| {
            let orders = shop.orders.clone();
            tokio::spawn(async move { orders.process_order(id).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(SalesError::InsufficientStock(_))))
    );
    assert_eq!(shop.stock(&p1).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_restore_stock_once() {
    let shop = Arc::new(shop());
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 6).await;
    let order_id = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 6))
        .await
        .unwrap()
        .order
        .id();
    shop.orders.process_order(order_id).await.unwrap();
    assert_eq!(shop.stock(&p1).await, 0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orders = shop.orders.clone();
            tokio::spawn(async move { orders.cancel_order(order_id).await })
        })
        .collect();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.order.state(), OrderState::Cancelled);
    }

    assert_eq!(shop.stock(&p1).await, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_never_goes_negative_under_load() {
    let shop = Arc::new(shop());
    let client = shop.client().await;
    let pen = shop.product("PEN", 100, 7).await;
    let pad = shop.product("PAD", 100, 4).await;

    let mut order_ids = Vec::new();
    for i in 0..12i64 {
        let created = shop
            .orders
            .create_order(
                OrderDraft::new(client.id)
                    .line(pen.id, 1 + i % 2)
                    .line(pad.id, 1),
            )
            .await
            .unwrap();
        order_ids.push(created.order.id());
    }

    let handles: Vec<_> = order_ids
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let orders = shop.orders.clone();
            tokio::spawn(async move {
                let processed = orders.process_order(id).await;
                if i % 3 == 0 {
                    let _ = orders.cancel_order(id).await;
                }
                processed
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    // Stock equals the opening stock minus what processed orders hold
    let mut held_pen = 0;
    let mut held_pad = 0;
    for id in &order_ids {
        let order = shop.store.require_order(*id).await.unwrap();
        if order.state().holds_stock() {
            held_pen += order.line_for(pen.id).unwrap().quantity;
            held_pad += order.line_for(pad.id).unwrap().quantity;
        }
    }
    assert_eq!(shop.stock(&pen).await + held_pen, 7);
    assert_eq!(shop.stock(&pad).await + held_pad, 4);
}

/// Store that lets another writer win the race once: the first transition
/// it sees is preceded by a competing transition on the same order.
#[derive(Clone)]
struct Interloper {
    inner: InMemoryStore,
    competing: fn(&Order) -> Option<Transition>,
    fired: Arc<AtomicBool>,
}

impl Interloper {
    fn new(inner: InMemoryStore, competing: fn(&Order) -> Option<Transition>) -> Self {
        Self {
            inner,
            competing,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl SalesStore for Interloper {
    async fn insert_client(&self, client: Client) -> store::Result<Client> {
        self.inner.insert_client(client).await
    }

    async fn get_client(&self, id: ClientId) -> store::Result<Option<Client>> {
        self.inner.get_client(id).await
    }

    async fn list_clients(&self, query: ClientQuery) -> store::Result<Page<Client>> {
        self.inner.list_clients(query).await
    }

    async fn delete_client(&self, id: ClientId) -> store::Result<()> {
        self.inner.delete_client(id).await
    }

    async fn insert_product(&self, product: Product) -> store::Result<Product> {
        self.inner.insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> store::Result<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn get_products(&self, ids: &[ProductId]) -> store::Result<HashMap<ProductId, Product>> {
        self.inner.get_products(ids).await
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> store::Result<Product> {
        self.inner.update_product(id, update).await
    }

    async fn list_products(&self, query: ProductQuery) -> store::Result<Page<Product>> {
        self.inner.list_products(query).await
    }

    async fn delete_product(&self, id: ProductId) -> store::Result<()> {
        self.inner.delete_product(id).await
    }

    async fn insert_order(&self, order: Order) -> store::Result<Order> {
        self.inner.insert_order(order).await
    }

    async fn get_order(&self, id: OrderId) -> store::Result<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn list_orders(&self, query: OrderQuery) -> store::Result<Page<Order>> {
        self.inner.list_orders(query).await
    }

    async fn delete_order(&self, id: OrderId) -> store::Result<()> {
        self.inner.delete_order(id).await
    }

    async fn apply_transition(&self, transition: &Transition) -> store::Result<Order> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let current = self.inner.require_order(transition.order_id).await?;
            if let Some(competing) = (self.competing)(&current) {
                self.inner.apply_transition(&competing).await?;
            }
        }
        self.inner.apply_transition(transition).await
    }
}

#[tokio::test]
async fn cancel_replans_after_losing_race_to_process() {
    let shop = Shop::over(Interloper::new(InMemoryStore::new(), |order| {
        order.process().ok()
    }));
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 5).await;
    let order_id = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 5))
        .await
        .unwrap()
        .order
        .id();

    // Planned from `new`, but the order is processed before the commit. The
    // retry sees `processed` and gives the stock back.
    let outcome = shop.orders.cancel_order(order_id).await.unwrap();

    assert_eq!(outcome.order.state(), OrderState::Cancelled);
    assert_eq!(shop.stock(&p1).await, 5);
}

#[tokio::test]
async fn process_replans_after_losing_race_to_cancel() {
    let shop = Shop::over(Interloper::new(InMemoryStore::new(), Order::cancel));
    let client = shop.client().await;
    let p1 = shop.product("P1", 500, 5).await;
    let order_id = shop
        .orders
        .create_order(OrderDraft::new(client.id).line(p1.id, 2))
        .await
        .unwrap()
        .order
        .id();

    let result = shop.orders.process_order(order_id).await;

    assert!(matches!(
        result,
        Err(SalesError::InvalidTransition {
            current_state: OrderState::Cancelled,
            ..
        })
    ));
    assert_eq!(shop.stock(&p1).await, 5);
}
