//! Order service: order entry and the stock ledger protocol.

use std::time::Instant;

use common::{OrderId, Page};
use domain::{DomainError, Order, OrderDraft, Transition, validate_entry};
use store::{OrderQuery, SalesStore, SalesStoreExt, StoreError};

use crate::error::{Result, SalesError};

/// Attempts per transition before a state conflict is reported as a store
/// failure.
const MAX_TRANSITION_ATTEMPTS: u32 = 3;

/// The order after a successful operation, with a user-facing message.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub order: Order,
    pub message: String,
}

type Plan = fn(&Order) -> std::result::Result<Option<Transition>, DomainError>;

/// Service for entering orders and moving them through their lifecycle.
///
/// Stock changes only happen here, inside [`SalesStore::apply_transition`].
/// Each transition is planned from a fresh read of the order and committed
/// on the condition that the order has not changed since. A conflicting
/// commit is re-planned from a new read.
#[derive(Clone)]
pub struct OrderService<S: SalesStore> {
    store: S,
}

impl<S: SalesStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates a draft and persists it as a new order.
    ///
    /// Stock is checked but not reserved.
    #[tracing::instrument(skip(self, draft), fields(client_id = %draft.client_id, lines = draft.lines.len()))]
    pub async fn create_order(&self, draft: OrderDraft) -> Result<OrderOutcome> {
        if !self.store.client_exists(draft.client_id).await? {
            return Err(SalesError::NotFound {
                entity: "client",
                id: draft.client_id.to_string(),
            });
        }

        let products = self.store.get_products(&draft.product_ids()).await?;
        let lines = validate_entry(&draft, &products).inspect_err(|err| {
            if let DomainError::InsufficientStock(shortage) = err {
                metrics::counter!("stock_rejections_total", "operation" => "create").increment(1);
                tracing::warn!(shortfalls = shortage.shortfalls().len(), "order entry rejected");
            }
        })?;

        let order = Order::place(draft.client_id, draft.note, lines);
        let order = self.store.insert_order(order).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id(), total = %order.total(), "order created");

        Ok(OrderOutcome {
            message: format!("{} created in state '{}'.", order.label(), order.state()),
            order,
        })
    }

    /// Moves a `new` order to `processed`, decrementing stock for every line.
    ///
    /// Either all decrements happen or none do.
    #[tracing::instrument(skip(self))]
    pub async fn process_order(&self, order_id: OrderId) -> Result<OrderOutcome> {
        let order = self
            .run_transition(order_id, |order| order.process().map(Some))
            .await?;

        metrics::counter!("orders_processed_total").increment(1);
        Ok(OrderOutcome {
            message: format!("{} processed and stock updated.", order.label()),
            order,
        })
    }

    /// Cancels an order, restoring stock if it had been processed.
    ///
    /// Cancelling a cancelled order succeeds without touching stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<OrderOutcome> {
        let order = self
            .run_transition(order_id, |order| Ok(order.cancel()))
            .await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        Ok(OrderOutcome {
            message: format!("{} cancelled.", order.label()),
            order,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        Ok(self.store.require_order(order_id).await?)
    }

    /// Lists orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>> {
        Ok(self.store.list_orders(query).await?)
    }

    /// Deletes an order with its lines. Stock is not touched.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        self.store.delete_order(order_id).await?;
        tracing::info!(%order_id, "order deleted");
        Ok(())
    }

    /// Labels for an order's lines, `"<sku> - <name> x <qty>"`.
    ///
    /// Falls back to the product id if the product is gone.
    pub async fn line_labels(&self, order: &Order) -> Result<Vec<String>> {
        let ids: Vec<_> = order.lines().iter().map(|l| l.product_id).collect();
        let products = self.store.get_products(&ids).await?;
        Ok(order
            .lines()
            .iter()
            .map(|line| match products.get(&line.product_id) {
                Some(product) => line.label(&product.label()),
                None => line.label(&line.product_id.to_string()),
            })
            .collect())
    }

    /// Reads the order, plans a transition and commits it.
    ///
    /// A plan of `None` means there is nothing to do; the order is returned
    /// as read.
    async fn run_transition(&self, order_id: OrderId, plan: Plan) -> Result<Order> {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            let order = self.store.require_order(order_id).await?;
            let Some(transition) = plan(&order)? else {
                tracing::debug!(%order_id, state = %order.state(), "nothing to do");
                return Ok(order);
            };
            let action = transition.action();

            match self.store.apply_transition(&transition).await {
                Ok(order) => {
                    metrics::histogram!("ledger_transition_duration_seconds", "action" => action)
                        .record(started.elapsed().as_secs_f64());
                    tracing::info!(
                        %order_id,
                        action,
                        from = %transition.from,
                        to = %transition.to,
                        movements = transition.movements.len(),
                        attempt,
                        "transition committed"
                    );
                    return Ok(order);
                }
                Err(StoreError::StateConflict { actual, .. })
                    if attempt < MAX_TRANSITION_ATTEMPTS =>
                {
                    metrics::counter!("ledger_retries_total", "action" => action).increment(1);
                    tracing::debug!(%order_id, action, %actual, attempt, "state changed, retrying");
                    attempt += 1;
                }
                Err(StoreError::InsufficientStock(shortage)) => {
                    metrics::counter!("stock_rejections_total", "operation" => action)
                        .increment(1);
                    tracing::warn!(
                        %order_id,
                        action,
                        shortfalls = shortage.shortfalls().len(),
                        "transition rejected"
                    );
                    return Err(SalesError::InsufficientStock(shortage));
                }
                Err(err) => {
                    tracing::warn!(%order_id, action, error = %err, "transition failed");
                    return Err(err.into());
                }
            }
        }
    }
}
