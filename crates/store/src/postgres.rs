use std::collections::HashMap;

use async_trait::async_trait;
use common::{ClientId, OrderId, Page, ProductId};
use domain::{
    Client, LineItem, Money, Order, OrderState, Product, ProductUpdate, Transition,
    apply_movements,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    ClientQuery, OrderQuery, ProductQuery, Result, StoreError,
    store::SalesStore,
};

const CLIENT_COLUMNS: &str = "id, name, email, phone, address, active";
const PRODUCT_COLUMNS: &str = "id, sku, name, price_cents, stock, active";
const ORDER_COLUMNS: &str = "id, client_id, created_at, state, note";

/// PostgreSQL-backed store implementation.
///
/// Transitions lock the order row, then every touched product row in id
/// order, so concurrent transitions over overlapping products queue up
/// instead of deadlocking.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_client(row: PgRow) -> Result<Client> {
        Ok(Client {
            id: ClientId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let id = ProductId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let stock: i64 = row.try_get("stock")?;
        Ok(Product {
            id,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: u32::try_from(stock)
                .map_err(|_| StoreError::Corrupt(format!("product {id} has stock {stock}")))?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<LineItem> {
        let product_id = ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?);
        let quantity: i64 = row.try_get("quantity")?;
        Ok(LineItem {
            product_id,
            quantity: u32::try_from(quantity).map_err(|_| {
                StoreError::Corrupt(format!("line for product {product_id} has quantity {quantity}"))
            })?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    fn row_to_order(row: &PgRow, lines: Vec<LineItem>) -> Result<Order> {
        let state: String = row.try_get("state")?;
        let state: OrderState = state
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{e}")))?;
        Ok(Order::from_parts(
            OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            ClientId::from_uuid(row.try_get::<Uuid, _>("client_id")?),
            row.try_get("created_at")?,
            state,
            row.try_get("note")?,
            lines,
        ))
    }

    /// Loads the lines of several orders, grouped by order and kept in
    /// entry order.
    async fn load_lines(
        conn: &mut PgConnection,
        order_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<LineItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("order_id")?;
            lines.entry(order_id).or_default().push(Self::row_to_line(row)?);
        }
        Ok(lines)
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let mut lines = Self::load_lines(conn, &[id.as_uuid()]).await?;
                let lines = lines.remove(&id.as_uuid()).unwrap_or_default();
                Ok(Some(Self::row_to_order(&row, lines)?))
            }
            None => Ok(None),
        }
    }
}

fn constraint_of(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

/// Wraps a search term for ILIKE, escaping the pattern metacharacters.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl SalesStore for PostgresStore {
    async fn insert_client(&self, client: Client) -> Result<Client> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, name, email, phone, address, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(client.active)
        .execute(&self.pool)
        .await?;

        Ok(client)
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_client).transpose()
    }

    async fn list_clients(&self, query: ClientQuery) -> Result<Page<Client>> {
        let mut filter = String::from(" WHERE 1=1");
        if query.active_only {
            filter.push_str(" AND active");
        }
        let pattern = query.search.as_deref().map(like_pattern);
        if pattern.is_some() {
            filter.push_str(" AND (name ILIKE $1 OR email ILIKE $1 OR phone ILIKE $1)");
        }
        let next = if pattern.is_some() { 2 } else { 1 };

        let count_sql = format!("SELECT COUNT(*) FROM clients{filter}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(pattern) = &pattern {
            count_query = count_query.bind(pattern);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients{filter} ORDER BY name ASC, id ASC LIMIT ${} OFFSET ${}",
            next,
            next + 1
        );
        let mut sqlx_query = sqlx::query(&sql);
        if let Some(pattern) = &pattern {
            sqlx_query = sqlx_query.bind(pattern);
        }
        let rows = sqlx_query
            .bind(query.page.limit() as i64)
            .bind(query.page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Self::row_to_client)
                .collect::<Result<_>>()?,
            page: query.page.page,
            per_page: query.page.per_page,
            total: total as u64,
        })
    }

    async fn delete_client(&self, id: ClientId) -> Result<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if constraint_of(&e) == Some("orders_client_id_fkey") {
                    return StoreError::Referenced {
                        entity: "client",
                        id: id.to_string(),
                        referenced_by: "orders",
                    };
                }
                StoreError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("client", id));
        }
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price_cents, stock, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock as i64)
        .bind(product.active)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if constraint_of(&e) == Some("products_sku_key") {
                return StoreError::DuplicateSku(product.sku.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::row_to_product(row).map(|p| (p.id, p)))
            .collect()
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let mut product = row
            .map(Self::row_to_product)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("product", id))?;

        product.apply_update(&update)?;

        sqlx::query("UPDATE products SET name = $2, price_cents = $3, active = $4 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(&product.name)
            .bind(product.price.cents())
            .bind(product.active)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(product)
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Page<Product>> {
        let mut filter = String::from(" WHERE 1=1");
        if query.active_only {
            filter.push_str(" AND active");
        }
        let pattern = query.search.as_deref().map(like_pattern);
        if pattern.is_some() {
            filter.push_str(" AND (name ILIKE $1 OR sku ILIKE $1)");
        }
        let next = if pattern.is_some() { 2 } else { 1 };

        let count_sql = format!("SELECT COUNT(*) FROM products{filter}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(pattern) = &pattern {
            count_query = count_query.bind(pattern);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products{filter} ORDER BY name ASC, sku ASC LIMIT ${} OFFSET ${}",
            next,
            next + 1
        );
        let mut sqlx_query = sqlx::query(&sql);
        if let Some(pattern) = &pattern {
            sqlx_query = sqlx_query.bind(pattern);
        }
        let rows = sqlx_query
            .bind(query.page.limit() as i64)
            .bind(query.page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Self::row_to_product)
                .collect::<Result<_>>()?,
            page: query.page.page,
            per_page: query.page.per_page,
            total: total as u64,
        })
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if constraint_of(&e) == Some("order_lines_product_id_fkey") {
                    return StoreError::Referenced {
                        entity: "product",
                        id: id.to_string(),
                        referenced_by: "order lines",
                    };
                }
                StoreError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", id));
        }
        Ok(())
    }

    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, client_id, created_at, state, note)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.client_id().as_uuid())
        .bind(order.created_at())
        .bind(order.state().as_str())
        .bind(order.note())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if constraint_of(&e) == Some("orders_client_id_fkey") {
                return StoreError::not_found("client", order.client_id());
            }
            StoreError::Database(e)
        })?;

        for (position, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position as i32)
            .bind(line.product_id.as_uuid())
            .bind(line.quantity as i64)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await
            .map_err(|e| match constraint_of(&e) {
                Some("order_lines_product_id_fkey") => {
                    StoreError::not_found("product", line.product_id)
                }
                Some("order_lines_order_product_key") => StoreError::DuplicateLine {
                    order_id: order.id().to_string(),
                    product_id: line.product_id.to_string(),
                },
                _ => StoreError::Database(e),
            })?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, id).await
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if query.state.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND state = ${param_count}"));
        }
        if query.client_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND client_id = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{filter}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(state) = query.state {
            count_query = count_query.bind(state.as_str());
        }
        if let Some(client_id) = query.client_id {
            count_query = count_query.bind(client_id.as_uuid());
        }

        let mut conn = self.pool.acquire().await?;
        let total = count_query.fetch_one(&mut *conn).await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let mut sqlx_query = sqlx::query(&sql);
        if let Some(state) = query.state {
            sqlx_query = sqlx_query.bind(state.as_str());
        }
        if let Some(client_id) = query.client_id {
            sqlx_query = sqlx_query.bind(client_id.as_uuid());
        }
        let rows = sqlx_query
            .bind(query.page.limit() as i64)
            .bind(query.page.offset() as i64)
            .fetch_all(&mut *conn)
            .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = Self::load_lines(&mut conn, &ids).await?;

        let items = rows
            .iter()
            .zip(&ids)
            .map(|(row, id)| Self::row_to_order(row, lines.remove(id).unwrap_or_default()))
            .collect::<Result<_>>()?;

        Ok(Page {
            items,
            page: query.page.page,
            per_page: query.page.per_page,
            total: total as u64,
        })
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        // Lines go with the order through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Ok(())
    }

    async fn apply_transition(&self, transition: &Transition) -> Result<Order> {
        let order_id = transition.order_id;
        let mut tx = self.pool.begin().await?;

        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let actual: OrderState = state
            .ok_or_else(|| StoreError::not_found("order", order_id))?
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{e}")))?;

        if actual != transition.from {
            return Err(StoreError::StateConflict {
                order_id,
                expected: transition.from,
                actual,
            });
        }

        let product_ids: Vec<Uuid> = transition
            .product_ids()
            .into_iter()
            .map(|id| id.as_uuid())
            .collect();
        let mut products: HashMap<ProductId, Product> = HashMap::new();
        if !product_ids.is_empty() {
            let rows = sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
            ))
            .bind(&product_ids)
            .fetch_all(&mut *tx)
            .await?;
            for row in rows {
                let product = Self::row_to_product(row)?;
                products.insert(product.id, product);
            }
        }

        // Dropping `tx` on error rolls every statement back
        apply_movements(&transition.movements, &mut products)?;

        for product in products.values() {
            sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
                .bind(product.id.as_uuid())
                .bind(product.stock as i64)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE orders SET state = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(transition.to.as_str())
            .execute(&mut *tx)
            .await?;

        let order = Self::fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", order_id))?;

        tx.commit().await?;
        tracing::debug!(
            order_id = %order_id,
            action = transition.action(),
            products = product_ids.len(),
            "Transition committed"
        );
        Ok(order)
    }
}
