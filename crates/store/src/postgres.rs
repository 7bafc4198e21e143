use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use common::{
    EmployeeId, Invoice, InvoiceId, InvoiceLine, LineItem, LineItemId, Money, Order, OrderId,
    Product, ProductId, Status, Table, TableNumber, TableStatus,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Change, ChangeSet, Result, StoreError,
    change::validate_change_set,
    store::{Catalog, Store},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a table if its number is not taken yet. Existing occupancy is kept.
    pub async fn upsert_table(&self, table: &Table) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dining_tables (number, status)
            VALUES ($1, $2)
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(table_number_to_db(table.number)?)
        .bind(table.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts or refreshes a product.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, price_cents)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                price_cents = EXCLUDED.price_cents
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price.map(|p| p.cents()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_table(row: PgRow) -> Result<Table> {
        Ok(Table {
            number: table_number_from_db(row.try_get("number")?)?,
            status: parse_table_status(row.try_get("status")?)?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            price: row
                .try_get::<Option<i64>, _>("price_cents")?
                .map(Money::from_cents),
        })
    }

    fn row_to_line_item(row: &PgRow) -> Result<LineItem> {
        Ok(LineItem {
            id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            status: parse_status(row.try_get("status")?)?,
            created_at: row.try_get("created_at")?,
            prep_start: row.try_get("prep_start")?,
            prep_end: row.try_get("prep_end")?,
            finalized_at: row.try_get("finalized_at")?,
            prep_duration_minutes: row.try_get("prep_duration_minutes")?,
        })
    }

    fn row_to_order(row: &PgRow, items: Vec<LineItem>) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            table: table_number_from_db(row.try_get("table_number")?)?,
            waiter: EmployeeId::from_uuid(row.try_get::<Uuid, _>("waiter_id")?),
            status: parse_status(row.try_get("status")?)?,
            created_at: row.try_get("created_at")?,
            finished_at: row.try_get("finished_at")?,
            items,
        })
    }

    fn row_to_invoice_line(row: &PgRow) -> Result<InvoiceLine> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(InvoiceLine {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: u32::try_from(quantity)
                .map_err(|_| StoreError::CorruptRecord(format!("negative quantity {quantity}")))?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        })
    }

    fn row_to_invoice(row: &PgRow, lines: Vec<InvoiceLine>) -> Result<Invoice> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.try_get::<Uuid, _>("id")?),
            table: table_number_from_db(row.try_get("table_number")?)?,
            waiter: EmployeeId::from_uuid(row.try_get::<Uuid, _>("waiter_id")?),
            issued_at: row.try_get("issued_at")?,
            total: Money::from_cents(row.try_get("total_cents")?),
            lines,
        })
    }

    /// Loads the items of several orders, grouped by order and kept in position order.
    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<OrderId, Vec<LineItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, status, created_at,
                   prep_start, prep_end, finalized_at, prep_duration_minutes
            FROM line_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<LineItem>> = HashMap::new();
        for row in &rows {
            let item = Self::row_to_line_item(row)?;
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn assemble_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut items = self.load_items(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                let order_items = items.remove(&OrderId::from_uuid(id)).unwrap_or_default();
                Self::row_to_order(row, order_items)
            })
            .collect()
    }

    async fn load_invoice_lines(
        &self,
        invoice_ids: &[Uuid],
    ) -> Result<HashMap<InvoiceId, Vec<InvoiceLine>>> {
        let rows = sqlx::query(
            r#"
            SELECT invoice_id, product_id, product_name, quantity, unit_price_cents, subtotal_cents
            FROM invoice_lines
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, position ASC
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<InvoiceId, Vec<InvoiceLine>> = HashMap::new();
        for row in &rows {
            let invoice_id = InvoiceId::from_uuid(row.try_get::<Uuid, _>("invoice_id")?);
            grouped
                .entry(invoice_id)
                .or_default()
                .push(Self::row_to_invoice_line(row)?);
        }
        Ok(grouped)
    }

    async fn assemble_invoices(&self, rows: Vec<PgRow>) -> Result<Vec<Invoice>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = self.load_invoice_lines(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                let invoice_lines = lines.remove(&InvoiceId::from_uuid(id)).unwrap_or_default();
                Self::row_to_invoice(row, invoice_lines)
            })
            .collect()
    }

    async fn apply(conn: &mut PgConnection, change: Change) -> Result<()> {
        match change {
            Change::InsertOrder(order) => {
                let table = table_number_to_db(order.table)?;
                let exists: Option<i32> =
                    sqlx::query_scalar("SELECT number FROM dining_tables WHERE number = $1")
                        .bind(table)
                        .fetch_optional(&mut *conn)
                        .await?;
                if exists.is_none() {
                    return Err(StoreError::not_found("table", order.table));
                }

                sqlx::query(
                    r#"
                    INSERT INTO orders (id, table_number, waiter_id, status, created_at, finished_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(order.id.as_uuid())
                .bind(table)
                .bind(order.waiter.as_uuid())
                .bind(order.status.as_str())
                .bind(order.created_at)
                .bind(order.finished_at)
                .execute(&mut *conn)
                .await?;

                for (position, item) in order.items.iter().enumerate() {
                    sqlx::query(
                        r#"
                        INSERT INTO line_items (id, order_id, position, product_id, status, created_at,
                                                prep_start, prep_end, finalized_at, prep_duration_minutes)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                        "#,
                    )
                    .bind(item.id.as_uuid())
                    .bind(order.id.as_uuid())
                    .bind(position_to_db(position)?)
                    .bind(item.product_id.as_str())
                    .bind(item.status.as_str())
                    .bind(item.created_at)
                    .bind(item.prep_start)
                    .bind(item.prep_end)
                    .bind(item.finalized_at)
                    .bind(item.prep_duration_minutes)
                    .execute(&mut *conn)
                    .await?;
                }
            }
            Change::UpdateOrderStatus {
                order_id,
                expected,
                status,
                finished_at,
            } => {
                let result = sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $1, finished_at = COALESCE($2, finished_at)
                    WHERE id = $3 AND status = $4
                    "#,
                )
                .bind(status.as_str())
                .bind(finished_at)
                .bind(order_id.as_uuid())
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    let actual: Option<String> =
                        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                            .bind(order_id.as_uuid())
                            .fetch_optional(&mut *conn)
                            .await?;
                    return Err(match actual {
                        Some(actual) => StoreError::conflict("order", order_id, expected, actual),
                        None => StoreError::not_found("order", order_id),
                    });
                }
            }
            Change::UpdateLineItem { expected, item } => {
                let result = sqlx::query(
                    r#"
                    UPDATE line_items
                    SET status = $1, prep_start = $2, prep_end = $3,
                        finalized_at = $4, prep_duration_minutes = $5
                    WHERE id = $6 AND status = $7
                    "#,
                )
                .bind(item.status.as_str())
                .bind(item.prep_start)
                .bind(item.prep_end)
                .bind(item.finalized_at)
                .bind(item.prep_duration_minutes)
                .bind(item.id.as_uuid())
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    let actual: Option<String> =
                        sqlx::query_scalar("SELECT status FROM line_items WHERE id = $1")
                            .bind(item.id.as_uuid())
                            .fetch_optional(&mut *conn)
                            .await?;
                    return Err(match actual {
                        Some(actual) => StoreError::conflict("line item", item.id, expected, actual),
                        None => StoreError::not_found("line item", item.id),
                    });
                }
            }
            Change::SetTableStatus {
                table,
                expected,
                status,
            } => {
                let number = table_number_to_db(table)?;
                let result = sqlx::query(
                    "UPDATE dining_tables SET status = $1 WHERE number = $2 AND status = $3",
                )
                .bind(status.as_str())
                .bind(number)
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    let actual: Option<String> =
                        sqlx::query_scalar("SELECT status FROM dining_tables WHERE number = $1")
                            .bind(number)
                            .fetch_optional(&mut *conn)
                            .await?;
                    return Err(match actual {
                        Some(actual) => StoreError::conflict("table", table, expected, actual),
                        None => StoreError::not_found("table", table),
                    });
                }
            }
            Change::InsertInvoice(invoice) => {
                sqlx::query(
                    r#"
                    INSERT INTO invoices (id, table_number, waiter_id, issued_at, total_cents)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(invoice.id.as_uuid())
                .bind(table_number_to_db(invoice.table)?)
                .bind(invoice.waiter.as_uuid())
                .bind(invoice.issued_at)
                .bind(invoice.total.cents())
                .execute(&mut *conn)
                .await?;

                for (position, line) in invoice.lines.iter().enumerate() {
                    let quantity = i32::try_from(line.quantity).map_err(|_| {
                        StoreError::InvalidChangeSet(format!(
                            "quantity {} out of range",
                            line.quantity
                        ))
                    })?;
                    sqlx::query(
                        r#"
                        INSERT INTO invoice_lines (invoice_id, position, product_id, product_name,
                                                   quantity, unit_price_cents, subtotal_cents)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        "#,
                    )
                    .bind(invoice.id.as_uuid())
                    .bind(position_to_db(position)?)
                    .bind(line.product_id.as_str())
                    .bind(&line.product_name)
                    .bind(quantity)
                    .bind(line.unit_price.cents())
                    .bind(line.subtotal.cents())
                    .execute(&mut *conn)
                    .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn find_table_by_number(&self, number: TableNumber) -> Result<Option<Table>> {
        // No stored row can hold a number past the column range.
        let Ok(key) = i32::try_from(number.get()) else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT number, status FROM dining_tables WHERE number = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_table).transpose()
    }

    async fn all_tables(&self) -> Result<Vec<Table>> {
        let rows = sqlx::query("SELECT number, status FROM dining_tables ORDER BY number ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_table).collect()
    }

    async fn find_product_by_id(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, category, price_cents FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT id, name, category, price_cents FROM products ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, table_number, waiter_id, status, created_at, finished_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.assemble_orders(rows).await?.into_iter().next())
    }

    async fn fetch_line_item(&self, id: LineItemId) -> Result<Option<LineItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, product_id, status, created_at,
                   prep_start, prep_end, finalized_at, prep_duration_minutes
            FROM line_items
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_line_item).transpose()
    }

    async fn fetch_orders_for_table(&self, table: TableNumber) -> Result<Vec<Order>> {
        let Ok(key) = i32::try_from(table.get()) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT id, table_number, waiter_id, status, created_at, finished_at
            FROM orders
            WHERE table_number = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        self.assemble_orders(rows).await
    }

    async fn fetch_all_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, table_number, waiter_id, status, created_at, finished_at
            FROM orders
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.assemble_orders(rows).await
    }

    async fn fetch_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT id, table_number, waiter_id, issued_at, total_cents
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.assemble_invoices(rows).await?.into_iter().next())
    }

    async fn fetch_all_invoices(&self) -> Result<Vec<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT id, table_number, waiter_id, issued_at, total_cents
            FROM invoices
            ORDER BY issued_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.assemble_invoices(rows).await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        validate_change_set(&changes)?;

        let count = changes.len();
        // Dropping the transaction on an early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        for change in changes {
            let kind = change.kind();
            if let Err(e) = Self::apply(&mut *tx, change).await {
                if matches!(e, StoreError::Conflict { .. }) {
                    metrics::counter!("store_conflicts_total").increment(1);
                }
                tracing::warn!(change = kind, error = %e, "commit rejected");
                return Err(e);
            }
        }

        tx.commit().await?;

        metrics::counter!("store_commits_total").increment(1);
        tracing::debug!(changes = count, "commit applied");
        Ok(())
    }
}

fn parse_status(raw: String) -> Result<Status> {
    Status::from_str(&raw).map_err(|e| StoreError::CorruptRecord(e.to_string()))
}

fn parse_table_status(raw: String) -> Result<TableStatus> {
    TableStatus::from_str(&raw).map_err(|e| StoreError::CorruptRecord(e.to_string()))
}

fn table_number_to_db(number: TableNumber) -> Result<i32> {
    i32::try_from(number.get())
        .map_err(|_| StoreError::InvalidChangeSet(format!("table number {number} out of range")))
}

fn table_number_from_db(raw: i32) -> Result<TableNumber> {
    u32::try_from(raw)
        .map(TableNumber::new)
        .map_err(|_| StoreError::CorruptRecord(format!("negative table number {raw}")))
}

fn position_to_db(position: usize) -> Result<i32> {
    i32::try_from(position)
        .map_err(|_| StoreError::InvalidChangeSet(format!("position {position} out of range")))
}
