use async_trait::async_trait;
use common::{
    Invoice, InvoiceId, LineItem, LineItemId, Order, OrderId, Product, ProductId, Table,
    TableNumber,
};

use crate::{ChangeSet, Result};

/// Read-only reference data: tables and menu products.
///
/// The restaurant core only ever reads the catalog. Table occupancy is
/// changed through [`Store::commit`], never through this trait.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up a table by its number.
    async fn find_table_by_number(&self, number: TableNumber) -> Result<Option<Table>>;

    /// Lists every table, ordered by number.
    async fn all_tables(&self) -> Result<Vec<Table>>;

    /// Looks up a product by its ID.
    async fn find_product_by_id(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Lists every product, ordered by ID.
    async fn all_products(&self) -> Result<Vec<Product>>;
}

/// Persistence gateway for orders, line items, tables and invoices.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Catalog {
    /// Fetches an order with all of its line items.
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Fetches a single line item.
    async fn fetch_line_item(&self, id: LineItemId) -> Result<Option<LineItem>>;

    /// Fetches every order placed for a table, oldest first.
    async fn fetch_orders_for_table(&self, table: TableNumber) -> Result<Vec<Order>>;

    /// Fetches every order, oldest first.
    async fn fetch_all_orders(&self) -> Result<Vec<Order>>;

    /// Fetches an invoice with its lines.
    async fn fetch_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>>;

    /// Fetches every invoice, oldest first.
    async fn fetch_all_invoices(&self) -> Result<Vec<Invoice>>;

    /// Commits a change set.
    ///
    /// Changes are applied atomically - either all succeed or none do. If any
    /// change's expected status does not match the stored one, the call fails
    /// with `Conflict` and nothing is written.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Fetches the order that owns a line item.
    async fn fetch_order_for_item(&self, item_id: LineItemId) -> Result<Option<Order>> {
        match self.fetch_line_item(item_id).await? {
            Some(item) => self.fetch_order(item.order_id).await,
            None => Ok(None),
        }
    }

    /// Fetches the orders of a table that have not been invoiced yet.
    async fn fetch_open_orders_for_table(&self, table: TableNumber) -> Result<Vec<Order>> {
        let orders = self.fetch_orders_for_table(table).await?;
        Ok(orders.into_iter().filter(Order::is_open).collect())
    }
}

// Blanket implementation for all Store implementations
impl<T: Store + ?Sized> StoreExt for T {}
