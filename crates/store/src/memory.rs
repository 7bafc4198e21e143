use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    Invoice, InvoiceId, LineItem, LineItemId, Order, OrderId, Product, ProductId, Status, Table,
    TableNumber, TableStatus,
};
use tokio::sync::RwLock;

use crate::{
    Change, ChangeSet, Result, StoreError,
    change::validate_change_set,
    store::{Catalog, Store},
};

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<TableNumber, Table>,
    products: BTreeMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    item_owners: HashMap<LineItemId, OrderId>,
    invoices: Vec<Invoice>,
    fail_on_commit: bool,
}

/// Statuses written by the earlier changes of a set that is still being checked.
#[derive(Debug, Default)]
struct Pending {
    orders: HashMap<OrderId, Status>,
    items: HashMap<LineItemId, Status>,
    tables: HashMap<TableNumber, TableStatus>,
    invoices: HashSet<InvoiceId>,
}

impl State {
    /// Checks one change against the stored state plus what the set has
    /// already written, without touching the store.
    fn check(&self, change: &Change, pending: &mut Pending) -> Result<()> {
        match change {
            Change::InsertOrder(order) => {
                if pending.orders.contains_key(&order.id) || self.orders.contains_key(&order.id) {
                    return Err(StoreError::InvalidChangeSet(format!(
                        "order {} already exists",
                        order.id
                    )));
                }
                if !self.tables.contains_key(&order.table) {
                    return Err(StoreError::not_found("table", order.table));
                }
                pending.orders.insert(order.id, order.status);
                pending
                    .items
                    .extend(order.items.iter().map(|item| (item.id, item.status)));
            }
            Change::UpdateOrderStatus {
                order_id,
                expected,
                status,
                ..
            } => {
                let current = pending
                    .orders
                    .get(order_id)
                    .copied()
                    .or_else(|| self.orders.get(order_id).map(|order| order.status))
                    .ok_or_else(|| StoreError::not_found("order", order_id))?;
                if current != *expected {
                    return Err(StoreError::conflict("order", order_id, expected, current));
                }
                pending.orders.insert(*order_id, *status);
            }
            Change::UpdateLineItem { expected, item } => {
                let current = pending
                    .items
                    .get(&item.id)
                    .copied()
                    .or_else(|| self.item_status(item.id))
                    .ok_or_else(|| StoreError::not_found("line item", item.id))?;
                if current != *expected {
                    return Err(StoreError::conflict("line item", item.id, expected, current));
                }
                pending.items.insert(item.id, item.status);
            }
            Change::SetTableStatus {
                table,
                expected,
                status,
            } => {
                let current = pending
                    .tables
                    .get(table)
                    .copied()
                    .or_else(|| self.tables.get(table).map(|stored| stored.status))
                    .ok_or_else(|| StoreError::not_found("table", table))?;
                if current != *expected {
                    return Err(StoreError::conflict("table", table, expected, current));
                }
                pending.tables.insert(*table, *status);
            }
            Change::InsertInvoice(invoice) => {
                if !pending.invoices.insert(invoice.id)
                    || self.invoices.iter().any(|existing| existing.id == invoice.id)
                {
                    return Err(StoreError::InvalidChangeSet(format!(
                        "invoice {} already exists",
                        invoice.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Writes a change that [`State::check`] has accepted.
    fn apply(&mut self, change: Change) {
        match change {
            Change::InsertOrder(order) => {
                for item in &order.items {
                    self.item_owners.insert(item.id, order.id);
                }
                self.orders.insert(order.id, order);
            }
            Change::UpdateOrderStatus {
                order_id,
                status,
                finished_at,
                ..
            } => {
                if let Some(order) = self.orders.get_mut(&order_id) {
                    order.status = status;
                    if finished_at.is_some() {
                        order.finished_at = finished_at;
                    }
                }
            }
            Change::UpdateLineItem { item, .. } => {
                let item_id = item.id;
                let stored = self
                    .item_owners
                    .get(&item_id)
                    .copied()
                    .and_then(|order_id| self.orders.get_mut(&order_id))
                    .and_then(|order| order.item_mut(item_id));
                if let Some(stored) = stored {
                    *stored = item;
                }
            }
            Change::SetTableStatus { table, status, .. } => {
                if let Some(stored) = self.tables.get_mut(&table) {
                    stored.status = status;
                }
            }
            Change::InsertInvoice(invoice) => self.invoices.push(invoice),
        }
    }

    fn item_status(&self, id: LineItemId) -> Option<Status> {
        self.item_owners
            .get(&id)
            .and_then(|order_id| self.orders.get(order_id))
            .and_then(|order| order.item(id))
            .map(|item| item.status)
    }

    fn sorted_orders<'a>(&self, orders: impl Iterator<Item = &'a Order>) -> Vec<Order> {
        let mut orders: Vec<Order> = orders.cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        orders
    }
}

/// In-memory store implementation for testing and single-terminal use.
///
/// Provides the same interface and atomicity guarantees as the PostgreSQL
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with tables and products.
    pub fn with_catalog(
        tables: impl IntoIterator<Item = Table>,
        products: impl IntoIterator<Item = Product>,
    ) -> Self {
        let state = State {
            tables: tables.into_iter().map(|t| (t.number, t)).collect(),
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..State::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Removes a product from the catalog.
    pub async fn remove_product(&self, id: &ProductId) -> Option<Product> {
        self.state.write().await.products.remove(id)
    }

    /// Configures every subsequent commit to fail before writing anything.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().await.fail_on_commit = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of stored invoices.
    pub async fn invoice_count(&self) -> usize {
        self.state.read().await.invoices.len()
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn find_table_by_number(&self, number: TableNumber) -> Result<Option<Table>> {
        Ok(self.state.read().await.tables.get(&number).cloned())
    }

    async fn all_tables(&self) -> Result<Vec<Table>> {
        Ok(self.state.read().await.tables.values().cloned().collect())
    }

    async fn find_product_by_id(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        Ok(self.state.read().await.products.values().cloned().collect())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn fetch_line_item(&self, id: LineItemId) -> Result<Option<LineItem>> {
        let state = self.state.read().await;
        Ok(state
            .item_owners
            .get(&id)
            .and_then(|order_id| state.orders.get(order_id))
            .and_then(|order| order.item(id))
            .cloned())
    }

    async fn fetch_orders_for_table(&self, table: TableNumber) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state.sorted_orders(state.orders.values().filter(|o| o.table == table)))
    }

    async fn fetch_all_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state.sorted_orders(state.orders.values()))
    }

    async fn fetch_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        let state = self.state.read().await;
        Ok(state.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn fetch_all_invoices(&self) -> Result<Vec<Invoice>> {
        let state = self.state.read().await;
        let mut invoices = state.invoices.clone();
        invoices.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(invoices)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        validate_change_set(&changes)?;

        let mut state = self.state.write().await;
        if state.fail_on_commit {
            return Err(StoreError::Injected("commit disabled".to_string()));
        }

        // Every precondition is checked before the first write, so a rejected
        // set leaves the store untouched.
        let mut pending = Pending::default();
        for change in changes.iter() {
            if let Err(e) = state.check(change, &mut pending) {
                if matches!(e, StoreError::Conflict { .. }) {
                    metrics::counter!("store_conflicts_total").increment(1);
                }
                tracing::warn!(change = change.kind(), error = %e, "commit rejected");
                return Err(e);
            }
        }

        let count = changes.len();
        for change in changes {
            state.apply(change);
        }

        metrics::counter!("store_commits_total").increment(1);
        tracing::debug!(changes = count, "commit applied");
        Ok(())
    }
}
