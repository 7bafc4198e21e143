//! Restaurant service threading the state machines through the store.

use std::collections::HashMap;

use chrono::Utc;
use common::{
    EmployeeId, Invoice, InvoiceId, Order, OrderId, Product, ProductId, Status, Table,
};
use store::{Store, StoreError, StoreExt};

use crate::error::DomainError;
use crate::invoice::plan_billing;
use crate::order::{
    AdvanceItem, AdvanceOutcome, AdvancePlan, BillTable, BulkAdvance, OpenOrder, OrderProgress,
    apply_bulk_advance, apply_item_advance, plan_open_order,
};
use crate::report::{DailySummary, daily_summaries};

/// How advance operations that change nothing are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Backward or repeated transitions are silent no-ops.
    #[default]
    Permissive,
    /// An advance that changes nothing fails with `InvalidTransition`.
    Strict,
}

impl std::str::FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(format!("unknown transition policy: {other}")),
        }
    }
}

/// Service settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceConfig {
    pub transition_policy: TransitionPolicy,
}

/// Service for running the restaurant.
///
/// Every operation validates against the current state, plans its writes as
/// one change set and commits it atomically. Nothing is written when
/// validation fails.
pub struct RestaurantService<S: Store> {
    store: S,
    config: ServiceConfig,
}

impl<S: Store> RestaurantService<S> {
    /// Creates a new service with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    /// Creates a new service with the given configuration.
    pub fn with_config(store: S, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens an order on a free table and occupies it.
    #[tracing::instrument(skip(self, cmd), fields(table = %cmd.table, waiter = %cmd.waiter))]
    pub async fn open_order(&self, cmd: OpenOrder) -> Result<Order, DomainError> {
        let table = self
            .store
            .find_table_by_number(cmd.table)
            .await?
            .ok_or(DomainError::TableNotFound(cmd.table))?;

        let products = self
            .load_products(cmd.lines.iter().map(|line| &line.product_id))
            .await?;
        let plan = plan_open_order(&cmd, &table, |id| products.contains_key(id), Utc::now())?;

        self.store.commit(plan.changes).await.map_err(|e| match e {
            // Another terminal occupied the table between our read and the commit.
            StoreError::Conflict { entity: "table", .. } => DomainError::TableOccupied(cmd.table),
            other => other.into(),
        })?;

        metrics::counter!("orders_opened_total").increment(1);
        tracing::info!(
            order_id = %plan.order.id,
            items = plan.order.items.len(),
            "order opened"
        );
        Ok(plan.order)
    }

    /// Moves one line item forward and promotes its order when every item has caught up.
    #[tracing::instrument(skip(self), fields(item_id = %cmd.item_id, target = %cmd.target))]
    pub async fn advance_item(
        &self,
        actor: EmployeeId,
        cmd: AdvanceItem,
    ) -> Result<AdvanceOutcome, DomainError> {
        let order = self
            .store
            .fetch_order_for_item(cmd.item_id)
            .await?
            .ok_or(DomainError::ItemNotFound(cmd.item_id))?;

        let plan = apply_item_advance(&order, cmd.item_id, cmd.target, Utc::now())?;
        if plan.outcome.progress == OrderProgress::Unchanged {
            let current = order
                .item(cmd.item_id)
                .map(|item| item.status)
                .unwrap_or(order.status);
            let id = cmd.item_id.to_string();
            return self.unchanged(plan, "line item", id, current, cmd.target);
        }

        self.commit_advance(plan).await
    }

    /// Moves every item of an order forward at once.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, target = %cmd.target))]
    pub async fn bulk_advance(
        &self,
        actor: EmployeeId,
        cmd: BulkAdvance,
    ) -> Result<AdvanceOutcome, DomainError> {
        let order = self
            .store
            .fetch_order(cmd.order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(cmd.order_id))?;

        let plan = apply_bulk_advance(&order, cmd.target, Utc::now());
        if plan.outcome.progress == OrderProgress::Unchanged {
            let id = cmd.order_id.to_string();
            return self.unchanged(plan, "order", id, order.status, cmd.target);
        }

        self.commit_advance(plan).await
    }

    /// Bills every finalized order of a table into one invoice.
    #[tracing::instrument(skip(self), fields(table = %cmd.table))]
    pub async fn bill_table(
        &self,
        actor: EmployeeId,
        cmd: BillTable,
    ) -> Result<Invoice, DomainError> {
        let table = self
            .store
            .find_table_by_number(cmd.table)
            .await?
            .ok_or(DomainError::TableNotFound(cmd.table))?;

        let orders = self.store.fetch_open_orders_for_table(cmd.table).await?;
        let product_ids = orders
            .iter()
            .flat_map(|order| &order.items)
            .map(|item| &item.product_id);
        let products = self.load_products(product_ids).await?;

        let plan = plan_billing(&table, &orders, |id| products.get(id).cloned(), Utc::now())?;
        self.store.commit(plan.changes).await?;

        let invoice = plan.invoice;
        metrics::counter!("invoices_issued_total").increment(1);
        metrics::histogram!("invoice_total_cents").record(invoice.total.cents() as f64);
        tracing::info!(
            invoice_id = %invoice.id,
            orders = plan.billed_orders,
            total = %invoice.total,
            "table billed"
        );
        Ok(invoice)
    }

    /// Lists every table with its occupancy.
    pub async fn tables(&self) -> Result<Vec<Table>, DomainError> {
        Ok(self.store.all_tables().await?)
    }

    /// Lists the menu.
    pub async fn products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.all_products().await?)
    }

    /// Returns the orders not yet invoiced, oldest first.
    pub async fn order_queue(&self) -> Result<Vec<Order>, DomainError> {
        let orders = self.store.fetch_all_orders().await?;
        Ok(orders.into_iter().filter(Order::is_open).collect())
    }

    /// Loads an order by ID.
    pub async fn order(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.store.fetch_order(id).await?)
    }

    /// Lists every invoice, oldest first.
    pub async fn invoices(&self) -> Result<Vec<Invoice>, DomainError> {
        Ok(self.store.fetch_all_invoices().await?)
    }

    /// Loads an invoice by ID.
    pub async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, DomainError> {
        Ok(self.store.fetch_invoice(id).await?)
    }

    /// Summarizes invoices per day.
    pub async fn daily_summary(&self) -> Result<Vec<DailySummary>, DomainError> {
        let invoices = self.store.fetch_all_invoices().await?;
        Ok(daily_summaries(&invoices))
    }

    async fn load_products<'a>(
        &self,
        ids: impl Iterator<Item = &'a ProductId>,
    ) -> Result<HashMap<ProductId, Product>, DomainError> {
        let mut products = HashMap::new();
        for id in ids {
            if products.contains_key(id) {
                continue;
            }
            if let Some(product) = self.store.find_product_by_id(id).await? {
                products.insert(id.clone(), product);
            }
        }
        Ok(products)
    }

    async fn commit_advance(&self, plan: AdvancePlan) -> Result<AdvanceOutcome, DomainError> {
        self.store.commit(plan.changes).await?;

        let outcome = plan.outcome;
        metrics::counter!("line_items_advanced_total").increment(outcome.items_changed as u64);
        match outcome.progress {
            OrderProgress::Promoted(status) => {
                metrics::counter!("orders_promoted_total", "status" => status.as_str())
                    .increment(1);
                tracing::info!(
                    order_id = %outcome.order.id,
                    status = %status,
                    items = outcome.items_changed,
                    "order promoted"
                );
            }
            _ => {
                tracing::info!(
                    order_id = %outcome.order.id,
                    items = outcome.items_changed,
                    "items advanced, order unchanged"
                );
            }
        }
        Ok(outcome)
    }

    fn unchanged(
        &self,
        plan: AdvancePlan,
        entity: &'static str,
        id: String,
        current: Status,
        target: Status,
    ) -> Result<AdvanceOutcome, DomainError> {
        match self.config.transition_policy {
            TransitionPolicy::Permissive => {
                tracing::debug!(entity, id = %id, current = %current, target = %target, "no effect");
                Ok(plan.outcome)
            }
            TransitionPolicy::Strict => Err(DomainError::InvalidTransition {
                entity,
                id,
                current,
                target,
            }),
        }
    }
}
