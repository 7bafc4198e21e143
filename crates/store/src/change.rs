//! Units of work submitted to the store.

use chrono::{DateTime, Utc};
use common::{Invoice, LineItem, Money, Order, OrderId, Status, TableNumber, TableStatus};

use crate::{Result, StoreError};

/// A single write.
///
/// Updates carry the status the writer last observed. The store refuses the
/// whole change set if the stored status no longer matches, which serializes
/// competing writers on the same table, order or item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Insert a new order together with all of its line items.
    InsertOrder(Order),

    /// Move an order to a new status.
    UpdateOrderStatus {
        order_id: OrderId,
        expected: Status,
        status: Status,
        /// Written only when `Some`; an existing value is never cleared.
        finished_at: Option<DateTime<Utc>>,
    },

    /// Replace a line item's status and timestamps.
    UpdateLineItem { expected: Status, item: LineItem },

    /// Flip a table between free and occupied.
    SetTableStatus {
        table: TableNumber,
        expected: TableStatus,
        status: TableStatus,
    },

    /// Insert an invoice together with its lines.
    InsertInvoice(Invoice),
}

impl Change {
    /// Short name of the change, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Change::InsertOrder(_) => "InsertOrder",
            Change::UpdateOrderStatus { .. } => "UpdateOrderStatus",
            Change::UpdateLineItem { .. } => "UpdateLineItem",
            Change::SetTableStatus { .. } => "SetTableStatus",
            Change::InsertInvoice(_) => "InsertInvoice",
        }
    }
}

/// An ordered list of changes committed atomically: all of them or none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Appends a change, builder style.
    pub fn with(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    /// Returns true if there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterates over the changes in commit order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Validates a change set before any of it is written.
pub fn validate_change_set(changes: &ChangeSet) -> Result<()> {
    if changes.is_empty() {
        return Err(invalid("cannot commit an empty change set"));
    }

    for change in changes.iter() {
        match change {
            Change::InsertOrder(order) => {
                if order.items.is_empty() {
                    return Err(invalid(format!("order {} has no line items", order.id)));
                }
                if let Some(item) = order.items.iter().find(|item| item.order_id != order.id) {
                    return Err(invalid(format!(
                        "line item {} does not belong to order {}",
                        item.id, order.id
                    )));
                }
            }
            Change::UpdateLineItem { item, .. } => {
                if !item.status.is_item_stage() {
                    return Err(invalid(format!(
                        "line item {} cannot hold status {}",
                        item.id, item.status
                    )));
                }
            }
            Change::InsertInvoice(invoice) => {
                if invoice.lines.is_empty() {
                    return Err(invalid(format!("invoice {} has no lines", invoice.id)));
                }
                if let Some(line) = invoice.lines.iter().find(|line| {
                    line.unit_price.checked_multiply(line.quantity) != Some(line.subtotal)
                }) {
                    return Err(invalid(format!(
                        "invoice {} line {} subtotal {} does not match its price and quantity",
                        invoice.id, line.product_id, line.subtotal
                    )));
                }
                let sum = invoice
                    .lines
                    .iter()
                    .try_fold(Money::zero(), |acc, line| acc.checked_add(line.subtotal))
                    .ok_or_else(|| invalid(format!("invoice {} total overflows", invoice.id)))?;
                if sum != invoice.total {
                    return Err(invalid(format!(
                        "invoice {} total {} does not match its lines ({})",
                        invoice.id, invoice.total, sum
                    )));
                }
            }
            Change::UpdateOrderStatus { .. } | Change::SetTableStatus { .. } => {}
        }
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidChangeSet(message.into())
}
