//! Order state machine.
//!
//! An order holds status X only while every one of its items holds X, so the
//! order is promoted right after an item change leaves all items at the
//! target. The functions here are pure: they compute the new order and the
//! change set that persists it.

use chrono::{DateTime, Utc};
use common::{LineItem, LineItemId, Order, OrderId, ProductId, Status, Table};
use serde::Serialize;
use store::{Change, ChangeSet};

use super::{MAX_UNITS_PER_LINE, MAX_UNITS_PER_ORDER, OpenOrder};
use crate::{DomainError, line_item, table};

/// A validated order ready to be committed.
#[derive(Debug, Clone)]
pub struct OrderPlan {
    pub order: Order,
    pub changes: ChangeSet,
}

/// What happened to the order as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "status")]
pub enum OrderProgress {
    /// Every item reached the target and the order moved with them.
    Promoted(Status),
    /// Some items moved but not all of them are at the target yet.
    Partial,
    /// Nothing changed.
    Unchanged,
}

/// Result of an advance operation.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceOutcome {
    /// The order after the operation.
    pub order: Order,
    /// Number of line items that changed status.
    pub items_changed: usize,
    pub progress: OrderProgress,
}

/// An advance computed against a snapshot of the order.
#[derive(Debug, Clone)]
pub struct AdvancePlan {
    pub outcome: AdvanceOutcome,
    /// Empty when nothing changed.
    pub changes: ChangeSet,
}

/// Validates an `OpenOrder` command and builds the order with one line item
/// per requested unit, plus the change that occupies the table.
///
/// `product_exists` answers catalog lookups. Checks run in order: table
/// free, at least one line, then each line's product and quantity. A line
/// may ask for at most [`MAX_UNITS_PER_LINE`] units and the whole order for
/// at most [`MAX_UNITS_PER_ORDER`].
pub fn plan_open_order(
    cmd: &OpenOrder,
    table: &Table,
    product_exists: impl Fn(&ProductId) -> bool,
    now: DateTime<Utc>,
) -> Result<OrderPlan, DomainError> {
    let occupy = table::occupy(table)?;

    if cmd.lines.is_empty() {
        return Err(DomainError::NoItems);
    }

    let order_id = OrderId::new();
    let mut items = Vec::new();
    for line in &cmd.lines {
        if !product_exists(&line.product_id) {
            return Err(DomainError::ProductNotFound(line.product_id.clone()));
        }
        let units = Some(line.quantity)
            .filter(|quantity| (1..=MAX_UNITS_PER_LINE).contains(quantity))
            .and_then(|quantity| usize::try_from(quantity).ok())
            .ok_or_else(|| DomainError::InvalidQuantity {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            })?;
        let total = items.len() + units;
        if total > MAX_UNITS_PER_ORDER {
            return Err(DomainError::OrderTooLarge {
                units: total,
                max: MAX_UNITS_PER_ORDER,
            });
        }
        items.extend(
            (0..units).map(|_| LineItem::requested(order_id, line.product_id.clone(), now)),
        );
    }

    let order = Order {
        id: order_id,
        table: table.number,
        waiter: cmd.waiter,
        status: Status::Requested,
        created_at: now,
        finished_at: None,
        items,
    };

    let changes = ChangeSet::new()
        .with(Change::InsertOrder(order.clone()))
        .with(occupy);

    Ok(OrderPlan { order, changes })
}

/// Applies `target` to every item of the order that is still behind it.
pub fn apply_bulk_advance(order: &Order, target: Status, now: DateTime<Utc>) -> AdvancePlan {
    let mut order = order.clone();
    let mut changes = ChangeSet::new();

    if order.is_open() {
        for item in &mut order.items {
            let expected = item.status;
            if line_item::transition(item, target, now).is_applied() {
                changes.push(Change::UpdateLineItem {
                    expected,
                    item: item.clone(),
                });
            }
        }
    }

    finish(order, changes, target, now)
}

/// Applies `target` to one item of the order.
pub fn apply_item_advance(
    order: &Order,
    item_id: LineItemId,
    target: Status,
    now: DateTime<Utc>,
) -> Result<AdvancePlan, DomainError> {
    let mut order = order.clone();
    let mut changes = ChangeSet::new();
    let is_open = order.is_open();

    let item = order
        .item_mut(item_id)
        .ok_or(DomainError::ItemNotFound(item_id))?;
    let expected = item.status;
    if is_open && line_item::transition(item, target, now).is_applied() {
        changes.push(Change::UpdateLineItem {
            expected,
            item: item.clone(),
        });
    }

    Ok(finish(order, changes, target, now))
}

fn finish(
    mut order: Order,
    mut changes: ChangeSet,
    target: Status,
    now: DateTime<Utc>,
) -> AdvancePlan {
    let items_changed = changes.len();
    let promoted = promote(&mut order, &mut changes, target, now);

    let progress = if promoted {
        OrderProgress::Promoted(target)
    } else if items_changed > 0 {
        OrderProgress::Partial
    } else {
        OrderProgress::Unchanged
    };

    AdvancePlan {
        outcome: AdvanceOutcome {
            order,
            items_changed,
            progress,
        },
        changes,
    }
}

/// Moves the order to `target` once all of its items are there.
fn promote(
    order: &mut Order,
    changes: &mut ChangeSet,
    target: Status,
    now: DateTime<Utc>,
) -> bool {
    if !order.is_open() || !target.is_after(order.status) || !order.all_items_at(target) {
        return false;
    }

    let expected = order.status;
    let finished_at = (target == Status::Finalized && order.finished_at.is_none()).then_some(now);
    order.status = target;
    if finished_at.is_some() {
        order.finished_at = finished_at;
    }

    changes.push(Change::UpdateOrderStatus {
        order_id: order.id,
        expected,
        status: target,
        finished_at,
    });
    true
}
