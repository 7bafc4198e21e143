//! Invoice aggregator.
//!
//! Collapses every finalized order of a table into one invoice with a line
//! per distinct product.

use chrono::{DateTime, Utc};
use common::{
    Invoice, InvoiceId, InvoiceLine, Money, Order, Product, ProductId, Status, Table, TableNumber,
};
use store::{Change, ChangeSet};

use crate::{DomainError, table};

/// An invoice ready to be committed with the order and table updates that go with it.
#[derive(Debug, Clone)]
pub struct BillingPlan {
    pub invoice: Invoice,
    /// Orders that move to `Invoiced`.
    pub billed_orders: usize,
    pub changes: ChangeSet,
}

struct Accumulator {
    product_id: ProductId,
    product_name: String,
    quantity: u32,
    unit_price: Money,
}

/// Builds the invoice for the finalized orders among `orders`.
///
/// Quantities are summed per product across all finalized orders. The unit
/// price is read from `lookup` the first time a product is seen; a product
/// without a price, or no longer in the catalog, is billed at zero. The
/// invoice waiter is the waiter of the earliest billed order.
pub fn aggregate_invoice(
    table: TableNumber,
    orders: &[Order],
    lookup: impl Fn(&ProductId) -> Option<Product>,
    now: DateTime<Utc>,
) -> Result<Invoice, DomainError> {
    let mut finalized: Vec<&Order> = orders
        .iter()
        .filter(|order| order.table == table && order.status == Status::Finalized)
        .collect();
    finalized.sort_by_key(|order| order.created_at);

    let Some(first) = finalized.first() else {
        return Err(DomainError::NoFinalizedOrders(table));
    };
    let waiter = first.waiter;

    let overflow = || DomainError::AmountOverflow(table);
    let mut lines: Vec<Accumulator> = Vec::new();
    for item in finalized.iter().flat_map(|order| &order.items) {
        match lines.iter_mut().find(|line| line.product_id == item.product_id) {
            Some(line) => line.quantity = line.quantity.checked_add(1).ok_or_else(overflow)?,
            None => {
                let product = lookup(&item.product_id);
                lines.push(Accumulator {
                    product_id: item.product_id.clone(),
                    product_name: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
                    quantity: 1,
                    unit_price: product.map(|p| p.price_or_zero()).unwrap_or_default(),
                });
            }
        }
    }

    let lines = lines
        .into_iter()
        .map(|acc| {
            InvoiceLine::new(acc.product_id, acc.product_name, acc.quantity, acc.unit_price)
                .ok_or_else(overflow)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let total = lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.subtotal))
        .ok_or_else(overflow)?;

    Ok(Invoice {
        id: InvoiceId::new(),
        table,
        waiter,
        issued_at: now,
        total,
        lines,
    })
}

/// Plans billing a table: the invoice, every finalized order moving to
/// `Invoiced`, and freeing the table once no open order remains on it.
pub fn plan_billing(
    table: &Table,
    orders: &[Order],
    lookup: impl Fn(&ProductId) -> Option<Product>,
    now: DateTime<Utc>,
) -> Result<BillingPlan, DomainError> {
    let invoice = aggregate_invoice(table.number, orders, lookup, now)?;

    let mut changes = ChangeSet::new().with(Change::InsertInvoice(invoice.clone()));
    let mut billed_orders = 0;
    let mut still_open = false;
    for order in orders.iter().filter(|order| order.table == table.number) {
        match order.status {
            Status::Finalized => {
                changes.push(Change::UpdateOrderStatus {
                    order_id: order.id,
                    expected: Status::Finalized,
                    status: Status::Invoiced,
                    finished_at: None,
                });
                billed_orders += 1;
            }
            Status::Invoiced => {}
            _ => still_open = true,
        }
    }

    if !still_open && let Some(free) = table::free(table) {
        changes.push(free);
    }

    Ok(BillingPlan {
        invoice,
        billed_orders,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{EmployeeId, LineItem, OrderId, TableStatus};

    fn catalog(id: &ProductId) -> Option<Product> {
        match id.as_str() {
            "ANTICUCHO" => Some(Product::new("ANTICUCHO", "Anticuchos", "Parrilla", Money::from_units(10))),
            "CHICHA" => Some(Product::new("CHICHA", "Chicha Morada", "Bebidas", Money::from_cents(850))),
            "AGUA" => Some(Product {
                id: ProductId::new("AGUA"),
                name: "Agua".to_string(),
                category: "Bebidas".to_string(),
                price: None,
            }),
            _ => None,
        }
    }

    fn order(table: u32, status: Status, products: &[&str], created_at: DateTime<Utc>) -> Order {
        let id = OrderId::new();
        Order {
            id,
            table: TableNumber::new(table),
            waiter: EmployeeId::new(),
            status,
            created_at,
            finished_at: None,
            items: products
                .iter()
                .map(|p| {
                    let mut item = LineItem::requested(id, ProductId::new(*p), created_at);
                    item.status = status.min(Status::Finalized);
                    item
                })
                .collect(),
        }
    }

    fn occupied(number: u32) -> Table {
        Table {
            number: TableNumber::new(number),
            status: TableStatus::Occupied,
        }
    }

    #[test]
    fn single_order_single_product() {
        let now = Utc::now();
        let orders = vec![order(3, Status::Finalized, &["ANTICUCHO", "ANTICUCHO"], now)];

        let invoice = aggregate_invoice(TableNumber::new(3), &orders, catalog, now).unwrap();

        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(invoice.lines[0].quantity, 2);
        assert_eq!(invoice.lines[0].unit_price, Money::from_units(10));
        assert_eq!(invoice.lines[0].subtotal, Money::from_units(20));
        assert_eq!(invoice.total, Money::from_units(20));
        assert_eq!(invoice.waiter, orders[0].waiter);
    }

    #[test]
    fn quantities_sum_across_orders() {
        let now = Utc::now();
        let orders = vec![
            order(1, Status::Finalized, &["CHICHA", "ANTICUCHO"], now),
            order(1, Status::Finalized, &["CHICHA"], now + Duration::minutes(1)),
        ];

        let invoice = aggregate_invoice(TableNumber::new(1), &orders, catalog, now).unwrap();

        assert_eq!(invoice.lines.len(), 2);
        assert_eq!(invoice.lines[0].product_id, ProductId::new("CHICHA"));
        assert_eq!(invoice.lines[0].quantity, 2);
        assert_eq!(invoice.lines[1].quantity, 1);
        assert_eq!(invoice.total, Money::from_cents(850 * 2 + 1000));
    }

    #[test]
    fn waiter_comes_from_earliest_order() {
        let now = Utc::now();
        let later = order(1, Status::Finalized, &["CHICHA"], now);
        let earlier = order(1, Status::Finalized, &["CHICHA"], now - Duration::minutes(20));
        let waiter = earlier.waiter;

        let invoice =
            aggregate_invoice(TableNumber::new(1), &[later, earlier], catalog, now).unwrap();
        assert_eq!(invoice.waiter, waiter);
    }

    #[test]
    fn missing_prices_bill_at_zero() {
        let now = Utc::now();
        let orders = vec![order(2, Status::Finalized, &["AGUA", "RETIRED", "CHICHA"], now)];

        let invoice = aggregate_invoice(TableNumber::new(2), &orders, catalog, now).unwrap();

        assert_eq!(invoice.lines[0].unit_price, Money::zero());
        assert_eq!(invoice.lines[1].product_name, "");
        assert_eq!(invoice.lines[1].subtotal, Money::zero());
        assert_eq!(invoice.total, Money::from_cents(850));
    }

    #[test]
    fn non_finalized_orders_are_not_billed() {
        let now = Utc::now();
        let orders = vec![
            order(4, Status::Delivered, &["CHICHA"], now),
            order(4, Status::Invoiced, &["CHICHA"], now),
        ];

        let result = aggregate_invoice(TableNumber::new(4), &orders, catalog, now);
        assert!(matches!(result, Err(DomainError::NoFinalizedOrders(_))));
    }

    #[test]
    fn out_of_range_amounts_are_rejected() {
        let now = Utc::now();
        let pricey = |id: &ProductId| match id.as_str() {
            "ORO" => Some(Product::new("ORO", "Lomo al Oro", "Fondos", Money::from_cents(i64::MAX))),
            other => catalog(&ProductId::new(other)),
        };

        let orders = vec![order(5, Status::Finalized, &["ORO", "ORO"], now)];
        let result = aggregate_invoice(TableNumber::new(5), &orders, pricey, now);
        assert!(matches!(result, Err(DomainError::AmountOverflow(t)) if t == TableNumber::new(5)));

        // Each line fits on its own but the total does not.
        let orders = vec![order(5, Status::Finalized, &["ORO", "CHICHA"], now)];
        let result = aggregate_invoice(TableNumber::new(5), &orders, pricey, now);
        assert!(matches!(result, Err(DomainError::AmountOverflow(_))));
    }

    #[test]
    fn billing_plan_invoices_orders_and_frees_table() {
        let now = Utc::now();
        let orders = vec![
            order(3, Status::Finalized, &["ANTICUCHO"], now),
            order(3, Status::Invoiced, &["ANTICUCHO"], now - Duration::days(1)),
        ];

        let plan = plan_billing(&occupied(3), &orders, catalog, now).unwrap();

        assert_eq!(plan.billed_orders, 1);
        // invoice, one order update, table release
        assert_eq!(plan.changes.len(), 3);
        assert!(plan.changes.iter().any(|c| matches!(
            c,
            Change::SetTableStatus {
                status: TableStatus::Free,
                ..
            }
        )));
    }

    #[test]
    fn billing_plan_keeps_table_with_open_orders() {
        let now = Utc::now();
        let orders = vec![
            order(3, Status::Finalized, &["ANTICUCHO"], now),
            order(3, Status::InPreparation, &["CHICHA"], now),
        ];

        let plan = plan_billing(&occupied(3), &orders, catalog, now).unwrap();

        assert_eq!(plan.invoice.lines.len(), 1);
        assert!(
            !plan
                .changes
                .iter()
                .any(|c| matches!(c, Change::SetTableStatus { .. }))
        );
    }
}
