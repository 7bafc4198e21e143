//! Daily invoice summary.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use common::{EmployeeId, Invoice, InvoiceId, Money, TableNumber};
use serde::Serialize;

/// One invoice as listed in a daily summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummaryRow {
    pub invoice_id: InvoiceId,
    pub table: TableNumber,
    pub waiter: EmployeeId,
    pub issued_at: DateTime<Utc>,
    pub total: Money,
}

/// Invoices issued on one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub invoices: Vec<InvoiceSummaryRow>,
    pub total: Money,
}

/// Groups invoices by issue date, oldest day first.
pub fn daily_summaries(invoices: &[Invoice]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, Vec<InvoiceSummaryRow>> = BTreeMap::new();
    for invoice in invoices {
        days.entry(invoice.issued_at.date_naive())
            .or_default()
            .push(InvoiceSummaryRow {
                invoice_id: invoice.id,
                table: invoice.table,
                waiter: invoice.waiter,
                issued_at: invoice.issued_at,
                total: invoice.total,
            });
    }

    days.into_iter()
        .map(|(date, mut rows)| {
            rows.sort_by_key(|row| row.issued_at);
            let total = rows.iter().map(|row| row.total).sum();
            DailySummary {
                date,
                invoices: rows,
                total,
            }
        })
        .collect()
}
