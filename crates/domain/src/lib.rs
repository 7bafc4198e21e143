//! Restaurant order lifecycle and billing.
//!
//! This crate provides:
//! - the line-item and order state machines
//! - table occupancy planning
//! - the invoice aggregator and daily summaries
//! - `RestaurantService`, which commits each operation through a `Store`

pub mod error;
pub mod invoice;
pub mod line_item;
pub mod order;
pub mod report;
pub mod service;
pub mod table;

pub use error::{DomainError, ErrorKind};
pub use invoice::{BillingPlan, aggregate_invoice, plan_billing};
pub use line_item::{Transition, transition};
pub use order::{
    AdvanceItem, AdvanceOutcome, AdvancePlan, BillTable, BulkAdvance, MAX_UNITS_PER_LINE,
    MAX_UNITS_PER_ORDER, OpenOrder, OrderLine, OrderPlan, OrderProgress, apply_bulk_advance,
    apply_item_advance, plan_open_order,
};
pub use report::{DailySummary, InvoiceSummaryRow, daily_summaries};
pub use service::{RestaurantService, ServiceConfig, TransitionPolicy};
