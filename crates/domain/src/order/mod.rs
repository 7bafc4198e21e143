//! Order commands and the order state machine.

mod commands;
mod lifecycle;

pub use commands::*;
pub use lifecycle::{
    AdvanceOutcome, AdvancePlan, OrderPlan, OrderProgress, apply_bulk_advance, apply_item_advance,
    plan_open_order,
};
