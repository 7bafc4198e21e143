//! Line-item state machine.
//!
//! ```text
//! Requested ──► InPreparation ──► Delivered ──► Finalized
//! ```
//!
//! Targets may skip stages. Only the target stage's side effect runs, so an
//! item jumped straight to `Finalized` never gets preparation timestamps.

use chrono::{DateTime, Utc};
use common::{LineItem, Status};

/// Result of a single transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The item moved to the target status.
    Applied,
    /// The target was not ahead of the current status; nothing changed.
    Ignored,
}

impl Transition {
    /// Returns true if the item changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Moves `item` to `target` if `target` is a later item stage.
pub fn transition(item: &mut LineItem, target: Status, now: DateTime<Utc>) -> Transition {
    if !target.is_item_stage() || !target.is_after(item.status) {
        tracing::debug!(
            item_id = %item.id,
            current = %item.status,
            target = %target,
            "transition ignored"
        );
        return Transition::Ignored;
    }

    item.status = target;
    match target {
        Status::InPreparation => {
            item.prep_start.get_or_insert(now);
        }
        Status::Delivered => {
            if let Some(start) = item.prep_start
                && item.prep_end.is_none()
            {
                item.prep_end = Some(now);
                item.prep_duration_minutes = Some((now - start).num_minutes());
            }
        }
        Status::Finalized => {
            item.finalized_at.get_or_insert(now);
        }
        Status::Requested | Status::Invoiced => {}
    }

    Transition::Applied
}
