//! Lifecycle statuses shared by orders and line items.

use serde::{Deserialize, Serialize};

/// The lifecycle status of an order or one of its line items.
///
/// A single ordered enumeration drives both state machines:
/// ```text
/// Requested ──► InPreparation ──► Delivered ──► Finalized ──► Invoiced
/// └──────────────── line items and orders ────────────────┘   (orders only)
/// ```
/// Statuses only ever move forward. `Invoiced` is reached exclusively
/// through table billing and never appears on a line item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Status {
    /// Taken by the waiter, not yet picked up by the kitchen.
    #[default]
    Requested,

    /// Being prepared in the kitchen.
    InPreparation,

    /// Served at the table.
    Delivered,

    /// Closed out and ready to be billed.
    Finalized,

    /// Billed as part of a table invoice (orders only, terminal).
    Invoiced,
}

impl Status {
    /// The four stages a line item moves through, in order.
    pub const ITEM_STAGES: [Status; 4] = [
        Status::Requested,
        Status::InPreparation,
        Status::Delivered,
        Status::Finalized,
    ];

    /// Every status, in lifecycle order.
    pub const ALL: [Status; 5] = [
        Status::Requested,
        Status::InPreparation,
        Status::Delivered,
        Status::Finalized,
        Status::Invoiced,
    ];

    /// Position of this status in the lifecycle.
    pub fn index(&self) -> usize {
        match self {
            Status::Requested => 0,
            Status::InPreparation => 1,
            Status::Delivered => 2,
            Status::Finalized => 3,
            Status::Invoiced => 4,
        }
    }

    /// Returns true if `self` lies strictly after `other` in the lifecycle.
    ///
    /// This is the only ordering check used by the state machines.
    pub fn is_after(&self, other: Status) -> bool {
        self.index() > other.index()
    }

    /// Returns true if a line item may hold this status.
    pub fn is_item_stage(&self) -> bool {
        !matches!(self, Status::Invoiced)
    }

    /// Returns true if this is the terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Invoiced)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Requested => "Requested",
            Status::InPreparation => "InPreparation",
            Status::Delivered => "Delivered",
            Status::Finalized => "Finalized",
            Status::Invoiced => "Invoiced",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl std::str::FromStr for Status {
    type Err = UnknownStatus;

    /// Accepts the canonical names case-insensitively, ignoring `_`, `-` and spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Status::ALL
            .into_iter()
            .find(|status| status.as_str().to_lowercase() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Occupancy of a dining table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
pub enum TableStatus {
    #[default]
    Free,
    Occupied,
}

impl TableStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Free => "Free",
            TableStatus::Occupied => "Occupied",
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TableStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Free" => Ok(TableStatus::Free),
            "Occupied" => Ok(TableStatus::Occupied),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
