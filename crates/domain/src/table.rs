//! Table occupancy manager.
//!
//! Both operations only plan the write; the change is committed together
//! with the order or invoice that caused it.

use common::{Table, TableStatus};
use store::Change;

use crate::DomainError;

/// Plans marking a free table as occupied.
pub fn occupy(table: &Table) -> Result<Change, DomainError> {
    if table.is_occupied() {
        return Err(DomainError::TableOccupied(table.number));
    }
    Ok(Change::SetTableStatus {
        table: table.number,
        expected: TableStatus::Free,
        status: TableStatus::Occupied,
    })
}

/// Plans freeing a table. Returns `None` if it is already free.
pub fn free(table: &Table) -> Option<Change> {
    table.is_occupied().then(|| Change::SetTableStatus {
        table: table.number,
        expected: TableStatus::Occupied,
        status: TableStatus::Free,
    })
}
