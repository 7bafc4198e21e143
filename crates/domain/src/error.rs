//! Domain error types.

use common::{LineItemId, OrderId, ProductId, Status, TableNumber};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during restaurant operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The table number does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(TableNumber),

    /// The product is not on the menu.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The line item does not exist.
    #[error("Line item not found: {0}")]
    ItemNotFound(LineItemId),

    /// A requested quantity was not between 1 and the per-line limit.
    #[error(
        "Invalid quantity {quantity} for product {product_id} (must be between 1 and {max})",
        max = crate::order::MAX_UNITS_PER_LINE
    )]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// The order asks for more units than one order may hold.
    #[error("Order has {units} units, more than the limit of {max}")]
    OrderTooLarge { units: usize, max: usize },

    /// An order was submitted without any products.
    #[error("Order has no items")]
    NoItems,

    /// The table already hosts an open order.
    #[error("Table {0} is occupied")]
    TableOccupied(TableNumber),

    /// A status change had no effect and the service runs with the strict policy.
    #[error("Invalid transition: {entity} {id} is {current}, cannot move to {target}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        current: Status,
        target: Status,
    },

    /// The table has nothing ready to bill.
    #[error("Table {0} has no finalized orders")]
    NoFinalizedOrders(TableNumber),

    /// An invoice quantity or amount does not fit the money range.
    #[error("Invoice amount for table {0} is out of range")]
    AmountOverflow(TableNumber),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification of [`DomainError`], used by callers to decide how
/// to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    ConflictingState,
    AggregationEmpty,
    Storage,
}

impl DomainError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::TableNotFound(_)
            | DomainError::ProductNotFound(_)
            | DomainError::OrderNotFound(_)
            | DomainError::ItemNotFound(_)
            | DomainError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            DomainError::InvalidQuantity { .. }
            | DomainError::OrderTooLarge { .. }
            | DomainError::NoItems
            | DomainError::AmountOverflow(_) => ErrorKind::InvalidInput,
            DomainError::TableOccupied(_)
            | DomainError::InvalidTransition { .. }
            | DomainError::Store(StoreError::Conflict { .. }) => ErrorKind::ConflictingState,
            DomainError::NoFinalizedOrders(_) => ErrorKind::AggregationEmpty,
            DomainError::Store(_) => ErrorKind::Storage,
        }
    }
}
