//! Plain records for the restaurant entities.
//!
//! Records carry data only. Status changes go through the state machines in
//! the `domain` crate, and persistence through the `store` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    EmployeeId, InvoiceId, LineItemId, Money, OrderId, ProductId, Status, TableNumber, TableStatus,
};

/// A dining table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub number: TableNumber,
    pub status: TableStatus,
}

impl Table {
    /// Creates a free table.
    pub fn free(number: u32) -> Self {
        Self {
            number: TableNumber::new(number),
            status: TableStatus::Free,
        }
    }

    /// Returns true if the table currently hosts an open order.
    pub fn is_occupied(&self) -> bool {
        self.status == TableStatus::Occupied
    }
}

/// A menu product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Catalog price; `None` when the catalog has no price on record.
    pub price: Option<Money>,
}

impl Product {
    /// Creates a priced product.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        category: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            price: Some(price),
        }
    }

    /// Returns the price, treating a missing price as zero.
    pub fn price_or_zero(&self) -> Money {
        self.price.unwrap_or_default()
    }
}

/// One physical unit of a product within an order.
///
/// A quantity of N is stored as N line items so that every unit can
/// progress through the kitchen independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub prep_start: Option<DateTime<Utc>>,
    pub prep_end: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
    /// Whole minutes between `prep_start` and `prep_end`, set once on delivery.
    pub prep_duration_minutes: Option<i64>,
}

impl LineItem {
    /// Creates a freshly requested unit.
    pub fn requested(order_id: OrderId, product_id: ProductId, now: DateTime<Utc>) -> Self {
        Self {
            id: LineItemId::new(),
            order_id,
            product_id,
            status: Status::Requested,
            created_at: now,
            prep_start: None,
            prep_end: None,
            finalized_at: None,
            prep_duration_minutes: None,
        }
    }
}

/// An order placed by a waiter for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub table: TableNumber,
    pub waiter: EmployeeId,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    /// Set when the order reaches `Finalized`.
    pub finished_at: Option<DateTime<Utc>>,
    /// Line items in the order they were taken.
    pub items: Vec<LineItem>,
}

impl Order {
    /// Returns an item by ID.
    pub fn item(&self, item_id: LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Returns a mutable item by ID.
    pub fn item_mut(&mut self, item_id: LineItemId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    /// Returns true if the order has items and every one of them is at `status`.
    pub fn all_items_at(&self, status: Status) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.status == status)
    }

    /// Returns true until the order has been invoiced.
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// One billed product on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: ProductId,
    /// Product name captured at billing time.
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl InvoiceLine {
    /// Creates a line, deriving the subtotal.
    ///
    /// Returns `None` if the subtotal does not fit in a [`Money`].
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Option<Self> {
        let subtotal = unit_price.checked_multiply(quantity)?;
        Some(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            subtotal,
        })
    }
}

/// An itemized bill for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub table: TableNumber,
    pub waiter: EmployeeId,
    pub issued_at: DateTime<Utc>,
    /// Sum of all line subtotals, fixed at creation.
    pub total: Money,
    pub lines: Vec<InvoiceLine>,
}
