//! Restaurant commands.

use common::{EmployeeId, LineItemId, OrderId, ProductId, Status, TableNumber};

/// Most units a single order line may request.
pub const MAX_UNITS_PER_LINE: i64 = 100;

/// Most units one order may hold across all of its lines.
pub const MAX_UNITS_PER_ORDER: usize = 500;

/// One requested product and how many units of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    /// Units requested, between 1 and [`MAX_UNITS_PER_LINE`].
    pub quantity: i64,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Command to open an order on a free table.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    /// The table being served.
    pub table: TableNumber,

    /// The waiter taking the order.
    pub waiter: EmployeeId,

    /// Requested products in the order they were taken.
    pub lines: Vec<OrderLine>,
}

impl OpenOrder {
    /// Creates a new OpenOrder command.
    pub fn new(table: TableNumber, waiter: EmployeeId, lines: Vec<OrderLine>) -> Self {
        Self {
            table,
            waiter,
            lines,
        }
    }

    /// Adds a line, builder style.
    pub fn with_line(mut self, product_id: impl Into<ProductId>, quantity: i64) -> Self {
        self.lines.push(OrderLine::new(product_id, quantity));
        self
    }
}

/// Command to move a single line item forward.
#[derive(Debug, Clone, Copy)]
pub struct AdvanceItem {
    pub item_id: LineItemId,
    pub target: Status,
}

impl AdvanceItem {
    /// Creates a new AdvanceItem command.
    pub fn new(item_id: LineItemId, target: Status) -> Self {
        Self { item_id, target }
    }
}

/// Command to move every item of an order forward at once.
#[derive(Debug, Clone, Copy)]
pub struct BulkAdvance {
    pub order_id: OrderId,
    pub target: Status,
}

impl BulkAdvance {
    /// Creates a new BulkAdvance command.
    pub fn new(order_id: OrderId, target: Status) -> Self {
        Self { order_id, target }
    }
}

/// Command to bill every finalized order of a table.
#[derive(Debug, Clone, Copy)]
pub struct BillTable {
    pub table: TableNumber,
}

impl BillTable {
    /// Creates a new BillTable command.
    pub fn new(table: TableNumber) -> Self {
        Self { table }
    }
}
