//! Shared records and value objects for the restaurant order system.

pub mod model;
pub mod money;
pub mod status;
pub mod types;

pub use model::{Invoice, InvoiceLine, LineItem, Order, Product, Table};
pub use money::Money;
pub use status::{Status, TableStatus, UnknownStatus};
pub use types::{EmployeeId, InvoiceId, LineItemId, OrderId, ProductId, TableNumber};
