pub mod change;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use change::{Change, ChangeSet, validate_change_set};
pub use common::{
    Invoice, InvoiceId, InvoiceLine, LineItem, LineItemId, Order, OrderId, Product, ProductId,
    Table, TableNumber,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{Catalog, Store, StoreExt};
