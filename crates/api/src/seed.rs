//! Startup catalog loaded from a JSON file.
//!
//! ```json
//! {
//!   "tables": [1, 2, 3],
//!   "products": [
//!     { "id": "LOMO-FINO", "name": "Lomo Fino", "category": "Al Fuego", "price_cents": 4800 }
//!   ]
//! }
//! ```

use std::path::Path;

use common::{Money, Product, ProductId, Table};
use serde::Deserialize;
use store::{InMemoryStore, PostgresStore, StoreError};
use thiserror::Error;

/// Errors that can occur while loading the catalog file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid catalog: {0}")]
    Invalid(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Highest unit price a catalog entry may carry, in cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

#[derive(Debug, Deserialize)]
struct ProductEntry {
    id: String,
    name: String,
    #[serde(default)]
    category: String,
    /// Omitted when the product has no price on record.
    price_cents: Option<i64>,
}

/// Tables and products read from a catalog file.
#[derive(Debug, Default)]
pub struct CatalogSeed {
    pub tables: Vec<Table>,
    pub products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tables: Vec<u32>,
    #[serde(default)]
    products: Vec<ProductEntry>,
}

impl CatalogSeed {
    /// Parses a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        let file: CatalogFile = serde_json::from_str(json)?;

        if let Some(zero) = file.tables.iter().find(|n| **n == 0) {
            return Err(SeedError::Invalid(format!("table number {zero} must be positive")));
        }
        if let Some(entry) = file
            .products
            .iter()
            .find(|p| p.price_cents.is_some_and(|c| !(0..=MAX_PRICE_CENTS).contains(&c)))
        {
            return Err(SeedError::Invalid(format!(
                "product {} price must be between 0 and {MAX_PRICE_CENTS} cents",
                entry.id
            )));
        }

        Ok(Self {
            tables: file.tables.into_iter().map(Table::free).collect(),
            products: file
                .products
                .into_iter()
                .map(|entry| Product {
                    id: ProductId::new(entry.id),
                    name: entry.name,
                    category: entry.category,
                    price: entry.price_cents.map(Money::from_cents),
                })
                .collect(),
        })
    }

    /// Reads a catalog file.
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Builds an in-memory store holding this catalog.
    pub fn into_memory_store(self) -> InMemoryStore {
        InMemoryStore::with_catalog(self.tables, self.products)
    }

    /// Writes this catalog into PostgreSQL. Existing table occupancy is kept.
    pub async fn apply_to_postgres(&self, store: &PostgresStore) -> Result<(), SeedError> {
        for table in &self.tables {
            store.upsert_table(table).await?;
        }
        for product in &self.products {
            store.upsert_product(product).await?;
        }
        Ok(())
    }
}
