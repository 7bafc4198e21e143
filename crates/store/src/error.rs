use thiserror::Error;

/// Errors that can occur when reading from or writing to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entity was not in the status the change set expected.
    /// Another writer got there first; nothing from the change set was applied.
    #[error("Conflict on {entity} {id}: expected {expected}, found {actual}")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: String,
        actual: String,
    },

    /// A change referenced an entity that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The change set is malformed and was rejected before touching storage.
    #[error("Invalid change set: {0}")]
    InvalidChangeSet(String),

    /// A stored record could not be decoded.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// A failure injected through the in-memory store.
    #[error("Injected failure: {0}")]
    Injected(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn conflict(
        entity: &'static str,
        id: impl ToString,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        StoreError::Conflict {
            entity,
            id: id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
