use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A write referenced a row that does not exist.
    #[error("Foreign key violated: {0}")]
    ForeignKeyViolation(String),

    /// A check constraint rejected the write.
    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    /// A stored value could not be mapped back into a record.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A failure injected by the in-memory store's test hooks.
    #[error("Injected failure: {0}")]
    Injected(&'static str),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
