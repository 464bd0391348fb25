//! # Database Error Types
//!
//! Error types for statement execution.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  CoreError (till-core)          SQLite Error (sqlx::Error)              │
//! │  raised before any SQL runs     raised by the store                    │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  DbError::Core                  DbError (this module) ← categorised,   │
//! │       │                                │                 message kept  │
//! │       └────────────────┬───────────────┘                                │
//! │                        ▼                                                │
//! │  IPC command error ← Serialized for the frontend                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is retried. "Not found" is never an error: reads return
//! `None` or an empty list.

use sqlx::error::ErrorKind;
use thiserror::Error;
use till_core::CoreError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The query descriptor or its values were rejected before execution.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating a row with an id that already exists
    /// - Duplicate SKU or receipt number
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - A sale item referencing a sale that doesn't exist
    /// - Deleting a product still referenced by sale items
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The database file is locked by another writer.
    ///
    /// ## When This Occurs
    /// - Another process holds a write lock past `busy_timeout`
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created or opened
    /// - File permissions issue
    /// - The connection was closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed (syntax error, missing table, ...).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN / COMMIT / ROLLBACK was rejected.
    ///
    /// ## When This Occurs
    /// - Starting a transaction inside an open one
    /// - Committing when no transaction is active
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// `till_db::client()` was called before `till_db::init()`.
    #[error("Database client not initialized")]
    NotInitialized,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        DbError::Config(message.into())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// UNIQUE constraint failed: <table>.<column>    → UniqueViolation
/// FOREIGN KEY constraint failed                 → ForeignKeyViolation
/// SQLITE_BUSY / SQLITE_LOCKED                   → Busy
/// cannot start a transaction within a ...       → TransactionFailed
/// Other database errors                         → QueryFailed
/// Io / Tls / Protocol                           → ConnectionFailed
/// Other                                         → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();
                // Extended result codes keep the primary code in the low byte.
                let primary = code
                    .as_deref()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);

                if matches!(db_err.kind(), ErrorKind::UniqueViolation)
                    || msg.contains("UNIQUE constraint failed")
                {
                    // "UNIQUE constraint failed: sales.id"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if matches!(db_err.kind(), ErrorKind::ForeignKeyViolation)
                    || msg.contains("FOREIGN KEY constraint failed")
                {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if matches!(primary, Some(5) | Some(6)) || msg.contains("is locked") {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("within a transaction") || msg.contains("no transaction is active") {
                    DbError::TransactionFailed(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                DbError::ConnectionFailed(err.to_string())
            }

            sqlx::Error::Configuration(_) => DbError::Config(err.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
