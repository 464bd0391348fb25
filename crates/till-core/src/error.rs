//! # Error Types
//!
//! Translation errors raised by till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  └── CoreError   - Descriptor / parameter problems, found before SQL   │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  └── DbError     - Store failures, wraps CoreError                     │
//! │                                                                         │
//! │  Flow: CoreError → DbError::Core → caller                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` is raised synchronously while a statement is being
//! built, so nothing has reached the store when one is returned.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors produced while translating a query descriptor into SQL.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value destined for binding is not a primitive the store accepts.
    ///
    /// ## When This Occurs
    /// - An array or object in a scalar position (`{ total: [1, 2] }`)
    /// - A JSON integer beyond the signed 64-bit range
    /// - A NaN or infinite real
    #[error("Invalid parameter type for {field}: {kind} cannot be bound")]
    InvalidParameterType { field: String, kind: &'static str },

    /// A single-record update had nothing to set once `id` was excluded.
    #[error("No fields to update on {table}")]
    NoFieldsToUpdate { table: String },

    /// A table or field name is not a plain SQL identifier.
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// A field is not in the column set declared for its table.
    #[error("Unknown field {table}.{field}")]
    UnknownField { table: String, field: String },

    /// The descriptor itself is malformed (wrong shape, bad direction, ...).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The relationship registry definition could not be loaded.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// The include tree nests deeper than the configured limit.
    #[error("Include tree nests deeper than {max} levels")]
    IncludeTooDeep { max: usize },
}

impl CoreError {
    /// Creates an InvalidParameterType error for a field.
    pub fn invalid_parameter(field: impl Into<String>, kind: &'static str) -> Self {
        CoreError::InvalidParameterType {
            field: field.into(),
            kind,
        }
    }

    /// Creates an InvalidQuery error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        CoreError::InvalidQuery(message.into())
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::invalid_parameter("total", "array");
        assert_eq!(
            err.to_string(),
            "Invalid parameter type for total: array cannot be bound"
        );

        let err = CoreError::NoFieldsToUpdate {
            table: "sales".to_string(),
        };
        assert_eq!(err.to_string(), "No fields to update on sales");
    }
}
