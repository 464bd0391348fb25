//! Identifier validation.
//!
//! Table and field names are spliced into SQL text, so each one must be a
//! plain identifier: `[A-Za-z_][A-Za-z0-9_]*`.

use crate::error::{CoreError, CoreResult};

/// Checks that a table or field name is a plain SQL identifier.
///
/// ## Example
/// ```rust
/// use till_core::validate_ident;
///
/// assert!(validate_ident("sale_items").is_ok());
/// assert!(validate_ident("id; DROP TABLE sales").is_err());
/// ```
pub fn validate_ident(name: &str) -> CoreResult<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(name)
    } else {
        Err(CoreError::InvalidIdentifier(name.to_string()))
    }
}
