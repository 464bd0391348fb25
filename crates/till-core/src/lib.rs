//! # till-core: Pure Query Translation for Till
//!
//! This crate turns structural query descriptors (`where`, `select`,
//! `include`, `orderBy`, `take`/`skip`) into parameterized SQL. It has zero
//! I/O dependencies: nothing here touches a connection.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Till Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  POS commands (IPC handlers)                    │   │
//! │  │       list_sales, create_sale, void_sale, daily_totals, ...    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ FindArgs / Record / AggregateArgs      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   value   │  │ predicate │  │projection │  │ relation  │  │   │
//! │  │   │  Value    │  │  Filter   │  │ OrderBy   │  │  Schema   │  │   │
//! │  │   │  Record   │  │  Op       │  │ Page      │  │  Relation │  │   │
//! │  │   │  SqlParam │  │  Fragment │  │ Select    │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Statement { sql, params }              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Execution Layer)                    │   │
//! │  │         SQLite connection, table models, relation resolver      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`value`] - Values, records and the scalar coercion boundary
//! - [`predicate`] - `where` filters and their translation
//! - [`projection`] - `orderBy`, `take`/`skip`, `select`
//! - [`include`] - Include trees for relation resolution
//! - [`relation`] - The relationship registry
//! - [`sql`] - Complete statement builders
//! - [`aggregate`] - Aggregate requests and result reshaping
//! - [`error`] - Translation error types
//!
//! ## Design Principles
//!
//! 1. **Errors Before SQL**: Bad names and unbindable values fail while the
//!    statement is being built, never at the store
//! 2. **Typed Parameters**: Only `SqlParam` can reach a placeholder
//! 3. **Validated Names**: Every identifier spliced into SQL is checked
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::{sql, Filter, OrderBy, Page};
//!
//! let filter = Filter::from_json(&serde_json::json!({
//!     "status": { "in": ["PENDING", "DONE"] }
//! })).unwrap();
//!
//! let stmt = sql::select(
//!     "orders",
//!     filter.translate().unwrap(),
//!     &OrderBy::new().asc("id"),
//!     &Page::default(),
//! ).unwrap();
//!
//! assert_eq!(stmt.sql, "SELECT * FROM orders WHERE status IN (?, ?) ORDER BY id ASC");
//! assert_eq!(stmt.params.len(), 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod args;
pub mod error;
pub mod id;
pub mod ident;
pub mod include;
pub mod predicate;
pub mod projection;
pub mod relation;
pub mod sql;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use aggregate::{AggregateArgs, CountSpec};
pub use args::FindArgs;
pub use error::{CoreError, CoreResult};
pub use id::generate_id;
pub use ident::validate_ident;
pub use include::{Include, RelationQuery};
pub use predicate::{Filter, Fragment, Op, Predicate};
pub use projection::{Direction, OrderBy, Page, Select};
pub use relation::{Relation, RelationKind, Schema, SchemaBuilder};
pub use sql::{Statement, PRIMARY_KEY};
pub use value::{KeyValue, Record, SqlParam, Value};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default limit on include nesting.
///
/// Stops a self-referential include tree (`category.parent.parent…`) from
/// recursing without bound.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 8;
