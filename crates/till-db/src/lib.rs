//! # till-db: Execution Layer for Till
//!
//! Runs the statements till-core builds against the embedded SQLite store,
//! and attaches declared relations in batches.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Till Data Flow                                 │
//! │                                                                         │
//! │  IPC command (list_sales { where, include, orderBy })                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    Client     │    │  TableModel   │    │   Resolver   │  │   │
//! │  │   │ (client.rs)   │───►│  (model.rs)   │───►│(resolver.rs) │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ model cache   │    │ find / create │    │ one query    │  │   │
//! │  │   │ raw SQL       │    │ update/delete │    │ per relation │  │   │
//! │  │   │ transactions  │    │ aggregate     │    │ edge         │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────┬───────┘  │   │
//! │  │           └────────────────────┼───────────────────┘          │   │
//! │  │                                ▼                               │   │
//! │  │                      ┌───────────────────┐                    │   │
//! │  │                      │ Store (store.rs)  │                    │   │
//! │  │                      │ one connection    │                    │   │
//! │  │                      └─────────┬─────────┘                    │   │
//! │  └────────────────────────────────┼──────────────────────────────┘   │
//! │                                   ▼                                    │
//! │                           SQLite database                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`client`] - Client handle and the process-wide instance
//! - [`model`] - Per-table CRUD and aggregates
//! - [`store`] - The connection, binding and row decoding
//! - [`transaction`] - `run_transaction` and `run_batch`
//! - [`config`] - Connection settings (TOML + environment)
//! - [`error`] - Database error types
//! - [`pos`] - Demo POS tables and registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_core::{FindArgs, Include};
//! use till_db::{Client, DbConfig};
//!
//! let client = Client::connect(DbConfig::new("till.db"), till_db::pos::schema()?).await?;
//!
//! let sales = client.table("sales")?;
//! let recent = sales
//!     .find_many(FindArgs::new().include(Include::new().relation("items")).take(20))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod pos;
mod resolver;
pub mod store;
pub mod transaction;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{client, init, Client};
pub use config::DbConfig;
pub use error::{DbError, DbResult};
pub use model::TableModel;
pub use store::Store;
