//! # Transactions
//!
//! Two ways to make several writes atomic.
//!
//! ## Dual Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run_batch(statements)              run_transaction(|tx| async { … })  │
//! │                                                                         │
//! │  Statements are already built.      The body awaits, reads, decides.   │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  connection held for the          gate closed (outside callers wait)  │
//! │  whole batch                      BEGIN                                │
//! │  sqlx begin / commit              body(tx_client)                      │
//! │  (savepoint when already            Ok  → COMMIT                       │
//! │   inside a transaction)             Err → ROLLBACK, original error     │
//! │                                   gate opened                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Only the client passed to the body may be used inside it. Statements
//!   or a new `run_transaction` through an autocommit client (the outer
//!   one, or the global `client()`) fail with `Busy` when issued from the
//!   task running the body. Tasks the body spawns are not the owner: they
//!   wait at the gate until the transaction ends.
//! - Transactions don't nest. `run_transaction` on a transaction client
//!   issues a second BEGIN, and SQLite's refusal comes back as
//!   `TransactionFailed` with the outer transaction still open.
//! - Dropping a `run_transaction` future mid-body rolls the transaction
//!   back before anyone else gets the connection.

use std::future::Future;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use till_core::Statement;

use crate::client::Client;
use crate::error::{DbError, DbResult};
use crate::store::Store;

impl Client {
    /// Runs `body` inside BEGIN / COMMIT.
    ///
    /// ## Arguments
    /// * `body` - Receives a transaction client; every statement it issues
    ///   lands in the transaction
    ///
    /// ## Returns
    /// * `Ok(T)` - The body's value, after COMMIT succeeded
    /// * `Err(E)` - The body's own error after ROLLBACK, or a store error
    ///   from BEGIN / COMMIT
    ///
    /// ## Example
    /// ```rust,ignore
    /// let sale = client
    ///     .run_transaction(|tx| async move {
    ///         let sale = tx.table("sales")?.create(record! { "total" => 900 }).await?;
    ///         tx.table("sale_items")?
    ///             .create(record! { "sale_id" => sale.get("id").cloned(), "qty" => 2 })
    ///             .await?;
    ///         Ok::<_, DbError>(sale)
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_transaction<F, Fut, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let gate = if self.is_transaction() {
            None
        } else {
            Some(self.store().close_gate().await?)
        };

        let tx = self.transaction_scope();
        tx.store().control("BEGIN").await?;
        info!("Transaction started");

        let mut open = OpenTransaction {
            store: tx.store().clone(),
            gate,
            finished: false,
        };

        let outcome = open.store.run_as_owner(body(tx)).await;

        let result = match outcome {
            Ok(value) => match open.store.control("COMMIT").await {
                Ok(()) => {
                    info!("Transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    open.rollback().await;
                    Err(err.into())
                }
            },
            Err(err) => {
                open.rollback().await;
                Err(err)
            }
        };

        open.finished = true;
        result
    }

    /// Runs pre-built statements atomically; returns each one's row count.
    ///
    /// On the first failure nothing from the batch is kept.
    pub async fn run_batch(&self, statements: Vec<Statement>) -> DbResult<Vec<u64>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }

        debug!(statements = statements.len(), "Running batch");
        let counts = self.store().execute_batch(&statements).await?;
        info!(statements = counts.len(), "Batch committed");
        Ok(counts)
    }
}

/// A BEGIN that has not been answered with COMMIT or ROLLBACK yet.
struct OpenTransaction {
    store: Store,
    gate: Option<OwnedMutexGuard<()>>,
    finished: bool,
}

impl OpenTransaction {
    async fn rollback(&mut self) {
        match self.store.control("ROLLBACK").await {
            Ok(()) => info!("Transaction rolled back"),
            Err(err) => warn!(error = %err, "Rollback failed"),
        }
    }
}

impl Drop for OpenTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        warn!("Transaction dropped while open, rolling back");
        let store = self.store.clone();
        let gate = self.gate.take();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    // Keep outside callers queued until the rollback lands.
                    let _gate = gate;
                    if let Err(err) = store.control("ROLLBACK").await {
                        warn!(error = %err, "Rollback of dropped transaction failed");
                    }
                });
            }
            Err(_) => warn!("No runtime to roll back dropped transaction"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
