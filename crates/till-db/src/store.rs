//! # Store
//!
//! The single embedded SQLite connection and everything that touches it.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One Connection, Serialized                         │
//! │                                                                         │
//! │  Client::connect(config)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────────────────────┐                     │
//! │  │ Shared                                        │                     │
//! │  │   gate: Mutex<()>        ← held by an open    │                     │
//! │  │                            manual transaction │                     │
//! │  │   conn: Mutex<SqliteConnection>               │                     │
//! │  │   statements: AtomicU64  ← diagnostics        │                     │
//! │  └───────────────────────────────────────────────┘                     │
//! │       ▲                         ▲                                       │
//! │       │ gate, then conn         │ conn only                             │
//! │  Store (autocommit)        Store (transaction scope)                    │
//! │  every client call         the client handed to a                       │
//! │                            run_transaction body                         │
//! │                                                                         │
//! │  No two statements ever run at once. While a manual transaction is     │
//! │  open, autocommit statements from other tasks queue at the gate        │
//! │  instead of landing inside it. The task running the transaction body   │
//! │  gets `Busy` from an autocommit handle, since it holds the gate.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Classes
//! Columns come back by the storage class of each value, not the declared
//! type: INTEGER → `Integer`, REAL → `Real`, TEXT → `Text`, BLOB → `Blob`,
//! NULL → `Null`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Column, ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};

use till_core::{Record, SqlParam, Statement, Value};

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};

/// Savepoint used by batches issued inside a manual transaction.
const BATCH_SAVEPOINT: &str = "till_batch";

tokio::task_local! {
    /// Store whose manual transaction body the current task is running,
    /// by the address of its shared state.
    static TRANSACTION_OWNER: usize;
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug)]
struct Shared {
    /// `None` once the store is closed.
    conn: Mutex<Option<SqliteConnection>>,

    /// Held for the whole life of a manual transaction.
    gate: Arc<Mutex<()>>,

    /// Data statements executed (transaction control excluded).
    statements: AtomicU64,

    log_statements: bool,
}

/// Whether a handle waits at the transaction gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Autocommit,
    Transaction,
}

/// Handle to the shared connection.
///
/// Cheap to clone; every clone talks to the same connection.
#[derive(Debug, Clone)]
pub struct Store {
    shared: Arc<Shared>,
    scope: Scope,
}

/// Exclusive access to the connection for one statement (or one batch).
struct Lease<'a> {
    _gate: Option<OwnedMutexGuard<()>>,
    conn: MutexGuard<'a, Option<SqliteConnection>>,
}

impl Lease<'_> {
    fn conn(&mut self) -> DbResult<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::ConnectionFailed("connection is closed".to_string()))
    }
}

impl Store {
    /// Opens the connection.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Applies `busy_timeout` and `foreign_keys`
    /// 3. Switches file databases to WAL with NORMAL synchronous
    pub async fn open(config: &DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening database connection"
        );

        let mut options = if config.is_in_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
        };

        options = options
            .foreign_keys(config.foreign_keys)
            .busy_timeout(config.busy_timeout);

        if config.wal && !config.is_in_memory() {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let conn = options
            .connect()
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!("Database connection ready");

        Ok(Store {
            shared: Arc::new(Shared {
                conn: Mutex::new(Some(conn)),
                gate: Arc::new(Mutex::new(())),
                statements: AtomicU64::new(0),
                log_statements: config.log_statements,
            }),
            scope: Scope::Autocommit,
        })
    }

    /// A handle that bypasses the gate, for use inside a manual transaction.
    pub(crate) fn transaction_scope(&self) -> Store {
        Store {
            shared: Arc::clone(&self.shared),
            scope: Scope::Transaction,
        }
    }

    pub(crate) fn in_transaction(&self) -> bool {
        self.scope == Scope::Transaction
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }

    /// Whether the current task is running a transaction body on this store.
    fn owned_by_current_task(&self) -> bool {
        TRANSACTION_OWNER
            .try_with(|owner| *owner == self.id())
            .unwrap_or(false)
    }

    /// Drives `body` with the current task marked as the transaction owner.
    pub(crate) async fn run_as_owner<F: Future>(&self, body: F) -> F::Output {
        TRANSACTION_OWNER.scope(self.id(), body).await
    }

    /// Waits until no manual transaction is open, then holds the gate.
    ///
    /// ## Errors
    /// `Busy` when the calling task already holds the gate through an open
    /// transaction; waiting would never end.
    pub(crate) async fn close_gate(&self) -> DbResult<OwnedMutexGuard<()>> {
        if self.owned_by_current_task() {
            return Err(DbError::Busy(
                "a transaction is open on this task; use the client passed to its body"
                    .to_string(),
            ));
        }
        Ok(Arc::clone(&self.shared.gate).lock_owned().await)
    }

    /// Holds other autocommit callers off for a read-then-write pair.
    ///
    /// Returns the guard and a handle that passes the gate while it is held.
    /// Inside a manual transaction the gate is already held; nothing to take.
    pub(crate) async fn hold(&self) -> DbResult<(Option<OwnedMutexGuard<()>>, Store)> {
        match self.scope {
            Scope::Autocommit => Ok((Some(self.close_gate().await?), self.transaction_scope())),
            Scope::Transaction => Ok((None, self.clone())),
        }
    }

    async fn lease(&self) -> DbResult<Lease<'_>> {
        let gate = match self.scope {
            Scope::Autocommit => Some(self.close_gate().await?),
            Scope::Transaction => None,
        };
        Ok(Lease {
            _gate: gate,
            conn: self.shared.conn.lock().await,
        })
    }

    /// Number of data statements executed since the store opened.
    pub fn statements_executed(&self) -> u64 {
        self.shared.statements.load(Ordering::Relaxed)
    }

    fn record_statement(&self, statement: &Statement) {
        self.shared.statements.fetch_add(1, Ordering::Relaxed);
        if self.shared.log_statements {
            debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Runs a query and decodes every row.
    pub async fn fetch_all(&self, statement: &Statement) -> DbResult<Vec<Record>> {
        let mut lease = self.lease().await?;
        let conn = lease.conn()?;
        self.record_statement(statement);

        let rows = bind_params(&statement.sql, &statement.params)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(decode_row).collect()
    }

    /// Runs a statement and returns the number of rows it changed.
    pub async fn execute(&self, statement: &Statement) -> DbResult<u64> {
        let mut lease = self.lease().await?;
        let conn = lease.conn()?;
        self.record_statement(statement);

        let result = bind_params(&statement.sql, &statement.params)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Runs pre-built statements as one atomic unit.
    ///
    /// ## How It Works
    /// - Autocommit: sqlx's native transaction (`begin` / `commit`), rolled
    ///   back when it is dropped after the first failure
    /// - Inside a manual transaction: a savepoint, so the outer transaction
    ///   stays open either way
    ///
    /// The connection is held for the whole batch; nothing interleaves.
    pub async fn execute_batch(&self, statements: &[Statement]) -> DbResult<Vec<u64>> {
        let mut lease = self.lease().await?;
        let conn = lease.conn()?;

        match self.scope {
            Scope::Autocommit => {
                let mut tx = conn.begin().await?;
                let mut counts = Vec::with_capacity(statements.len());
                for statement in statements {
                    self.record_statement(statement);
                    let result = bind_params(&statement.sql, &statement.params)
                        .execute(&mut *tx)
                        .await?;
                    counts.push(result.rows_affected());
                }
                tx.commit().await?;
                Ok(counts)
            }
            Scope::Transaction => {
                control(conn, &format!("SAVEPOINT {BATCH_SAVEPOINT}")).await?;
                match self.execute_each(conn, statements).await {
                    Ok(counts) => {
                        control(conn, &format!("RELEASE {BATCH_SAVEPOINT}")).await?;
                        Ok(counts)
                    }
                    Err(err) => {
                        let undo = format!("ROLLBACK TO {BATCH_SAVEPOINT}; RELEASE {BATCH_SAVEPOINT}");
                        if let Err(rollback_err) = raw_control(conn, &undo).await {
                            warn!(error = %rollback_err, "Failed to roll back batch savepoint");
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    async fn execute_each(&self, conn: &mut SqliteConnection, statements: &[Statement]) -> DbResult<Vec<u64>> {
        let mut counts = Vec::with_capacity(statements.len());
        for statement in statements {
            self.record_statement(statement);
            let result = bind_params(&statement.sql, &statement.params)
                .execute(&mut *conn)
                .await?;
            counts.push(result.rows_affected());
        }
        Ok(counts)
    }

    /// Issues BEGIN / COMMIT / ROLLBACK. Not counted as a data statement.
    pub(crate) async fn control(&self, sql: &str) -> DbResult<()> {
        let mut lease = self.lease().await?;
        control(lease.conn()?, sql).await
    }

    /// Checks the connection answers `SELECT 1`.
    pub async fn health_check(&self) -> bool {
        let Ok(mut lease) = self.lease().await else {
            return false;
        };
        match lease.conn() {
            Ok(conn) => sqlx::query("SELECT 1").execute(conn).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Closes the connection. Later operations fail with `ConnectionFailed`.
    pub async fn close(&self) -> DbResult<()> {
        let conn = self.lease().await?.conn.take();
        if let Some(conn) = conn {
            info!("Closing database connection");
            conn.close().await?;
        }
        Ok(())
    }
}

async fn control(conn: &mut SqliteConnection, sql: &str) -> DbResult<()> {
    debug!(sql, "Transaction control");
    sqlx::query(sql).execute(conn).await.map_err(|err| match DbError::from(err) {
        DbError::QueryFailed(message) => DbError::TransactionFailed(message),
        other => other,
    })?;
    Ok(())
}

/// Multi-statement control text, run without preparing.
async fn raw_control(conn: &mut SqliteConnection, sql: &str) -> DbResult<()> {
    sqlx::raw_sql(sql).execute(conn).await?;
    Ok(())
}

// =============================================================================
// Binding & Decoding
// =============================================================================

/// Binds each parameter positionally.
fn bind_params<'q>(sql: &'q str, params: &'q [SqlParam]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params.iter().fold(sqlx::query(sql), |query, param| match param {
        SqlParam::Null => query.bind(None::<i64>),
        SqlParam::Integer(value) => query.bind(*value),
        SqlParam::Real(value) => query.bind(*value),
        SqlParam::Text(value) => query.bind(value.as_str()),
        SqlParam::Blob(value) => query.bind(value.as_slice()),
    })
}

/// Decodes a row by the storage class of each value.
fn decode_row(row: &SqliteRow) -> DbResult<Record> {
    let mut record = Record::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let class = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };

        let value = match class.as_deref() {
            None => Value::Null,
            Some("INTEGER") => Value::Integer(row.try_get_unchecked::<i64, _>(index)?),
            Some("REAL") => Value::Real(row.try_get_unchecked::<f64, _>(index)?),
            Some("BLOB") => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
            Some(_) => Value::Text(row.try_get_unchecked::<String, _>(index)?),
        };

        record.insert(column.name(), value);
    }

    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn store() -> Store {
        Store::open(&DbConfig::in_memory()).await.unwrap()
    }

    fn stmt(sql: &str, params: Vec<SqlParam>) -> Statement {
        Statement::new(sql, params)
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = store().await;
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_values_decode_by_storage_class() {
        let store = store().await;
        let rows = store
            .fetch_all(&stmt(
                "SELECT ? AS i, ? AS r, ? AS t, ? AS b, ? AS n",
                vec![
                    SqlParam::Integer(7),
                    SqlParam::Real(1.5),
                    SqlParam::Text("tea".to_string()),
                    SqlParam::Blob(vec![0xde, 0xad]),
                    SqlParam::Null,
                ],
            ))
            .await
            .unwrap();

        let row = &rows[0];
        assert_eq!(row.keys().collect::<Vec<_>>(), ["i", "r", "t", "b", "n"]);
        assert_eq!(row.get("i"), Some(&Value::Integer(7)));
        assert_eq!(row.get("r"), Some(&Value::Real(1.5)));
        assert_eq!(row.get("t"), Some(&Value::Text("tea".to_string())));
        assert_eq!(row.get("b"), Some(&Value::Blob(vec![0xde, 0xad])));
        assert_eq!(row.get("n"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_execute_counts_rows_and_statements() {
        let store = store().await;
        store
            .execute(&stmt("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER)", vec![]))
            .await
            .unwrap();
        let changed = store
            .execute(&stmt(
                "INSERT INTO t (id, n) VALUES ('a', 1), ('b', 2)",
                vec![],
            ))
            .await
            .unwrap();

        assert_eq!(changed, 2);
        assert_eq!(store.statements_executed(), 2);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_failure() {
        let store = store().await;
        store
            .execute(&stmt("CREATE TABLE t (id TEXT PRIMARY KEY)", vec![]))
            .await
            .unwrap();

        let insert = |id: &str| stmt("INSERT INTO t (id) VALUES (?)", vec![SqlParam::Text(id.to_string())]);
        let err = store
            .execute_batch(&[insert("a"), insert("b"), insert("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "t.id"));

        let rows = store.fetch_all(&stmt("SELECT * FROM t", vec![])).await.unwrap();
        assert!(rows.is_empty());

        let counts = store.execute_batch(&[insert("a"), insert("b")]).await.unwrap();
        assert_eq!(counts, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_hold_keeps_autocommit_writers_out() {
        let store = store().await;
        store
            .execute(&stmt("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER)", vec![]))
            .await
            .unwrap();
        store
            .execute(&stmt("INSERT INTO t (id, n) VALUES ('a', 1)", vec![]))
            .await
            .unwrap();

        let (gate, held) = store.hold().await.unwrap();
        assert!(gate.is_some());

        let outside = store.clone();
        let writer = tokio::spawn(async move {
            outside
                .execute(&stmt("UPDATE t SET n = 99 WHERE id = 'a'", vec![]))
                .await
        });
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert!(!writer.is_finished());

        // The holder reads and writes past its own gate.
        held.execute(&stmt("UPDATE t SET n = n + 1 WHERE id = 'a'", vec![]))
            .await
            .unwrap();
        let rows = held.fetch_all(&stmt("SELECT n FROM t", vec![])).await.unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::Integer(2)));

        drop(gate);
        assert_eq!(writer.await.unwrap().unwrap(), 1);
        let rows = store.fetch_all(&stmt("SELECT n FROM t", vec![])).await.unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::Integer(99)));

        let (gate, _) = held.hold().await.unwrap();
        assert!(gate.is_none());
    }

    #[tokio::test]
    async fn test_closed_store_fails_cleanly() {
        let store = store().await;
        store.close().await.unwrap();

        assert!(!store.health_check().await);
        let err = store.fetch_all(&stmt("SELECT 1", vec![])).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }
}
