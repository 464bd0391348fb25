//! # Client
//!
//! The object the rest of the app talks to: one per database.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Client Lifecycle                                │
//! │                                                                         │
//! │  App Startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  till_db::init(config, schema) ← once; later calls return the same     │
//! │       │                          client                                 │
//! │       ▼                                                                 │
//! │  till_db::client()?.table("sales")?  ← model created on first use,     │
//! │       │                                cached afterwards                │
//! │       ▼                                                                 │
//! │  sales.find_many(args).await?                                          │
//! │                                                                         │
//! │  Tests skip the global and call Client::connect directly.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use till_core::{validate_ident, Record, Schema, Statement, Value};

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::model::TableModel;
use crate::store::Store;

type ModelCache = Arc<Mutex<HashMap<String, Arc<TableModel>>>>;

/// Handle to one database: table models, raw SQL and transactions.
///
/// Cheap to clone; clones share the connection and the model cache.
#[derive(Debug, Clone)]
pub struct Client {
    store: Store,
    schema: Arc<Schema>,
    max_include_depth: usize,
    models: ModelCache,
}

impl Client {
    /// Opens the database described by `config`.
    ///
    /// ## Arguments
    /// * `config` - Connection settings; validated first
    /// * `schema` - Relation registry and optional column sets
    pub async fn connect(config: DbConfig, schema: Schema) -> DbResult<Self> {
        config.validate()?;
        let store = Store::open(&config).await?;

        info!(
            path = %config.database_path.display(),
            max_include_depth = config.max_include_depth,
            "Database client ready"
        );

        Ok(Client {
            store,
            schema: Arc::new(schema),
            max_include_depth: config.max_include_depth,
            models: ModelCache::default(),
        })
    }

    /// The model for `name`, created on first use.
    ///
    /// ## Returns
    /// * `Ok(model)` - The same `Arc` on every call for the same name
    /// * `Err(Core(InvalidIdentifier))` - `name` is not a plain identifier
    pub fn table(&self, name: &str) -> DbResult<Arc<TableModel>> {
        validate_ident(name)?;

        let mut models = self
            .models
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let model = models.entry(name.to_string()).or_insert_with(|| {
            debug!(table = name, "Creating table model");
            Arc::new(TableModel::new(
                name,
                self.store.clone(),
                Arc::clone(&self.schema),
                self.max_include_depth,
            ))
        });
        Ok(Arc::clone(model))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Runs caller-written SQL and returns the decoded rows.
    ///
    /// `values` go through the same coercion as model operations.
    pub async fn raw_query(&self, sql: &str, values: &[Value]) -> DbResult<Vec<Record>> {
        let stmt = Statement::raw(sql, values)?;
        self.store.fetch_all(&stmt).await
    }

    /// Runs caller-written SQL and returns the number of changed rows.
    pub async fn raw_execute(&self, sql: &str, values: &[Value]) -> DbResult<u64> {
        let stmt = Statement::raw(sql, values)?;
        self.store.execute(&stmt).await
    }

    /// Data statements executed on this database so far.
    pub fn statements_executed(&self) -> u64 {
        self.store.statements_executed()
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    /// Closes the connection. Every clone is closed with it.
    pub async fn close(&self) -> DbResult<()> {
        self.store.close().await
    }

    /// Whether this client was handed to a `run_transaction` body.
    pub fn is_transaction(&self) -> bool {
        self.store.in_transaction()
    }

    /// A client on the same connection that bypasses the transaction gate.
    ///
    /// Gets its own model cache so models never leak out of the
    /// transaction body.
    pub(crate) fn transaction_scope(&self) -> Client {
        Client {
            store: self.store.transaction_scope(),
            schema: Arc::clone(&self.schema),
            max_include_depth: self.max_include_depth,
            models: ModelCache::default(),
        }
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }
}

// =============================================================================
// Global Client
// =============================================================================

static CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Connects the process-wide client. Only the first call connects.
///
/// ## Usage
/// ```rust,ignore
/// let config = DbConfig::load(Some("till.toml".into()))?;
/// till_db::init(config, till_db::pos::schema()?).await?;
///
/// // anywhere else
/// let sales = till_db::client()?.table("sales")?;
/// ```
pub async fn init(config: DbConfig, schema: Schema) -> DbResult<&'static Client> {
    if let Some(existing) = CLIENT.get() {
        warn!("Database client already initialized, ignoring new config");
        return Ok(existing);
    }
    CLIENT
        .get_or_try_init(|| Client::connect(config, schema))
        .await
}

/// The process-wide client.
///
/// ## Returns
/// * `Err(DbError::NotInitialized)` - `init` has not completed yet
pub fn client() -> DbResult<&'static Client> {
    CLIENT.get().ok_or(DbError::NotInitialized)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use pretty_assertions::assert_eq;
    use till_core::CoreError;

    #[tokio::test]
    async fn test_table_models_are_cached() {
        let client = testing::client().await;

        let a = client.table("sales").unwrap();
        let b = client.table("sales").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.table(), "sales");

        let err = client.table("sales; DROP TABLE sales").unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidIdentifier(_))));
    }

    #[tokio::test]
    async fn test_raw_passthrough_coerces_params() {
        let client = testing::client().await;

        let changed = client
            .raw_execute(
                "INSERT INTO customers (id, name, is_member) VALUES (?, ?, ?)",
                &[Value::from("c1"), Value::from("Ayesha"), Value::from(true)],
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let rows = client
            .raw_query("SELECT name, is_member FROM customers WHERE id = ?", &[Value::from("c1")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("Ayesha")));
        assert_eq!(rows[0].get("is_member"), Some(&Value::Integer(1)));

        let err = client
            .raw_query("SELECT ?", &[Value::Array(vec![])])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidParameterType { .. })));
    }

    #[tokio::test]
    async fn test_raw_errors_keep_sqlite_message() {
        let client = testing::client().await;
        let err = client.raw_query("SELECT * FROM refunds", &[]).await.unwrap_err();
        match err {
            DbError::QueryFailed(message) => assert!(message.contains("no such table: refunds")),
            other => panic!("expected QueryFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close() {
        let client = testing::client().await;
        assert!(client.health_check().await);

        client.close().await.unwrap();
        assert!(!client.health_check().await);
        let err = client.raw_query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_global_client() {
        let first = init(DbConfig::in_memory(), Schema::empty()).await.unwrap();
        let again = init(DbConfig::in_memory(), Schema::empty()).await.unwrap();
        assert!(std::ptr::eq(first, again));
        assert!(std::ptr::eq(client().unwrap(), first));
    }
}
