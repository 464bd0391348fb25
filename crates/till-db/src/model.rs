//! # Table Model
//!
//! The CRUD surface for one table. Every operation is built from the
//! till-core translators; nothing here writes SQL by hand.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    find_many(args)                                      │
//! │                                                                         │
//! │  1. check include depth, field names        (before any SQL)           │
//! │  2. Filter::translate + OrderBy + Page  ──► SELECT * FROM t …          │
//! │  3. Store::fetch_all                     ──► Vec<Record>               │
//! │  4. resolver::resolve(include)           ──► one query per edge        │
//! │  5. Select::apply_all                    ──► narrowed records          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes that return a row (`create`, `update`) re-read it by id, so the
//! caller always gets the read-path shape. `update`, `delete` and `upsert`
//! read and write under one hold of the transaction gate, so no other
//! autocommit caller changes the row in between.

use std::sync::Arc;

use tracing::debug;

use till_core::{
    generate_id, sql, AggregateArgs, CoreError, Filter, FindArgs, Include, Op, OrderBy, Page,
    Record, RelationQuery, Schema, Select, Statement, Value, PRIMARY_KEY,
};

use crate::error::{DbError, DbResult};
use crate::resolver;
use crate::store::Store;

/// Generic CRUD executor bound to one table.
///
/// Holds no per-call state; one instance serves any number of calls.
///
/// ## Usage
/// ```rust,ignore
/// let sales = client.table("sales")?;
///
/// let sale = sales.create(record! { "total" => 1250, "status" => "OPEN" }).await?;
/// let open = sales
///     .find_many(FindArgs::new().filter(Filter::new().eq("status", "OPEN")))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct TableModel {
    table: String,
    store: Store,
    schema: Arc<Schema>,
    max_include_depth: usize,
}

impl TableModel {
    pub(crate) fn new(table: impl Into<String>, store: Store, schema: Arc<Schema>, max_include_depth: usize) -> Self {
        TableModel {
            table: table.into(),
            store,
            schema,
            max_include_depth,
        }
    }

    /// Name of the table this model reads and writes.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    /// A model for another table on the same connection.
    pub(crate) fn related(&self, table: &str) -> TableModel {
        TableModel::new(table, self.store.clone(), Arc::clone(&self.schema), self.max_include_depth)
    }

    /// This table through another handle to the connection.
    fn with_store(&self, store: Store) -> TableModel {
        TableModel::new(self.table.clone(), store, Arc::clone(&self.schema), self.max_include_depth)
    }

    // =========================================================================
    // Checks (all run before SQL is issued)
    // =========================================================================

    fn check_filter(&self, filter: &Filter) -> DbResult<()> {
        Ok(self.schema.check_fields(&self.table, filter.fields())?)
    }

    fn check_data(&self, data: &Record) -> DbResult<()> {
        Ok(self.schema.check_fields(&self.table, data.keys())?)
    }

    fn check_read(&self, args: &FindArgs) -> DbResult<()> {
        args.include.check_depth(self.max_include_depth)?;
        self.check_filter(&args.filter)?;
        self.schema.check_fields(&self.table, args.order_by.fields())?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns the first row matching `args.filter`, or `None`.
    ///
    /// `SELECT * FROM t WHERE … LIMIT 1`; `order_by`, `take` and `skip` are
    /// not used.
    pub async fn find_unique(&self, args: FindArgs) -> DbResult<Option<Record>> {
        self.check_read(&args)?;

        let page = Page {
            take: Some(1),
            skip: None,
        };
        let stmt = sql::select(&self.table, args.filter.translate()?, &OrderBy::new(), &page)?;
        let rows = self.store.fetch_all(&stmt).await?;

        let rows = self.finish(rows, &args.include, args.select.as_ref()).await?;
        Ok(rows.into_iter().next())
    }

    /// `find_many` with `take = 1`.
    pub async fn find_first(&self, args: FindArgs) -> DbResult<Option<Record>> {
        let rows = self.find_many(args.take(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Returns every matching row, possibly none.
    ///
    /// ## Arguments
    /// * `args` - `where`, `orderBy`, `take`/`skip`, `include`, `select`
    ///
    /// ## Returns
    /// * `Ok(Vec<Record>)` - Rows with relations attached and select applied
    /// * `Err(DbError::Core)` - Bad descriptor, raised before any SQL
    pub async fn find_many(&self, args: FindArgs) -> DbResult<Vec<Record>> {
        self.check_read(&args)?;

        let stmt = sql::select(
            &self.table,
            args.filter.translate()?,
            &args.order_by,
            &args.page(),
        )?;
        let rows = self.store.fetch_all(&stmt).await?;

        self.finish(rows, &args.include, args.select.as_ref()).await
    }

    /// Attaches relations, then narrows.
    async fn finish(
        &self,
        mut rows: Vec<Record>,
        include: &Include,
        select: Option<&Select>,
    ) -> DbResult<Vec<Record>> {
        if !include.is_empty() && !rows.is_empty() {
            resolver::resolve(self, &mut rows, include).await?;
        }
        if let Some(select) = select {
            select.apply_all(&mut rows);
        }
        Ok(rows)
    }

    /// Rows of this table whose `field` is one of `keys`.
    ///
    /// Used by the resolver; the relation scope's own filter and order are
    /// merged in by the caller.
    pub(crate) async fn find_in(
        &self,
        field: &str,
        keys: Vec<Value>,
        scope: &RelationQuery,
    ) -> DbResult<Vec<Record>> {
        let filter = Filter::new()
            .compare(field, Op::In(keys))
            .merge(scope.filter.clone());

        let args = FindArgs {
            filter,
            order_by: scope.order_by.clone(),
            include: scope.include.clone(),
            ..FindArgs::default()
        };
        self.find_many(args).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts one row and returns it as stored.
    ///
    /// An `id` is generated when `data` has none (or a null one).
    pub async fn create(&self, data: Record) -> DbResult<Record> {
        let (id, row) = with_id(data);
        self.check_data(&row)?;

        let stmt = sql::insert(&self.table, &row)?;
        self.store.execute(&stmt).await?;
        debug!(table = %self.table, "Created record");

        self.find_unique(FindArgs::by_id(id.clone()))
            .await?
            .ok_or_else(|| DbError::Internal(format!("{} row {id:?} missing after insert", self.table)))
    }

    /// Inserts every row in one atomic batch; returns how many were inserted.
    ///
    /// If any insert fails, none are kept.
    pub async fn create_many(&self, rows: Vec<Record>) -> DbResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let statements = rows
            .into_iter()
            .map(|data| {
                let (_, row) = with_id(data);
                self.check_data(&row)?;
                Ok(sql::insert(&self.table, &row)?)
            })
            .collect::<DbResult<Vec<Statement>>>()?;

        let counts = self.store.execute_batch(&statements).await?;
        let inserted: u64 = counts.iter().sum();
        debug!(table = %self.table, inserted, "Created records");
        Ok(inserted)
    }

    /// Updates the row matching `filter` and returns it re-read.
    ///
    /// ## Returns
    /// * `Ok(Some(row))` - The updated row
    /// * `Ok(None)` - Nothing matched; no UPDATE was issued
    /// * `Err(Core(NoFieldsToUpdate))` - `data` sets nothing besides `id`
    pub async fn update(&self, filter: Filter, data: Record) -> DbResult<Option<Record>> {
        if !sql::has_assignments(&data) {
            return Err(CoreError::NoFieldsToUpdate {
                table: self.table.clone(),
            }
            .into());
        }
        self.check_filter(&filter)?;
        self.check_data(&data)?;

        let (_gate, store) = self.store.hold().await?;
        let model = self.with_store(store);

        let Some(existing) = model.find_unique(FindArgs::new().filter(filter.clone())).await? else {
            return Ok(None);
        };
        let target = row_filter(&existing, filter);

        let stmt = sql::update(&self.table, &data, target.translate()?)?;
        model.store.execute(&stmt).await?;

        model.find_unique(FindArgs::new().filter(target)).await
    }

    /// Updates every matching row; returns the changed-row count.
    ///
    /// Empty `data` is a no-op returning `0`, without touching the store.
    pub async fn update_many(&self, filter: Filter, data: Record) -> DbResult<u64> {
        if !sql::has_assignments(&data) {
            return Ok(0);
        }
        self.check_filter(&filter)?;
        self.check_data(&data)?;

        let stmt = sql::update(&self.table, &data, filter.translate()?)?;
        self.store.execute(&stmt).await
    }

    /// Deletes the row matching `filter` and returns its last state.
    pub async fn delete(&self, filter: Filter) -> DbResult<Option<Record>> {
        self.check_filter(&filter)?;

        let (_gate, store) = self.store.hold().await?;
        let model = self.with_store(store);

        let Some(snapshot) = model.find_unique(FindArgs::new().filter(filter.clone())).await? else {
            return Ok(None);
        };

        let stmt = sql::delete(&self.table, row_filter(&snapshot, filter).translate()?)?;
        model.store.execute(&stmt).await?;
        Ok(Some(snapshot))
    }

    /// Deletes every matching row (all rows for an empty filter).
    pub async fn delete_many(&self, filter: Filter) -> DbResult<u64> {
        self.check_filter(&filter)?;

        let stmt = sql::delete(&self.table, filter.translate()?)?;
        self.store.execute(&stmt).await
    }

    /// Updates the row matching `filter`, or creates it.
    ///
    /// A created row gets `create` plus every `field = value` of `filter`;
    /// on overlap the `filter` value wins, so lookup keys always survive.
    pub async fn upsert(&self, filter: Filter, create: Record, update: Record) -> DbResult<Record> {
        let (_gate, store) = self.store.hold().await?;
        let model = self.with_store(store);

        if let Some(existing) = model.find_unique(FindArgs::new().filter(filter.clone())).await? {
            if !sql::has_assignments(&update) {
                return Ok(existing);
            }
            let target = row_filter(&existing, filter);
            return Ok(model.update(target, update).await?.unwrap_or(existing));
        }

        let mut row = create;
        for (field, value) in filter.equalities() {
            row.insert(field, value.clone());
        }
        model.create(row).await
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub async fn count(&self, filter: Filter) -> DbResult<u64> {
        self.check_filter(&filter)?;

        let stmt = sql::count(&self.table, filter.translate()?)?;
        let rows = self.store.fetch_all(&stmt).await?;

        let count = rows
            .first()
            .and_then(|row| row.get(sql::COUNT_ALIAS))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Runs the requested aggregates and nests the result like the request.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let totals = sales
    ///     .aggregate(AggregateArgs::new().sum("total").count_all())
    ///     .await?;
    /// // { "_count": 3, "_sum": { "total": 60 } }
    /// ```
    pub async fn aggregate(&self, args: AggregateArgs) -> DbResult<Record> {
        self.check_filter(&args.filter)?;
        self.schema.check_fields(&self.table, args.fields())?;

        let stmt = args.statement(&self.table)?;
        let row = self
            .store
            .fetch_all(&stmt)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        Ok(args.reshape(row))
    }
}

/// Puts an id on `data`, generating one when it is missing or null.
fn with_id(data: Record) -> (Value, Record) {
    let existing = data.get(PRIMARY_KEY).cloned();
    match existing {
        Some(id) if !id.is_null() => (id, data),
        Some(_) => {
            let mut data = data;
            let id = Value::Text(generate_id());
            data.insert(PRIMARY_KEY, id.clone());
            (id, data)
        }
        None => {
            let id = Value::Text(generate_id());
            let mut row = Record::with_capacity(data.len() + 1);
            row.insert(PRIMARY_KEY, id.clone());
            row.extend(data);
            (id, row)
        }
    }
}

/// Narrows a filter to the row it found, by id when the row has one.
fn row_filter(row: &Record, filter: Filter) -> Filter {
    match row.get(PRIMARY_KEY) {
        Some(id) if !id.is_null() => Filter::new().eq(PRIMARY_KEY, id.clone()),
        _ => filter,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, orders_client};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use till_core::record;

    fn status(row: &Record) -> &str {
        row.get("status").and_then(Value::as_str).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_find_many_in_with_order() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();

        orders.create(record! { "id" => "o2", "status" => "DONE" }).await.unwrap();
        orders.create(record! { "id" => "o1", "status" => "PENDING" }).await.unwrap();

        let args = FindArgs::from_json(&json!({
            "where": { "status": { "in": ["PENDING", "DONE"] } },
            "orderBy": { "id": "asc" }
        }))
        .unwrap();
        let rows = orders.find_many(args).await.unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.get("id").and_then(Value::as_str).unwrap()).collect();
        assert_eq!(ids, ["o1", "o2"]);
    }

    #[tokio::test]
    async fn test_find_unique_returns_what_create_stored() {
        let client = client().await;
        let products = client.table("products").unwrap();

        let data = record! {
            "id" => "p1",
            "sku" => "TEA-1",
            "name" => "Green Tea",
            "price_cents" => 450,
            "is_active" => true,
        };
        let created = products.create(data).await.unwrap();
        let found = products.find_unique(FindArgs::by_id("p1")).await.unwrap().unwrap();

        assert_eq!(created, found);
        assert_eq!(found.get("sku"), Some(&Value::from("TEA-1")));
        assert_eq!(found.get("price_cents"), Some(&Value::Integer(450)));
        // Booleans come back as stored: 0/1.
        assert_eq!(found.get("is_active"), Some(&Value::Integer(1)));
        assert_eq!(found.get("is_active").and_then(Value::as_bool), Some(true));
    }

    #[tokio::test]
    async fn test_find_unique_and_first_return_none_when_nothing_matches() {
        let client = client().await;
        let products = client.table("products").unwrap();

        assert!(products.find_unique(FindArgs::by_id("nope")).await.unwrap().is_none());
        assert!(products.find_first(FindArgs::new()).await.unwrap().is_none());
        assert!(products.find_many(FindArgs::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_generates_ids() {
        let client = client().await;
        let products = client.table("products").unwrap();

        let a = products.create(record! { "sku" => "A", "name" => "A", "price_cents" => 1 }).await.unwrap();
        let b = products
            .create(record! { "id" => Value::Null, "sku" => "B", "name" => "B", "price_cents" => 1 })
            .await
            .unwrap();

        let a_id = a.get("id").and_then(Value::as_str).unwrap();
        let b_id = b.get("id").and_then(Value::as_str).unwrap();
        assert!(!a_id.is_empty());
        assert_ne!(a_id, b_id);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_is_a_store_error() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();

        orders.create(record! { "id" => "o1", "status" => "PENDING" }).await.unwrap();
        let err = orders
            .create(record! { "id" => "o1", "status" => "DONE" })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_create_many_is_atomic() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();

        let inserted = orders
            .create_many(vec![
                record! { "id" => "o1", "status" => "PENDING" },
                record! { "status" => "DONE" },
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let err = orders
            .create_many(vec![
                record! { "id" => "o3", "status" => "PENDING" },
                record! { "id" => "o1", "status" => "DONE" },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(orders.count(Filter::new()).await.unwrap(), 2);

        assert_eq!(orders.create_many(vec![]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_leaves_other_fields_alone() {
        let client = client().await;
        let products = client.table("products").unwrap();
        products
            .create(record! { "id" => "p1", "sku" => "TEA-1", "name" => "Tea", "price_cents" => 450 })
            .await
            .unwrap();

        let updated = products
            .update(Filter::new().eq("sku", "TEA-1"), record! { "id" => "hijack", "price_cents" => 500 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("id"), Some(&Value::from("p1")));
        assert_eq!(updated.get("price_cents"), Some(&Value::Integer(500)));

        let found = products
            .find_unique(FindArgs::new().filter(Filter::new().eq("sku", "TEA-1")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, updated);
        assert_eq!(found.get("name"), Some(&Value::from("Tea")));
    }

    #[tokio::test]
    async fn test_update_with_nothing_to_set_fails_before_sql() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();
        let before = client.statements_executed();

        let err = orders
            .update(Filter::new().eq("id", "o1"), record! { "id" => "o2" })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::NoFieldsToUpdate { .. })));
        assert_eq!(client.statements_executed(), before);

        // Bulk form treats it as a no-op.
        assert_eq!(orders.update_many(Filter::new(), Record::new()).await.unwrap(), 0);
        assert_eq!(client.statements_executed(), before);
    }

    #[tokio::test]
    async fn test_update_missing_row_returns_none() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();

        let result = orders
            .update(Filter::new().eq("id", "ghost"), record! { "status" => "DONE" })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_many_counts_changed_rows() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();
        for (id, state) in [("o1", "PENDING"), ("o2", "PENDING"), ("o3", "DONE")] {
            orders.create(record! { "id" => id, "status" => state }).await.unwrap();
        }

        let changed = orders
            .update_many(Filter::new().eq("status", "PENDING"), record! { "status" => "DONE" })
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(orders.count(Filter::new().eq("status", "DONE")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_returns_snapshot() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();
        orders.create(record! { "id" => "o1", "status" => "PENDING" }).await.unwrap();

        let snapshot = orders.delete(Filter::new().eq("id", "o1")).await.unwrap().unwrap();
        assert_eq!(status(&snapshot), "PENDING");
        assert_eq!(orders.count(Filter::new()).await.unwrap(), 0);

        assert!(orders.delete(Filter::new().eq("id", "o1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete_do_not_interleave() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();
        orders.create(record! { "id" => "o1", "status" => "PENDING" }).await.unwrap();

        let updater = Arc::clone(&orders);
        let update = tokio::spawn(async move {
            updater
                .update(Filter::new().eq("id", "o1"), record! { "status" => "PAID" })
                .await
        });
        let deleter = Arc::clone(&orders);
        let delete = tokio::spawn(async move { deleter.delete(Filter::new().eq("id", "o1")).await });

        let updated = update.await.unwrap().unwrap();
        let snapshot = delete.await.unwrap().unwrap().unwrap();

        // Either the update landed first and the snapshot shows it, or the
        // row was already gone when the update looked for it.
        match updated {
            Some(row) => {
                assert_eq!(status(&row), "PAID");
                assert_eq!(status(&snapshot), "PAID");
            }
            None => assert_eq!(status(&snapshot), "PENDING"),
        }
        assert_eq!(orders.count(Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_inside_transaction() {
        let client = orders_client().await;
        client
            .table("orders")
            .unwrap()
            .create(record! { "id" => "o1", "status" => "PENDING" })
            .await
            .unwrap();

        let updated = client
            .run_transaction(|tx| async move {
                tx.table("orders")?
                    .update(Filter::new().eq("id", "o1"), record! { "status" => "PAID" })
                    .await
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status(&updated), "PAID");
    }

    #[tokio::test]
    async fn test_delete_many_with_empty_filter_removes_everything() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();
        for id in ["o1", "o2", "o3", "o4"] {
            orders.create(record! { "id" => id, "status" => "PENDING" }).await.unwrap();
        }

        let before = orders.count(Filter::new()).await.unwrap();
        let deleted = orders.delete_many(Filter::new()).await.unwrap();
        assert_eq!(deleted, before);
        assert_eq!(orders.count(Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_creates_with_where_keys() {
        let client = client().await;
        let products = client.table("products").unwrap();

        let created = products
            .upsert(
                Filter::new().eq("sku", "TEA-1"),
                record! { "sku" => "WRONG", "name" => "Tea", "price_cents" => 450 },
                record! { "price_cents" => 999 },
            )
            .await
            .unwrap();
        assert_eq!(created.get("sku"), Some(&Value::from("TEA-1")));
        assert_eq!(created.get("price_cents"), Some(&Value::Integer(450)));

        let updated = products
            .upsert(
                Filter::new().eq("sku", "TEA-1"),
                record! { "name" => "ignored", "price_cents" => 1 },
                record! { "price_cents" => 999 },
            )
            .await
            .unwrap();
        assert_eq!(updated.get("id"), created.get("id"));
        assert_eq!(updated.get("price_cents"), Some(&Value::Integer(999)));
        assert_eq!(products.count(Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_sum_and_count() {
        let client = client().await;
        let sales = client.table("sales").unwrap();
        for total in [10, 20, 30] {
            sales.create(record! { "total" => total, "status" => "DONE" }).await.unwrap();
        }

        let result = sales
            .aggregate(AggregateArgs::from_json(&json!({ "_sum": { "total": true }, "_count": true })).unwrap())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "_count": 3, "_sum": { "total": 60 } })
        );
    }

    #[tokio::test]
    async fn test_aggregate_min_max_avg_with_filter() {
        let client = client().await;
        let sales = client.table("sales").unwrap();
        for (total, state) in [(10, "DONE"), (20, "DONE"), (90, "VOID")] {
            sales.create(record! { "total" => total, "status" => state }).await.unwrap();
        }

        let args = AggregateArgs::new()
            .filter(Filter::new().compare("status", Op::Not("VOID".into())))
            .min("total")
            .max("total")
            .avg("total");
        let result = sales.aggregate(args).await.unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "_avg": { "total": 15.0 }, "_min": { "total": 10 }, "_max": { "total": 20 } })
        );
    }

    #[tokio::test]
    async fn test_unknown_fields_fail_before_sql() {
        let client = client().await;
        let items = client.table("sale_items").unwrap();
        let before = client.statements_executed();

        let err = items
            .find_many(FindArgs::new().filter(Filter::new().eq("quantity", 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UnknownField { .. })));

        let err = items.create(record! { "sale_id" => "s1", "colour" => "red" }).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UnknownField { .. })));

        assert_eq!(client.statements_executed(), before);
    }

    #[tokio::test]
    async fn test_unbindable_values_fail_before_sql() {
        let client = orders_client().await;
        let orders = client.table("orders").unwrap();
        let before = client.statements_executed();

        let err = orders
            .create(record! { "status" => Value::Array(vec![Value::from("A")]) })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidParameterType { .. })));
        assert_eq!(client.statements_executed(), before);
    }
}
