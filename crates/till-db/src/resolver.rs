//! # Relation Resolver
//!
//! Attaches included relations to records that were already fetched, with
//! one query per relation edge per nesting level.
//!
//! ## Batched Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              sales.find_many({ include: { items: true } })              │
//! │                                                                         │
//! │  SELECT * FROM sales                      → s1, s2, s3   (1 query)     │
//! │       │                                                                 │
//! │       │ distinct parent keys: [s1, s2, s3]                              │
//! │       ▼                                                                 │
//! │  SELECT * FROM sale_items                                               │
//! │    WHERE sale_id IN (?, ?, ?)             → i1, i2, i3   (1 query)     │
//! │       │                                                                 │
//! │       │ group by sale_id                                                │
//! │       ▼                                                                 │
//! │  s1.items = [i1, i2]   s2.items = [i3]   s3.items = []                 │
//! │                                                                         │
//! │  N parents never means N queries: the cost is one query per edge       │
//! │  per level of the include tree.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nested includes are resolved against the whole related batch before it
//! is split between parents. Relation-scoped `where` and `orderBy` go into
//! the batched query; `skip`/`take` apply to each parent's group.

use std::collections::{HashMap, HashSet};

use async_recursion::async_recursion;
use indexmap::IndexMap;
use tracing::{debug, warn};

use till_core::{Include, KeyValue, Record, Relation, RelationKind, RelationQuery, Value};

use crate::error::DbResult;
use crate::model::TableModel;

/// Resolves every relation in `include` onto `records`, in place.
///
/// Relation names missing from the registry are skipped with a warning.
#[async_recursion]
pub(crate) async fn resolve(model: &TableModel, records: &mut [Record], include: &Include) -> DbResult<()> {
    for (field, scope) in include.iter() {
        let Some(relation) = model.schema().relation(model.table(), field) else {
            warn!(table = model.table(), relation = field, "Skipping unknown relation");
            continue;
        };

        match relation.kind {
            RelationKind::OneToMany => one_to_many(model, records, field, relation, scope).await?,
            RelationKind::ManyToOne => many_to_one(model, records, field, relation, scope).await?,
        }
    }
    Ok(())
}

/// Distinct non-null values of `field`, in first-seen order.
fn distinct_keys(records: &[Record], field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| record.get(field))
        .filter(|value| value.key().is_some_and(|key| seen.insert(key)))
        .cloned()
        .collect()
}

fn key_of(record: &Record, field: &str) -> Option<KeyValue> {
    record.get(field).and_then(Value::key)
}

async fn one_to_many(
    model: &TableModel,
    records: &mut [Record],
    field: &str,
    relation: &Relation,
    scope: &RelationQuery,
) -> DbResult<()> {
    let keys = distinct_keys(records, relation.parent_key());
    if keys.is_empty() {
        for record in records.iter_mut() {
            record.insert(field, Value::Array(Vec::new()));
        }
        return Ok(());
    }

    let target = model.related(&relation.target_table);
    let parent_count = keys.len();
    let rows = target.find_in(relation.target_key(), keys, scope).await?;
    debug!(
        table = model.table(),
        relation = field,
        parents = parent_count,
        fetched = rows.len(),
        "Resolved one-to-many relation"
    );

    let mut groups: IndexMap<KeyValue, Vec<Record>> = IndexMap::new();
    for row in rows {
        if let Some(key) = key_of(&row, relation.target_key()) {
            groups.entry(key).or_default().push(row);
        }
    }

    for record in records.iter_mut() {
        let group = key_of(record, relation.parent_key())
            .and_then(|key| groups.get(&key))
            .cloned()
            .unwrap_or_default();

        let mut group = scope.page.slice(group);
        if let Some(select) = &scope.select {
            select.apply_all(&mut group);
        }
        record.insert(field, Value::Array(group.into_iter().map(Value::Object).collect()));
    }

    Ok(())
}

async fn many_to_one(
    model: &TableModel,
    records: &mut [Record],
    field: &str,
    relation: &Relation,
    scope: &RelationQuery,
) -> DbResult<()> {
    let keys = distinct_keys(records, relation.parent_key());
    if keys.is_empty() {
        for record in records.iter_mut() {
            record.insert(field, Value::Null);
        }
        return Ok(());
    }

    let target = model.related(&relation.target_table);
    let parent_count = keys.len();
    let rows = target.find_in(relation.target_key(), keys, scope).await?;
    debug!(
        table = model.table(),
        relation = field,
        parents = parent_count,
        fetched = rows.len(),
        "Resolved many-to-one relation"
    );

    let mut lookup: HashMap<KeyValue, Record> = HashMap::with_capacity(rows.len());
    for row in rows {
        if let Some(key) = key_of(&row, relation.target_key()) {
            lookup.entry(key).or_insert(row);
        }
    }

    for record in records.iter_mut() {
        let attached = match key_of(record, relation.parent_key()).and_then(|key| lookup.get(&key)) {
            Some(row) => {
                let mut row = row.clone();
                if let Some(select) = &scope.select {
                    select.apply(&mut row);
                }
                Value::Object(row)
            }
            None => Value::Null,
        };
        record.insert(field, attached);
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testing::{client, seed_sales};
    use crate::{Client, DbConfig, DbError};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use till_core::{CoreError, FindArgs, Include, RelationQuery, Schema, Value};

    fn ids(value: Option<&Value>) -> Vec<String> {
        value
            .and_then(Value::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.as_object()?.get("id")?.as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_one_to_many_is_one_batched_query() {
        let client = client().await;
        seed_sales(&client).await;
        let sales = client.table("sales").unwrap();

        let before = client.statements_executed();
        let rows = sales
            .find_many(
                FindArgs::from_json(&json!({ "include": { "items": true }, "orderBy": { "id": "asc" } }))
                    .unwrap(),
            )
            .await
            .unwrap();

        // One query for the sales, one for all of their items.
        assert_eq!(client.statements_executed() - before, 2);
        assert_eq!(rows.len(), 3);
        assert_eq!(ids(rows[0].get("items")), ["i1", "i2"]);
        assert_eq!(ids(rows[1].get("items")), ["i3"]);
        assert_eq!(ids(rows[2].get("items")), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_keys_match_across_column_affinity() {
        // INTEGER primary key on one side, TEXT foreign key on the other.
        let schema = Schema::builder()
            .table("registers", ["label"])
            .table("shifts", ["register_id"])
            .one_to_many("registers", "shifts", "shifts", "register_id")
            .many_to_one("shifts", "register", "registers", "register_id")
            .build()
            .unwrap();
        let client = Client::connect(DbConfig::in_memory(), schema).await.unwrap();
        for ddl in [
            "CREATE TABLE registers (id INTEGER PRIMARY KEY, label TEXT)",
            "CREATE TABLE shifts (id TEXT PRIMARY KEY, register_id TEXT)",
            "INSERT INTO registers (id, label) VALUES (1, 'Front'), (2, 'Back')",
            "INSERT INTO shifts (id, register_id) VALUES ('morning', 1), ('evening', '1')",
        ] {
            client.raw_execute(ddl, &[]).await.unwrap();
        }

        let registers = client
            .table("registers")
            .unwrap()
            .find_many(
                FindArgs::from_json(&json!({
                    "include": { "shifts": { "orderBy": { "id": "asc" } } },
                    "orderBy": { "id": "asc" }
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(registers[0].get("id"), Some(&Value::Integer(1)));
        assert_eq!(ids(registers[0].get("shifts")), ["evening", "morning"]);
        assert_eq!(ids(registers[1].get("shifts")), Vec::<String>::new());

        let shifts = client
            .table("shifts")
            .unwrap()
            .find_many(
                FindArgs::from_json(&json!({
                    "include": { "register": { "select": { "label": true } } },
                    "orderBy": { "id": "asc" }
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        let attached: Vec<_> = shifts.iter().map(|row| row.get("register").cloned()).collect();
        assert_eq!(
            serde_json::to_value(&attached).unwrap(),
            json!([{ "label": "Front" }, { "label": "Front" }])
        );
    }

    #[tokio::test]
    async fn test_many_to_one_attaches_record_or_null() {
        let client = client().await;
        seed_sales(&client).await;
        let sales = client.table("sales").unwrap();

        let rows = sales
            .find_many(
                FindArgs::from_json(&json!({
                    "include": { "customer": { "select": { "name": true } } },
                    "orderBy": { "id": "asc" }
                }))
                .unwrap(),
            )
            .await
            .unwrap();

        let customers: Vec<_> = rows.iter().map(|row| row.get("customer").cloned()).collect();
        assert_eq!(
            serde_json::to_value(&customers).unwrap(),
            json!([{ "name": "Ayesha" }, { "name": "Ayesha" }, null])
        );
    }

    #[tokio::test]
    async fn test_nested_includes_cost_one_query_per_level() {
        let client = client().await;
        seed_sales(&client).await;
        let sales = client.table("sales").unwrap();

        let before = client.statements_executed();
        let sale = sales
            .find_unique(
                FindArgs::from_json(&json!({
                    "where": { "id": "s1" },
                    "include": { "items": { "include": { "product": true } } }
                }))
                .unwrap(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(client.statements_executed() - before, 3);
        let items = sale.get("items").and_then(Value::as_array).unwrap();
        let names: Vec<_> = items
            .iter()
            .map(|item| {
                item.as_object()
                    .and_then(|item| item.get("product"))
                    .and_then(Value::as_object)
                    .and_then(|product| product.get("name"))
                    .and_then(Value::as_str)
                    .unwrap()
            })
            .collect();
        assert_eq!(names, ["Green Tea", "Biscuits"]);
    }

    #[tokio::test]
    async fn test_relation_scope_is_honoured() {
        let client = client().await;
        seed_sales(&client).await;
        let sales = client.table("sales").unwrap();

        let include = Include::new().scoped(
            "items",
            RelationQuery::from_json(&json!({
                "where": { "qty": { "gte": 1 } },
                "orderBy": { "qty": "desc" },
                "take": 1
            }))
            .unwrap(),
        );
        let sale = sales
            .find_unique(FindArgs::by_id("s1").include(include))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ids(sale.get("items")), ["i1"]);
    }

    #[tokio::test]
    async fn test_select_narrows_after_attachment() {
        let client = client().await;
        seed_sales(&client).await;
        let sales = client.table("sales").unwrap();

        let sale = sales
            .find_unique(
                FindArgs::from_json(&json!({
                    "where": { "id": "s2" },
                    "include": { "items": true },
                    "select": { "id": true, "items": { "select": { "qty": true } } }
                }))
                .unwrap(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&sale).unwrap(),
            json!({ "id": "s2", "items": [{ "qty": 5 }] })
        );
    }

    #[tokio::test]
    async fn test_unknown_relations_are_skipped() {
        let client = client().await;
        seed_sales(&client).await;
        let sales = client.table("sales").unwrap();

        let before = client.statements_executed();
        let sale = sales
            .find_unique(FindArgs::by_id("s1").include(Include::new().relation("refunds")))
            .await
            .unwrap()
            .unwrap();

        assert!(!sale.contains_key("refunds"));
        assert_eq!(client.statements_executed() - before, 1);
    }

    #[tokio::test]
    async fn test_no_parent_keys_means_no_query() {
        let client = client().await;
        seed_sales(&client).await;
        let sales = client.table("sales").unwrap();

        let before = client.statements_executed();
        let sale = sales
            .find_unique(FindArgs::by_id("s3").include(Include::new().relation("customer")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sale.get("customer"), Some(&Value::Null));
        assert_eq!(client.statements_executed() - before, 1);
    }

    #[tokio::test]
    async fn test_include_depth_is_bounded() {
        let client = client().await;
        let categories = client.table("categories").unwrap();

        let mut include = Include::new();
        for _ in 0..9 {
            include = Include::new().scoped("parent", RelationQuery::new().include(include));
        }

        let before = client.statements_executed();
        let err = categories
            .find_many(FindArgs::new().include(include))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::IncludeTooDeep { max: 8 })));
        assert_eq!(client.statements_executed(), before);
    }
}
