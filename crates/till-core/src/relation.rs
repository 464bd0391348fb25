//! # Relationship Registry
//!
//! The only schema the engine ever receives: which relation fields exist on
//! which tables, and optionally the column set of each table.
//!
//! ## Relation Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Relation Edges                                  │
//! │                                                                         │
//! │  OneToMany   sales.items                                                │
//! │              parent.local_key (sales.id) = child.foreign_key            │
//! │                                            (sale_items.sale_id)         │
//! │              attaches: [record, …]  (or [])                             │
//! │                                                                         │
//! │  ManyToOne   sale_items.product                                         │
//! │              parent.foreign_key (sale_items.product_id)                 │
//! │                = target.local_key (products.id)                         │
//! │              attaches: record  (or null)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Built once at startup, then shared read-only behind an `Arc`.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::ident::validate_ident;
use crate::sql::PRIMARY_KEY;

// =============================================================================
// Relation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToMany,
    ManyToOne,
}

/// One declared edge from an owning table to a target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub kind: RelationKind,
    pub target_table: String,
    pub foreign_key: String,
    pub local_key: String,
}

impl Relation {
    /// Field read from each parent record to collect the batch keys.
    pub fn parent_key(&self) -> &str {
        match self.kind {
            RelationKind::OneToMany => &self.local_key,
            RelationKind::ManyToOne => &self.foreign_key,
        }
    }

    /// Field of the target table matched against the batch keys.
    pub fn target_key(&self) -> &str {
        match self.kind {
            RelationKind::OneToMany => &self.foreign_key,
            RelationKind::ManyToOne => &self.local_key,
        }
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Relationship registry plus optional per-table column sets.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: HashMap<String, HashSet<String>>,
    relations: HashMap<String, IndexMap<String, Relation>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// A registry with no relations and no declared tables.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn relation(&self, table: &str, field: &str) -> Option<&Relation> {
        self.relations.get(table)?.get(field)
    }

    pub fn relations(&self, table: &str) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations
            .get(table)
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(field, relation)| (field.as_str(), relation)))
    }

    /// Column set declared for a table, if any.
    pub fn columns(&self, table: &str) -> Option<&HashSet<String>> {
        self.columns.get(table)
    }

    /// Validates a field name and, when the table declares its columns,
    /// that the field is one of them.
    pub fn check_field(&self, table: &str, field: &str) -> CoreResult<()> {
        validate_ident(field)?;
        match self.columns.get(table) {
            Some(columns) if !columns.contains(field) => Err(CoreError::UnknownField {
                table: table.to_string(),
                field: field.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn check_fields<'a>(&self, table: &str, fields: impl IntoIterator<Item = &'a str>) -> CoreResult<()> {
        fields
            .into_iter()
            .try_for_each(|field| self.check_field(table, field))
    }

    /// Loads a registry from TOML.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::{RelationKind, Schema};
    ///
    /// let schema = Schema::from_toml_str(r#"
    ///     [[tables]]
    ///     name = "sale_items"
    ///     columns = ["id", "sale_id", "product_id", "qty"]
    ///
    ///     [[relations]]
    ///     table = "sales"
    ///     field = "items"
    ///     kind = "one_to_many"
    ///     target = "sale_items"
    ///     foreign_key = "sale_id"
    /// "#).unwrap();
    ///
    /// let items = schema.relation("sales", "items").unwrap();
    /// assert_eq!(items.kind, RelationKind::OneToMany);
    /// assert_eq!(items.local_key, "id");
    /// ```
    pub fn from_toml_str(source: &str) -> CoreResult<Schema> {
        let file: SchemaFile =
            toml::from_str(source).map_err(|e| CoreError::InvalidSchema(e.to_string()))?;

        let mut builder = Schema::builder();
        for table in file.tables {
            if let Some(columns) = table.columns {
                builder = builder.table(table.name, columns);
            }
        }
        for entry in file.relations {
            builder = builder.relation(
                entry.table,
                entry.field,
                Relation {
                    kind: entry.kind,
                    target_table: entry.target,
                    foreign_key: entry.foreign_key,
                    local_key: entry.local_key,
                },
            );
        }
        builder.build()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects table and relation declarations; `build` validates them.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: Vec<(String, Vec<String>)>,
    relations: Vec<(String, String, Relation)>,
}

impl SchemaBuilder {
    /// Declares a table's column set. `id` is always implied.
    pub fn table<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .push((name.into(), columns.into_iter().map(Into::into).collect()));
        self
    }

    /// `table.field` is the list of `target` rows whose `foreign_key`
    /// equals this row's `id`.
    pub fn one_to_many(
        self,
        table: impl Into<String>,
        field: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relation(
            table,
            field,
            Relation {
                kind: RelationKind::OneToMany,
                target_table: target.into(),
                foreign_key: foreign_key.into(),
                local_key: PRIMARY_KEY.to_string(),
            },
        )
    }

    /// `table.field` is the `target` row whose `id` equals this row's
    /// `foreign_key`.
    pub fn many_to_one(
        self,
        table: impl Into<String>,
        field: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relation(
            table,
            field,
            Relation {
                kind: RelationKind::ManyToOne,
                target_table: target.into(),
                foreign_key: foreign_key.into(),
                local_key: PRIMARY_KEY.to_string(),
            },
        )
    }

    pub fn relation(mut self, table: impl Into<String>, field: impl Into<String>, relation: Relation) -> Self {
        self.relations.push((table.into(), field.into(), relation));
        self
    }

    /// Validates every name and key, then freezes the registry.
    ///
    /// ## Errors
    /// * `InvalidIdentifier` - A table, field or key is not a plain identifier
    /// * `InvalidSchema` - A relation is declared twice, or names a key
    ///   missing from a table that declares its columns
    pub fn build(self) -> CoreResult<Schema> {
        let mut schema = Schema::default();

        for (name, columns) in self.tables {
            validate_ident(&name)?;
            let mut set = HashSet::with_capacity(columns.len() + 1);
            set.insert(PRIMARY_KEY.to_string());
            for column in columns {
                validate_ident(&column)?;
                set.insert(column);
            }
            schema.columns.insert(name, set);
        }

        for (table, field, relation) in self.relations {
            validate_ident(&table)?;
            validate_ident(&field)?;
            validate_ident(&relation.target_table)?;
            validate_ident(&relation.foreign_key)?;
            validate_ident(&relation.local_key)?;

            schema.require_column(&table, relation.parent_key(), &field)?;
            schema.require_column(&relation.target_table, relation.target_key(), &field)?;

            let fields = schema.relations.entry(table.clone()).or_default();
            if fields.contains_key(&field) {
                return Err(CoreError::InvalidSchema(format!(
                    "relation {table}.{field} is declared twice"
                )));
            }
            fields.insert(field, relation);
        }

        Ok(schema)
    }
}

impl Schema {
    fn require_column(&self, table: &str, column: &str, relation_field: &str) -> CoreResult<()> {
        match self.columns.get(table) {
            Some(columns) if !columns.contains(column) => Err(CoreError::InvalidSchema(format!(
                "relation {relation_field} uses {table}.{column}, which is not a declared column"
            ))),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// TOML Format
// =============================================================================

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    tables: Vec<TableEntry>,
    #[serde(default)]
    relations: Vec<RelationEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    name: String,
    columns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RelationEntry {
    table: String,
    field: String,
    kind: RelationKind,
    target: String,
    foreign_key: String,
    #[serde(default = "default_local_key")]
    local_key: String,
}

fn default_local_key() -> String {
    PRIMARY_KEY.to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
