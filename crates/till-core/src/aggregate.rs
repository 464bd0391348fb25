//! # Aggregates
//!
//! One aliased SQL aggregate per requested field, reshaped back into the
//! request's nesting.
//!
//! ```text
//! request   { _sum: { total: true }, _count: true }
//! SQL       SELECT COUNT(*) AS _count, SUM(total) AS _sum__total FROM sales
//! row       { _count: 3, _sum__total: 60 }
//! result    { _count: 3, _sum: { total: 60 } }
//! ```

use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};
use crate::ident::validate_ident;
use crate::predicate::Filter;
use crate::sql::Statement;
use crate::value::{json_kind, Record, Value};

/// `_count` request: every row, or non-null values per field.
#[derive(Debug, Clone, PartialEq)]
pub enum CountSpec {
    All,
    /// `_all` counts every row, like `All`, but nests under `_count`.
    Fields(Vec<String>),
}

/// Fields nested under `_count` that mean "all rows".
pub const COUNT_ALL_FIELD: &str = "_all";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateArgs {
    pub filter: Filter,
    pub count: Option<CountSpec>,
    pub sum: Vec<String>,
    pub avg: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
}

impl AggregateArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn count_all(mut self) -> Self {
        self.count = Some(CountSpec::All);
        self
    }

    pub fn count(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        match &mut self.count {
            Some(CountSpec::Fields(fields)) => fields.push(field),
            _ => self.count = Some(CountSpec::Fields(vec![field])),
        }
        self
    }

    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }

    /// Every column the request aggregates over.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let counted = match &self.count {
            Some(CountSpec::Fields(fields)) => fields.as_slice(),
            _ => &[],
        };
        counted
            .iter()
            .filter(|field| field.as_str() != COUNT_ALL_FIELD)
            .chain(self.sum.iter())
            .chain(self.avg.iter())
            .chain(self.min.iter())
            .chain(self.max.iter())
            .map(String::as_str)
    }

    /// `(kind, function, fields)` for the per-field aggregates.
    fn functions(&self) -> [(&'static str, &'static str, &[String]); 4] {
        [
            ("_sum", "SUM", self.sum.as_slice()),
            ("_avg", "AVG", self.avg.as_slice()),
            ("_min", "MIN", self.min.as_slice()),
            ("_max", "MAX", self.max.as_slice()),
        ]
    }

    /// Builds the aggregate query.
    ///
    /// ## Errors
    /// * `InvalidQuery` - Nothing was requested
    /// * `InvalidIdentifier` - A table or field name is not an identifier
    pub fn statement(&self, table: &str) -> CoreResult<Statement> {
        validate_ident(table)?;
        let mut columns = Vec::new();

        match &self.count {
            Some(CountSpec::All) => columns.push("COUNT(*) AS _count".to_string()),
            Some(CountSpec::Fields(fields)) => {
                for field in fields {
                    if field == COUNT_ALL_FIELD {
                        columns.push(format!("COUNT(*) AS {}", alias("_count", field)));
                    } else {
                        validate_ident(field)?;
                        columns.push(format!("COUNT({field}) AS {}", alias("_count", field)));
                    }
                }
            }
            None => {}
        }

        for (kind, function, fields) in self.functions() {
            for field in fields {
                validate_ident(field)?;
                columns.push(format!("{function}({field}) AS {}", alias(kind, field)));
            }
        }

        if columns.is_empty() {
            return Err(CoreError::invalid_query(format!(
                "aggregate on {table} requests nothing"
            )));
        }

        let filter = self.filter.translate()?;
        let mut sql = format!("SELECT {} FROM {table}", columns.join(", "));
        if !filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
        }
        Ok(Statement::new(sql, filter.params))
    }

    /// Folds the flat aliased row back into the request's nesting.
    pub fn reshape(&self, mut row: Record) -> Record {
        let mut result = Record::new();

        match &self.count {
            Some(CountSpec::All) => {
                result.insert("_count", row.remove("_count").unwrap_or_default());
            }
            Some(CountSpec::Fields(fields)) => {
                result.insert("_count", nest(&mut row, "_count", fields));
            }
            None => {}
        }

        for (kind, _, fields) in self.functions() {
            if !fields.is_empty() {
                result.insert(kind, nest(&mut row, kind, fields));
            }
        }

        result
    }

    /// Parses `{ where, _count, _sum, _avg, _min, _max }`.
    pub fn from_json(json: &JsonValue) -> CoreResult<AggregateArgs> {
        let JsonValue::Object(map) = json else {
            return Err(CoreError::invalid_query(format!(
                "aggregate arguments must be an object, got {}",
                json_kind(json)
            )));
        };

        let mut args = AggregateArgs::new();
        if let Some(filter) = map.get("where") {
            args.filter = Filter::from_json(filter)?;
        }

        match map.get("_count") {
            None | Some(JsonValue::Null) | Some(JsonValue::Bool(false)) => {}
            Some(JsonValue::Bool(true)) => args.count = Some(CountSpec::All),
            Some(fields @ JsonValue::Object(_)) => {
                args.count = Some(CountSpec::Fields(selected_fields("_count", fields)?));
            }
            Some(other) => {
                return Err(CoreError::invalid_query(format!(
                    "_count must be a boolean or an object, got {}",
                    json_kind(other)
                )))
            }
        }

        for (kind, target) in [
            ("_sum", &mut args.sum),
            ("_avg", &mut args.avg),
            ("_min", &mut args.min),
            ("_max", &mut args.max),
        ] {
            if let Some(fields) = map.get(kind) {
                *target = selected_fields(kind, fields)?;
            }
        }

        Ok(args)
    }
}

fn alias(kind: &str, field: &str) -> String {
    format!("{kind}__{field}")
}

fn nest(row: &mut Record, kind: &str, fields: &[String]) -> Value {
    let nested: Record = fields
        .iter()
        .map(|field| {
            let value = row.remove(&alias(kind, field)).unwrap_or_default();
            (field.clone(), value)
        })
        .collect();
    Value::Object(nested)
}

fn selected_fields(kind: &str, json: &JsonValue) -> CoreResult<Vec<String>> {
    match json {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Object(map) => Ok(map
            .iter()
            .filter(|(_, selected)| selected.as_bool() == Some(true))
            .map(|(field, _)| field.clone())
            .collect()),
        other => Err(CoreError::invalid_query(format!(
            "{kind} must be an object, got {}",
            json_kind(other)
        ))),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
