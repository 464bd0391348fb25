//! # Projection, Order and Page
//!
//! `orderBy`, `take`/`skip` become SQL fragments; `select` is applied to
//! records after relations are attached, never at the SQL level.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};
use crate::ident::validate_ident;
use crate::value::{json_kind, Record, Value};

// =============================================================================
// Order
// =============================================================================

/// Sort direction; parsed case-insensitively, rendered upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Desc)
        } else {
            Err(CoreError::invalid_query(format!("unknown sort direction '{s}'")))
        }
    }
}

/// Ordered sort keys. Input order is output order, with no implicit
/// tie-breaker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy(pub Vec<(String, Direction)>);

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.then(field, Direction::Asc)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.then(field, Direction::Desc)
    }

    pub fn then(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.0.push((field.into(), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(field, _)| field.as_str())
    }

    /// Renders `ORDER BY a ASC, b DESC`, or `""` when there are no keys.
    pub fn to_sql(&self) -> CoreResult<String> {
        if self.0.is_empty() {
            return Ok(String::new());
        }

        let keys = self
            .0
            .iter()
            .map(|(field, direction)| Ok(format!("{} {direction}", validate_ident(field)?)))
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(format!("ORDER BY {}", keys.join(", ")))
    }

    /// Parses `{ field: "asc" }` or `[{ a: "desc" }, { b: "asc" }]`.
    pub fn from_json(json: &JsonValue) -> CoreResult<OrderBy> {
        let mut order = OrderBy::new();
        match json {
            JsonValue::Null => {}
            JsonValue::Object(_) => order.push_json(json)?,
            JsonValue::Array(items) => {
                for item in items {
                    order.push_json(item)?;
                }
            }
            other => {
                return Err(CoreError::invalid_query(format!(
                    "orderBy must be an object or a list, got {}",
                    json_kind(other)
                )))
            }
        }
        Ok(order)
    }

    fn push_json(&mut self, json: &JsonValue) -> CoreResult<()> {
        let JsonValue::Object(map) = json else {
            return Err(CoreError::invalid_query("orderBy entries must be objects"));
        };
        for (field, direction) in map {
            let direction: Direction = direction
                .as_str()
                .ok_or_else(|| {
                    CoreError::invalid_query(format!("sort direction for {field} must be a string"))
                })?
                .parse()?;
            self.0.push((field.clone(), direction));
        }
        Ok(())
    }
}

// =============================================================================
// Page
// =============================================================================

/// `take` / `skip`. Neither implies a default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub take: Option<u64>,
    pub skip: Option<u64>,
}

impl Page {
    /// Renders `LIMIT n` and `OFFSET m` as given.
    ///
    /// SQLite needs a LIMIT before OFFSET, so a lone `skip` renders
    /// `LIMIT -1 OFFSET m`. Both are capped at `i64::MAX`, the largest
    /// integer SQLite accepts there.
    pub fn to_sql(&self) -> String {
        let take = self.take.map(clamp_to_sql);
        let skip = self.skip.map(clamp_to_sql);
        match (take, skip) {
            (None, None) => String::new(),
            (Some(take), None) => format!("LIMIT {take}"),
            (Some(take), Some(skip)) => format!("LIMIT {take} OFFSET {skip}"),
            (None, Some(skip)) => format!("LIMIT -1 OFFSET {skip}"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.take.is_none() && self.skip.is_none()
    }

    /// Reads `take` and `skip` out of a descriptor object.
    pub fn from_json_map(map: &serde_json::Map<String, JsonValue>) -> CoreResult<Page> {
        Ok(Page {
            take: count_from_json(map, "take")?,
            skip: count_from_json(map, "skip")?,
        })
    }

    /// Applies the page to rows already in memory.
    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let skip = self.skip.map_or(0, |skip| usize::try_from(skip).unwrap_or(usize::MAX));
        let rows = rows.into_iter().skip(skip);
        match self.take {
            Some(take) => rows.take(usize::try_from(take).unwrap_or(usize::MAX)).collect(),
            None => rows.collect(),
        }
    }
}

fn clamp_to_sql(count: u64) -> u64 {
    count.min(i64::MAX as u64)
}

fn count_from_json(map: &serde_json::Map<String, JsonValue>, key: &str) -> CoreResult<Option<u64>> {
    match map.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .filter(|count| i64::try_from(*count).is_ok())
            .map(Some)
            .ok_or_else(|| {
                CoreError::invalid_query(format!(
                    "{key} must be a non-negative integer no larger than {}",
                    i64::MAX
                ))
            }),
    }
}

// =============================================================================
// Select
// =============================================================================

/// Field narrowing tree: `field → true` or `field → nested select`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select(pub IndexMap<String, Option<Select>>);

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), None);
        self
    }

    pub fn nested(mut self, field: impl Into<String>, select: Select) -> Self {
        self.0.insert(field.into(), Some(select));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Narrows a record to the selected keys, recursing into attached
    /// relation values (records and lists of records).
    pub fn apply(&self, record: &mut Record) {
        record.retain(|field, _| self.0.contains_key(field));

        for (field, nested) in &self.0 {
            let Some(nested) = nested else { continue };
            match record.get_mut(field) {
                Some(Value::Object(child)) => nested.apply(child),
                Some(Value::Array(items)) => {
                    for item in items {
                        if let Value::Object(child) = item {
                            nested.apply(child);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    pub fn apply_all(&self, records: &mut [Record]) {
        for record in records {
            self.apply(record);
        }
    }

    /// Parses `{ id: true, items: { select: { qty: true } } }`.
    ///
    /// A nested value may be the select map itself or wrapped in
    /// `{ select: … }`. Fields set to `false` are left out.
    pub fn from_json(json: &JsonValue) -> CoreResult<Select> {
        let JsonValue::Object(map) = json else {
            return Err(CoreError::invalid_query(format!(
                "select must be an object, got {}",
                json_kind(json)
            )));
        };

        let mut select = Select::new();
        for (field, value) in map {
            match value {
                JsonValue::Bool(true) => select = select.field(field.clone()),
                JsonValue::Bool(false) | JsonValue::Null => {}
                JsonValue::Object(inner) => {
                    let nested = match inner.get("select") {
                        Some(wrapped @ JsonValue::Object(_)) => wrapped,
                        _ => value,
                    };
                    select = select.nested(field.clone(), Select::from_json(nested)?);
                }
                other => {
                    return Err(CoreError::invalid_query(format!(
                        "select.{field} must be a boolean or an object, got {}",
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(select)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
