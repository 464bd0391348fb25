//! # Predicate Translator
//!
//! Turns a `where` filter into a SQL boolean expression plus the ordered
//! parameter list that goes with it. Pure: no I/O, no store.
//!
//! ## Translation Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Filter Node → SQL Conjunct                           │
//! │                                                                         │
//! │  { status: "DONE" }             status = ?            ["DONE"]          │
//! │  { status: null }               status IS NULL        []                │
//! │  { total: { gte: 10 } }         total >= ?            [10]              │
//! │  { id: { in: ["a", "b"] } }     id IN (?, ?)          ["a", "b"]        │
//! │  { id: { in: [] } }             0 = 1                 []                │
//! │  { id: { notIn: [] } }          1 = 1                 []                │
//! │  { name: { contains: "tea" } }  name LIKE ?           ["%tea%"]         │
//! │  { OR: [{a: 1}, {b: 2}] }       (a = ? OR b = ?)      [1, 2]            │
//! │                                                                         │
//! │  Conjuncts are joined with " AND ". No conjuncts → "" (caller omits    │
//! │  the WHERE keyword entirely).                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::ident::validate_ident;
use crate::value::{json_kind, SqlParam, Value};

// =============================================================================
// AST
// =============================================================================

/// Comparison applied to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Equals(Value),
    Not(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Contains(Value),
    StartsWith(Value),
    EndsWith(Value),
    IsNull,
}

/// One node of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { field: String, op: Op },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

/// A `where` clause: a list of nodes that must all hold.
///
/// ## Example
/// ```rust
/// use till_core::{Filter, Op};
///
/// let filter = Filter::new()
///     .eq("status", "PENDING")
///     .compare("total", Op::Gte(100.into()));
///
/// let fragment = filter.translate().unwrap();
/// assert_eq!(fragment.sql, "status = ? AND total >= ?");
/// assert_eq!(fragment.params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub nodes: Vec<Predicate>,
}

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

// =============================================================================
// Builders
// =============================================================================

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds `field = value` (`IS NULL` when the value is null).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Op::Equals(value.into()))
    }

    /// Adds `field = value` only when a value is present.
    ///
    /// `None` means "not filtered", which is different from filtering on null.
    pub fn eq_opt<T: Into<Value>>(self, field: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(value) => self.eq(field, value),
            None => self,
        }
    }

    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.compare(field, Op::IsNull)
    }

    pub fn compare(mut self, field: impl Into<String>, op: Op) -> Self {
        self.nodes.push(Predicate::Compare {
            field: field.into(),
            op,
        });
        self
    }

    pub fn and(mut self, children: Vec<Filter>) -> Self {
        self.nodes.push(Predicate::And(children));
        self
    }

    pub fn or(mut self, children: Vec<Filter>) -> Self {
        self.nodes.push(Predicate::Or(children));
        self
    }

    /// Appends every node of `other` after this filter's nodes.
    pub fn merge(mut self, other: Filter) -> Self {
        self.nodes.extend(other.nodes);
        self
    }

    /// Top-level `field = value` pairs, in order.
    ///
    /// Used by upsert to carry the lookup keys into the created row.
    pub fn equalities(&self) -> Vec<(&str, &Value)> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Predicate::Compare {
                    field,
                    op: Op::Equals(value),
                } if !value.is_null() => Some((field.as_str(), value)),
                _ => None,
            })
            .collect()
    }

    /// Every field referenced anywhere in the filter.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        for node in &self.nodes {
            match node {
                Predicate::Compare { field, .. } => out.push(field),
                Predicate::And(children) | Predicate::Or(children) => {
                    for child in children {
                        child.collect_fields(out);
                    }
                }
            }
        }
    }
}

// =============================================================================
// Structural JSON
// =============================================================================

impl Filter {
    /// Parses a structural `where` object.
    ///
    /// `null` means no filter. Unknown operator keys are skipped with a
    /// warning.
    pub fn from_json(json: &JsonValue) -> CoreResult<Filter> {
        let map = match json {
            JsonValue::Null => return Ok(Filter::new()),
            JsonValue::Object(map) => map,
            other => {
                return Err(CoreError::invalid_query(format!(
                    "where must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut filter = Filter::new();
        for (key, value) in map {
            match key.as_str() {
                "AND" => filter = filter.and(children_from_json(value)?),
                "OR" => filter = filter.or(children_from_json(value)?),
                _ => filter = field_from_json(filter, key, value)?,
            }
        }
        Ok(filter)
    }
}

fn children_from_json(json: &JsonValue) -> CoreResult<Vec<Filter>> {
    match json {
        JsonValue::Array(items) => items.iter().map(Filter::from_json).collect(),
        single => Ok(vec![Filter::from_json(single)?]),
    }
}

fn field_from_json(mut filter: Filter, field: &str, json: &JsonValue) -> CoreResult<Filter> {
    match json {
        JsonValue::Null => Ok(filter.is_null(field)),
        JsonValue::Array(_) => Err(CoreError::invalid_parameter(field, "array")),
        JsonValue::Object(ops) => {
            for (name, operand) in ops {
                let op = match name.as_str() {
                    "equals" => Op::Equals(Value::from_json(field, operand)?),
                    "not" => Op::Not(Value::from_json(field, operand)?),
                    "in" => Op::In(list_operand(field, name, operand)?),
                    "notIn" => Op::NotIn(list_operand(field, name, operand)?),
                    "lt" => Op::Lt(Value::from_json(field, operand)?),
                    "lte" => Op::Lte(Value::from_json(field, operand)?),
                    "gt" => Op::Gt(Value::from_json(field, operand)?),
                    "gte" => Op::Gte(Value::from_json(field, operand)?),
                    "contains" => Op::Contains(Value::from_json(field, operand)?),
                    "startsWith" => Op::StartsWith(Value::from_json(field, operand)?),
                    "endsWith" => Op::EndsWith(Value::from_json(field, operand)?),
                    unknown => {
                        warn!(field, operator = unknown, "Ignoring unrecognized filter operator");
                        continue;
                    }
                };
                filter = filter.compare(field, op);
            }
            Ok(filter)
        }
        scalar => Ok(filter.eq(field, Value::from_json(field, scalar)?)),
    }
}

fn list_operand(field: &str, op: &str, json: &JsonValue) -> CoreResult<Vec<Value>> {
    match json {
        JsonValue::Array(items) => items.iter().map(|item| Value::from_json(field, item)).collect(),
        other => Err(CoreError::invalid_query(format!(
            "{op} on {field} expects a list, got {}",
            json_kind(other)
        ))),
    }
}

// =============================================================================
// Translation
// =============================================================================

impl Filter {
    /// Translates the filter into a boolean expression and its parameters.
    ///
    /// ## Returns
    /// * `Ok(Fragment)` - `sql` is empty when the filter produced no conjuncts
    /// * `Err(InvalidIdentifier)` - A field name is not a plain identifier
    /// * `Err(InvalidParameterType)` - An operand cannot be bound
    pub fn translate(&self) -> CoreResult<Fragment> {
        let mut params = Vec::new();
        let conjuncts = self.translate_into(&mut params)?;
        Ok(Fragment {
            sql: conjuncts.join(" AND "),
            params,
        })
    }

    fn translate_into(&self, params: &mut Vec<SqlParam>) -> CoreResult<Vec<String>> {
        let mut conjuncts = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            match node {
                Predicate::Compare { field, op } => {
                    conjuncts.push(translate_compare(field, op, params)?);
                }
                Predicate::And(children) => {
                    if let Some(group) = translate_group(children, " AND ", params)? {
                        conjuncts.push(group);
                    }
                }
                Predicate::Or(children) => {
                    if let Some(group) = translate_group(children, " OR ", params)? {
                        conjuncts.push(group);
                    }
                }
            }
        }

        Ok(conjuncts)
    }
}

/// Joins non-empty children with the connective inside parentheses.
fn translate_group(
    children: &[Filter],
    connective: &str,
    params: &mut Vec<SqlParam>,
) -> CoreResult<Option<String>> {
    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        let conjuncts = child.translate_into(params)?;
        if !conjuncts.is_empty() {
            parts.push(conjuncts.join(" AND "));
        }
    }

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!("({})", parts.join(connective))))
    }
}

fn translate_compare(field: &str, op: &Op, params: &mut Vec<SqlParam>) -> CoreResult<String> {
    validate_ident(field)?;

    let sql = match op {
        Op::IsNull | Op::Equals(Value::Null) => format!("{field} IS NULL"),
        Op::Not(Value::Null) => format!("{field} IS NOT NULL"),
        Op::Equals(value) => binary(field, "=", value, params)?,
        Op::Not(value) => binary(field, "!=", value, params)?,
        Op::Lt(value) => binary(field, "<", value, params)?,
        Op::Lte(value) => binary(field, "<=", value, params)?,
        Op::Gt(value) => binary(field, ">", value, params)?,
        Op::Gte(value) => binary(field, ">=", value, params)?,
        Op::In(values) if values.is_empty() => "0 = 1".to_string(),
        Op::NotIn(values) if values.is_empty() => "1 = 1".to_string(),
        Op::In(values) => list(field, "IN", values, params)?,
        Op::NotIn(values) => list(field, "NOT IN", values, params)?,
        Op::Contains(value) => like(field, value, "%", "%", params)?,
        Op::StartsWith(value) => like(field, value, "", "%", params)?,
        Op::EndsWith(value) => like(field, value, "%", "", params)?,
    };

    Ok(sql)
}

fn binary(field: &str, operator: &str, value: &Value, params: &mut Vec<SqlParam>) -> CoreResult<String> {
    params.push(value.to_param(field)?);
    Ok(format!("{field} {operator} ?"))
}

fn list(field: &str, keyword: &str, values: &[Value], params: &mut Vec<SqlParam>) -> CoreResult<String> {
    for value in values {
        params.push(value.to_param(field)?);
    }
    let placeholders = vec!["?"; values.len()].join(", ");
    Ok(format!("{field} {keyword} ({placeholders})"))
}

/// Wildcards go into the bound value, never the SQL text.
fn like(
    field: &str,
    value: &Value,
    prefix: &str,
    suffix: &str,
    params: &mut Vec<SqlParam>,
) -> CoreResult<String> {
    let needle = match value {
        Value::Text(text) => text.clone(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) if number.is_finite() => number.to_string(),
        other => return Err(CoreError::invalid_parameter(field, other.kind())),
    };
    params.push(SqlParam::Text(format!("{prefix}{needle}{suffix}")));
    Ok(format!("{field} LIKE ?"))
}

// =============================================================================
// Unit Tests
// =============================================================================
