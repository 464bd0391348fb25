//! # Values and Records
//!
//! The scalar coercion boundary between callers and the store.
//!
//! ## Crossing the Boundary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Scalar Coercion Boundary                             │
//! │                                                                         │
//! │  Caller Value                 SqlParam (bound)        Read back as      │
//! │  ────────────                 ────────────────        ────────────      │
//! │  Bool(true)          ──►      Integer(1)        ──►   Integer(1)        │
//! │  Timestamp(..)       ──►      Text("…T10:00:00.000Z") Text(..)          │
//! │  Date(2026-01-31)    ──►      Text("2026-01-31")  ──► Text(..)          │
//! │  Integer / Real / Text / Blob / Null pass through unchanged             │
//! │  Array / Object      ──►      ✗ InvalidParameterType                    │
//! │                                                                         │
//! │  Value::as_bool / Value::as_timestamp undo the coercion on the way out │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};

/// Format used for `Value::Date` when it is bound.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed value flowing in or out of a record.
///
/// `Array` and `Object` only appear as operands of `in`/`notIn` or as
/// relation attachments; they can never be bound as a parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Array(Vec<Value>),
    Object(Record),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            Value::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(value) => Some(*value),
            Value::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Reads a boolean back out of the store, where it lives as 0/1.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            _ => None,
        }
    }

    /// Reads a timestamp back out of its canonical text form.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Coerces the value into a bindable parameter.
    ///
    /// ## Arguments
    /// * `field` - Field the value belongs to (for the error message)
    ///
    /// ## Returns
    /// * `Ok(SqlParam)` - One of the five primitives SQLite accepts
    /// * `Err(CoreError::InvalidParameterType)` - Array, object or non-finite real
    pub fn to_param(&self, field: &str) -> CoreResult<SqlParam> {
        let param = match self {
            Value::Null => SqlParam::Null,
            Value::Bool(value) => SqlParam::Integer(i64::from(*value)),
            Value::Integer(value) => SqlParam::Integer(*value),
            Value::Real(value) if value.is_finite() => SqlParam::Real(*value),
            Value::Real(_) => return Err(CoreError::invalid_parameter(field, "non-finite real")),
            Value::Text(text) => SqlParam::Text(text.clone()),
            Value::Blob(bytes) => SqlParam::Blob(bytes.clone()),
            Value::Timestamp(ts) => SqlParam::Text(canonical_timestamp(ts)),
            Value::Date(date) => SqlParam::Text(date.format(DATE_FORMAT).to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(CoreError::invalid_parameter(field, self.kind()))
            }
        };
        Ok(param)
    }

    /// Hashable identity used to match keys across records.
    ///
    /// Values SQLite treats as equal across column affinities share a key:
    /// `Bool(true)`, `Integer(1)`, `Real(1.0)` and `Text("1")` all match.
    /// Text only folds when it is the canonical spelling of an integer, so
    /// `"01"` stays text. Nulls and non-scalars have no key.
    pub fn key(&self) -> Option<KeyValue> {
        match self.to_param("key").ok()? {
            SqlParam::Null => None,
            SqlParam::Integer(value) => Some(KeyValue::Integer(value)),
            SqlParam::Real(value) if value.fract() == 0.0 && value.abs() < 9.0e15 => {
                Some(KeyValue::Integer(value as i64))
            }
            SqlParam::Real(value) => Some(KeyValue::Real(value.to_bits())),
            SqlParam::Text(text) => match text.parse::<i64>() {
                Ok(value) if value.to_string() == text => Some(KeyValue::Integer(value)),
                _ => Some(KeyValue::Text(text)),
            },
            SqlParam::Blob(bytes) => Some(KeyValue::Blob(bytes)),
        }
    }

    /// Converts structural JSON into a value.
    ///
    /// Integers beyond `i64` are rejected rather than rounded through `f64`.
    pub fn from_json(field: &str, json: &JsonValue) -> CoreResult<Value> {
        let value = match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(value) => Value::Bool(*value),
            JsonValue::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Value::Integer(value)
                } else if number.is_u64() {
                    return Err(CoreError::invalid_parameter(field, "integer beyond i64"));
                } else {
                    Value::Real(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(text) => Value::Text(text.clone()),
            JsonValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| Value::from_json(field, item))
                    .collect::<CoreResult<_>>()?,
            ),
            JsonValue::Object(_) => Value::Object(Record::from_json(json)?),
        };
        Ok(value)
    }
}

/// Canonical text form of a timestamp: RFC 3339, milliseconds, `Z` suffix.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Real(value) => serializer.serialize_f64(*value),
            Value::Text(text) => serializer.serialize_str(text),
            Value::Blob(bytes) => serializer.serialize_bytes(bytes),
            Value::Timestamp(ts) => serializer.serialize_str(&canonical_timestamp(ts)),
            Value::Date(date) => serializer.collect_str(&date.format(DATE_FORMAT)),
            Value::Array(items) => serializer.collect_seq(items),
            Value::Object(record) => record.serialize(serializer),
        }
    }
}

// -----------------------------------------------------------------------------
// Conversions
// -----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Bind Parameters
// =============================================================================

/// A parameter as it is handed to the store.
///
/// The type is the invariant: nothing else can reach a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Hashable form of a key value, for grouping related rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Integer(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

// =============================================================================
// Record
// =============================================================================

/// One row: field name → value, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Record(IndexMap::with_capacity(capacity))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    /// Sets a field, keeping its position if it already exists.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a field, preserving the order of the others.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.0.retain(|field, value| keep(field, value));
    }

    /// Builds a record from a structural JSON object.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::{Record, Value};
    ///
    /// let json = serde_json::json!({ "id": "s1", "total": 1250, "paid": true });
    /// let record = Record::from_json(&json).unwrap();
    /// assert_eq!(record.get("total"), Some(&Value::Integer(1250)));
    /// ```
    pub fn from_json(json: &JsonValue) -> CoreResult<Record> {
        let JsonValue::Object(map) = json else {
            return Err(CoreError::invalid_query(format!(
                "expected an object, got {}",
                json_kind(json)
            )));
        };

        map.iter()
            .map(|(field, value)| Ok((field.clone(), Value::from_json(field, value)?)))
            .collect()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

impl Extend<(String, Value)> for Record {
    fn extend<I: IntoIterator<Item = (String, Value)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Builds a [`Record`] from `field => value` pairs.
///
/// ```rust
/// use till_core::record;
///
/// let row = record! { "id" => "o1", "status" => "PENDING", "total" => 10 };
/// assert_eq!(row.len(), 3);
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert($field, $value); )+
        record
    }};
}

/// Short description of a JSON node's type.
pub(crate) fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
