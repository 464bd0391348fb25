//! Query descriptor for reads: `{ where, select, include, orderBy, take, skip }`.

use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};
use crate::include::Include;
use crate::predicate::Filter;
use crate::projection::{OrderBy, Page, Select};
use crate::sql::PRIMARY_KEY;
use crate::value::{json_kind, Value};

/// Arguments of `find_unique`, `find_first` and `find_many`.
///
/// ## Example
/// ```rust
/// use till_core::{FindArgs, Filter, Include, OrderBy};
///
/// let args = FindArgs::new()
///     .filter(Filter::new().eq("status", "DONE"))
///     .include(Include::new().relation("items"))
///     .order_by(OrderBy::new().desc("created_at"))
///     .take(20);
///
/// let parsed = FindArgs::from_json(&serde_json::json!({
///     "where": { "status": "DONE" },
///     "include": { "items": true },
///     "orderBy": { "created_at": "desc" },
///     "take": 20
/// })).unwrap();
///
/// assert_eq!(args, parsed);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub filter: Filter,
    pub select: Option<Select>,
    pub include: Include,
    pub order_by: OrderBy,
    pub take: Option<u64>,
    pub skip: Option<u64>,
}

impl FindArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{ where: { id } }`
    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().filter(Filter::new().eq(PRIMARY_KEY, id))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include = include;
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn page(&self) -> Page {
        Page {
            take: self.take,
            skip: self.skip,
        }
    }

    pub fn from_json(json: &JsonValue) -> CoreResult<FindArgs> {
        let map = match json {
            JsonValue::Null => return Ok(FindArgs::new()),
            JsonValue::Object(map) => map,
            other => {
                return Err(CoreError::invalid_query(format!(
                    "query arguments must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let page = Page::from_json_map(map)?;
        Ok(FindArgs {
            filter: map.get("where").map(Filter::from_json).transpose()?.unwrap_or_default(),
            select: map.get("select").map(Select::from_json).transpose()?,
            include: map.get("include").map(Include::from_json).transpose()?.unwrap_or_default(),
            order_by: map.get("orderBy").map(OrderBy::from_json).transpose()?.unwrap_or_default(),
            take: page.take,
            skip: page.skip,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_defaults() {
        assert_eq!(FindArgs::from_json(&json!({})).unwrap(), FindArgs::new());
        assert_eq!(FindArgs::from_json(&JsonValue::Null).unwrap(), FindArgs::new());
    }

    #[test]
    fn test_from_json_rejects_bad_pages() {
        assert!(FindArgs::from_json(&json!({ "take": -1 })).is_err());
        assert!(FindArgs::from_json(&json!({ "skip": "10" })).is_err());
        assert!(FindArgs::from_json(&json!("sales")).is_err());
    }

    #[test]
    fn test_by_id() {
        let fragment = FindArgs::by_id("s1").filter.translate().unwrap();
        assert_eq!(fragment.sql, "id = ?");
    }
}
