//! Include trees: which relations to attach, and how to scope each one.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};
use crate::predicate::Filter;
use crate::projection::{OrderBy, Page, Select};
use crate::value::json_kind;

/// Relation field → how to fetch it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Include(pub IndexMap<String, RelationQuery>);

/// Scope applied to one relation edge.
///
/// `filter` and `order_by` are pushed into the batched query; `page` is
/// applied per parent group once rows are grouped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationQuery {
    pub filter: Filter,
    pub order_by: OrderBy,
    pub page: Page,
    pub select: Option<Select>,
    pub include: Include,
}

impl Include {
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes a relation with no extra scope (`{ items: true }`).
    pub fn relation(self, field: impl Into<String>) -> Self {
        self.scoped(field, RelationQuery::default())
    }

    pub fn scoped(mut self, field: impl Into<String>, query: RelationQuery) -> Self {
        self.0.insert(field.into(), query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationQuery)> {
        self.0.iter().map(|(field, query)| (field.as_str(), query))
    }

    /// Levels of nesting; `{}` is 0, `{ items: true }` is 1.
    pub fn depth(&self) -> usize {
        self.0
            .values()
            .map(|query| 1 + query.include.depth())
            .max()
            .unwrap_or(0)
    }

    /// Fails with `IncludeTooDeep` when the tree nests past `max` levels.
    pub fn check_depth(&self, max: usize) -> CoreResult<()> {
        if self.depth() > max {
            return Err(CoreError::IncludeTooDeep { max });
        }
        Ok(())
    }

    /// Parses `{ items: true, customer: { where: …, include: … } }`.
    pub fn from_json(json: &JsonValue) -> CoreResult<Include> {
        let map = match json {
            JsonValue::Null => return Ok(Include::new()),
            JsonValue::Object(map) => map,
            other => {
                return Err(CoreError::invalid_query(format!(
                    "include must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut include = Include::new();
        for (field, value) in map {
            match value {
                JsonValue::Bool(true) => include = include.relation(field.clone()),
                JsonValue::Bool(false) | JsonValue::Null => {}
                JsonValue::Object(_) => {
                    include = include.scoped(field.clone(), RelationQuery::from_json(value)?)
                }
                other => {
                    return Err(CoreError::invalid_query(format!(
                        "include.{field} must be a boolean or an object, got {}",
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(include)
    }
}

impl RelationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.page.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.page.skip = Some(skip);
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

    pub fn from_json(json: &JsonValue) -> CoreResult<RelationQuery> {
        let JsonValue::Object(map) = json else {
            return Ok(RelationQuery::default());
        };

        Ok(RelationQuery {
            filter: map.get("where").map(Filter::from_json).transpose()?.unwrap_or_default(),
            order_by: map.get("orderBy").map(OrderBy::from_json).transpose()?.unwrap_or_default(),
            page: Page::from_json_map(map)?,
            select: map.get("select").map(Select::from_json).transpose()?,
            include: map.get("include").map(Include::from_json).transpose()?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let include = Include::from_json(&json!({
            "customer": true,
            "refunds": false,
            "items": {
                "where": { "qty": { "gt": 0 } },
                "orderBy": { "id": "asc" },
                "take": 2,
                "include": { "product": true }
            }
        }))
        .unwrap();

        let fields: Vec<_> = include.iter().map(|(field, _)| field).collect();
        assert_eq!(fields, ["customer", "items"]);

        let items = &include.0["items"];
        assert_eq!(items.page.take, Some(2));
        assert_eq!(items.order_by.to_sql().unwrap(), "ORDER BY id ASC");
        assert_eq!(items.filter.translate().unwrap().sql, "qty > ?");
        assert_eq!(items.include.depth(), 1);
    }

    #[test]
    fn test_depth() {
        assert_eq!(Include::new().depth(), 0);

        let include = Include::new()
            .relation("customer")
            .scoped(
                "items",
                RelationQuery::new().include(Include::new().scoped(
                    "product",
                    RelationQuery::new().include(Include::new().relation("supplier")),
                )),
            );
        assert_eq!(include.depth(), 3);
        assert!(include.check_depth(3).is_ok());
        assert!(matches!(
            include.check_depth(2),
            Err(CoreError::IncludeTooDeep { max: 2 })
        ));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(Include::from_json(&json!(["items"])).is_err());
        assert!(Include::from_json(&json!({ "items": 1 })).is_err());
    }
}
