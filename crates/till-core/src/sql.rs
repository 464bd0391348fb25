//! # SQL Statement Builders
//!
//! Assembles complete statements from translated fragments. Every table
//! and column name is validated here before it is spliced into text.
//!
//! ```text
//! select  SELECT * FROM t [WHERE …] [ORDER BY …] [LIMIT n] [OFFSET m]
//! insert  INSERT INTO t (a, b) VALUES (?, ?)
//! update  UPDATE t SET a = ?, b = ? [WHERE …]
//! delete  DELETE FROM t [WHERE …]
//! count   SELECT COUNT(*) AS count FROM t [WHERE …]
//! ```

use crate::error::{CoreError, CoreResult};
use crate::ident::validate_ident;
use crate::predicate::Fragment;
use crate::projection::{OrderBy, Page};
use crate::value::{Record, SqlParam, Value};

/// Implicit primary key of every table.
pub const PRIMARY_KEY: &str = "id";

/// Column alias used by [`count`].
pub const COUNT_ALIAS: &str = "count";

/// SQL text with its positional parameters, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Statement {
            sql: sql.into(),
            params,
        }
    }

    /// Hand-written SQL; the values still pass the coercion boundary.
    pub fn raw(sql: impl Into<String>, values: &[Value]) -> CoreResult<Self> {
        let params = values
            .iter()
            .enumerate()
            .map(|(index, value)| value.to_param(&format!("${}", index + 1)))
            .collect::<CoreResult<_>>()?;
        Ok(Statement::new(sql, params))
    }
}

fn push_where(sql: &mut String, filter: &Fragment) {
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.sql);
    }
}

fn push_clause(sql: &mut String, clause: &str) {
    if !clause.is_empty() {
        sql.push(' ');
        sql.push_str(clause);
    }
}

pub fn select(table: &str, filter: Fragment, order_by: &OrderBy, page: &Page) -> CoreResult<Statement> {
    let mut sql = format!("SELECT * FROM {}", validate_ident(table)?);
    push_where(&mut sql, &filter);
    push_clause(&mut sql, &order_by.to_sql()?);
    push_clause(&mut sql, &page.to_sql());
    Ok(Statement::new(sql, filter.params))
}

/// Inserts exactly the fields of `data`, in record order.
pub fn insert(table: &str, data: &Record) -> CoreResult<Statement> {
    validate_ident(table)?;
    if data.is_empty() {
        return Err(CoreError::invalid_query(format!("nothing to insert into {table}")));
    }

    let mut columns = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len());
    for (field, value) in data.iter() {
        columns.push(validate_ident(field)?);
        params.push(value.to_param(field)?);
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    );
    Ok(Statement::new(sql, params))
}

/// True when `data` sets at least one field besides `id`.
pub fn has_assignments(data: &Record) -> bool {
    data.keys().any(|field| field != PRIMARY_KEY)
}

/// Builds `UPDATE … SET` from every field except `id`.
///
/// ## Errors
/// * `NoFieldsToUpdate` - Nothing left to set once `id` is excluded
pub fn update(table: &str, data: &Record, filter: Fragment) -> CoreResult<Statement> {
    validate_ident(table)?;
    if !has_assignments(data) {
        return Err(CoreError::NoFieldsToUpdate {
            table: table.to_string(),
        });
    }

    let mut assignments = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len() + filter.params.len());
    for (field, value) in data.iter().filter(|(field, _)| *field != PRIMARY_KEY) {
        assignments.push(format!("{} = ?", validate_ident(field)?));
        params.push(value.to_param(field)?);
    }

    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    push_where(&mut sql, &filter);
    params.extend(filter.params);
    Ok(Statement::new(sql, params))
}

pub fn delete(table: &str, filter: Fragment) -> CoreResult<Statement> {
    let mut sql = format!("DELETE FROM {}", validate_ident(table)?);
    push_where(&mut sql, &filter);
    Ok(Statement::new(sql, filter.params))
}

pub fn count(table: &str, filter: Fragment) -> CoreResult<Statement> {
    let mut sql = format!("SELECT COUNT(*) AS {COUNT_ALIAS} FROM {}", validate_ident(table)?);
    push_where(&mut sql, &filter);
    Ok(Statement::new(sql, filter.params))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Filter;
    use crate::record;
    use pretty_assertions::assert_eq;

    fn text(value: &str) -> SqlParam {
        SqlParam::Text(value.to_string())
    }

    #[test]
    fn test_select_without_clauses() {
        let stmt = select("orders", Fragment::default(), &OrderBy::new(), &Page::default()).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM orders");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_with_every_clause() {
        let filter = Filter::new().eq("status", "DONE").translate().unwrap();
        let order = OrderBy::new().desc("created_at").asc("id");
        let page = Page {
            take: Some(20),
            skip: Some(40),
        };

        let stmt = select("orders", filter, &order, &page).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM orders WHERE status = ? ORDER BY created_at DESC, id ASC LIMIT 20 OFFSET 40"
        );
        assert_eq!(stmt.params, vec![text("DONE")]);
    }

    #[test]
    fn test_insert_uses_exactly_the_supplied_fields() {
        let stmt = insert("sales", &record! { "id" => "s1", "total" => 60, "paid" => true }).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO sales (id, total, paid) VALUES (?, ?, ?)");
        assert_eq!(
            stmt.params,
            vec![text("s1"), SqlParam::Integer(60), SqlParam::Integer(1)]
        );
    }

    #[test]
    fn test_update_never_sets_id() {
        let filter = Filter::new().eq("id", "s1").translate().unwrap();
        let stmt = update("sales", &record! { "id" => "s2", "total" => 70 }, filter).unwrap();
        assert_eq!(stmt.sql, "UPDATE sales SET total = ? WHERE id = ?");
        assert_eq!(stmt.params, vec![SqlParam::Integer(70), text("s1")]);
    }

    #[test]
    fn test_update_with_only_id_fails() {
        let err = update("sales", &record! { "id" => "s2" }, Fragment::default()).unwrap_err();
        assert!(matches!(err, CoreError::NoFieldsToUpdate { ref table } if table == "sales"));
        assert!(!has_assignments(&Record::new()));
    }

    #[test]
    fn test_delete_and_count() {
        assert_eq!(delete("sales", Fragment::default()).unwrap().sql, "DELETE FROM sales");

        let filter = Filter::new().compare("total", crate::Op::Gt(0.into())).translate().unwrap();
        let stmt = count("sales", filter).unwrap();
        assert_eq!(stmt.sql, "SELECT COUNT(*) AS count FROM sales WHERE total > ?");
        assert_eq!(stmt.params, vec![SqlParam::Integer(0)]);
    }

    #[test]
    fn test_table_names_are_validated() {
        assert!(matches!(
            delete("sales; --", Fragment::default()),
            Err(CoreError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_raw_params_pass_the_boundary() {
        let stmt = Statement::raw("SELECT ?", &[Value::Bool(true)]).unwrap();
        assert_eq!(stmt.params, vec![SqlParam::Integer(1)]);

        let err = Statement::raw("SELECT ?", &[Value::Array(vec![])]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameterType { ref field, .. } if field == "$1"));
    }
}
