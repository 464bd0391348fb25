//! # POS Demo Schema
//!
//! The tables the seed binary and the tests run against, plus their
//! relation registry.
//!
//! ## Tables
//! ```text
//! ┌─────────────┐        ┌─────────────┐        ┌──────────────┐
//! │  customers  │ 1    * │    sales    │ 1    * │  sale_items  │
//! │─────────────│◄───────│─────────────│◄───────│──────────────│
//! │ id          │        │ id          │        │ id           │
//! │ name        │        │ customer_id │        │ sale_id      │
//! │ phone       │        │ total       │        │ product_id   │──┐
//! │ is_member   │        │ status      │        │ qty          │  │
//! └─────────────┘        └─────────────┘        │ price_cents  │  │
//!                                               └──────────────┘  │
//! ┌─────────────┐        ┌─────────────┐                          │
//! │ categories  │ 1    * │  products   │ 1                      * │
//! │─────────────│◄───────│─────────────│◄─────────────────────────┘
//! │ parent_id ──┼─┐      │ sku UNIQUE  │
//! └─────────────┘ │      │ price_cents │
//!        ▲        │      │ is_active   │
//!        └────────┘      └─────────────┘
//! ```
//!
//! The store has no schema of its own: this DDL is what a POS app would
//! create, and the registry below is what tells the resolver how the
//! tables connect.

use till_core::{CoreResult, Schema};

/// Statements that create the demo tables, in dependency order.
pub const DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        parent_id TEXT REFERENCES categories(id)
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        sku TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        price_cents INTEGER NOT NULL DEFAULT 0,
        stock INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        category_id TEXT REFERENCES categories(id),
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )",
    "CREATE TABLE IF NOT EXISTS customers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        phone TEXT,
        email TEXT,
        is_member INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )",
    "CREATE TABLE IF NOT EXISTS sales (
        id TEXT PRIMARY KEY,
        customer_id TEXT REFERENCES customers(id),
        total INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'OPEN',
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )",
    "CREATE TABLE IF NOT EXISTS sale_items (
        id TEXT PRIMARY KEY,
        sale_id TEXT NOT NULL REFERENCES sales(id) ON DELETE CASCADE,
        product_id TEXT REFERENCES products(id),
        qty INTEGER NOT NULL DEFAULT 1,
        price_cents INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_sale_items_sale ON sale_items(sale_id)",
    "CREATE INDEX IF NOT EXISTS idx_sales_customer ON sales(customer_id)",
];

/// Registry for the demo tables, in the TOML form apps ship it in.
pub const SCHEMA_TOML: &str = r#"
[[tables]]
name = "categories"
columns = ["name", "parent_id"]

[[tables]]
name = "products"
columns = ["sku", "name", "price_cents", "stock", "is_active", "category_id", "created_at"]

[[tables]]
name = "customers"
columns = ["name", "phone", "email", "is_member", "created_at"]

[[tables]]
name = "sales"
columns = ["customer_id", "total", "status", "created_at"]

[[tables]]
name = "sale_items"
columns = ["sale_id", "product_id", "qty", "price_cents"]

[[relations]]
table = "sales"
field = "items"
kind = "one_to_many"
target = "sale_items"
foreign_key = "sale_id"

[[relations]]
table = "sales"
field = "customer"
kind = "many_to_one"
target = "customers"
foreign_key = "customer_id"

[[relations]]
table = "customers"
field = "sales"
kind = "one_to_many"
target = "sales"
foreign_key = "customer_id"

[[relations]]
table = "sale_items"
field = "sale"
kind = "many_to_one"
target = "sales"
foreign_key = "sale_id"

[[relations]]
table = "sale_items"
field = "product"
kind = "many_to_one"
target = "products"
foreign_key = "product_id"

[[relations]]
table = "products"
field = "category"
kind = "many_to_one"
target = "categories"
foreign_key = "category_id"

[[relations]]
table = "categories"
field = "parent"
kind = "many_to_one"
target = "categories"
foreign_key = "parent_id"

[[relations]]
table = "categories"
field = "children"
kind = "one_to_many"
target = "categories"
foreign_key = "parent_id"
"#;

/// Parses [`SCHEMA_TOML`].
pub fn schema() -> CoreResult<Schema> {
    Schema::from_toml_str(SCHEMA_TOML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::RelationKind;

    #[test]
    fn test_demo_schema_loads() {
        let schema = schema().unwrap();

        let items = schema.relation("sales", "items").unwrap();
        assert_eq!(items.kind, RelationKind::OneToMany);
        assert_eq!(items.parent_key(), "id");
        assert_eq!(items.target_key(), "sale_id");

        let parent = schema.relation("categories", "parent").unwrap();
        assert_eq!(parent.parent_key(), "parent_id");
        assert_eq!(parent.target_key(), "id");

        assert!(schema.check_field("sale_items", "qty").is_ok());
        assert!(schema.check_field("sale_items", "quantity").is_err());
    }
}
