//! Shared fixtures for the async tests.

use till_core::{record, Schema};

use crate::client::Client;
use crate::config::DbConfig;
use crate::pos;

/// In-memory client with the POS tables and registry.
pub(crate) async fn client() -> Client {
    let client = Client::connect(DbConfig::in_memory(), pos::schema().unwrap())
        .await
        .unwrap();
    for ddl in pos::DDL {
        client.raw_execute(ddl, &[]).await.unwrap();
    }
    client
}

/// In-memory client with one undeclared `orders` table and no registry.
pub(crate) async fn orders_client() -> Client {
    let client = Client::connect(DbConfig::in_memory(), Schema::empty())
        .await
        .unwrap();
    client
        .raw_execute("CREATE TABLE orders (id TEXT PRIMARY KEY, status TEXT)", &[])
        .await
        .unwrap();
    client
}

/// Three sales: s1 (two items, customer c1), s2 (one item, c1), s3 (no
/// items, no customer).
pub(crate) async fn seed_sales(client: &Client) {
    client
        .table("customers")
        .unwrap()
        .create(record! { "id" => "c1", "name" => "Ayesha" })
        .await
        .unwrap();

    client
        .table("products")
        .unwrap()
        .create_many(vec![
            record! { "id" => "p1", "sku" => "TEA-1", "name" => "Green Tea", "price_cents" => 450 },
            record! { "id" => "p2", "sku" => "BIS-1", "name" => "Biscuits", "price_cents" => 120 },
        ])
        .await
        .unwrap();

    client
        .table("sales")
        .unwrap()
        .create_many(vec![
            record! { "id" => "s1", "customer_id" => "c1", "total" => 1470, "status" => "DONE" },
            record! { "id" => "s2", "customer_id" => "c1", "total" => 2250, "status" => "DONE" },
            record! { "id" => "s3", "total" => 0, "status" => "OPEN" },
        ])
        .await
        .unwrap();

    client
        .table("sale_items")
        .unwrap()
        .create_many(vec![
            record! { "id" => "i1", "sale_id" => "s1", "product_id" => "p1", "qty" => 3, "price_cents" => 450 },
            record! { "id" => "i2", "sale_id" => "s1", "product_id" => "p2", "qty" => 1, "price_cents" => 120 },
            record! { "id" => "i3", "sale_id" => "s2", "product_id" => "p1", "qty" => 5, "price_cents" => 450 },
        ])
        .await
        .unwrap();
}
