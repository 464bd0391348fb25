//! # Seed Data Generator
//!
//! Creates the demo POS tables, fills them through the table models and
//! prints a nested read plus an aggregate.
//!
//! ## Usage
//! ```bash
//! # Generate 200 sales (default)
//! cargo run -p till-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p till-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p till-db --bin seed -- --db ./data/till.db
//! ```
//!
//! ## Generated Data
//! - A handful of categories and products (unique SKU per product)
//! - Customers, every third sale being a walk-in (no customer)
//! - Sales with 1-4 line items each, totals matching their items

use chrono::Utc;
use serde_json::json;
use std::env;
use till_core::{record, AggregateArgs, Filter, FindArgs, Record, Value};
use till_db::{pos, Client, DbConfig};
use tracing_subscriber::EnvFilter;

/// Product catalogue: (sku prefix, name, price in cents)
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("TEA", "Green Tea", 450),
    ("TEA", "Black Tea", 400),
    ("BIS", "Digestive Biscuits", 120),
    ("BIS", "Chocolate Biscuits", 180),
    ("MLK", "Whole Milk 1L", 260),
    ("MLK", "Yogurt Cup", 90),
    ("BRD", "Wheat Bread", 210),
    ("BRD", "Bun Pack", 150),
];

const CUSTOMERS: &[&str] = &["Ayesha Khan", "Bilal Ahmed", "Sara Malik", "Usman Tariq", "Hina Raza"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./till_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of sales to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./till_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Till Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", count);
    println!();

    let client = Client::connect(DbConfig::new(&db_path), pos::schema()?).await?;
    for ddl in pos::DDL {
        client.raw_execute(ddl, &[]).await?;
    }
    println!("✓ Connected to database");
    println!("✓ Tables ready");

    let sales = client.table("sales")?;
    let existing = sales.count(Filter::new()).await?;
    if existing > 0 {
        println!("⚠ Database already has {} sales", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Catalogue
    let categories = client.table("categories")?;
    categories
        .create(record! { "id" => "cat-grocery", "name" => "Grocery" })
        .await?;
    let mut category_rows = Vec::new();
    for prefix in ["TEA", "BIS", "MLK", "BRD"] {
        category_rows.push(record! {
            "id" => format!("cat-{}", prefix.to_lowercase()),
            "name" => prefix,
            "parent_id" => "cat-grocery",
        });
    }
    categories.create_many(category_rows).await?;

    let products: Vec<Record> = PRODUCTS
        .iter()
        .enumerate()
        .map(|(index, (prefix, name, price))| {
            record! {
                "id" => format!("prod-{index}"),
                "sku" => format!("{prefix}-{index:03}"),
                "name" => *name,
                "price_cents" => *price,
                "stock" => 100,
                "is_active" => true,
                "category_id" => format!("cat-{}", prefix.to_lowercase()),
            }
        })
        .collect();
    client.table("products")?.create_many(products).await?;

    let customers: Vec<Record> = CUSTOMERS
        .iter()
        .enumerate()
        .map(|(index, name)| {
            record! {
                "id" => format!("cust-{index}"),
                "name" => *name,
                "phone" => format!("0300-555{index:04}"),
                "is_member" => index % 2 == 0,
            }
        })
        .collect();
    client.table("customers")?.create_many(customers).await?;
    println!("✓ Catalogue: {} products, {} customers", PRODUCTS.len(), CUSTOMERS.len());

    // Sales, each written with its items in one transaction
    for seed in 0..count {
        let (sale, items) = generate_sale(seed);
        client
            .run_transaction(|tx| async move {
                tx.table("sales")?.create(sale).await?;
                tx.table("sale_items")?.create_many(items).await?;
                Ok::<_, till_db::DbError>(())
            })
            .await?;

        if (seed + 1) % 50 == 0 {
            println!("  Generated {} sales...", seed + 1);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} sales in {:?}", count, elapsed);
    println!("  Statements executed: {}", client.statements_executed());

    // Nested read: latest sales with customer and items → product
    println!();
    println!("Latest sales:");
    let args = FindArgs::from_json(&json!({
        "where": { "status": "DONE" },
        "orderBy": { "id": "desc" },
        "take": 3,
        "include": {
            "customer": { "select": { "name": true } },
            "items": { "include": { "product": { "select": { "sku": true, "name": true } } } }
        }
    }))?;
    let latest = sales.find_many(args).await?;
    println!("{}", serde_json::to_string_pretty(&latest)?);

    // Aggregate
    println!();
    println!("Totals:");
    let totals = sales
        .aggregate(AggregateArgs::from_json(&json!({
            "where": { "status": "DONE" },
            "_count": true,
            "_sum": { "total": true },
            "_avg": { "total": true },
            "_max": { "total": true }
        }))?)
        .await?;
    println!("{}", serde_json::to_string_pretty(&totals)?);

    println!();
    println!("✓ Seed complete!");

    client.close().await?;
    Ok(())
}

/// Initializes tracing (logging) subsystem.
///
/// ## Log Levels
/// Set via `RUST_LOG` environment variable:
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=till_db=trace` - Trace level for till-db only
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Generates one sale and its line items.
fn generate_sale(seed: usize) -> (Record, Vec<Record>) {
    let sale_id = format!("sale-{seed:06}");
    let line_count = 1 + seed % 4;

    let mut total: i64 = 0;
    let items: Vec<Record> = (0..line_count)
        .map(|line| {
            let product = (seed * 7 + line * 3) % PRODUCTS.len();
            let (_, _, price) = PRODUCTS[product];
            let qty = 1 + ((seed + line) % 3) as i64;
            total += price * qty;
            record! {
                "sale_id" => sale_id.as_str(),
                "product_id" => format!("prod-{product}"),
                "qty" => qty,
                "price_cents" => price,
            }
        })
        .collect();

    let customer = if seed % 3 == 0 {
        Value::Null
    } else {
        Value::from(format!("cust-{}", seed % CUSTOMERS.len()))
    };
    let status = if seed % 10 == 9 { "VOID" } else { "DONE" };

    let sale = record! {
        "id" => sale_id.as_str(),
        "customer_id" => customer,
        "total" => total,
        "status" => status,
        "created_at" => Utc::now(),
    };

    (sale, items)
}
