//! # Demo Data Seeder
//!
//! Populates a fresh database with a small shop for development: categories,
//! items, partners, an opening purchase per supplier and a few sales.
//!
//! ## Usage
//! ```bash
//! # Seed ./stockbook_dev.db
//! cargo run -p stockbook-db --bin seed
//!
//! # Specify database path and number of sales
//! cargo run -p stockbook-db --bin seed -- --db ./data/stockbook.db --sales 50
//! ```
//!
//! Everything goes through the repositories, so stock, history, vouchers and
//! low-stock notifications come out exactly as they would from the API.

use std::env;
use stockbook_core::requests::{CategoryInput, LineRequest, NewItem, PartnerInput, TransactionRequest};
use stockbook_core::{PartnerKind, TransactionKind};
use stockbook_db::{Database, DbConfig, DbError, ItemFilter};

/// (category, [(code, name, unit price cents, cost cents, min stock)])
const CATALOG: &[(&str, &[(&str, &str, i64, i64, i64)])] = &[
    (
        "Beverages",
        &[
            ("BEV-COLA-330", "Cola 330ml", 150, 80, 24),
            ("BEV-WATER-500", "Still Water 500ml", 90, 35, 48),
            ("BEV-OJ-1L", "Orange Juice 1L", 320, 190, 12),
        ],
    ),
    (
        "Snacks",
        &[
            ("SNK-CHIPS-SALT", "Salted Chips 150g", 240, 120, 20),
            ("SNK-CHOC-BAR", "Milk Chocolate Bar", 130, 70, 30),
        ],
    ),
    (
        "Household",
        &[
            ("HH-SOAP-BAR", "Bar Soap", 180, 95, 10),
            ("HH-DISH-500", "Dish Liquid 500ml", 290, 150, 8),
            ("HH-TOWEL-2", "Paper Towels 2-Pack", 450, 260, 6),
        ],
    ),
];

const SUPPLIERS: &[&str] = &["Northwind Wholesale", "Contoso Distribution"];
const CUSTOMERS: &[&str] = &["Walk-in Customer", "Corner Cafe", "Harbor Hotel"];

const ACTOR: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut sales: usize = 20;
    let mut db_path = String::from("./stockbook_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(20);
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
                println!("Stockbook Demo Data Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <N>    Number of sales to generate (default: 20)");
                println!("  -d, --db <PATH>    Database file path (default: ./stockbook_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Stockbook Demo Data Seeder");
    println!("==========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db
        .items()
        .list(&ItemFilter {
            include_inactive: true,
            limit: Some(1),
            ..Default::default()
        })
        .await?;
    if !existing.is_empty() {
        println!("⚠ Database already has items");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalogue
    let mut item_ids = Vec::new();
    for (category_name, items) in CATALOG {
        let category = db
            .categories()
            .create(&CategoryInput {
                name: category_name.to_string(),
                parent_id: None,
            })
            .await?;
        for (code, name, unit_price_cents, cost_price_cents, min_stock_level) in items.iter() {
            let item = db
                .items()
                .create(&NewItem {
                    code: code.to_string(),
                    name: name.to_string(),
                    category_id: Some(category.id),
                    unit: None,
                    unit_price_cents: *unit_price_cents,
                    cost_price_cents: *cost_price_cents,
                    min_stock_level: *min_stock_level,
                })
                .await?;
            item_ids.push(item.id);
        }
    }
    println!("✓ {} items", item_ids.len());

    // Partners
    let mut supplier_ids = Vec::new();
    for name in SUPPLIERS {
        supplier_ids.push(db.partners().create(&partner(name, PartnerKind::Supplier)).await?.id);
    }
    let mut customer_ids = Vec::new();
    for name in CUSTOMERS {
        customer_ids.push(db.partners().create(&partner(name, PartnerKind::Customer)).await?.id);
    }
    println!("✓ {} suppliers, {} customers", supplier_ids.len(), customer_ids.len());

    // Opening stock: each supplier delivers half the catalogue
    for (n, supplier_id) in supplier_ids.iter().enumerate() {
        let lines = item_ids
            .iter()
            .enumerate()
            .filter(|(idx, _)| idx % supplier_ids.len() == n)
            .map(|(idx, item_id)| LineRequest {
                item_id: *item_id,
                quantity: 40 + (idx as i64 * 7) % 30,
                unit_price_cents: None,
            })
            .collect();
        let outcome = db
            .transactions()
            .create(&trade(TransactionKind::Purchase, *supplier_id, lines), ACTOR)
            .await?;
        println!("✓ Purchase {}", outcome.transaction.transaction.reference);
    }

    // Sales; some will run into low stock and be skipped
    let mut sold = 0;
    let mut skipped = 0;
    for n in 0..sales {
        let customer_id = customer_ids[n % customer_ids.len()];
        let item_id = item_ids[(n * 3) % item_ids.len()];
        let lines = vec![LineRequest {
            item_id,
            quantity: 1 + (n as i64 % 5),
            unit_price_cents: None,
        }];
        match db
            .transactions()
            .create(&trade(TransactionKind::Sale, customer_id, lines), ACTOR)
            .await
        {
            Ok(_) => sold += 1,
            Err(DbError::Core(e)) => {
                eprintln!("  skipped sale {}: {}", n, e);
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!("✓ {} sales ({} skipped)", sold, skipped);

    let report = db.notifications().scan(chrono::Utc::now()).await?;
    println!(
        "✓ Notification scan: {} low stock, {} unpaid",
        report.stock_low_created, report.unpaid_created
    );

    db.close().await;
    println!();
    println!("Done.");
    Ok(())
}

fn partner(name: &str, kind: PartnerKind) -> PartnerInput {
    PartnerInput {
        name: name.to_string(),
        kind,
        phone: None,
        email: None,
        address: None,
        is_active: None,
    }
}

fn trade(kind: TransactionKind, partner_id: i64, lines: Vec<LineRequest>) -> TransactionRequest {
    TransactionRequest {
        kind,
        partner_id,
        transaction_date: None,
        lines,
        note: None,
        post_voucher: None,
    }
}
