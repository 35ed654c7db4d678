//! # Seed Data Generator
//!
//! Fills the product table with demo stock for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p mauzo-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p mauzo-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p mauzo-db --bin seed -- --db ./data/mauzo.db
//! ```
//!
//! SKUs follow `{CATEGORY}-{NAME}-{INDEX}`. Every fifth product is left
//! untracked (`stock_quantity = NULL`), the rest get 0 to 60 units.

use chrono::Utc;
use mauzo_db::{Database, DbConfig, Product};
use std::env;
use uuid::Uuid;

/// Product categories for demo data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola",
            "Fanta Orange",
            "Stoney Tangawizi",
            "Keringet Water",
            "Minute Maid Mango",
            "Kericho Gold Tea",
            "Nescafe Classic",
            "Brookside Milk",
        ],
    ),
    (
        "GRO",
        &[
            "Jogoo Maize Flour",
            "Pembe Maize Flour",
            "Exe Wheat Flour",
            "Mumias Sugar",
            "Pishori Rice",
            "Kabras Sugar",
            "Elianto Oil",
            "Royco Mchuzi Mix",
        ],
    ),
    (
        "HSE",
        &[
            "Sunlight Soap",
            "Omo Detergent",
            "Jik Bleach",
            "Kiwi Polish",
            "Colgate Toothpaste",
            "Rexona Roll-On",
        ],
    ),
    (
        "SNK",
        &[
            "Tropical Heat Crisps",
            "Manji Biscuits",
            "Nuvita Biscuits",
            "Kenblest Bread",
            "Supaloaf Bread",
        ],
    ),
];

/// Size variants with a price addon in cents
const SIZES: &[(&str, i64)] = &[
    ("250g", 0),
    ("500g", 4_000),
    ("1kg", 9_000),
    ("2kg", 17_500),
    ("300ml", 0),
    ("500ml", 3_000),
    ("1L", 8_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./mauzo_dev.db");

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
                println!("Mauzo POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./mauzo_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Mauzo POS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let inventory = db.inventory();
    let existing = inventory.count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(category_code, name, size, *addon, seed);

                if let Err(e) = inventory.insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }
                generated += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    let sample = inventory.list_active(5).await?;
    for product in sample {
        println!("  {:<24} {:>10}  {}", product.sku, product.price(), product.name);
    }

    println!();
    println!("✓ Seed complete!");
    db.close().await;

    Ok(())
}

fn generate_product(category: &str, name: &str, size: &str, addon: i64, seed: usize) -> Product {
    let now = Utc::now();

    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:03}", category, short, seed);

    // KES 35 - KES 285 before the size addon
    let price_cents = 3_500 + ((seed * 37) % 250) as i64 * 100 + addon;

    let stock_quantity = if seed % 5 == 0 {
        None
    } else {
        Some((seed % 61) as i64)
    };

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} {}", name, size),
        price_cents,
        stock_quantity,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
