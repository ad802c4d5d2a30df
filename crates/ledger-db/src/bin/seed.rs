//! # Seed Data Generator
//!
//! Populates a local store with a demo branch and catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p ledger-db --bin seed
//!
//! # Specify database path and branch credentials
//! cargo run -p ledger-db --bin seed -- --db ./data/ledger.db --username branch1 --password demo
//! ```
//!
//! Creates:
//! - one branch (branch_no 1) with an argon2-hashed password
//! - product categories and a small menu
//! - a couple of customers and expense categories

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use std::env;
use uuid::Uuid;

use ledger_core::{Branch, Category, Customer, ExpenseCategory, Product};
use ledger_db::{Database, DbConfig};

const MENU: &[(&str, &str, i64, u32)] = &[
    ("Margherita Pizza", "Pizza", 8_50, 500),
    ("Pepperoni Pizza", "Pizza", 10_00, 500),
    ("Quattro Formaggi", "Pizza", 11_50, 500),
    ("Garlic Bread", "Sides", 3_50, 500),
    ("Chicken Wings", "Sides", 6_00, 500),
    ("Tiramisu", "Desserts", 4_50, 500),
    ("Cola 330ml", "Drinks", 2_00, 1000),
    ("Still Water 500ml", "Drinks", 1_50, 1000),
];

const EXPENSE_CATEGORIES: &[&str] = &["Ingredients", "Utilities", "Maintenance", "Wages"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let db_path = arg_value(&args, "--db").unwrap_or_else(|| "./ledger.db".to_string());
    let username = arg_value(&args, "--username").unwrap_or_else(|| "branch1".to_string());
    let password = arg_value(&args, "--password").unwrap_or_else(|| "demo".to_string());

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let now = Utc::now();

    // Branch with a real argon2 hash so authenticate() works against it
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| format!("hash password: {e}"))?
        .to_string();

    db.branches()
        .insert(&Branch {
            id: Uuid::new_v4().to_string(),
            branch_no: 1,
            name: "Demo Branch".to_string(),
            username: username.clone(),
            password_hash,
            address: Some("42 High Street".to_string()),
            tax_id: Some("TAX-0001".to_string()),
            created_at: now,
        })
        .await?;

    let catalog = db.catalog();

    let mut category_ids = std::collections::HashMap::new();
    for name in ["Pizza", "Sides", "Desserts", "Drinks"] {
        let id = Uuid::new_v4().to_string();
        catalog
            .insert_category(&Category {
                id: id.clone(),
                name: name.to_string(),
            })
            .await?;
        category_ids.insert(name, id);
    }

    for (name, category, price_cents, tax_bps) in MENU {
        catalog
            .insert_product(&Product {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                category_id: category_ids.get(category).cloned(),
                price_cents: *price_cents,
                tax_rate_bps: *tax_bps,
                unit: Some("pc".to_string()),
                is_active: true,
                created_at: now,
            })
            .await?;
    }

    for (name, phone) in [("Walk-in", None), ("Ada Lovelace", Some("555-0101"))] {
        catalog
            .insert_customer(&Customer {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                phone: phone.map(str::to_string),
                email: None,
                address: None,
                created_at: now,
            })
            .await?;
    }

    for name in EXPENSE_CATEGORIES {
        catalog
            .insert_expense_category(&ExpenseCategory {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
            })
            .await?;
    }

    tracing::info!(
        db = %db_path,
        username = %username,
        products = MENU.len(),
        "Seed complete"
    );

    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
