//! # mauzo-till
//!
//! Prints the state of the configured till: the active shift with its
//! expected cash, the most recent closed shifts and the ledger balances.
//!
//! ```text
//! $ mauzo-till [--config till.toml]
//! ```

use std::path::PathBuf;

use mauzo_core::{calculate_expected_cash, Money};
use mauzo_db::{Database, DbConfig};
use mauzo_till::{TillConfig, TillResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const HISTORY_LIMIT: u32 = 5;

#[tokio::main]
async fn main() {
    init_tracing();

    let config_path = parse_args();
    if let Err(e) = run(config_path).await {
        error!(error = %e, "mauzo-till failed");
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise info with debug for our crates.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mauzo=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = args.get(i + 1).map(PathBuf::from);
                i += 2;
            }
            "--help" | "-h" => {
                println!("Usage: mauzo-till [--config <till.toml>]");
                println!();
                println!("Environment: MAUZO_DB_PATH, MAUZO_STORE_NAME, MAUZO_USER_ID,");
                println!("             MAUZO_DEVICE_ID, MAUZO_CURRENCY, MAUZO_STK_TIMEOUT_SECS");
                std::process::exit(0);
            }
            _ => i += 1,
        }
    }

    config_path
}

async fn run(config_path: Option<PathBuf>) -> TillResult<()> {
    let config = TillConfig::load(config_path)?;
    let path = config.database_path()?;
    info!(path = %path.display(), "Opening till database");

    let db = Database::new(DbConfig::new(path)).await?;
    let money = |amount: Money| config.format_currency(amount);

    println!("{} ({} @ {})", config.store.name, config.till.user_id, config.till.device_id);
    let schema = db.schema_status().await?;
    println!("Schema {}/{} migrations applied", schema.applied, schema.known);
    println!();

    match db.shifts().get_active().await? {
        Some(shift) => {
            println!("Active shift {}", shift.id);
            println!("  opened        {}", shift.clock_in_time.format("%Y-%m-%d %H:%M"));
            println!("  opening float {}", money(shift.opening_balance()));
            println!("  sales         {}", money(shift.total_sales()));
            for (key, amount) in shift.payment_totals.iter() {
                if !amount.is_zero() {
                    println!("    {:<14}{}", key.as_str(), money(amount));
                }
            }
            println!("  expenses      {}", money(shift.total_expenses()));
            println!("  expected cash {}", money(calculate_expected_cash(&shift)));
            println!(
                "  transactions  {}",
                db.transactions().count_by_shift(&shift.id).await?
            );
        }
        None => println!("No active shift"),
    }

    let history = db.shifts().history(HISTORY_LIMIT).await?;
    if !history.is_empty() {
        println!();
        println!("Recent shifts");
        for shift in history {
            let closed = shift
                .clock_out_time
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let variance = shift
                .cash_variance_cents
                .map(|v| format!(" (variance {})", money(Money::from_cents(v))))
                .unwrap_or_default();
            println!(
                "  {}  {}  closing {}{}",
                closed,
                shift.user_id,
                money(shift.closing_balance().unwrap_or_default()),
                variance
            );
        }
    }

    println!();
    println!("Accounts");
    for account in db.accounts().list().await? {
        println!("  {:<20}{}", account.name, money(account.balance()));
    }

    db.close().await;
    Ok(())
}
