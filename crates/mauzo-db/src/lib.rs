//! # mauzo-db: Database Layer for Mauzo POS
//!
//! SQLite storage for shifts, transactions, the accounts ledger and
//! inventory, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mauzo POS Data Flow                              │
//! │                                                                         │
//! │  mauzo-till (record_transaction, close_shift, ...)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     mauzo-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │   │   │
//! │  │   │               │    │ ShiftRepo      │   │              │   │   │
//! │  │   │ SqlitePool    │◄───│ TransactionRepo│   │ 001_init.sql │   │   │
//! │  │   │               │    │ AccountRepo    │   │              │   │   │
//! │  │   │               │    │ InventoryRepo  │   │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mauzo_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/mauzo.db")).await?;
//!
//! db.shifts().start(&shift).await?;
//! let (shift, expense) = db
//!     .shifts()
//!     .with_active(|s| s.add_expense("fuel", Money::from_major(300)))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::SchemaStatus;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::{Account, AccountPosting, AccountRepository};
pub use repository::inventory::{InventoryRepository, Product};
pub use repository::shift::ShiftRepository;
pub use repository::transaction::TransactionRepository;
