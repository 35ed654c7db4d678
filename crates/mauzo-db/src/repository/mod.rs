//! # Repository Module
//!
//! Database repository implementations for Mauzo POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Till operation                                                         │
//! │       │                                                                 │
//! │       │  db.shifts().with_active(|s| s.close(counted))                  │
//! │       ▼                                                                 │
//! │  ShiftRepository                                                        │
//! │  ├── start(&self, shift)                                                │
//! │  ├── get_active(&self)                                                  │
//! │  ├── with_active(&self, mutate)   ← read-modify-write in one txn       │
//! │  └── history(&self, limit)                                              │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business rules stay in mauzo-core. Repositories load the latest state,
//! hand it to a core method, and persist the result atomically.
//!
//! ## Available Repositories
//!
//! - [`ShiftRepository`] - Shift lifecycle, totals and expenses
//! - [`TransactionRepository`] - Sale commit, status changes, listings
//! - [`AccountRepository`] - Ledger postings and balances
//! - [`InventoryRepository`] - Products and stock levels

pub mod account;
pub mod inventory;
pub mod shift;
pub mod transaction;

pub use account::AccountRepository;
pub use inventory::InventoryRepository;
pub use shift::ShiftRepository;
pub use transaction::TransactionRepository;
