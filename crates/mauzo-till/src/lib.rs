//! # mauzo-till: Shift & Transaction Engine
//!
//! Everything a till UI calls into between "cashier logs in" and "shift
//! closed": the session, the working cart, the Shift Store, the Transaction
//! Recorder and the collaborators that react to committed sales.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mauzo POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web UI (checkout, shift, reports)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mauzo-till (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   Till ──► TillSession ──► ShiftStore / TransactionRecorder     │   │
//! │  │                                   │                             │   │
//! │  │                            EventBus ──► AccountsLedgerSubscriber│   │
//! │  │                                    └──► InventorySubscriber     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │        mauzo-core (rules)  ◄───┴───►  mauzo-db (SQLite)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`till`] - The facade wiring everything for one operator
//! - [`session`] - Logged-in context and the write lock
//! - [`shift_store`] - Start, expense, close and shift queries
//! - [`recorder`] - Checkout, status changes and deletes
//! - [`mobile_money`] - STK push confirmation with timeout and cancel
//! - [`events`] - Event bus and commit subscribers
//! - [`ledger`] / [`inventory`] - Post-commit collaborators
//! - [`state`] - The working cart
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Till errors and API error codes

pub mod config;
pub mod error;
pub mod events;
pub mod inventory;
pub mod ledger;
pub mod mobile_money;
pub mod recorder;
pub mod session;
pub mod shift_store;
pub mod state;
pub mod till;

pub use config::TillConfig;
pub use error::{ApiError, ErrorCode, TillError, TillResult};
pub use events::{CommitSubscriber, EventBus, TillEvent, TransactionCommitted};
pub use inventory::InventorySubscriber;
pub use ledger::AccountsLedgerSubscriber;
pub use mobile_money::{
    MobileMoneyGateway, SimulatedMobileMoneyGateway, StkConfirmation, StkPushRequest,
};
pub use recorder::{RecordOutcome, TransactionRecorder};
pub use session::TillSession;
pub use shift_store::{ShiftStore, ShiftSummary};
pub use state::CartState;
pub use till::Till;
