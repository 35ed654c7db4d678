//! # mauzo-core: Pure Business Logic for the Mauzo till
//!
//! This crate holds the rules that make money balance at the till: the shift
//! state machine, tender validation, split-payment allocation and cash
//! reconciliation. It performs no I/O.
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
//! │  │                    mauzo-till (session, recorder, events)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mauzo-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────────┐ ┌──────────────────┐ │   │
//! │  │   │  money  │ │  shift  │ │ transaction │ │ split / reconcile│ │   │
//! │  │   └─────────┘ └─────────┘ └─────────────┘ └──────────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mauzo-db (SQLite repositories)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic
//! - [`payment`] - Sale payment methods and the shift-total key mapping
//! - [`shift`] - Shift, Expense and the shift state machine
//! - [`cart`] - Cart lines and cart totals
//! - [`transaction`] - Tender, Payment, Transaction and status transitions
//! - [`split`] - Split-payment allocator
//! - [`reconciliation`] - Expected cash in drawer
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use mauzo_core::money::Money;
//! use mauzo_core::shift::Shift;
//! use mauzo_core::payment::PaymentMethod;
//! use mauzo_core::transaction::TenderLeg;
//! use mauzo_core::reconciliation::calculate_expected_cash;
//!
//! let mut shift = Shift::open("cashier-1", "till-01", Money::from_major(5000)).unwrap();
//! shift
//!     .apply_payment_totals(&[TenderLeg::new(PaymentMethod::Cash, Money::from_major(1200))])
//!     .unwrap();
//! shift.add_expense("fuel", Money::from_major(300)).unwrap();
//!
//! assert_eq!(calculate_expected_cash(&shift), Money::from_major(5900));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod payment;
pub mod reconciliation;
pub mod shift;
pub mod split;
pub mod transaction;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payment::{PaymentMethod, PaymentMethodTotals, ShiftTotalKey};
pub use reconciliation::{calculate_expected_cash, CashReconciliation};
pub use shift::{Expense, Shift, ShiftStatus};
pub use split::{SplitAllocator, SplitEntryOutcome};
pub use transaction::{
    CustomerRef, DocumentKind, Payment, Tender, TenderLeg, Transaction, TransactionItem,
    TransactionStatus,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line in the cart.
///
/// Stops a mistyped 1000 instead of 10 from reaching the drawer.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Maximum length of an expense description.
pub const MAX_EXPENSE_DESCRIPTION: usize = 200;
