//! # Error Types
//!
//! Domain-specific error types for mauzo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mauzo-core errors (this file)                                         │
//! │  ├── CoreError        - Shift / tender / transaction rule violations   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mauzo-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  mauzo-till errors                                                     │
//! │  └── TillError        - What the UI sees (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → TillError → UI          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the shift and transaction logic.
///
/// Every variant is detected before any state changes, so a caller that
/// receives one can assume nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A mutating operation ran while no shift is open.
    ///
    /// ## When This Occurs
    /// - Recording a sale before `start_shift`
    /// - Adding an expense after the shift was closed
    #[error("No active shift. Start a shift before recording sales or expenses")]
    NoActiveShift,

    /// `start_shift` ran while another shift is still open.
    #[error("Shift {shift_id} is already active. Close it before starting a new one")]
    ShiftAlreadyActive { shift_id: String },

    /// A closed shift was asked to change.
    #[error("Shift {shift_id} is closed and cannot be modified")]
    ShiftClosed { shift_id: String },

    /// Split legs do not add up to the cart total.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart total: 1000.00
    /// Legs: cash 400.00 + bank-transfer 550.00 = 950.00
    ///      │
    ///      ▼
    /// SplitAmountMismatch { expected: 1000.00, tendered: 950.00 }
    ///      │
    ///      ▼
    /// UI shows: "Payments total 950.00 but the sale is 1000.00"
    /// ```
    #[error("Payments total {tendered} but the sale is {expected}")]
    SplitAmountMismatch { expected: Money, tendered: Money },

    /// A credit leg was tendered without a customer.
    ///
    /// Recoverable: the caller resolves a customer and resubmits.
    #[error("Credit sales need a customer. Select a customer to continue")]
    CreditCustomerRequired,

    /// A single split leg exceeds what is still owed.
    #[error("Amount {amount} exceeds the remaining balance of {remaining}")]
    OverTender { amount: Money, remaining: Money },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Checkout was attempted with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Requested quantity is more than the inventory holds.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Shift not found.
    #[error("Shift not found: {0}")]
    ShiftNotFound(String),

    /// Status change outside the documented transitions.
    #[error("Transaction {transaction_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        transaction_id: String,
        from: String,
        to: String,
    },

    /// No split leg exists at the given position.
    #[error("No payment entry at position {index}")]
    SplitEntryNotFound { index: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for conditions the operator resolves with a guided next step
    /// rather than a blocking error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::CreditCustomerRequired)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid amount, unknown payment method).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
