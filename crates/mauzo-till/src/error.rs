//! # Till Error Type
//!
//! Unified error type for till operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Mauzo POS                              │
//! │                                                                         │
//! │  UI action                   Rust till                                  │
//! │  ─────────                   ─────────                                  │
//! │                                                                         │
//! │  recordTransaction(...)                                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  TillResult<T>                                                   │  │
//! │  │         │                                                        │  │
//! │  │  Rule violated? ─── CoreError::SplitAmountMismatch ──┐           │  │
//! │  │  Storage failed? ── DbError::QueryFailed ────────────┤           │  │
//! │  │  STK push failed? ─ AsyncPaymentTimeout ─────────────┤           │  │
//! │  │                                                      ▼           │  │
//! │  │                                       TillError → ApiError ─────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "SPLIT_AMOUNT_MISMATCH",                                     │
//! │    "message": "Payments total 950.00 but the sale is 1000.00" }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant has an operator-facing message. Storage internals are
//! logged and replaced with a generic message.

use mauzo_core::{CoreError, ValidationError};
use mauzo_db::DbError;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

/// Result type for till operations.
pub type TillResult<T> = Result<T, TillError>;

/// Errors surfaced by the till.
#[derive(Debug, Error)]
pub enum TillError {
    /// A shift or transaction rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failed.
    #[error("Database error: {0}")]
    Db(DbError),

    /// The mobile-money provider declined or failed the push.
    ///
    /// ## When This Occurs
    /// - Customer rejected the STK prompt
    /// - Insufficient M-Pesa balance
    #[error("Mobile money payment failed: {reason}")]
    AsyncPaymentFailed { reason: String },

    /// No confirmation arrived in time.
    #[error("Mobile money payment timed out after {secs} seconds")]
    AsyncPaymentTimeout { secs: u64 },

    /// The operator cancelled while waiting for confirmation.
    #[error("Mobile money payment was cancelled")]
    AsyncPaymentCancelled,

    /// Posting a committed sale to the accounts ledger failed.
    ///
    /// The sale itself stands.
    #[error("Ledger posting failed for transaction {transaction_id}: {reason}")]
    LedgerPostingFailed {
        transaction_id: String,
        reason: String,
    },

    /// The session was logged out.
    #[error("Till session is closed. Log in again to continue")]
    SessionClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for TillError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(core) => TillError::Core(core),
            other => TillError::Db(other),
        }
    }
}

impl From<ValidationError> for TillError {
    fn from(err: ValidationError) -> Self {
        TillError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for TillError {
    fn from(err: std::io::Error) -> Self {
        TillError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for TillError {
    fn from(err: toml::de::Error) -> Self {
        TillError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Codes
// =============================================================================

/// Machine-readable error codes.
///
/// ## Usage in Frontend
/// ```typescript
/// switch (e.code) {
///   case 'CREDIT_CUSTOMER_REQUIRED':
///     openCustomerPicker();
///     break;
///   case 'ASYNC_PAYMENT_TIMEOUT':
///     offerRetry(e.message);
///     break;
///   default:
///     showError(e.message);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCode {
    NoActiveShift,
    ShiftAlreadyActive,
    ShiftClosed,
    SplitAmountMismatch,
    CreditCustomerRequired,
    OverTender,
    PaymentError,
    CartError,
    InsufficientStock,
    NotFound,
    InvalidStatusTransition,
    ValidationError,
    AsyncPaymentFailed,
    AsyncPaymentTimeout,
    AsyncPaymentCancelled,
    LedgerPostingFailed,
    SessionClosed,
    ConfigError,
    DatabaseError,
    Internal,
}

impl TillError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TillError::Core(err) => match err {
                CoreError::NoActiveShift => ErrorCode::NoActiveShift,
                CoreError::ShiftAlreadyActive { .. } => ErrorCode::ShiftAlreadyActive,
                CoreError::ShiftClosed { .. } => ErrorCode::ShiftClosed,
                CoreError::SplitAmountMismatch { .. } => ErrorCode::SplitAmountMismatch,
                CoreError::CreditCustomerRequired => ErrorCode::CreditCustomerRequired,
                CoreError::OverTender { .. } => ErrorCode::OverTender,
                CoreError::InvalidPaymentAmount { .. } => ErrorCode::PaymentError,
                CoreError::EmptyCart | CoreError::CartTooLarge { .. } => ErrorCode::CartError,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::TransactionNotFound(_)
                | CoreError::ShiftNotFound(_)
                | CoreError::SplitEntryNotFound { .. } => ErrorCode::NotFound,
                CoreError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            TillError::Db(DbError::NotFound { .. }) => ErrorCode::NotFound,
            TillError::Db(DbError::UniqueViolation { .. }) => ErrorCode::ValidationError,
            TillError::Db(_) => ErrorCode::DatabaseError,
            TillError::AsyncPaymentFailed { .. } => ErrorCode::AsyncPaymentFailed,
            TillError::AsyncPaymentTimeout { .. } => ErrorCode::AsyncPaymentTimeout,
            TillError::AsyncPaymentCancelled => ErrorCode::AsyncPaymentCancelled,
            TillError::LedgerPostingFailed { .. } => ErrorCode::LedgerPostingFailed,
            TillError::SessionClosed => ErrorCode::SessionClosed,
            TillError::InvalidConfig(_) | TillError::ConfigLoadFailed(_) => ErrorCode::ConfigError,
            TillError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// The message shown to the operator.
    pub fn user_message(&self) -> String {
        match self {
            TillError::Db(DbError::NotFound { entity, id }) => {
                format!("{} not found: {}", entity, id)
            }
            TillError::Db(DbError::UniqueViolation { field, value }) => {
                format!("{} '{}' already exists", field, value)
            }
            TillError::Db(DbError::ConnectionFailed(_)) => "Database connection failed".to_string(),
            TillError::Db(err) => {
                // Log the actual error but return a generic message
                tracing::error!("Database operation failed: {}", err);
                "Database operation failed".to_string()
            }
            TillError::Internal(e) => {
                tracing::error!("Internal till error: {}", e);
                "Something went wrong. Please try again".to_string()
            }
            other => other.to_string(),
        }
    }

    /// True when the operator resolves this with a guided next step.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TillError::Core(err) if err.is_recoverable())
    }

    /// True when retrying the same checkout may succeed. The cart is intact.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TillError::AsyncPaymentFailed { .. }
                | TillError::AsyncPaymentTimeout { .. }
                | TillError::AsyncPaymentCancelled
        )
    }

    /// The domain error, when this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            TillError::Core(err) => Some(err),
            _ => None,
        }
    }
}

// =============================================================================
// API Error
// =============================================================================

/// What the UI receives when an operation fails.
///
/// ```json
/// {
///   "code": "NO_ACTIVE_SHIFT",
///   "message": "No active shift. Start a shift before recording sales or expenses",
///   "recoverable": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl From<&TillError> for ApiError {
    fn from(err: &TillError) -> Self {
        ApiError {
            code: err.code(),
            message: err.user_message(),
            recoverable: err.is_recoverable(),
        }
    }
}

impl From<TillError> for ApiError {
    fn from(err: TillError) -> Self {
        ApiError::from(&err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use mauzo_core::Money;

    #[test]
    fn test_db_core_error_is_unwrapped() {
        let err: TillError = DbError::Core(CoreError::NoActiveShift).into();
        assert!(matches!(err, TillError::Core(CoreError::NoActiveShift)));
        assert_eq!(err.code(), ErrorCode::NoActiveShift);
    }

    #[test]
    fn test_api_error_serialization() {
        let err = TillError::Core(CoreError::SplitAmountMismatch {
            expected: Money::from_major(1000),
            tendered: Money::from_major(950),
        });
        let json = serde_json::to_value(ApiError::from(err)).unwrap();

        assert_eq!(json["code"], "SPLIT_AMOUNT_MISMATCH");
        assert_eq!(json["message"], "Payments total 950.00 but the sale is 1000.00");
        assert_eq!(json["recoverable"], false);
    }

    #[test]
    fn test_customer_required_is_recoverable() {
        let err = TillError::Core(CoreError::CreditCustomerRequired);
        assert!(err.is_recoverable());
        assert!(!err.is_retryable());
        assert!(TillError::AsyncPaymentTimeout { secs: 60 }.is_retryable());
    }

    #[test]
    fn test_storage_details_hidden() {
        let err = TillError::Db(DbError::QueryFailed("disk I/O error".into()));
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(err.user_message(), "Database operation failed");
    }
}
