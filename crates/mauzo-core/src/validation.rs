//! # Validation Module
//!
//! Input validation for the till. Everything here runs before any shift or
//! transaction state is touched.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web UI                                                       │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: mauzo-till / mauzo-core                                      │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (amounts, status values)                        │
//! │  └── Partial UNIQUE index (one active shift)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mauzo_core::validation::{validate_expense_description, validate_quantity};
//!
//! validate_expense_description("fuel").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CART_LINES, MAX_EXPENSE_DESCRIPTION, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an expense description.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Returns
/// The trimmed description.
///
/// ## Example
/// ```rust
/// use mauzo_core::validation::validate_expense_description;
///
/// assert_eq!(validate_expense_description("  fuel ").unwrap(), "fuel");
/// assert!(validate_expense_description("   ").is_err());
/// ```
pub fn validate_expense_description(description: &str) -> ValidationResult<String> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::required("description"));
    }

    if description.chars().count() > MAX_EXPENSE_DESCRIPTION {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_EXPENSE_DESCRIPTION,
        });
    }

    Ok(description.to_string())
}

/// Validates an identifier supplied by the caller (user, device, customer).
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates a payment reference (mobile-money confirmation code, bank ref).
pub fn validate_reference(reference: &str) -> ValidationResult<String> {
    let reference = reference.trim();

    if reference.is_empty() {
        return Err(ValidationError::required("reference"));
    }

    if reference.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "reference".to_string(),
            max: 50,
        });
    }

    if !reference.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::invalid_format(
            "reference",
            "must contain only letters, numbers and hyphens",
        ));
    }

    Ok(reference.to_string())
}

// =============================================================================
// Money Validators
// =============================================================================

/// Validates a shift opening balance.
///
/// Zero is allowed (a till that starts with an empty drawer).
pub fn validate_opening_balance(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "opening balance".to_string(),
        });
    }

    Ok(())
}

/// Validates an expense amount. Must be strictly positive.
pub fn validate_expense_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "expense amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a single payment leg amount.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Cannot pay zero or negative amounts
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit price in cents.
///
/// ## Example
/// ```rust
/// use mauzo_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());     // free item
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Line                                                         │
/// │                                                                         │
/// │  Operator enters quantity: 5                                           │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → stock check against inventory                           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates that a cart with `current_lines` can take one more line.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_expense_description() {
        assert_eq!(validate_expense_description("fuel").unwrap(), "fuel");
        assert!(validate_expense_description("").is_err());
        assert!(validate_expense_description("   ").is_err());
        assert!(validate_expense_description(&"a".repeat(200)).is_ok());
        assert!(validate_expense_description(&"a".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("user id", "cashier-1").is_ok());
        assert!(validate_identifier("user id", " ").is_err());
        assert!(validate_identifier("user id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_reference() {
        assert_eq!(validate_reference(" QK7H2L9XPA ").unwrap(), "QK7H2L9XPA");
        assert!(validate_reference("").is_err());
        assert!(validate_reference("has space").is_err());
    }

    #[test]
    fn test_money_validators() {
        assert!(validate_opening_balance(Money::zero()).is_ok());
        assert!(validate_opening_balance(Money::from_cents(-1)).is_err());

        assert!(validate_expense_amount(Money::from_cents(1)).is_ok());
        assert!(validate_expense_amount(Money::zero()).is_err());

        assert!(validate_payment_amount(Money::from_major(10)).is_ok());
        assert!(validate_payment_amount(Money::from_major(-10)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(99).is_ok());
        assert!(validate_cart_size(100).is_err());
    }
}
