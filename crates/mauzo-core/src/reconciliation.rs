//! # Cash Reconciliation
//!
//! Expected cash in the drawer, for a live shift or at close.
//!
//! ```text
//! expected = opening balance + cash bucket − Σ expenses
//! variance = counted − expected        (positive: drawer over)
//! ```
//!
//! Only the `cash` bucket counts; M-Pesa, card and bank money never enters
//! the drawer. Expenses are treated as paid from the drawer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::shift::Shift;

/// Expected cash for `shift`. Pure: reads the shift, changes nothing.
///
/// ## Example
/// ```rust
/// use mauzo_core::{calculate_expected_cash, Money, Shift};
///
/// let shift = Shift::open("cashier-1", "till-01", Money::from_major(2000)).unwrap();
/// assert_eq!(calculate_expected_cash(&shift), Money::from_major(2000));
/// ```
pub fn calculate_expected_cash(shift: &Shift) -> Money {
    shift.opening_balance() + shift.payment_totals.cash - shift.total_expenses()
}

/// Expected vs counted cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashReconciliation {
    pub expected_cents: i64,
    pub counted_cents: Option<i64>,
}

impl CashReconciliation {
    pub fn for_shift(shift: &Shift, counted: Option<Money>) -> Self {
        CashReconciliation {
            expected_cents: calculate_expected_cash(shift).cents(),
            counted_cents: counted.map(|m| m.cents()),
        }
    }

    pub fn expected(&self) -> Money {
        Money::from_cents(self.expected_cents)
    }

    pub fn counted(&self) -> Option<Money> {
        self.counted_cents.map(Money::from_cents)
    }

    /// `counted - expected`, when a count exists.
    pub fn variance(&self) -> Option<Money> {
        self.counted().map(|counted| counted - self.expected())
    }

    /// True when the count matches to the cent.
    pub fn is_balanced(&self) -> bool {
        self.variance().is_some_and(|v| v.is_zero())
    }
}
