//! # Shift
//!
//! A bounded work session tied to one cash drawer.
//!
//! ## State Machine
//! ```text
//!                 open()                       close()
//!   (no shift) ───────────► ACTIVE ─────────────────────► CLOSED (terminal)
//!                           │    ▲
//!                           └────┘
//!             add_expense() / apply_payment_totals()
//! ```
//!
//! ## Invariant
//! `total_sales == Σ payment_totals` after every mutation. The only path that
//! changes either side is [`Shift::apply_payment_totals`], which updates both
//! from the same legs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::payment::PaymentMethodTotals;
use crate::reconciliation::{calculate_expected_cash, CashReconciliation};
use crate::transaction::TenderLeg;
use crate::validation::{
    validate_expense_amount, validate_expense_description, validate_identifier,
    validate_opening_balance, validate_payment_amount,
};

// =============================================================================
// Shift Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Active,
    Closed,
}

impl ShiftStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Active => "active",
            ShiftStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ShiftStatus::Active),
            "closed" => Ok(ShiftStatus::Closed),
            other => Err(ValidationError::invalid_format(
                "shift status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

// =============================================================================
// Expense
// =============================================================================

/// Money taken out of the drawer during a shift.
///
/// Appended to the active shift, never edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

impl Expense {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Shift
// =============================================================================

/// A cashier's shift and its running totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Shift {
    pub id: String,
    /// The cashier who owns the shift.
    pub user_id: String,
    /// The till the drawer belongs to.
    pub device_id: String,
    /// Calendar day the shift belongs to.
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub opening_balance_cents: i64,
    /// Expected cash at close; `None` while active.
    pub closing_balance_cents: Option<i64>,
    /// Physically counted cash, when the cashier counted at close.
    pub counted_cash_cents: Option<i64>,
    /// `counted - expected`; positive means the drawer is over.
    pub cash_variance_cents: Option<i64>,
    pub status: ShiftStatus,
    pub payment_totals: PaymentMethodTotals,
    pub expenses: Vec<Expense>,
    pub total_sales_cents: i64,
    #[ts(as = "String")]
    pub clock_in_time: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub clock_out_time: Option<DateTime<Utc>>,
}

impl Shift {
    /// Opens a new shift with zeroed totals.
    ///
    /// ## Errors
    /// - `Validation` when the opening balance is negative or an id is empty
    pub fn open(
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        opening_balance: Money,
    ) -> CoreResult<Shift> {
        Self::open_at(user_id, device_id, opening_balance, Utc::now())
    }

    /// [`Shift::open`] with an explicit clock-in time.
    pub fn open_at(
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        opening_balance: Money,
        now: DateTime<Utc>,
    ) -> CoreResult<Shift> {
        let user_id = user_id.into();
        let device_id = device_id.into();
        validate_identifier("user id", &user_id)?;
        validate_identifier("device id", &device_id)?;
        validate_opening_balance(opening_balance)?;

        Ok(Shift {
            id: Uuid::new_v4().to_string(),
            user_id,
            device_id,
            date: now.date_naive(),
            opening_balance_cents: opening_balance.cents(),
            closing_balance_cents: None,
            counted_cash_cents: None,
            cash_variance_cents: None,
            status: ShiftStatus::Active,
            payment_totals: PaymentMethodTotals::zeroed(),
            expenses: Vec::new(),
            total_sales_cents: 0,
            clock_in_time: now,
            clock_out_time: None,
        })
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ShiftStatus::Active
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::ShiftClosed {
                shift_id: self.id.clone(),
            })
        }
    }

    pub fn opening_balance(&self) -> Money {
        Money::from_cents(self.opening_balance_cents)
    }

    pub fn closing_balance(&self) -> Option<Money> {
        self.closing_balance_cents.map(Money::from_cents)
    }

    pub fn total_sales(&self) -> Money {
        Money::from_cents(self.total_sales_cents)
    }

    /// Sum of every expense recorded on the shift.
    pub fn total_expenses(&self) -> Money {
        self.expenses.iter().map(Expense::amount).sum()
    }

    /// `total_sales == Σ payment_totals`.
    pub fn totals_consistent(&self) -> bool {
        self.total_sales() == self.payment_totals.sum()
    }

    /// Adds a sale's legs to the per-method totals and to `total_sales`.
    ///
    /// Every leg is checked before anything is added, so a rejected call
    /// leaves the shift untouched.
    pub fn apply_payment_totals(&mut self, legs: &[TenderLeg]) -> CoreResult<()> {
        self.ensure_active()?;
        for leg in legs {
            validate_payment_amount(leg.amount())?;
        }

        let mut totals = self.payment_totals;
        let mut sales = self.total_sales();
        for leg in legs {
            totals.add(leg.method, leg.amount());
            sales += leg.amount();
        }

        self.payment_totals = totals;
        self.total_sales_cents = sales.cents();
        Ok(())
    }

    /// Records a drawer expense. Totals are not touched.
    pub fn add_expense(&mut self, description: &str, amount: Money) -> CoreResult<Expense> {
        self.add_expense_at(description, amount, Utc::now())
    }

    pub fn add_expense_at(
        &mut self,
        description: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> CoreResult<Expense> {
        self.ensure_active()?;
        let description = validate_expense_description(description)?;
        validate_expense_amount(amount)?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            description,
            amount_cents: amount.cents(),
            timestamp: now,
        };
        self.expenses.push(expense.clone());
        Ok(expense)
    }

    /// Closes the shift, fixing the closing balance at the expected cash.
    ///
    /// When `counted` is given, the count and its variance are stored too.
    pub fn close(&mut self, counted: Option<Money>) -> CoreResult<CashReconciliation> {
        self.close_at(counted, Utc::now())
    }

    pub fn close_at(
        &mut self,
        counted: Option<Money>,
        now: DateTime<Utc>,
    ) -> CoreResult<CashReconciliation> {
        self.ensure_active()?;
        if let Some(counted) = counted {
            if counted.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: "counted cash".to_string(),
                }
                .into());
            }
        }

        let reconciliation = CashReconciliation::for_shift(self, counted);

        self.closing_balance_cents = Some(reconciliation.expected().cents());
        self.counted_cash_cents = reconciliation.counted().map(|m| m.cents());
        self.cash_variance_cents = reconciliation.variance().map(|m| m.cents());
        self.status = ShiftStatus::Closed;
        self.clock_out_time = Some(now);
        Ok(reconciliation)
    }

    /// Expected cash in the drawer right now.
    pub fn expected_cash(&self) -> Money {
        calculate_expected_cash(self)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
