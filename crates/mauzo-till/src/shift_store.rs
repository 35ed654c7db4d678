//! # Shift Store
//!
//! Owns the single active shift and the shift history.
//!
//! ## Mutation Path
//! ```text
//! start / add_expense / apply_payment_totals / close
//!        │
//!        ▼
//! session.lock_writes()          one writer at a time
//!        │
//!        ▼
//! db.shifts().with_active(|shift| pure core mutation)
//!        │   load latest ──► mutate ──► write back (one sqlx transaction)
//!        ▼
//! events.publish(...)            after commit only
//! ```

use std::sync::Arc;

use mauzo_core::{
    calculate_expected_cash, CashReconciliation, CoreError, Expense, Money, Shift, TenderLeg,
    Transaction,
};
use mauzo_db::Database;
use serde::Serialize;
use tracing::info;
use ts_rs::TS;

use crate::error::TillResult;
use crate::events::{EventBus, TillEvent};
use crate::session::TillSession;

/// Supervisory view of one shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShiftSummary {
    pub shift: Shift,
    pub transactions: Vec<Transaction>,
    pub expected_cash_cents: i64,
    pub transaction_count: usize,
    /// Expected vs counted cash; the count is only present after a counted close.
    pub reconciliation: CashReconciliation,
}

#[derive(Debug, Clone)]
pub struct ShiftStore {
    session: Arc<TillSession>,
    db: Database,
    events: EventBus,
}

impl ShiftStore {
    pub fn new(session: Arc<TillSession>, db: Database, events: EventBus) -> Self {
        ShiftStore { session, db, events }
    }

    /// Opens a shift for the session's cashier and device.
    ///
    /// ## Errors
    /// - `ShiftAlreadyActive` when a shift is already open
    /// - `Validation` for a negative opening balance
    pub async fn start_shift(&self, opening_balance: Money) -> TillResult<Shift> {
        let _guard = self.session.lock_writes().await?;

        let shift = Shift::open(
            self.session.user_id(),
            self.session.device_id(),
            opening_balance,
        )?;
        self.db.shifts().start(&shift).await?;

        info!(
            shift_id = %shift.id,
            user_id = %shift.user_id,
            opening = %opening_balance,
            "Shift started"
        );
        self.events.publish(TillEvent::ShiftStarted {
            shift_id: shift.id.clone(),
            user_id: shift.user_id.clone(),
            opening_balance_cents: shift.opening_balance_cents,
        });
        Ok(shift)
    }

    /// Closes the active shift without a physical count.
    pub async fn close_shift(&self) -> TillResult<Shift> {
        self.close_shift_with_count(None).await
    }

    /// Closes the active shift, fixing its closing balance at the expected
    /// cash. A count, when given, is stored with its variance.
    ///
    /// ## Errors
    /// - `NoActiveShift` when nothing is open
    pub async fn close_shift_with_count(&self, counted: Option<Money>) -> TillResult<Shift> {
        let _guard = self.session.lock_writes().await?;

        let (shift, reconciliation) = self
            .db
            .shifts()
            .with_active(|shift| shift.close(counted))
            .await?;

        info!(
            shift_id = %shift.id,
            closing = %reconciliation.expected(),
            variance = ?reconciliation.variance().map(|v| v.to_string()),
            "Shift closed"
        );
        self.events.publish(TillEvent::ShiftClosed {
            shift_id: shift.id.clone(),
            closing_balance_cents: reconciliation.expected_cents,
            cash_variance_cents: shift.cash_variance_cents,
        });
        Ok(shift)
    }

    /// Records cash taken out of the drawer. Payment totals are untouched.
    pub async fn add_expense(&self, description: &str, amount: Money) -> TillResult<Expense> {
        let _guard = self.session.lock_writes().await?;

        let (shift, expense) = self
            .db
            .shifts()
            .with_active(|shift| shift.add_expense(description, amount))
            .await?;

        info!(shift_id = %shift.id, amount = %expense.amount(), "Expense added");
        self.events.publish(TillEvent::ExpenseAdded {
            shift_id: shift.id,
            expense: expense.clone(),
        });
        Ok(expense)
    }

    /// Folds `(method, amount)` legs into the active shift's totals.
    ///
    /// Sales go through the recorder, which applies the same legs inside its
    /// own commit. This entry point is for adjustments made outside a sale.
    pub async fn apply_payment_totals(&self, legs: &[TenderLeg]) -> TillResult<Shift> {
        let _guard = self.session.lock_writes().await?;

        let (shift, ()) = self
            .db
            .shifts()
            .with_active(|shift| shift.apply_payment_totals(legs))
            .await?;
        Ok(shift)
    }

    pub async fn get_active_shift(&self) -> TillResult<Option<Shift>> {
        self.session.ensure_open()?;
        Ok(self.db.shifts().get_active().await?)
    }

    /// Closed shifts, most recently closed first.
    pub async fn get_shift_history(&self, limit: u32) -> TillResult<Vec<Shift>> {
        self.session.ensure_open()?;
        Ok(self.db.shifts().history(limit).await?)
    }

    pub async fn get_shift_by_id(&self, id: &str) -> TillResult<Shift> {
        self.session.ensure_open()?;
        self.db
            .shifts()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ShiftNotFound(id.to_string()).into())
    }

    pub async fn get_shift_transactions(&self, shift_id: &str) -> TillResult<Vec<Transaction>> {
        self.session.ensure_open()?;
        Ok(self.db.transactions().list_by_shift(shift_id).await?)
    }

    pub async fn get_shift_summary(&self, shift_id: &str) -> TillResult<ShiftSummary> {
        let shift = self.get_shift_by_id(shift_id).await?;
        let transactions = self.get_shift_transactions(shift_id).await?;
        let reconciliation =
            CashReconciliation::for_shift(&shift, shift.counted_cash_cents.map(Money::from_cents));

        Ok(ShiftSummary {
            expected_cash_cents: calculate_expected_cash(&shift).cents(),
            transaction_count: transactions.len(),
            reconciliation,
            shift,
            transactions,
        })
    }

    pub fn expected_cash(&self, shift: &Shift) -> Money {
        calculate_expected_cash(shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TillError;
    use mauzo_core::{PaymentMethod, ShiftStatus};
    use mauzo_db::DbConfig;

    async fn store() -> ShiftStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = TillSession::open("cashier-1", "till-01").unwrap();
        ShiftStore::new(session, db, EventBus::default())
    }

    #[tokio::test]
    async fn test_start_publishes_and_persists() {
        let store = store().await;
        let mut rx = store.events.observe();

        let shift = store.start_shift(Money::from_major(5000)).await.unwrap();

        assert_eq!(shift.user_id, "cashier-1");
        assert_eq!(shift.device_id, "till-01");
        assert_eq!(store.get_active_shift().await.unwrap().unwrap().id, shift.id);
        assert!(matches!(
            rx.recv().await.unwrap(),
            TillEvent::ShiftStarted { opening_balance_cents: 500_000, .. }
        ));
    }

    #[tokio::test]
    async fn test_negative_opening_balance_rejected() {
        let store = store().await;
        let err = store.start_shift(Money::from_major(-1)).await.unwrap_err();
        assert!(matches!(err, TillError::Core(CoreError::Validation(_))));
        assert!(store.get_active_shift().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counted_close_records_variance() {
        let store = store().await;
        store.start_shift(Money::from_major(1000)).await.unwrap();
        store
            .apply_payment_totals(&[TenderLeg::new(PaymentMethod::Cash, Money::from_major(500))])
            .await
            .unwrap();

        let closed = store
            .close_shift_with_count(Some(Money::from_major(1490)))
            .await
            .unwrap();

        assert_eq!(closed.status, ShiftStatus::Closed);
        assert_eq!(closed.closing_balance_cents, Some(150_000));
        assert_eq!(closed.counted_cash_cents, Some(149_000));
        assert_eq!(closed.cash_variance_cents, Some(-1_000));

        let summary = store.get_shift_summary(&closed.id).await.unwrap();
        assert_eq!(summary.expected_cash_cents, 150_000);
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(summary.reconciliation.variance(), Some(Money::from_major(-10)));
    }

    #[tokio::test]
    async fn test_expense_validation() {
        let store = store().await;
        store.start_shift(Money::zero()).await.unwrap();

        assert!(store.add_expense("", Money::from_major(10)).await.is_err());
        assert!(store.add_expense("fuel", Money::zero()).await.is_err());

        let active = store.get_active_shift().await.unwrap().unwrap();
        assert!(active.expenses.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_shift_is_not_found() {
        let store = store().await;
        let err = store.get_shift_by_id("nope").await.unwrap_err();
        assert!(matches!(err, TillError::Core(CoreError::ShiftNotFound(_))));
    }
}
