//! # Shift Repository
//!
//! Persistence for shifts and their expenses.
//!
//! ## Read-Modify-Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  with_active(|shift| shift.add_expense(..))                             │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    SELECT ... FROM shifts WHERE status = 'active'   ← latest state      │
//! │    closure mutates the in-memory Shift (mauzo-core rules)              │
//! │    UPDATE shifts SET totals..., status... WHERE id = ? AND active       │
//! │    INSERT new shift_expenses rows                                       │
//! │  COMMIT                        (any error → ROLLBACK, nothing written)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals and `total_sales_cents` are written by the same UPDATE, and the
//! table carries a CHECK that they agree.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use mauzo_core::{
    CoreError, CoreResult, Expense, Money, PaymentMethodTotals, Shift, ShiftStatus, ShiftTotalKey,
};

const SHIFT_SELECT: &str = r#"
    SELECT
        id, user_id, device_id, shift_date,
        opening_balance_cents, closing_balance_cents,
        counted_cash_cents, cash_variance_cents, status,
        mpesa_cents, mpesa_till_cents, pochi_biashara_cents, card_cents,
        bank_transfer_cents, cash_cents, credit_cents, total_sales_cents,
        clock_in_time, clock_out_time
    FROM shifts
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct ShiftRow {
    id: String,
    user_id: String,
    device_id: String,
    shift_date: NaiveDate,
    opening_balance_cents: i64,
    closing_balance_cents: Option<i64>,
    counted_cash_cents: Option<i64>,
    cash_variance_cents: Option<i64>,
    status: ShiftStatus,
    mpesa_cents: i64,
    mpesa_till_cents: i64,
    pochi_biashara_cents: i64,
    card_cents: i64,
    bank_transfer_cents: i64,
    cash_cents: i64,
    credit_cents: i64,
    total_sales_cents: i64,
    clock_in_time: DateTime<Utc>,
    clock_out_time: Option<DateTime<Utc>>,
}

impl ShiftRow {
    fn into_shift(self, expenses: Vec<Expense>) -> Shift {
        let mut totals = PaymentMethodTotals::zeroed();
        for (key, cents) in [
            (ShiftTotalKey::Mpesa, self.mpesa_cents),
            (ShiftTotalKey::MpesaTill, self.mpesa_till_cents),
            (ShiftTotalKey::PochiBiashara, self.pochi_biashara_cents),
            (ShiftTotalKey::Card, self.card_cents),
            (ShiftTotalKey::BankTransfer, self.bank_transfer_cents),
            (ShiftTotalKey::Cash, self.cash_cents),
            (ShiftTotalKey::Credit, self.credit_cents),
        ] {
            totals.set(key, Money::from_cents(cents));
        }

        Shift {
            id: self.id,
            user_id: self.user_id,
            device_id: self.device_id,
            date: self.shift_date,
            opening_balance_cents: self.opening_balance_cents,
            closing_balance_cents: self.closing_balance_cents,
            counted_cash_cents: self.counted_cash_cents,
            cash_variance_cents: self.cash_variance_cents,
            status: self.status,
            payment_totals: totals,
            expenses,
            total_sales_cents: self.total_sales_cents,
            clock_in_time: self.clock_in_time,
            clock_out_time: self.clock_out_time,
        }
    }
}

#[derive(Debug, FromRow)]
struct ExpenseRow {
    id: String,
    description: String,
    amount_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            description: row.description,
            amount_cents: row.amount_cents,
            timestamp: row.created_at,
        }
    }
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================
// Shared with the transaction repository so a sale commit and its shift
// update run on the same database transaction.

async fn load_expenses(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<Vec<Expense>> {
    let rows = sqlx::query_as::<_, ExpenseRow>(
        r#"
        SELECT id, description, amount_cents, created_at
        FROM shift_expenses
        WHERE shift_id = ?1
        ORDER BY created_at, rowid
        "#,
    )
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Expense::from).collect())
}

async fn hydrate(conn: &mut SqliteConnection, row: Option<ShiftRow>) -> DbResult<Option<Shift>> {
    match row {
        Some(row) => {
            let expenses = load_expenses(conn, &row.id).await?;
            Ok(Some(row.into_shift(expenses)))
        }
        None => Ok(None),
    }
}

/// Loads the active shift, if any.
pub(crate) async fn fetch_active(conn: &mut SqliteConnection) -> DbResult<Option<Shift>> {
    let sql = format!("{SHIFT_SELECT} WHERE status = 'active' LIMIT 1");
    let row = sqlx::query_as::<_, ShiftRow>(&sql)
        .fetch_optional(&mut *conn)
        .await?;
    hydrate(conn, row).await
}

async fn fetch_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Shift>> {
    let sql = format!("{SHIFT_SELECT} WHERE id = ?1");
    let row = sqlx::query_as::<_, ShiftRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    hydrate(conn, row).await
}

/// Writes a mutated active shift back.
///
/// `known_expenses` is how many expenses the shift had when it was loaded;
/// any beyond that are inserted.
pub(crate) async fn write_back(
    conn: &mut SqliteConnection,
    shift: &Shift,
    known_expenses: usize,
) -> DbResult<()> {
    let totals = &shift.payment_totals;
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE shifts SET
            closing_balance_cents = ?2,
            counted_cash_cents = ?3,
            cash_variance_cents = ?4,
            status = ?5,
            mpesa_cents = ?6,
            mpesa_till_cents = ?7,
            pochi_biashara_cents = ?8,
            card_cents = ?9,
            bank_transfer_cents = ?10,
            cash_cents = ?11,
            credit_cents = ?12,
            total_sales_cents = ?13,
            clock_out_time = ?14,
            updated_at = ?15
        WHERE id = ?1 AND status = 'active'
        "#,
    )
    .bind(&shift.id)
    .bind(shift.closing_balance_cents)
    .bind(shift.counted_cash_cents)
    .bind(shift.cash_variance_cents)
    .bind(shift.status)
    .bind(totals.mpesa.cents())
    .bind(totals.mpesa_till.cents())
    .bind(totals.pochi_biashara.cents())
    .bind(totals.card.cents())
    .bind(totals.bank_transfer.cents())
    .bind(totals.cash.cents())
    .bind(totals.credit.cents())
    .bind(shift.total_sales_cents)
    .bind(shift.clock_out_time)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::ShiftClosed {
            shift_id: shift.id.clone(),
        }
        .into());
    }

    for expense in shift.expenses.iter().skip(known_expenses) {
        sqlx::query(
            r#"
            INSERT INTO shift_expenses (id, shift_id, description, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&expense.id)
        .bind(&shift.id)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.timestamp)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shift database operations.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Persists a freshly opened shift as the active shift.
    ///
    /// ## Errors
    /// - `Core(ShiftAlreadyActive)` when another shift is open. The check
    ///   runs in the same transaction as the insert, and the partial unique
    ///   index catches anything that slips past it.
    pub async fn start(&self, shift: &Shift) -> DbResult<()> {
        debug!(id = %shift.id, user_id = %shift.user_id, "Starting shift");

        let mut tx = self.pool.begin().await?;

        if let Some(active) = fetch_active(&mut tx).await? {
            return Err(CoreError::ShiftAlreadyActive {
                shift_id: active.id,
            }
            .into());
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO shifts (
                id, user_id, device_id, shift_date,
                opening_balance_cents, status,
                clock_in_time, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.user_id)
        .bind(&shift.device_id)
        .bind(shift.date)
        .bind(shift.opening_balance_cents)
        .bind(shift.status)
        .bind(shift.clock_in_time)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            tx.rollback().await?;
            return Err(self.name_conflicting_shift(DbError::from(err)).await);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Turns a hit on the one-active-shift index into `ShiftAlreadyActive`
    /// carrying the id of the shift that won. Other errors pass through.
    async fn name_conflicting_shift(&self, err: DbError) -> DbError {
        match &err {
            DbError::UniqueViolation { field, .. } if field.starts_with("shifts.status") => {}
            _ => return err,
        }

        match self.get_active().await {
            Ok(Some(active)) => CoreError::ShiftAlreadyActive {
                shift_id: active.id,
            }
            .into(),
            Ok(None) => err,
            Err(lookup) => {
                warn!(error = %lookup, "Could not load the shift that blocked the insert");
                err
            }
        }
    }

    /// The active shift, if one is open.
    pub async fn get_active(&self) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        fetch_active(&mut conn).await
    }

    /// Any shift, active or closed.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// Closed shifts, most recently closed first.
    pub async fn history(&self, limit: u32) -> DbResult<Vec<Shift>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "{SHIFT_SELECT} WHERE status = 'closed' ORDER BY clock_out_time DESC, rowid DESC LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;

        let mut shifts = Vec::with_capacity(rows.len());
        for row in rows {
            let expenses = load_expenses(&mut conn, &row.id).await?;
            shifts.push(row.into_shift(expenses));
        }
        Ok(shifts)
    }

    /// Applies `mutate` to the latest active shift and writes it back, all
    /// inside one database transaction.
    ///
    /// ## Errors
    /// - `Core(NoActiveShift)` when no shift is open
    /// - whatever `mutate` returns; nothing is written in that case
    pub async fn with_active<T, F>(&self, mutate: F) -> DbResult<(Shift, T)>
    where
        F: FnOnce(&mut Shift) -> CoreResult<T> + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await?;

        let mut shift = fetch_active(&mut tx)
            .await?
            .ok_or(CoreError::NoActiveShift)?;
        let known_expenses = shift.expenses.len();

        let output = mutate(&mut shift)?;

        write_back(&mut tx, &shift, known_expenses).await?;
        tx.commit().await?;

        debug!(id = %shift.id, status = %shift.status, "Shift written back");
        Ok((shift, output))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
