//! # Transaction Repository
//!
//! Database operations for committed sales.
//!
//! ## Sale Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_sale(kind, now, build)          one SQLite transaction          │
//! │                                                                         │
//! │  1. load active shift            (none → NoActiveShift)                 │
//! │  2. next number for the day      RCP-20240315-0001, -0002, ...          │
//! │  3. build(&shift, number)        mauzo-core validates + builds          │
//! │  4. shift.apply_payment_totals   every leg into its bucket              │
//! │  5. INSERT transaction, items, payments                                 │
//! │  6. UPDATE shift totals                                                 │
//! │  COMMIT                          (any failure → nothing persisted)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::shift;
use crate::error::{DbError, DbResult};
use mauzo_core::{
    CoreError, CoreResult, DocumentKind, Payment, PaymentMethod, Shift, Transaction,
    TransactionItem, TransactionStatus,
};

/// Length of `RCP-YYYYMMDD-`; the sequence starts right after it.
const SEQUENCE_OFFSET: usize = 14;

const TRANSACTION_SELECT: &str = r#"
    SELECT
        id, shift_id, receipt_number, total_cents,
        customer_id, customer_name, status, is_invoice,
        paid_amount_cents, payment_reference, created_at, updated_at
    FROM transactions
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: String,
    shift_id: Option<String>,
    receipt_number: String,
    total_cents: i64,
    customer_id: Option<String>,
    customer_name: Option<String>,
    status: TransactionStatus,
    is_invoice: bool,
    paid_amount_cents: Option<i64>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_transaction(self, items: Vec<TransactionItem>, payments: Vec<Payment>) -> Transaction {
        Transaction {
            id: self.id,
            shift_id: self.shift_id,
            receipt_number: self.receipt_number,
            items,
            payments,
            total_cents: self.total_cents,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            status: self.status,
            is_invoice: self.is_invoice,
            paid_amount_cents: self.paid_amount_cents,
            payment_reference: self.payment_reference,
            timestamp: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    product_id: String,
    name: String,
    unit_price_cents: i64,
    quantity: i64,
    line_total_cents: i64,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    method: PaymentMethod,
    amount_cents: i64,
    reference: Option<String>,
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================

async fn next_document_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    date: NaiveDate,
) -> DbResult<String> {
    let last: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(MAX(CAST(substr(receipt_number, ?2) AS INTEGER)), 0)
        FROM transactions
        WHERE receipt_number LIKE ?1
        "#,
    )
    .bind(kind.day_pattern(date))
    .bind(SEQUENCE_OFFSET as i64)
    .fetch_one(&mut *conn)
    .await?;

    let next = u32::try_from(last + 1)
        .map_err(|_| DbError::corrupt("transactions", format!("sequence overflow at {last}")))?;
    Ok(kind.format_number(date, next))
}

async fn hydrate(conn: &mut SqliteConnection, row: TransactionRow) -> DbResult<Transaction> {
    let items = sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT product_id, name, unit_price_cents, quantity, line_total_cents
        FROM transaction_items
        WHERE transaction_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| TransactionItem {
        product_id: r.product_id,
        name: r.name,
        unit_price_cents: r.unit_price_cents,
        quantity: r.quantity,
        line_total_cents: r.line_total_cents,
    })
    .collect();

    let payments = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, method, amount_cents, reference
        FROM transaction_payments
        WHERE transaction_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| Payment {
        id: r.id,
        method: r.method,
        amount_cents: r.amount_cents,
        reference: r.reference,
    })
    .collect();

    Ok(row.into_transaction(items, payments))
}

async fn fetch_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Transaction>> {
    let sql = format!("{TRANSACTION_SELECT} WHERE id = ?1");
    let row = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

async fn insert(conn: &mut SqliteConnection, txn: &Transaction) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, shift_id, receipt_number, total_cents,
            customer_id, customer_name, status, is_invoice,
            paid_amount_cents, payment_reference, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&txn.id)
    .bind(&txn.shift_id)
    .bind(&txn.receipt_number)
    .bind(txn.total_cents)
    .bind(&txn.customer_id)
    .bind(&txn.customer_name)
    .bind(txn.status)
    .bind(txn.is_invoice)
    .bind(txn.paid_amount_cents)
    .bind(&txn.payment_reference)
    .bind(txn.timestamp)
    .bind(txn.updated_at)
    .execute(&mut *conn)
    .await?;

    for (line_no, item) in txn.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                transaction_id, line_no, product_id, name,
                unit_price_cents, quantity, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&txn.id)
        .bind(line_no as i64)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .execute(&mut *conn)
        .await?;
    }

    for (line_no, payment) in txn.payments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO transaction_payments (
                id, transaction_id, line_no, method, amount_cents, reference
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&txn.id)
        .bind(line_no as i64)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(&payment.reference)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Commits a sale and folds its payments into the active shift.
    ///
    /// `build` receives the freshly loaded shift and the allocated document
    /// number. If it fails, or any write fails, the whole thing rolls back.
    ///
    /// ## Returns
    /// The persisted transaction and the shift with its new totals.
    pub async fn record_sale<F>(
        &self,
        kind: DocumentKind,
        now: DateTime<Utc>,
        build: F,
    ) -> DbResult<(Transaction, Shift)>
    where
        F: FnOnce(&Shift, String) -> CoreResult<Transaction> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let mut shift = shift::fetch_active(&mut tx)
            .await?
            .ok_or(CoreError::NoActiveShift)?;
        let known_expenses = shift.expenses.len();

        let number = next_document_number(&mut tx, kind, now.date_naive()).await?;
        let txn = build(&shift, number)?;

        shift.apply_payment_totals(&txn.tender_legs())?;

        insert(&mut tx, &txn).await?;
        shift::write_back(&mut tx, &shift, known_expenses).await?;

        tx.commit().await?;

        info!(
            id = %txn.id,
            number = %txn.receipt_number,
            total = %txn.total(),
            shift_id = %shift.id,
            "Sale committed"
        );
        Ok((txn, shift))
    }

    /// Gets a transaction by ID with its items and payments.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// Most recent transactions first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{TRANSACTION_SELECT} ORDER BY created_at DESC, rowid DESC LIMIT ?1");
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(hydrate(&mut conn, row).await?);
        }
        Ok(out)
    }

    /// Transactions recorded under a shift, in commit order.
    pub async fn list_by_shift(&self, shift_id: &str) -> DbResult<Vec<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{TRANSACTION_SELECT} WHERE shift_id = ?1 ORDER BY created_at, rowid");
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(shift_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(hydrate(&mut conn, row).await?);
        }
        Ok(out)
    }

    pub async fn count_by_shift(&self, shift_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE shift_id = ?1")
            .bind(shift_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Moves a transaction to a new status.
    ///
    /// Shift totals are left alone; they keep what was tendered at sale time.
    ///
    /// ## Errors
    /// - `Core(TransactionNotFound)` for an unknown id
    /// - `Core(InvalidStatusTransition)` for a move the lifecycle forbids
    pub async fn update_status(
        &self,
        id: &str,
        next: TransactionStatus,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> DbResult<Transaction> {
        let mut tx = self.pool.begin().await?;

        let mut txn = fetch_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))?;
        txn.apply_status(next, payment_reference, now)?;

        sqlx::query(
            r#"
            UPDATE transactions SET
                status = ?2,
                paid_amount_cents = ?3,
                payment_reference = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&txn.id)
        .bind(txn.status)
        .bind(txn.paid_amount_cents)
        .bind(&txn.payment_reference)
        .bind(txn.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(id = %txn.id, status = %txn.status, "Transaction status updated");
        Ok(txn)
    }

    /// Deletes a transaction with its items and payments.
    ///
    /// Returns the deleted record. Shift totals and ledger postings stay.
    pub async fn delete(&self, id: &str) -> DbResult<Transaction> {
        let mut tx = self.pool.begin().await?;

        let txn = fetch_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))?;

        sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = %id, number = %txn.receipt_number, "Transaction deleted");
        Ok(txn)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
