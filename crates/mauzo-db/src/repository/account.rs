//! # Account Repository
//!
//! The accounts ledger: one balance per shift-total key, plus a posting row
//! for every tender leg that moved it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use mauzo_core::{Money, PaymentMethod, ShiftTotalKey, TenderLeg};

/// A ledger account balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub key: ShiftTotalKey,
    pub name: String,
    pub balance_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// One leg posted to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountPosting {
    pub id: String,
    pub account_key: ShiftTotalKey,
    pub transaction_id: String,
    pub shift_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Repository for ledger postings and balances.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Posts every leg of a committed sale to its account.
    ///
    /// All legs land or none do.
    pub async fn post_sale(
        &self,
        legs: &[TenderLeg],
        transaction_id: &str,
        shift_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for leg in legs {
            let key = leg.method.shift_total_key();

            sqlx::query(
                r#"
                INSERT INTO account_postings (
                    id, account_key, transaction_id, shift_id, method, amount_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(key)
            .bind(transaction_id)
            .bind(shift_id)
            .bind(leg.method)
            .bind(leg.amount_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let updated = sqlx::query(
                r#"
                UPDATE accounts
                SET balance_cents = balance_cents + ?2, updated_at = ?3
                WHERE key = ?1
                "#,
            )
            .bind(key)
            .bind(leg.amount_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::not_found("Account", key.as_str()));
            }
        }

        tx.commit().await?;

        debug!(
            transaction_id = %transaction_id,
            legs = legs.len(),
            "Sale posted to ledger"
        );
        Ok(())
    }

    pub async fn get(&self, key: ShiftTotalKey) -> DbResult<Account> {
        sqlx::query_as::<_, Account>(
            "SELECT key, name, balance_cents, updated_at FROM accounts WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Account", key.as_str()))
    }

    pub async fn balance(&self, key: ShiftTotalKey) -> DbResult<Money> {
        Ok(self.get(key).await?.balance())
    }

    /// All accounts, in the order they were seeded.
    pub async fn list(&self) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT key, name, balance_cents, updated_at FROM accounts ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    pub async fn postings_for_transaction(
        &self,
        transaction_id: &str,
    ) -> DbResult<Vec<AccountPosting>> {
        let postings = sqlx::query_as::<_, AccountPosting>(
            r#"
            SELECT id, account_key, transaction_id, shift_id, method, amount_cents, created_at
            FROM account_postings
            WHERE transaction_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_accounts_seeded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let accounts = db.accounts().list().await.unwrap();

        let keys: Vec<_> = accounts.iter().map(|a| a.key).collect();
        assert_eq!(keys, ShiftTotalKey::ALL.to_vec());
        assert!(accounts.iter().all(|a| a.balance().is_zero()));
    }

    #[tokio::test]
    async fn test_post_sale_moves_balances() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.accounts();

        let legs = vec![
            TenderLeg::new(PaymentMethod::Cash, Money::from_major(400)),
            TenderLeg::new(PaymentMethod::MpesaTill, Money::from_major(600)),
            TenderLeg::new(PaymentMethod::OtherCustom, Money::from_major(50)),
        ];
        repo.post_sale(&legs, "txn-1", "shift-1").await.unwrap();

        assert_eq!(
            repo.balance(ShiftTotalKey::Cash).await.unwrap(),
            Money::from_major(450)
        );
        assert_eq!(
            repo.balance(ShiftTotalKey::MpesaTill).await.unwrap(),
            Money::from_major(600)
        );

        let postings = repo.postings_for_transaction("txn-1").await.unwrap();
        assert_eq!(postings.len(), 3);
        assert_eq!(postings[2].method, PaymentMethod::OtherCustom);
        assert_eq!(postings[2].account_key, ShiftTotalKey::Cash);
    }
}
