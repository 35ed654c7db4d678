//! # Inventory Repository
//!
//! Products the cart draws from and the stock levels it checks against.
//!
//! ## Stock Tracking
//! ```text
//! stock_quantity = NULL   → not tracked, any quantity may be sold
//! stock_quantity = n      → cart refuses more than n, sales decrement it
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use mauzo_core::{CartLine, Money, TransactionItem};

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    /// `None` when the product is not stock-tracked.
    pub stock_quantity: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// A cart line for `quantity` units at the current price.
    pub fn cart_line(&self, quantity: i64) -> CartLine {
        CartLine::new(self.id.clone(), self.name.clone(), self.price(), quantity)
    }
}

const PRODUCT_SELECT: &str = r#"
    SELECT id, sku, name, price_cents, stock_quantity, is_active, created_at, updated_at
    FROM products
"#;

/// Repository for product and stock operations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, stock_quantity, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.sku),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Active products ordered by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE is_active = 1 ORDER BY name LIMIT ?1");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Stock the cart may draw on; `None` for untracked products.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown or inactive product
    pub async fn available_quantity(&self, product_id: &str) -> DbResult<Option<i64>> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT stock_quantity FROM products WHERE id = ?1 AND is_active = 1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(qty,)| qty)
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Takes sold quantities off tracked stock.
    ///
    /// Lines for unknown or untracked products are skipped. Returns how
    /// many lines changed a stock level.
    pub async fn decrement_for_sale(&self, items: &[TransactionItem]) -> DbResult<usize> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for item in items {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - ?2, updated_at = ?3
                WHERE id = ?1 AND stock_quantity IS NOT NULL
                "#,
            )
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(product_id = %item.product_id, "Sold item has no tracked stock");
            } else {
                changed += 1;
            }
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// Gets total product count.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
