//! # Schema Migrations
//!
//! The till schema ships inside the binary. `Database::new` brings a store
//! up to date before any repository touches it, so a till upgraded in the
//! field migrates its own file on the next start.
//!
//! ```text
//! migrations/sqlite/NNN_*.sql ──(compile time)──► MIGRATOR
//!                                                    │
//!      run_migrations ── applies what the store lacks ┤
//!      schema_status  ── compares the store with it ──┘
//! ```
//!
//! Files are append-only: a shipped migration is never edited, a change
//! gets the next number.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// How far a store's schema is from the one this build expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Migrations embedded in this build.
    pub known: usize,
    /// Migrations the store has recorded as successful.
    pub applied: usize,
}

impl SchemaStatus {
    pub fn pending(&self) -> usize {
        self.known.saturating_sub(self.applied)
    }

    pub fn is_current(&self) -> bool {
        self.pending() == 0
    }
}

/// Applies every migration the store has not recorded yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(known = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Reads the store's migration bookkeeping. A store that was never migrated
/// reports zero applied rather than an error.
pub async fn schema_status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    let known = MIGRATOR.migrations.len();

    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if tracked == 0 {
        0
    } else {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    };

    let status = SchemaStatus {
        known,
        applied: usize::try_from(applied).unwrap_or_default(),
    };
    if status.applied > known {
        warn!(applied = status.applied, known, "Store was migrated by a newer build");
    }
    Ok(status)
}
