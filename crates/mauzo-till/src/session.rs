//! # Till Session
//!
//! The logged-in operator context shared by the Shift Store and the
//! Transaction Recorder.
//!
//! ## Lifecycle
//! ```text
//! login ──► TillSession::open(user, device) ──► Arc<TillSession>
//!                                                   │
//!                         ┌─────────────────────────┼──────────────────┐
//!                         ▼                         ▼                  ▼
//!                    ShiftStore            TransactionRecorder     Till facade
//!                         │                         │
//!                         └──── lock_writes() ──────┘   one mutation at a time
//!
//! logout ──► close() ──► every later operation fails with SessionClosed
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mauzo_core::validation::validate_identifier;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::error::{TillError, TillResult};

#[derive(Debug)]
pub struct TillSession {
    user_id: String,
    device_id: String,
    opened_at: DateTime<Utc>,
    write_lock: Mutex<()>,
    closed: AtomicBool,
}

impl TillSession {
    /// Opens a session for `user_id` at `device_id`.
    pub fn open(user_id: &str, device_id: &str) -> TillResult<Arc<Self>> {
        validate_identifier("user_id", user_id)?;
        validate_identifier("device_id", device_id)?;
        let user_id = user_id.trim().to_string();
        let device_id = device_id.trim().to_string();

        info!(user_id = %user_id, device_id = %device_id, "Till session opened");

        Ok(Arc::new(TillSession {
            user_id,
            device_id,
            opened_at: Utc::now(),
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    pub fn ensure_open(&self) -> TillResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TillError::SessionClosed)
        }
    }

    /// Waits for exclusive write access to the active shift.
    ///
    /// Held from the read of the latest shift until its write-back, so two
    /// rapid sales can never interleave.
    pub async fn lock_writes(&self) -> TillResult<MutexGuard<'_, ()>> {
        self.ensure_open()?;
        let guard = self.write_lock.lock().await;
        // logout may have happened while we waited
        self.ensure_open()?;
        Ok(guard)
    }

    /// Ends the session. Waits for an in-flight write to finish first.
    pub async fn close(&self) {
        let _guard = self.write_lock.lock().await;
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(user_id = %self.user_id, "Till session closed");
        }
    }
}
