//! # Transaction Recorder
//!
//! Turns the working cart and a tender into a committed transaction.
//!
//! ## Checkout Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_transaction(cart, tender, customer, cancel)                     │
//! │                                                                         │
//! │  1. snapshot cart, require an active shift         ── NoActiveShift     │
//! │  2. validate cart + tender + customer              ── SplitAmountMismatch │
//! │                                                       CustomerRequired  │
//! │  3. confirm every STK leg with the gateway, even   ── AsyncPayment*     │
//! │     one that arrived with a reference                                   │
//! │     (no lock held, nothing written yet)                                 │
//! │  4. lock writes ──► one sqlx transaction:                               │
//! │       load shift ─► number ─► build ─► totals ─► insert ─► write back   │
//! │  5. subscribers: ledger, inventory (failures logged, sale stands)       │
//! │  6. take the sold lines out of the cart                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mauzo_core::{CoreError, CustomerRef, SplitAllocator, Tender, Transaction, TransactionStatus};
use mauzo_db::Database;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use ts_rs::TS;

use crate::error::TillResult;
use crate::events::{EventBus, SubscriberFailure, TillEvent, TransactionCommitted};
use crate::mobile_money::{confirm_push, MobileMoneyGateway, StkPushRequest};
use crate::session::TillSession;
use crate::state::CartState;

/// What happened to a checkout attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
#[ts(export)]
pub enum RecordOutcome {
    Committed {
        transaction: Transaction,
        /// Post-commit collaborators that failed. The sale stands regardless.
        subscriber_failures: Vec<SubscriberFailure>,
    },
    /// A credit leg needs a customer. Nothing was written; resubmit with one.
    CustomerRequired,
}

impl RecordOutcome {
    pub fn committed(self) -> Option<Transaction> {
        match self {
            RecordOutcome::Committed { transaction, .. } => Some(transaction),
            RecordOutcome::CustomerRequired => None,
        }
    }

    pub fn subscriber_failures(&self) -> &[SubscriberFailure] {
        match self {
            RecordOutcome::Committed {
                subscriber_failures,
                ..
            } => subscriber_failures,
            RecordOutcome::CustomerRequired => &[],
        }
    }
}

#[derive(Clone)]
pub struct TransactionRecorder {
    session: Arc<TillSession>,
    db: Database,
    events: EventBus,
    gateway: Arc<dyn MobileMoneyGateway>,
    stk_timeout: Duration,
}

impl std::fmt::Debug for TransactionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRecorder")
            .field("user_id", &self.session.user_id())
            .field("stk_timeout", &self.stk_timeout)
            .finish()
    }
}

impl TransactionRecorder {
    pub fn new(
        session: Arc<TillSession>,
        db: Database,
        events: EventBus,
        gateway: Arc<dyn MobileMoneyGateway>,
        stk_timeout: Duration,
    ) -> Self {
        TransactionRecorder {
            session,
            db,
            events,
            gateway,
            stk_timeout,
        }
    }

    /// Records the cart as a sale.
    ///
    /// All or nothing: on any error the shift, the history and the cart are
    /// exactly as they were.
    ///
    /// ## Errors
    /// - `NoActiveShift` when no shift is open
    /// - `SplitAmountMismatch` when the tender does not cover the cart total
    /// - `AsyncPaymentFailed` / `AsyncPaymentTimeout` / `AsyncPaymentCancelled`
    ///   when an STK leg is not confirmed
    pub async fn record_transaction(
        &self,
        cart: &CartState,
        mut tender: Tender,
        customer: Option<CustomerRef>,
        cancel: &CancellationToken,
    ) -> TillResult<RecordOutcome> {
        self.session.ensure_open()?;
        let snapshot = cart.snapshot()?;

        let shift = self
            .db
            .shifts()
            .get_active()
            .await?
            .ok_or(CoreError::NoActiveShift)?;

        let kind = match Transaction::validate_checkout(&snapshot, &tender, customer.as_ref()) {
            Ok(kind) => kind,
            Err(CoreError::CreditCustomerRequired) => {
                debug!(total = %snapshot.total(), "Credit sale waiting for a customer");
                return Ok(RecordOutcome::CustomerRequired);
            }
            Err(err) => return Err(err.into()),
        };

        for leg in tender.legs_mut() {
            leg.ensure_reference();
        }
        if tender.needs_async_confirmation() {
            self.confirm_stk_legs(&mut tender, &shift.id, cancel).await?;
        }

        let guard = self.session.lock_writes().await?;
        let now = Utc::now();
        let (txn, shift) = self
            .db
            .transactions()
            .record_sale(kind, now, |shift, number| {
                Transaction::build(&snapshot, &tender, customer.as_ref(), &shift.id, number, now)
            })
            .await?;
        drop(guard);

        info!(
            number = %txn.receipt_number,
            total = %txn.total(),
            legs = txn.payments.len(),
            invoice = txn.is_invoice,
            "Transaction recorded"
        );

        let subscriber_failures = self
            .events
            .transaction_committed(TransactionCommitted {
                transaction: txn.clone(),
                shift_id: shift.id,
            })
            .await;

        // lines added while the push was pending stay in the cart
        cart.remove_sold(&snapshot)?;

        Ok(RecordOutcome::Committed {
            transaction: txn,
            subscriber_failures,
        })
    }

    /// Sends a push for every STK leg and stores the gateway's receipt code
    /// as its reference. A reference supplied with the tender is never
    /// trusted in place of a confirmation.
    async fn confirm_stk_legs(
        &self,
        tender: &mut Tender,
        shift_id: &str,
        cancel: &CancellationToken,
    ) -> TillResult<()> {
        for leg in tender.legs_mut() {
            if !leg.method.requires_async_confirmation() {
                continue;
            }
            if let Some(preset) = &leg.reference {
                debug!(reference = %preset, "Replacing caller reference on STK leg");
            }

            let request = StkPushRequest {
                amount: leg.amount(),
                account_reference: shift_id.to_string(),
            };
            let confirmation =
                confirm_push(self.gateway.as_ref(), &request, self.stk_timeout, cancel).await?;
            leg.reference = Some(confirmation.receipt_code);
        }
        Ok(())
    }

    /// Records the cart against a finished split.
    ///
    /// ## Errors
    /// - `SplitAmountMismatch` when the legs do not cover the target
    pub async fn record_split(
        &self,
        cart: &CartState,
        split: SplitAllocator,
        cancel: &CancellationToken,
    ) -> TillResult<RecordOutcome> {
        let (tender, customer) = split.into_tender()?;
        self.record_transaction(cart, tender, customer, cancel).await
    }

    /// Administrative status change. Shift totals are not adjusted.
    ///
    /// ## Errors
    /// - `TransactionNotFound` for an unknown id
    /// - `InvalidStatusTransition` for a move outside
    ///   pending → completed/cancelled/paid and completed → refunded
    pub async fn update_transaction_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        payment_reference: Option<String>,
    ) -> TillResult<Transaction> {
        let _guard = self.session.lock_writes().await?;

        let txn = self
            .db
            .transactions()
            .update_status(transaction_id, status, payment_reference, Utc::now())
            .await?;

        info!(id = %txn.id, status = %txn.status, "Transaction status changed");
        self.events.publish(TillEvent::TransactionStatusChanged {
            transaction_id: txn.id.clone(),
            status: txn.status,
        });
        Ok(txn)
    }

    /// Deletes a transaction. Shift totals and ledger postings are kept.
    pub async fn delete_transaction(&self, transaction_id: &str) -> TillResult<Transaction> {
        let _guard = self.session.lock_writes().await?;

        let txn = self.db.transactions().delete(transaction_id).await?;
        self.events.publish(TillEvent::TransactionDeleted {
            transaction_id: txn.id.clone(),
        });
        Ok(txn)
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> TillResult<Transaction> {
        self.session.ensure_open()?;
        self.db
            .transactions()
            .get_by_id(transaction_id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()).into())
    }

    /// Most recent first.
    pub async fn list_transactions(&self, limit: u32) -> TillResult<Vec<Transaction>> {
        self.session.ensure_open()?;
        Ok(self.db.transactions().list_recent(limit).await?)
    }
}
