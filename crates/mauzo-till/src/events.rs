//! # Till Events
//!
//! Outbound notifications from the Shift Store and Transaction Recorder.
//!
//! ## Two Delivery Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  recorder commits a sale                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EventBus::transaction_committed(event)                                 │
//! │       │                                                                 │
//! │       ├──► subscribers, in registration order, awaited one by one       │
//! │       │      1. AccountsLedgerSubscriber  (posts legs)                  │
//! │       │      2. InventorySubscriber       (decrements stock)            │
//! │       │    a failing subscriber is logged and reported, never fatal     │
//! │       │                                                                 │
//! │       └──► broadcast::Sender<TillEvent>  (UI observers, fire and forget)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use mauzo_core::{Expense, TenderLeg, Transaction, TransactionStatus};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use ts_rs::TS;

use crate::error::TillResult;

/// Default capacity of the observer channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// =============================================================================
// Events
// =============================================================================

/// A sale that has been committed together with its shift update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionCommitted {
    pub transaction: Transaction,
    pub shift_id: String,
}

impl TransactionCommitted {
    /// The `(method, amount)` legs exactly as they were applied to the shift.
    pub fn legs(&self) -> Vec<TenderLeg> {
        self.transaction.tender_legs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum TillEvent {
    ShiftStarted {
        shift_id: String,
        user_id: String,
        opening_balance_cents: i64,
    },
    ExpenseAdded {
        shift_id: String,
        expense: Expense,
    },
    TransactionCommitted(TransactionCommitted),
    TransactionStatusChanged {
        transaction_id: String,
        status: TransactionStatus,
    },
    TransactionDeleted {
        transaction_id: String,
    },
    ShiftClosed {
        shift_id: String,
        closing_balance_cents: i64,
        cash_variance_cents: Option<i64>,
    },
    LedgerPostingFailed {
        transaction_id: String,
        reason: String,
    },
}

// =============================================================================
// Subscribers
// =============================================================================

/// Reacts to committed sales after the commit.
///
/// Errors are reported, never propagated back into the sale.
#[async_trait]
pub trait CommitSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_commit(&self, event: &TransactionCommitted) -> TillResult<()>;

    /// Event published when `on_commit` fails.
    fn failure_event(&self, _event: &TransactionCommitted, _reason: &str) -> Option<TillEvent> {
        None
    }
}

/// A subscriber that failed for one committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubscriberFailure {
    pub subscriber: String,
    pub reason: String,
}

// =============================================================================
// Event Bus
// =============================================================================

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TillEvent>,
    subscribers: Arc<RwLock<Vec<Arc<dyn CommitSubscriber>>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.tx.receiver_count())
            .field("subscribers", &self.subscriber_names())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus {
            tx,
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A receiver for every event published from now on.
    pub fn observe(&self) -> broadcast::Receiver<TillEvent> {
        self.tx.subscribe()
    }

    /// Adds a commit subscriber. Subscribers run in registration order.
    pub fn register(&self, subscriber: Arc<dyn CommitSubscriber>) {
        debug!(subscriber = subscriber.name(), "Registering commit subscriber");
        let mut subs = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.push(subscriber);
    }

    pub fn subscriber_names(&self) -> Vec<&'static str> {
        self.snapshot().iter().map(|s| s.name()).collect()
    }

    /// Sends an event to observers. Having none is fine.
    pub fn publish(&self, event: TillEvent) {
        if self.tx.send(event).is_err() {
            debug!("No observers for till event");
        }
    }

    /// Runs every commit subscriber, then notifies observers.
    pub async fn transaction_committed(&self, event: TransactionCommitted) -> Vec<SubscriberFailure> {
        let mut failures = Vec::new();

        for subscriber in self.snapshot() {
            if let Err(err) = subscriber.on_commit(&event).await {
                let reason = err.to_string();
                warn!(
                    subscriber = subscriber.name(),
                    transaction_id = %event.transaction.id,
                    error = %reason,
                    "Commit subscriber failed; sale stands"
                );
                if let Some(report) = subscriber.failure_event(&event, &reason) {
                    self.publish(report);
                }
                failures.push(SubscriberFailure {
                    subscriber: subscriber.name().to_string(),
                    reason,
                });
            }
        }

        self.publish(TillEvent::TransactionCommitted(event));
        failures
    }

    fn snapshot(&self) -> Vec<Arc<dyn CommitSubscriber>> {
        match self.subscribers.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
