//! # Mobile Money
//!
//! STK push confirmation for `mpesa-stk` tender legs.
//!
//! ## Confirmation Race
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  confirm_push(gateway, request, timeout, cancel)                        │
//! │                                                                         │
//! │         ┌─────────── cancel.cancelled() ──────► AsyncPaymentCancelled   │
//! │  select ┼─────────── timeout elapsed ─────────► AsyncPaymentTimeout     │
//! │         └─────────── gateway answers                                    │
//! │                        ├── declined ──────────► AsyncPaymentFailed      │
//! │                        └── confirmed ─────────► receipt code            │
//! │                                                                         │
//! │  Nothing is written on any failure path; the cart stays as it was.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mauzo_core::transaction::generate_reference;
use mauzo_core::Money;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{TillError, TillResult};

/// A push prompt sent to the customer's phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPushRequest {
    pub amount: Money,
    /// Shown on the customer's prompt; the till uses the shift id.
    pub account_reference: String,
}

/// A confirmed push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkConfirmation {
    /// Provider receipt code, stored as the payment reference.
    pub receipt_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("declined: {0}")]
    Declined(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// A mobile-money provider that can confirm STK pushes.
#[async_trait]
pub trait MobileMoneyGateway: Send + Sync {
    async fn request_payment(&self, request: &StkPushRequest)
        -> Result<StkConfirmation, GatewayError>;
}

/// Waits for one push to be confirmed, giving up on timeout or cancel.
pub async fn confirm_push(
    gateway: &dyn MobileMoneyGateway,
    request: &StkPushRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> TillResult<StkConfirmation> {
    debug!(amount = %request.amount, "Sending STK push");

    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!(amount = %request.amount, "STK push cancelled by operator");
            Err(TillError::AsyncPaymentCancelled)
        }

        outcome = tokio::time::timeout(timeout, gateway.request_payment(request)) => match outcome {
            Err(_) => {
                warn!(amount = %request.amount, secs = timeout.as_secs(), "STK push timed out");
                Err(TillError::AsyncPaymentTimeout { secs: timeout.as_secs() })
            }
            Ok(Err(err)) => {
                warn!(amount = %request.amount, error = %err, "STK push failed");
                Err(TillError::AsyncPaymentFailed { reason: err.to_string() })
            }
            Ok(Ok(confirmation)) => {
                info!(receipt = %confirmation.receipt_code, "STK push confirmed");
                Ok(confirmation)
            }
        }
    }
}

// =============================================================================
// Simulated Gateway
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedOutcome {
    Confirm,
    Decline(String),
}

/// Confirms or declines every push after a fixed delay.
#[derive(Debug)]
pub struct SimulatedMobileMoneyGateway {
    delay: Duration,
    outcome: SimulatedOutcome,
    requests: AtomicUsize,
}

impl SimulatedMobileMoneyGateway {
    pub fn new(delay: Duration, outcome: SimulatedOutcome) -> Self {
        SimulatedMobileMoneyGateway {
            delay,
            outcome,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn confirming(delay: Duration) -> Self {
        Self::new(delay, SimulatedOutcome::Confirm)
    }

    pub fn declining(delay: Duration, reason: impl Into<String>) -> Self {
        Self::new(delay, SimulatedOutcome::Decline(reason.into()))
    }

    /// How many pushes were sent.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MobileMoneyGateway for SimulatedMobileMoneyGateway {
    async fn request_payment(
        &self,
        request: &StkPushRequest,
    ) -> Result<StkConfirmation, GatewayError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        match &self.outcome {
            SimulatedOutcome::Confirm => Ok(StkConfirmation {
                receipt_code: generate_reference(),
            }),
            SimulatedOutcome::Decline(reason) => {
                debug!(account = %request.account_reference, "Simulated decline");
                Err(GatewayError::Declined(reason.clone()))
            }
        }
    }
}
