//! # Accounts Ledger Subscriber
//!
//! Posts every committed sale to the accounts ledger.
//!
//! Runs after the sale and shift totals are already committed. A failure here
//! is logged and published as `LedgerPostingFailed`; the sale stands and the
//! discrepancy is resolved out of band.

use async_trait::async_trait;
use mauzo_core::TenderLeg;
use mauzo_db::AccountRepository;

use crate::error::{TillError, TillResult};
use crate::events::{CommitSubscriber, TillEvent, TransactionCommitted};

#[derive(Debug, Clone)]
pub struct AccountsLedgerSubscriber {
    accounts: AccountRepository,
}

impl AccountsLedgerSubscriber {
    pub fn new(accounts: AccountRepository) -> Self {
        AccountsLedgerSubscriber { accounts }
    }

    /// Posts each `(method, amount)` leg to the account for its shift-total
    /// key. All legs land or none do.
    pub async fn record_sale_in_accounts(
        &self,
        legs: &[TenderLeg],
        transaction_id: &str,
        shift_id: &str,
    ) -> TillResult<()> {
        self.accounts
            .post_sale(legs, transaction_id, shift_id)
            .await
            .map_err(|err| TillError::LedgerPostingFailed {
                transaction_id: transaction_id.to_string(),
                reason: err.to_string(),
            })
    }
}

#[async_trait]
impl CommitSubscriber for AccountsLedgerSubscriber {
    fn name(&self) -> &'static str {
        "accounts-ledger"
    }

    async fn on_commit(&self, event: &TransactionCommitted) -> TillResult<()> {
        self.record_sale_in_accounts(&event.legs(), &event.transaction.id, &event.shift_id)
            .await
    }

    fn failure_event(&self, event: &TransactionCommitted, reason: &str) -> Option<TillEvent> {
        Some(TillEvent::LedgerPostingFailed {
            transaction_id: event.transaction.id.clone(),
            reason: reason.to_string(),
        })
    }
}
