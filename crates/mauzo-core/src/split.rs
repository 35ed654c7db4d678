//! # Split-Payment Allocator
//!
//! Builds a multi-method tender for one sale, leg by leg.
//!
//! ## Operator Flow
//! ```text
//! Cart total: 1000.00
//!
//!   add_entry(cash, 400)        ──► Added { remaining: 600.00 }
//!   add_entry(mpesa-stk, 700)   ──► OverTender (only 600.00 left)
//!   add_entry(credit, 600)      ──► CustomerRequired   (nothing added)
//!   select_customer(C1, Jane)
//!   add_entry(credit, 600)      ──► Added { remaining: 0.00 }
//!   into_tender()               ──► Tender::Split([...]) + customer
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::payment::PaymentMethod;
use crate::transaction::{CustomerRef, Tender, TenderLeg};

/// Result of offering a leg to the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SplitEntryOutcome {
    /// The leg was accepted.
    Added { remaining_cents: i64 },
    /// A credit leg needs a customer first. The leg was not added.
    CustomerRequired,
}

/// In-progress split tender for a single sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAllocator {
    target: Money,
    legs: Vec<TenderLeg>,
    customer: Option<CustomerRef>,
}

impl SplitAllocator {
    /// Starts a split against the cart total.
    pub fn new(target: Money) -> Self {
        SplitAllocator {
            target,
            legs: Vec::new(),
            customer: None,
        }
    }

    pub fn target(&self) -> Money {
        self.target
    }

    pub fn entries(&self) -> &[TenderLeg] {
        &self.legs
    }

    pub fn customer(&self) -> Option<&CustomerRef> {
        self.customer.as_ref()
    }

    /// Sum of the legs entered so far.
    pub fn tendered(&self) -> Money {
        self.legs.iter().map(TenderLeg::amount).sum()
    }

    /// `target - tendered`.
    pub fn remaining(&self) -> Money {
        self.target - self.tendered()
    }

    /// True once the legs cover the target exactly.
    pub fn is_settled(&self) -> bool {
        self.remaining().is_zero() && !self.legs.is_empty()
    }

    /// Offers a leg.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` when `amount <= 0`
    /// - `OverTender` when `amount` exceeds what is still owed
    pub fn add_entry(&mut self, method: PaymentMethod, amount: Money) -> CoreResult<SplitEntryOutcome> {
        self.add_entry_with_reference(method, amount, None)
    }

    /// [`SplitAllocator::add_entry`] with a reference the operator typed in
    /// (e.g. a bank transfer slip number).
    pub fn add_entry_with_reference(
        &mut self,
        method: PaymentMethod,
        amount: Money,
        reference: Option<String>,
    ) -> CoreResult<SplitEntryOutcome> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be greater than zero".to_string(),
            });
        }

        let remaining = self.remaining();
        if amount > remaining {
            return Err(CoreError::OverTender { amount, remaining });
        }

        if method.is_credit() && self.customer.is_none() {
            return Ok(SplitEntryOutcome::CustomerRequired);
        }

        let mut leg = TenderLeg::new(method, amount);
        leg.reference = reference;
        leg.ensure_reference();
        self.legs.push(leg);

        Ok(SplitEntryOutcome::Added {
            remaining_cents: self.remaining().cents(),
        })
    }

    /// Removes the leg at `index` and hands it back.
    pub fn remove_entry(&mut self, index: usize) -> CoreResult<TenderLeg> {
        if index >= self.legs.len() {
            return Err(CoreError::SplitEntryNotFound { index });
        }
        Ok(self.legs.remove(index))
    }

    pub fn select_customer(&mut self, customer: CustomerRef) {
        self.customer = Some(customer);
    }

    /// Indices of legs that must be confirmed on the customer's phone.
    pub fn pending_confirmations(&self) -> Vec<usize> {
        self.legs
            .iter()
            .enumerate()
            .filter(|(_, leg)| leg.method.requires_async_confirmation())
            .map(|(i, _)| i)
            .collect()
    }

    /// Finishes the split.
    ///
    /// ## Errors
    /// - `SplitAmountMismatch` unless the legs cover the target exactly
    pub fn into_tender(self) -> CoreResult<(Tender, Option<CustomerRef>)> {
        if !self.is_settled() {
            return Err(CoreError::SplitAmountMismatch {
                expected: self.target,
                tendered: self.tendered(),
            });
        }
        Ok((Tender::Split(self.legs), self.customer))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legs_reduce_remaining() {
        let mut split = SplitAllocator::new(Money::from_major(1000));
        let outcome = split
            .add_entry(PaymentMethod::Cash, Money::from_major(400))
            .unwrap();
        assert_eq!(
            outcome,
            SplitEntryOutcome::Added {
                remaining_cents: 60_000
            }
        );
        assert!(!split.is_settled());

        split
            .add_entry(PaymentMethod::MpesaStk, Money::from_major(600))
            .unwrap();
        assert!(split.is_settled());
        assert_eq!(split.pending_confirmations(), vec![1]);

        let (tender, customer) = split.into_tender().unwrap();
        assert_eq!(tender.total(), Money::from_major(1000));
        assert!(customer.is_none());
    }

    #[test]
    fn test_rejects_zero_and_over_tender() {
        let mut split = SplitAllocator::new(Money::from_major(100));
        assert!(matches!(
            split.add_entry(PaymentMethod::Cash, Money::zero()),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));

        split.add_entry(PaymentMethod::Cash, Money::from_major(60)).unwrap();
        let err = split
            .add_entry(PaymentMethod::Card, Money::from_major(41))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::OverTender {
                amount: Money::from_major(41),
                remaining: Money::from_major(40),
            }
        );
        assert_eq!(split.entries().len(), 1);
    }

    #[test]
    fn test_credit_leg_asks_for_customer() {
        let mut split = SplitAllocator::new(Money::from_major(1000));
        split.add_entry(PaymentMethod::Cash, Money::from_major(400)).unwrap();

        let outcome = split
            .add_entry(PaymentMethod::Credit, Money::from_major(600))
            .unwrap();
        assert_eq!(outcome, SplitEntryOutcome::CustomerRequired);
        assert_eq!(split.remaining(), Money::from_major(600));

        split.select_customer(CustomerRef::new("C1", "Jane"));
        split
            .add_entry(PaymentMethod::Credit, Money::from_major(600))
            .unwrap();

        let (tender, customer) = split.into_tender().unwrap();
        assert!(tender.has_credit());
        assert_eq!(customer.unwrap().id, "C1");
    }

    #[test]
    fn test_remove_entry() {
        let mut split = SplitAllocator::new(Money::from_major(100));
        split.add_entry(PaymentMethod::Cash, Money::from_major(30)).unwrap();
        split
            .add_entry(PaymentMethod::BankTransfer, Money::from_major(70))
            .unwrap();

        let removed = split.remove_entry(0).unwrap();
        assert_eq!(removed.method, PaymentMethod::Cash);
        assert_eq!(split.remaining(), Money::from_major(30));
        assert_eq!(
            split.remove_entry(5),
            Err(CoreError::SplitEntryNotFound { index: 5 })
        );
    }

    #[test]
    fn test_unsettled_split_cannot_submit() {
        let mut split = SplitAllocator::new(Money::from_major(1000));
        split.add_entry(PaymentMethod::Cash, Money::from_major(400)).unwrap();
        split
            .add_entry(PaymentMethod::BankTransfer, Money::from_major(550))
            .unwrap();

        assert_eq!(
            split.into_tender().unwrap_err(),
            CoreError::SplitAmountMismatch {
                expected: Money::from_major(1000),
                tendered: Money::from_major(950),
            }
        );
    }

    #[test]
    fn test_till_legs_get_references() {
        let mut split = SplitAllocator::new(Money::from_major(100));
        split
            .add_entry(PaymentMethod::PochiLaBiashara, Money::from_major(100))
            .unwrap();
        assert!(split.entries()[0].reference.is_some());
    }
}
