//! # Transactions
//!
//! Tender instructions, payments and the immutable sale record built from a
//! cart.
//!
//! ## Checkout Pipeline
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────────────┐   ┌─────────────┐
//! │  Cart    │──►│ Tender        │──►│ validate_checkout() │──►│ Transaction │
//! │ (lines)  │   │ Full | Split  │   │ cart, sum, customer │   │ ::build()   │
//! └──────────┘   └───────────────┘   └─────────────────────┘   └─────────────┘
//!                                              │
//!                    SplitAmountMismatch ◄─────┤
//!                    CreditCustomerRequired ◄──┤
//!                    EmptyCart ◄───────────────┘
//! ```
//!
//! ## Status Transitions
//! ```text
//!   pending ──► completed ──► refunded
//!      │
//!      ├──────► cancelled
//!      └──────► paid
//! ```
//! Anything else is rejected with `InvalidStatusTransition`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::payment::PaymentMethod;
use crate::validation::{validate_identifier, validate_payment_amount, validate_reference};

/// Length of references generated for till-number style mobile payments.
pub const GENERATED_REFERENCE_LEN: usize = 10;

// =============================================================================
// Tender
// =============================================================================

/// One `(method, amount)` entry of a tender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderLeg {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// External confirmation code, when the method produces one.
    pub reference: Option<String>,
}

impl TenderLeg {
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        TenderLeg {
            method,
            amount_cents: amount.cents(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Fills in a reference for till-number and Pochi payments that arrive
    /// without one. STK legs get theirs from the gateway instead.
    pub fn ensure_reference(&mut self) {
        let needs_generated = matches!(
            self.method,
            PaymentMethod::MpesaTill | PaymentMethod::PochiLaBiashara
        );
        if needs_generated && self.reference.is_none() {
            self.reference = Some(generate_reference());
        }
    }
}

/// Generates an upper-case alphanumeric reference in the M-Pesa code shape.
pub fn generate_reference() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(GENERATED_REFERENCE_LEN)
        .collect()
}

/// How the customer settles the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Tender {
    /// A single method covering the whole total.
    Full(TenderLeg),
    /// Several legs that together cover the total.
    Split(Vec<TenderLeg>),
}

impl Tender {
    /// Shorthand for a full payment.
    pub fn full(method: PaymentMethod, amount: Money) -> Self {
        Tender::Full(TenderLeg::new(method, amount))
    }

    /// The legs in entry order.
    pub fn legs(&self) -> &[TenderLeg] {
        match self {
            Tender::Full(leg) => std::slice::from_ref(leg),
            Tender::Split(legs) => legs,
        }
    }

    pub fn legs_mut(&mut self) -> &mut [TenderLeg] {
        match self {
            Tender::Full(leg) => std::slice::from_mut(leg),
            Tender::Split(legs) => legs,
        }
    }

    /// Sum of all leg amounts.
    pub fn total(&self) -> Money {
        self.legs().iter().map(TenderLeg::amount).sum()
    }

    /// True when any leg defers payment to a customer.
    pub fn has_credit(&self) -> bool {
        self.legs().iter().any(|leg| leg.method.is_credit())
    }

    /// True when any leg needs a phone confirmation before commit.
    pub fn needs_async_confirmation(&self) -> bool {
        self.legs()
            .iter()
            .any(|leg| leg.method.requires_async_confirmation())
    }

    /// Checks leg amounts and that the legs cover `total` exactly.
    ///
    /// A full tender whose amount differs from the sale is reported the same
    /// way as a split that does not add up.
    pub fn validate_against(&self, total: Money) -> CoreResult<()> {
        if self.legs().is_empty() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "no payment entered".to_string(),
            });
        }

        for leg in self.legs() {
            validate_payment_amount(leg.amount())?;
            if let Some(reference) = &leg.reference {
                validate_reference(reference)?;
            }
        }

        let tendered = self.total();
        if tendered != total {
            return Err(CoreError::SplitAmountMismatch {
                expected: total,
                tendered,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Customer
// =============================================================================

/// The customer a credit sale is billed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerRef {
    pub id: String,
    pub name: String,
}

impl CustomerRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        CustomerRef {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        validate_identifier("customer id", &self.id)?;
        Ok(())
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// Lifecycle status of a committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Settled sale.
    Completed,
    /// Invoice awaiting payment.
    Pending,
    Cancelled,
    /// Invoice settled after the fact.
    Paid,
    Refunded,
}

impl TransactionStatus {
    /// Whether an administrative update may move `self` to `next`.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Cancelled) | (Pending, Paid) | (Completed, Refunded)
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Ok(TransactionStatus::Completed),
            "pending" => Ok(TransactionStatus::Pending),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            "paid" => Ok(TransactionStatus::Paid),
            "refunded" => Ok(TransactionStatus::Refunded),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown transaction status '{}'", other),
            )),
        }
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// Whether the customer gets a receipt or an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Receipt,
    Invoice,
}

impl DocumentKind {
    /// Credit anywhere in the tender makes the sale an invoice.
    pub fn for_tender(tender: &Tender) -> Self {
        if tender.has_credit() {
            DocumentKind::Invoice
        } else {
            DocumentKind::Receipt
        }
    }

    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "RCP",
            DocumentKind::Invoice => "INV",
        }
    }

    /// Formats a document number such as `RCP-20240315-0007`.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use mauzo_core::transaction::DocumentKind;
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    /// assert_eq!(DocumentKind::Invoice.format_number(day, 12), "INV-20240315-0012");
    /// ```
    pub fn format_number(&self, date: NaiveDate, sequence: u32) -> String {
        format!("{}-{}-{:04}", self.prefix(), date.format("%Y%m%d"), sequence)
    }

    /// The `LIKE` pattern matching every number of this kind on `date`.
    pub fn day_pattern(&self, date: NaiveDate) -> String {
        format!("{}-{}-%", self.prefix(), date.format("%Y%m%d"))
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment line of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
}

impl Payment {
    fn from_leg(leg: &TenderLeg) -> Self {
        Payment {
            id: Uuid::new_v4().to_string(),
            method: leg.method,
            amount_cents: leg.amount_cents,
            reference: leg.reference.clone(),
        }
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Back to the `(method, amount)` tuple the ledger receives.
    pub fn as_leg(&self) -> TenderLeg {
        TenderLeg {
            method: self.method,
            amount_cents: self.amount_cents,
            reference: self.reference.clone(),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A cart line frozen into a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionItem {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// A committed sale.
///
/// Built once by [`Transaction::build`]; afterwards only
/// [`Transaction::apply_status`] changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    /// The shift that was active when the sale was recorded.
    pub shift_id: Option<String>,
    /// `RCP-...` for receipts, `INV-...` for invoices.
    pub receipt_number: String,
    pub items: Vec<TransactionItem>,
    pub payments: Vec<Payment>,
    pub total_cents: i64,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub status: TransactionStatus,
    pub is_invoice: bool,
    /// Amount actually received (non-credit legs for invoices).
    pub paid_amount_cents: Option<i64>,
    /// Reference captured when an invoice is settled.
    pub payment_reference: Option<String>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Runs every pre-commit check and tells which document the sale gets.
    ///
    /// ## Errors
    /// - `EmptyCart`, `CartTooLarge`, `Validation` for a bad cart
    /// - `SplitAmountMismatch` when the tender does not cover the total
    /// - `CreditCustomerRequired` when a credit leg has no customer
    pub fn validate_checkout(
        cart: &Cart,
        tender: &Tender,
        customer: Option<&CustomerRef>,
    ) -> CoreResult<DocumentKind> {
        cart.validate()?;
        tender.validate_against(cart.total())?;

        if tender.has_credit() {
            match customer {
                Some(customer) => customer.validate()?,
                None => return Err(CoreError::CreditCustomerRequired),
            }
        }

        Ok(DocumentKind::for_tender(tender))
    }

    /// Builds the immutable record for a validated checkout.
    pub fn build(
        cart: &Cart,
        tender: &Tender,
        customer: Option<&CustomerRef>,
        shift_id: &str,
        receipt_number: String,
        now: DateTime<Utc>,
    ) -> CoreResult<Transaction> {
        let kind = Self::validate_checkout(cart, tender, customer)?;
        let is_invoice = kind == DocumentKind::Invoice;
        let total = cart.total();

        let paid_amount = if is_invoice {
            tender
                .legs()
                .iter()
                .filter(|leg| !leg.method.is_credit())
                .map(TenderLeg::amount)
                .sum()
        } else {
            total
        };

        let items = cart
            .lines()
            .iter()
            .map(|line| TransactionItem {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                line_total_cents: line.line_total().cents(),
            })
            .collect();

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            shift_id: Some(shift_id.to_string()),
            receipt_number,
            items,
            payments: tender.legs().iter().map(Payment::from_leg).collect(),
            total_cents: total.cents(),
            customer_id: customer.map(|c| c.id.clone()),
            customer_name: customer.map(|c| c.name.clone()),
            status: if is_invoice {
                TransactionStatus::Pending
            } else {
                TransactionStatus::Completed
            },
            is_invoice,
            paid_amount_cents: Some(paid_amount.cents()),
            payment_reference: None,
            timestamp: now,
            updated_at: now,
        })
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn paid_amount(&self) -> Option<Money> {
        self.paid_amount_cents.map(Money::from_cents)
    }

    /// Amount still owed on an invoice.
    pub fn outstanding(&self) -> Money {
        self.total() - self.paid_amount().unwrap_or_default()
    }

    pub fn has_credit(&self) -> bool {
        self.payments.iter().any(|p| p.method.is_credit())
    }

    pub fn document_kind(&self) -> DocumentKind {
        if self.is_invoice {
            DocumentKind::Invoice
        } else {
            DocumentKind::Receipt
        }
    }

    /// The `(method, amount)` legs as posted to shift totals and the ledger.
    pub fn tender_legs(&self) -> Vec<TenderLeg> {
        self.payments.iter().map(Payment::as_leg).collect()
    }

    /// Applies an administrative status change.
    ///
    /// Marking an invoice paid records the full total as received. Shift
    /// totals are not touched here.
    pub fn apply_status(
        &mut self,
        next: TransactionStatus,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                transaction_id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let payment_reference = payment_reference
            .map(|r| validate_reference(&r))
            .transpose()?;

        self.status = next;
        if next == TransactionStatus::Paid {
            self.paid_amount_cents = Some(self.total_cents);
        }
        if payment_reference.is_some() {
            self.payment_reference = payment_reference;
        }
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartLine;

    fn cart_of(total_major: i64) -> Cart {
        let mut cart = Cart::new();
        cart.add_line(
            CartLine::new("p-1", "Unga 2kg", Money::from_major(total_major), 1),
            None,
        )
        .unwrap();
        cart
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_full_tender_must_match_total() {
        let cart = cart_of(500);
        let ok = Tender::full(PaymentMethod::Cash, Money::from_major(500));
        assert_eq!(
            Transaction::validate_checkout(&cart, &ok, None).unwrap(),
            DocumentKind::Receipt
        );

        let short = Tender::full(PaymentMethod::Cash, Money::from_major(499));
        assert!(matches!(
            Transaction::validate_checkout(&cart, &short, None),
            Err(CoreError::SplitAmountMismatch { .. })
        ));
    }

    #[test]
    fn test_split_must_sum_exactly() {
        let cart = cart_of(1000);
        let tender = Tender::Split(vec![
            TenderLeg::new(PaymentMethod::Cash, Money::from_major(400)),
            TenderLeg::new(PaymentMethod::BankTransfer, Money::from_major(550)),
        ]);
        let err = Transaction::validate_checkout(&cart, &tender, None).unwrap_err();
        assert_eq!(
            err,
            CoreError::SplitAmountMismatch {
                expected: Money::from_major(1000),
                tendered: Money::from_major(950),
            }
        );

        let one_cent_off = Tender::Split(vec![
            TenderLeg::new(PaymentMethod::Cash, Money::from_cents(40_001)),
            TenderLeg::new(PaymentMethod::MpesaStk, Money::from_major(600)),
        ]);
        assert!(Transaction::validate_checkout(&cart, &one_cent_off, None).is_err());
    }

    #[test]
    fn test_zero_leg_rejected() {
        let cart = cart_of(100);
        let tender = Tender::Split(vec![
            TenderLeg::new(PaymentMethod::Cash, Money::from_major(100)),
            TenderLeg::new(PaymentMethod::Card, Money::zero()),
        ]);
        assert!(matches!(
            Transaction::validate_checkout(&cart, &tender, None),
            Err(CoreError::Validation(_))
        ));
        assert!(Transaction::validate_checkout(&cart, &Tender::Split(vec![]), None).is_err());
    }

    #[test]
    fn test_credit_requires_customer() {
        let cart = cart_of(2000);
        let tender = Tender::full(PaymentMethod::Credit, Money::from_major(2000));
        assert_eq!(
            Transaction::validate_checkout(&cart, &tender, None),
            Err(CoreError::CreditCustomerRequired)
        );

        let jane = CustomerRef::new("C1", "Jane");
        assert_eq!(
            Transaction::validate_checkout(&cart, &tender, Some(&jane)).unwrap(),
            DocumentKind::Invoice
        );
    }

    #[test]
    fn test_build_receipt() {
        let cart = cart_of(1200);
        let tender = Tender::full(PaymentMethod::Cash, Money::from_major(1200));
        let txn = Transaction::build(&cart, &tender, None, "shift-1", "RCP-1".into(), now())
            .unwrap();

        assert!(!txn.is_invoice);
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert_eq!(txn.paid_amount(), Some(Money::from_major(1200)));
        assert_eq!(txn.shift_id.as_deref(), Some("shift-1"));
        assert_eq!(txn.items[0].line_total_cents, 120_000);
        let paid: Money = txn.payments.iter().map(Payment::amount).sum();
        assert_eq!(paid, txn.total());
    }

    #[test]
    fn test_build_partial_credit_invoice() {
        let cart = cart_of(1000);
        let tender = Tender::Split(vec![
            TenderLeg::new(PaymentMethod::Cash, Money::from_major(300)),
            TenderLeg::new(PaymentMethod::Credit, Money::from_major(700)),
        ]);
        let jane = CustomerRef::new("C1", "Jane");
        let txn = Transaction::build(&cart, &tender, Some(&jane), "s", "INV-1".into(), now())
            .unwrap();

        assert!(txn.is_invoice);
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert_eq!(txn.customer_id.as_deref(), Some("C1"));
        assert_eq!(txn.paid_amount(), Some(Money::from_major(300)));
        assert_eq!(txn.outstanding(), Money::from_major(700));
    }

    #[test]
    fn test_status_transitions() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Paid));
        assert!(Completed.can_transition_to(Refunded));

        assert!(!Completed.can_transition_to(Pending));
        assert!(!Refunded.can_transition_to(Completed));
        assert!(!Paid.can_transition_to(Refunded));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_mark_invoice_paid() {
        let cart = cart_of(2000);
        let tender = Tender::full(PaymentMethod::Credit, Money::from_major(2000));
        let jane = CustomerRef::new("C1", "Jane");
        let mut txn =
            Transaction::build(&cart, &tender, Some(&jane), "s", "INV-1".into(), now()).unwrap();
        assert_eq!(txn.paid_amount(), Some(Money::zero()));

        txn.apply_status(TransactionStatus::Paid, Some("QK7H2L9XPA".into()), now())
            .unwrap();
        assert_eq!(txn.status, TransactionStatus::Paid);
        assert_eq!(txn.paid_amount(), Some(Money::from_major(2000)));
        assert_eq!(txn.payment_reference.as_deref(), Some("QK7H2L9XPA"));

        let err = txn
            .apply_status(TransactionStatus::Refunded, None, now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn test_document_numbers() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            DocumentKind::Receipt.format_number(day, 7),
            "RCP-20240305-0007"
        );
        assert_eq!(DocumentKind::Invoice.day_pattern(day), "INV-20240305-%");
    }

    #[test]
    fn test_generated_reference_shape() {
        let mut leg = TenderLeg::new(PaymentMethod::MpesaTill, Money::from_major(10));
        leg.ensure_reference();
        let reference = leg.reference.unwrap();
        assert_eq!(reference.len(), GENERATED_REFERENCE_LEN);
        assert!(reference.chars().all(|c| c.is_ascii_alphanumeric()));

        let mut cash = TenderLeg::new(PaymentMethod::Cash, Money::from_major(10));
        cash.ensure_reference();
        assert!(cash.reference.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "PAID".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Paid
        );
        assert!("void".parse::<TransactionStatus>().is_err());
    }
}
