//! # Payment Vocabulary
//!
//! The sale-facing payment methods and the fixed set of buckets a shift
//! accumulates them into.
//!
//! ## Method → Shift Bucket Mapping
//! ```text
//! ┌──────────────────────┬────────────────────┐
//! │ sale method          │ shift total key    │
//! ├──────────────────────┼────────────────────┤
//! │ cash                 │ cash               │
//! │ mpesa-stk            │ mpesa              │
//! │ mpesa-till           │ mpesaTill          │
//! │ pochi-la-biashara    │ pochiBiashara      │
//! │ card                 │ card               │
//! │ bank-transfer        │ bankTransfer       │
//! │ credit               │ credit             │
//! │ other-custom         │ cash (fallback)    │
//! └──────────────────────┴────────────────────┘
//! ```
//!
//! The mapping is an exhaustive `match`: adding a method without deciding its
//! bucket is a compile error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Payment Method
// =============================================================================

/// How a customer settles (part of) a sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    /// Notes and coins into the drawer.
    Cash,
    /// M-Pesa push payment (STK prompt on the customer's phone).
    MpesaStk,
    /// M-Pesa Buy Goods till number.
    MpesaTill,
    /// M-Pesa Pochi la Biashara.
    PochiLaBiashara,
    /// Card on an external terminal.
    Card,
    /// Direct bank transfer.
    BankTransfer,
    /// Deferred payment by a named customer (invoice).
    Credit,
    /// Any other agreed method; counted with cash.
    OtherCustom,
}

impl PaymentMethod {
    /// Every method, in display order.
    pub const ALL: [PaymentMethod; 8] = [
        PaymentMethod::Cash,
        PaymentMethod::MpesaStk,
        PaymentMethod::MpesaTill,
        PaymentMethod::PochiLaBiashara,
        PaymentMethod::Card,
        PaymentMethod::BankTransfer,
        PaymentMethod::Credit,
        PaymentMethod::OtherCustom,
    ];

    /// The shift bucket this method accumulates into.
    pub const fn shift_total_key(&self) -> ShiftTotalKey {
        match self {
            PaymentMethod::Cash => ShiftTotalKey::Cash,
            PaymentMethod::MpesaStk => ShiftTotalKey::Mpesa,
            PaymentMethod::MpesaTill => ShiftTotalKey::MpesaTill,
            PaymentMethod::PochiLaBiashara => ShiftTotalKey::PochiBiashara,
            PaymentMethod::Card => ShiftTotalKey::Card,
            PaymentMethod::BankTransfer => ShiftTotalKey::BankTransfer,
            PaymentMethod::Credit => ShiftTotalKey::Credit,
            PaymentMethod::OtherCustom => ShiftTotalKey::Cash,
        }
    }

    /// True when the leg must be confirmed by the customer's phone before
    /// the sale can commit.
    pub const fn requires_async_confirmation(&self) -> bool {
        matches!(self, PaymentMethod::MpesaStk)
    }

    /// True for deferred (invoice) payment.
    pub const fn is_credit(&self) -> bool {
        matches!(self, PaymentMethod::Credit)
    }

    /// Wire name (`"mpesa-stk"`, `"bank-transfer"`, ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::MpesaStk => "mpesa-stk",
            PaymentMethod::MpesaTill => "mpesa-till",
            PaymentMethod::PochiLaBiashara => "pochi-la-biashara",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank-transfer",
            PaymentMethod::Credit => "credit",
            PaymentMethod::OtherCustom => "other-custom",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| {
                ValidationError::invalid_format(
                    "payment method",
                    format!("unknown payment method '{}'", s.trim()),
                )
            })
    }
}

// =============================================================================
// Shift Total Key
// =============================================================================

/// The fixed buckets of a shift's running payment totals.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "camelCase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum ShiftTotalKey {
    Mpesa,
    MpesaTill,
    PochiBiashara,
    Card,
    BankTransfer,
    Cash,
    Credit,
}

impl ShiftTotalKey {
    /// Every key, in storage order.
    pub const ALL: [ShiftTotalKey; 7] = [
        ShiftTotalKey::Mpesa,
        ShiftTotalKey::MpesaTill,
        ShiftTotalKey::PochiBiashara,
        ShiftTotalKey::Card,
        ShiftTotalKey::BankTransfer,
        ShiftTotalKey::Cash,
        ShiftTotalKey::Credit,
    ];

    /// Wire name (`"mpesaTill"`, `"bankTransfer"`, ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            ShiftTotalKey::Mpesa => "mpesa",
            ShiftTotalKey::MpesaTill => "mpesaTill",
            ShiftTotalKey::PochiBiashara => "pochiBiashara",
            ShiftTotalKey::Card => "card",
            ShiftTotalKey::BankTransfer => "bankTransfer",
            ShiftTotalKey::Cash => "cash",
            ShiftTotalKey::Credit => "credit",
        }
    }
}

impl fmt::Display for ShiftTotalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftTotalKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShiftTotalKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| {
                ValidationError::invalid_format("shift total key", format!("unknown key '{}'", s))
            })
    }
}

// =============================================================================
// Payment Method Totals
// =============================================================================

/// Running totals per bucket, embedded in a shift.
///
/// A struct with one field per key rather than a map: every key exists from
/// the moment the shift opens and no stray key can appear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodTotals {
    pub mpesa: Money,
    pub mpesa_till: Money,
    pub pochi_biashara: Money,
    pub card: Money,
    pub bank_transfer: Money,
    pub cash: Money,
    pub credit: Money,
}

impl PaymentMethodTotals {
    /// All buckets at zero.
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// Reads one bucket.
    pub fn get(&self, key: ShiftTotalKey) -> Money {
        match key {
            ShiftTotalKey::Mpesa => self.mpesa,
            ShiftTotalKey::MpesaTill => self.mpesa_till,
            ShiftTotalKey::PochiBiashara => self.pochi_biashara,
            ShiftTotalKey::Card => self.card,
            ShiftTotalKey::BankTransfer => self.bank_transfer,
            ShiftTotalKey::Cash => self.cash,
            ShiftTotalKey::Credit => self.credit,
        }
    }

    fn slot_mut(&mut self, key: ShiftTotalKey) -> &mut Money {
        match key {
            ShiftTotalKey::Mpesa => &mut self.mpesa,
            ShiftTotalKey::MpesaTill => &mut self.mpesa_till,
            ShiftTotalKey::PochiBiashara => &mut self.pochi_biashara,
            ShiftTotalKey::Card => &mut self.card,
            ShiftTotalKey::BankTransfer => &mut self.bank_transfer,
            ShiftTotalKey::Cash => &mut self.cash,
            ShiftTotalKey::Credit => &mut self.credit,
        }
    }

    /// Adds `amount` to the bucket `method` maps to.
    pub fn add(&mut self, method: PaymentMethod, amount: Money) {
        *self.slot_mut(method.shift_total_key()) += amount;
    }

    /// Overwrites one bucket (used when loading persisted rows).
    pub fn set(&mut self, key: ShiftTotalKey, amount: Money) {
        *self.slot_mut(key) = amount;
    }

    /// Sum over every bucket.
    pub fn sum(&self) -> Money {
        self.iter().map(|(_, amount)| amount).sum()
    }

    /// `(key, amount)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (ShiftTotalKey, Money)> + '_ {
        ShiftTotalKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_table() {
        let expected = [
            (PaymentMethod::Cash, ShiftTotalKey::Cash),
            (PaymentMethod::MpesaStk, ShiftTotalKey::Mpesa),
            (PaymentMethod::MpesaTill, ShiftTotalKey::MpesaTill),
            (PaymentMethod::PochiLaBiashara, ShiftTotalKey::PochiBiashara),
            (PaymentMethod::Card, ShiftTotalKey::Card),
            (PaymentMethod::BankTransfer, ShiftTotalKey::BankTransfer),
            (PaymentMethod::Credit, ShiftTotalKey::Credit),
            (PaymentMethod::OtherCustom, ShiftTotalKey::Cash),
        ];
        for (method, key) in expected {
            assert_eq!(method.shift_total_key(), key, "{method}");
        }
    }

    #[test]
    fn test_wire_names_round_trip_through_serde() {
        for method in PaymentMethod::ALL {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        let json = serde_json::to_string(&ShiftTotalKey::PochiBiashara).unwrap();
        assert_eq!(json, "\"pochiBiashara\"");
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
        assert_eq!(
            " MPESA-STK ".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::MpesaStk
        );
    }

    #[test]
    fn test_other_custom_lands_in_cash_drawer() {
        assert_eq!(PaymentMethod::OtherCustom.shift_total_key(), ShiftTotalKey::Cash);
        assert_eq!(PaymentMethod::Cash.shift_total_key(), ShiftTotalKey::Cash);
        assert_eq!(PaymentMethod::MpesaTill.shift_total_key(), ShiftTotalKey::MpesaTill);
    }

    #[test]
    fn test_totals_accumulate_and_sum() {
        let mut totals = PaymentMethodTotals::zeroed();
        assert_eq!(totals.sum(), Money::zero());

        totals.add(PaymentMethod::Cash, Money::from_major(400));
        totals.add(PaymentMethod::MpesaStk, Money::from_major(600));
        totals.add(PaymentMethod::OtherCustom, Money::from_major(50));

        assert_eq!(totals.cash, Money::from_major(450));
        assert_eq!(totals.get(ShiftTotalKey::Mpesa), Money::from_major(600));
        assert_eq!(totals.sum(), Money::from_major(1050));
    }

    #[test]
    fn test_totals_serialize_with_fixed_keys() {
        let json = serde_json::to_value(PaymentMethodTotals::zeroed()).unwrap();
        let obj = json.as_object().unwrap();
        for key in ShiftTotalKey::ALL {
            assert!(obj.contains_key(key.as_str()), "missing {key}");
        }
        assert_eq!(obj.len(), 7);
    }
}
