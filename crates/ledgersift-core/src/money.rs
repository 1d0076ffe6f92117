//! Exact-decimal monetary values with a currency tag
//!
//! Arithmetic and ordering between two `Money` values require matching
//! currencies; mixing currencies is a hard `CurrencyMismatch` error, never a
//! silent coercion.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// A monetary amount in a specific currency.
///
/// Immutable: every operation returns a new value. Negative amounts are
/// legal (refunds, credits); sign conventions are carried by
/// `TransactionType`, not by `Money` itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount: amount.round_dp(2),
            currency: currency.into(),
        }
    }

    /// Build from minor units (halalas, cents).
    pub fn from_minor(minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency: currency.into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency.clone(),
        }
    }

    /// Add two amounts, failing on currency mismatch.
    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.require_same_currency(other)?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    /// Subtract, failing on currency mismatch.
    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.require_same_currency(other)?;
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency.clone(),
        })
    }

    /// Compare two amounts, failing on currency mismatch.
    pub fn checked_cmp(&self, other: &Money) -> Result<Ordering> {
        self.require_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Lossy conversion for statistical baselines (z-scores, variance).
    /// Exactness only matters for ledger arithmetic, not for outlier math.
    pub fn to_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }

    fn require_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(Error::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

/// Ordering is only defined within one currency; cross-currency comparison
/// yields `None` rather than an arbitrary answer.
impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_same_currency() {
        let a = Money::from_minor(1050, "SAR");
        let b = Money::from_minor(425, "SAR");
        assert_eq!(a.checked_add(&b).unwrap(), Money::from_minor(1475, "SAR"));
    }

    #[test]
    fn add_mismatched_currency_fails() {
        let a = Money::from_minor(1000, "SAR");
        let b = Money::from_minor(1000, "USD");
        assert!(matches!(
            a.checked_add(&b),
            Err(Error::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            a.checked_sub(&b),
            Err(Error::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            a.checked_cmp(&b),
            Err(Error::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn cross_currency_ordering_is_undefined() {
        let a = Money::from_minor(100, "SAR");
        let b = Money::from_minor(200, "USD");
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn from_minor_units() {
        let m = Money::from_minor(5600, "SAR");
        assert_eq!(m, Money::new(Decimal::new(56, 0), "SAR"));
        assert_eq!(m.to_string(), "56.00 SAR");
    }
}
