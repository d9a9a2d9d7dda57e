//! # Money Module
//!
//! Integer money for every amount Stockbook stores: unit prices, line
//! amounts, transaction totals, voucher lines and payments.
//!
//! ## Representation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Money(i64) = minor units (cents)                                       │
//! │                                                                         │
//! │  unit_price_cents × quantity ──► line amount                           │
//! │  Σ line amounts             ──► subtotal                               │
//! │  subtotal × tax bps / 10000 ──► tax (rounded half up)                  │
//! │  subtotal + tax             ──► total                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Floats never enter the calculation path. Multiplication by a quantity is
//! checked because quantities come straight from request bodies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use ts_rs::TS;

use crate::types::TaxRate;

/// A monetary value in minor units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use stockbook_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    ///
    /// ```rust
    /// use stockbook_core::money::Money;
    ///
    /// let amount = Money::from_cents(299).checked_mul_quantity(3);
    /// assert_eq!(amount, Some(Money::from_cents(897)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul_quantity(2), None);
    /// ```
    #[inline]
    pub fn checked_mul_quantity(&self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Money)
    }

    /// Checked addition.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Flat tax on this amount, rounded half up.
    ///
    /// Computed in i128 so large subtotals cannot overflow mid-calculation.
    ///
    /// ```rust
    /// use stockbook_core::money::Money;
    /// use stockbook_core::types::TaxRate;
    ///
    /// // $10.00 at 8.25% = $0.825 → 83 cents
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(tax_cents as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);
        assert_eq!((a + b).cents(), 1250);
        assert_eq!((a - b).cents(), 750);
        assert_eq!((-a).cents(), -1000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 1500);
    }

    #[test]
    fn test_tax_rounding() {
        // 10% of $10.00 is exact
        assert_eq!(
            Money::from_cents(1000)
                .calculate_tax(TaxRate::from_bps(1000))
                .cents(),
            100
        );
        // $0.05 at 10% = 0.5 cent → rounds up to 1
        assert_eq!(
            Money::from_cents(5).calculate_tax(TaxRate::from_bps(1000)).cents(),
            1
        );
        assert!(Money::from_cents(1000)
            .calculate_tax(TaxRate::zero())
            .is_zero());
    }

    #[test]
    fn test_checked_operations() {
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(120).checked_mul_quantity(0),
            Some(Money::zero())
        );
    }
}
