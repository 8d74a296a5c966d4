//! Money type with fixed decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal`. Stored amounts carry two
//! fractional digits; per-lesson unit prices carry four.
//!
//! Every rounding in the system goes through [`ROUNDING`] (round half up),
//! so a unit price that is re-multiplied rounds the same way it was divided.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fractional digits for stored money amounts.
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits for per-lesson unit prices.
pub const UNIT_PRICE_SCALE: u32 = 4;

/// Rounding strategy used for every money rounding (round half up).
pub const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// A monetary amount.
///
/// Serialized as a decimal string (e.g. `"3800.00"`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// One cent, the smallest storable difference and the invariant tolerance.
    pub const ROUNDING_UNIT: Self = Self(Decimal::from_parts(1, 0, 0, false, 2));

    /// Wraps a decimal without rounding.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates an amount from integer cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    /// Returns the inner decimal.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Rounds to cents (half up).
    #[must_use]
    pub fn round_cents(self) -> Self {
        Self(self.0.round_dp_with_strategy(MONEY_SCALE, ROUNDING))
    }

    /// Rounds to unit-price precision (half up).
    #[must_use]
    pub fn round_unit(self) -> Self {
        Self(self.0.round_dp_with_strategy(UNIT_PRICE_SCALE, ROUNDING))
    }

    /// Multiplies by a lesson count without rounding.
    #[must_use]
    pub fn mul_lessons(self, lessons: u32) -> Self {
        Self(self.0 * Decimal::from(lessons))
    }

    /// Divides by a lesson count, rounded to unit-price precision.
    ///
    /// Returns `None` when `lessons` is zero.
    #[must_use]
    pub fn div_lessons(self, lessons: u32) -> Option<Self> {
        if lessons == 0 {
            return None;
        }
        Some(Self(self.0 / Decimal::from(lessons)).round_unit())
    }

    /// Computes `self * part / whole` at full precision, rounded once to cents.
    ///
    /// This is the canonical liability of `part` remaining lessons out of
    /// `whole`. Because it is derived from the whole amount rather than from a
    /// rounded unit price, repeated use never accumulates drift, and
    /// `pro_rata(n, n)` is exactly the whole amount rounded to cents.
    ///
    /// Returns `None` when `whole` is zero.
    #[must_use]
    pub fn pro_rata(self, part: u32, whole: u32) -> Option<Self> {
        if whole == 0 {
            return None;
        }
        let scaled = self.0 * Decimal::from(part) / Decimal::from(whole);
        Some(Self(scaled).round_cents())
    }

    /// Returns true when the amount has no fraction of a cent.
    #[must_use]
    pub fn is_whole_cents(self) -> bool {
        self.round_cents() == self
    }

    /// Largest expected gap between `unit_price * lessons` and the
    /// full-precision liability of the same lessons, both rounded to cents.
    ///
    /// One cent for each side's rounding plus half a unit-price step
    /// (`0.00005`) per lesson. Past roughly 200 lessons this exceeds a cent.
    #[must_use]
    pub fn unit_price_tolerance(lessons: u32) -> Self {
        let half_step = Decimal::new(5, UNIT_PRICE_SCALE + 1);
        Self(Decimal::new(2, MONEY_SCALE) + half_step * Decimal::from(lessons))
    }

    /// Returns true when both amounts differ by at most `tolerance`.
    #[must_use]
    pub fn approx_eq(self, other: Self, tolerance: Self) -> bool {
        (self.0 - other.0).abs() <= tolerance.0
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly negative.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns the larger of `self` and zero.
    #[must_use]
    pub fn max_zero(self) -> Self {
        if self.is_negative() { Self::ZERO } else { self }
    }

    /// Multiplies by an arbitrary decimal factor without rounding.
    #[must_use]
    pub fn scale(self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unit_price_exact() {
        let price = Money::new(dec!(4800)).div_lessons(48).unwrap();
        assert_eq!(price.amount(), dec!(100));
    }

    #[test]
    fn test_unit_price_rounds_to_four_places() {
        let price = Money::new(dec!(1000)).div_lessons(3).unwrap();
        assert_eq!(price.amount(), dec!(333.3333));

        let price = Money::new(dec!(2000)).div_lessons(3).unwrap();
        assert_eq!(price.amount(), dec!(666.6667));
    }

    #[test]
    fn test_unit_price_zero_lessons() {
        assert!(Money::new(dec!(100)).div_lessons(0).is_none());
    }

    #[test]
    fn test_round_cents_half_up() {
        assert_eq!(Money::new(dec!(0.005)).round_cents().amount(), dec!(0.01));
        assert_eq!(Money::new(dec!(2.345)).round_cents().amount(), dec!(2.35));
        assert_eq!(Money::new(dec!(2.344)).round_cents().amount(), dec!(2.34));
        assert_eq!(Money::new(dec!(-2.345)).round_cents().amount(), dec!(-2.35));
    }

    #[test]
    fn test_pro_rata() {
        let value = Money::new(dec!(1000));
        assert_eq!(value.pro_rata(1, 3).unwrap().amount(), dec!(333.33));
        assert_eq!(value.pro_rata(2, 3).unwrap().amount(), dec!(666.67));
        assert_eq!(value.pro_rata(3, 3).unwrap(), value);
        assert_eq!(value.pro_rata(0, 3).unwrap(), Money::ZERO);
        assert!(value.pro_rata(1, 0).is_none());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(150);
        let b = Money::from_cents(75);
        assert_eq!((a + b).amount(), dec!(2.25));
        assert_eq!((a - b).amount(), dec!(0.75));
        assert_eq!((-a).amount(), dec!(-1.50));

        let mut c = a;
        c += b;
        c -= Money::from_cents(25);
        assert_eq!(c.amount(), dec!(2.00));
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from_cents(100), Money::from_cents(250), Money::ZERO];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.amount(), dec!(3.50));
        let total: Money = amounts.into_iter().sum();
        assert_eq!(total.amount(), dec!(3.50));
    }

    #[test]
    fn test_sign_helpers() {
        assert!(Money::ZERO.is_zero());
        assert!(Money::from_cents(-1).is_negative());
        assert!(Money::from_cents(1).is_positive());
        assert_eq!(Money::from_cents(-5).max_zero(), Money::ZERO);
        assert_eq!(Money::from_cents(5).max_zero(), Money::from_cents(5));
    }

    #[test]
    fn test_whole_cents() {
        assert!(Money::new(dec!(12.30)).is_whole_cents());
        assert!(Money::new(dec!(12)).is_whole_cents());
        assert!(!Money::new(dec!(0.005)).is_whole_cents());
        assert!(!Money::new(dec!(-3.001)).is_whole_cents());
    }

    #[test]
    fn test_unit_price_tolerance() {
        assert_eq!(Money::unit_price_tolerance(0).amount(), dec!(0.02));
        assert_eq!(Money::unit_price_tolerance(600).amount(), dec!(0.05));

        // 1000 / 600 = 1.6667 per lesson, 2 cents above the exact value
        let unit = Money::new(dec!(1000)).div_lessons(600).unwrap();
        let nominal = unit.mul_lessons(600).round_cents();
        assert_eq!(nominal.amount(), dec!(1000.02));
        assert!(!nominal.approx_eq(Money::new(dec!(1000)), Money::ROUNDING_UNIT));
        assert!(nominal.approx_eq(Money::new(dec!(1000)), Money::unit_price_tolerance(600)));
    }

    #[test]
    fn test_approx_eq() {
        let a = Money::new(dec!(100.00));
        assert!(a.approx_eq(Money::new(dec!(100.01)), Money::ROUNDING_UNIT));
        assert!(!a.approx_eq(Money::new(dec!(100.02)), Money::ROUNDING_UNIT));
    }

    #[test]
    fn test_parse_and_display() {
        let money: Money = " 3600.50 ".parse().unwrap();
        assert_eq!(money.amount(), dec!(3600.50));
        assert_eq!(money.to_string(), "3600.50");
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Money::new(dec!(12.30))).unwrap();
        assert_eq!(json, "\"12.30\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount(), dec!(12.30));
    }

    proptest! {
        /// Consuming a contract lesson by lesson through canonical liabilities
        /// releases exactly the contract value, with no residue left over.
        #[test]
        fn prop_pro_rata_steps_sum_to_whole(
            cents in 1i64..100_000_000,
            lessons in 1u32..200,
        ) {
            let value = Money::from_cents(cents);
            let released: Money = (0..lessons)
                .map(|i| {
                    let before = value.pro_rata(lessons - i, lessons).unwrap();
                    let after = value.pro_rata(lessons - i - 1, lessons).unwrap();
                    before - after
                })
                .sum();
            prop_assert_eq!(released, value);
        }

        /// The canonical liability stays within one cent of unit price times lessons
        /// whenever the unit price is exact at cent precision.
        #[test]
        fn prop_pro_rata_matches_exact_unit_price(
            unit_cents in 1i64..1_000_000,
            lessons in 1u32..200,
            remain_seed in 0u32..200,
        ) {
            let remain = remain_seed % (lessons + 1);
            let unit = Money::from_cents(unit_cents);
            let value = unit.mul_lessons(lessons);
            let liability = value.pro_rata(remain, lessons).unwrap();
            prop_assert_eq!(liability, unit.mul_lessons(remain).round_cents());
        }
    }
}
