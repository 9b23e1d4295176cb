use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Signed money amount represented as **integer cents**.
///
/// Every monetary value in the ledger (balances, transaction amounts, split
/// amounts, transfer amounts and fees, credit limits, payment components) is a
/// `Money`. Legacy decimal columns are derived from it, never the other way
/// around.
///
/// # Examples
///
/// ```rust
/// use ledger::Money;
///
/// let amount = Money::new(25_50);
/// assert_eq!(amount.cents(), 2550);
/// assert_eq!(amount.to_string(), "25.50");
/// ```
///
/// Parsing rounds to the nearest cent, halves away from zero:
///
/// ```rust
/// use ledger::Money;
///
/// assert_eq!("10,5".parse::<Money>().unwrap().cents(), 1050);
/// assert_eq!("0.005".parse::<Money>().unwrap().cents(), 1);
/// assert_eq!("-0.005".parse::<Money>().unwrap().cents(), -1);
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Money {
        Money(self.0.abs())
    }

    /// Builds an amount from a decimal value, rounding to the nearest cent
    /// with halves going away from zero (`ROUND(x * 100)`).
    pub fn from_decimal(value: Decimal) -> ResultEngine<Money> {
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| EngineError::Validation("amount too large".to_string()))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents
            .to_i64()
            .map(Money)
            .ok_or_else(|| EngineError::Validation("amount too large".to_string()))
    }

    /// Exact decimal value in major units (scale 2).
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Decimal text stored in the legacy columns, e.g. `"25.50"`.
    #[must_use]
    pub fn to_decimal_string(self) -> String {
        self.to_decimal().to_string()
    }

    pub fn checked_add(self, rhs: Money) -> ResultEngine<Money> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or_else(|| EngineError::Validation("amount overflow".to_string()))
    }

    pub fn checked_sub(self, rhs: Money) -> ResultEngine<Money> {
        self.0
            .checked_sub(rhs.0)
            .map(Money)
            .ok_or_else(|| EngineError::Validation("amount overflow".to_string()))
    }

    pub fn checked_neg(self) -> ResultEngine<Money> {
        self.0
            .checked_neg()
            .map(Money)
            .ok_or_else(|| EngineError::Validation("amount overflow".to_string()))
    }

    /// Multiplies by the rational `numerator / denominator`, rounding half
    /// away from zero. Computed in 128-bit integer space.
    ///
    /// `Money::new(10_000).mul_ratio(1_500, 10_000)` is 15% of 100.00.
    pub fn mul_ratio(self, numerator: i64, denominator: i64) -> ResultEngine<Money> {
        if denominator == 0 {
            return Err(EngineError::Validation(
                "ratio denominator must not be 0".to_string(),
            ));
        }
        let product = i128::from(self.0) * i128::from(numerator);
        let denominator = i128::from(denominator);
        let quotient = product / denominator;
        let remainder = product % denominator;
        let rounded = if remainder.abs() * 2 >= denominator.abs() {
            if (product < 0) != (denominator < 0) {
                quotient - 1
            } else {
                quotient + 1
            }
        } else {
            quotient
        };
        i64::try_from(rounded)
            .map(Money)
            .map_err(|_| EngineError::Validation("amount overflow".to_string()))
    }

    /// Splits into `shares` parts: the first `shares - 1` get `total / shares`
    /// floored, the last one gets everything that is left.
    pub fn split(self, shares: usize) -> ResultEngine<Vec<Money>> {
        if shares == 0 {
            return Err(EngineError::Validation(
                "cannot split into 0 shares".to_string(),
            ));
        }
        let count = i64::try_from(shares)
            .map_err(|_| EngineError::Validation("too many shares".to_string()))?;
        let share = self.0.div_euclid(count);
        let mut out = vec![Money(share); shares - 1];
        let allocated = i128::from(share) * i128::from(count - 1);
        let last = i64::try_from(i128::from(self.0) - allocated)
            .map_err(|_| EngineError::Validation("amount overflow".to_string()))?;
        out.push(Money(last));
        Ok(out)
    }

    /// Weighted allocation with the same remainder policy as [`Money::split`]:
    /// every share but the last is `total * weight / sum(weights)` floored and
    /// the last share takes the remainder.
    pub fn allocate(self, weights: &[u64]) -> ResultEngine<Vec<Money>> {
        if weights.is_empty() {
            return Err(EngineError::Validation(
                "cannot allocate over 0 weights".to_string(),
            ));
        }
        let total_weight: u128 = weights.iter().map(|w| u128::from(*w)).sum();
        if total_weight == 0 {
            return Err(EngineError::Validation(
                "allocation weights must not all be 0".to_string(),
            ));
        }
        let total_weight = i128::try_from(total_weight)
            .map_err(|_| EngineError::Validation("allocation weights too large".to_string()))?;

        let mut out = Vec::with_capacity(weights.len());
        let mut allocated: i128 = 0;
        for weight in &weights[..weights.len() - 1] {
            let share = (i128::from(self.0) * i128::from(*weight)).div_euclid(total_weight);
            allocated += share;
            out.push(
                i64::try_from(share)
                    .map(Money)
                    .map_err(|_| EngineError::Validation("amount overflow".to_string()))?,
            );
        }
        let last = i64::try_from(i128::from(self.0) - allocated)
            .map_err(|_| EngineError::Validation("amount overflow".to_string()))?;
        out.push(Money(last));
        Ok(out)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{units}.{cents:02}")
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    /// Extra fractional digits are rounded, never truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::Validation(format!("invalid amount: {s:?}"));

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EngineError::Validation("empty amount".to_string()));
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped.trim_start())
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped.trim_start())
        } else {
            (false, trimmed)
        };

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let units = parts.next().ok_or_else(invalid)?;
        let fraction = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }
        if units.is_empty() || !units.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if let Some(frac) = fraction
            && !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let normalized = match fraction {
            Some(frac) if !frac.is_empty() => format!("{units}.{frac}"),
            _ => units.to_string(),
        };
        let value = Decimal::from_str(&normalized).map_err(|_| invalid())?;
        let value = if negative { -value } else { value };
        Money::from_decimal(value)
    }
}
