//! Principal/interest split of a single payment.

use serde::Serialize;

use crate::{EngineError, Money, ResultEngine};

/// Basis points in a whole, times twelve months.
const MONTHLY_BPS_DENOMINATOR: i64 = 10_000 * 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentSplit {
    pub principal: Money,
    pub interest: Money,
    pub balance_before: Money,
    pub balance_after: Money,
}

/// Splits `amount` against `remaining` at an annual rate of `rate_bps`.
///
/// Interest for the period is `remaining * rate / 12`, rounded half away from
/// zero and capped at the payment. The rest is principal, capped at the
/// remaining balance; any overpayment beyond that is not applied.
pub fn split_payment(amount: Money, remaining: Money, rate_bps: u32) -> ResultEngine<PaymentSplit> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(
            "payment amount must be > 0".to_string(),
        ));
    }
    let remaining = remaining.max(Money::ZERO);
    let interest = remaining
        .mul_ratio(i64::from(rate_bps), MONTHLY_BPS_DENOMINATOR)?
        .min(amount);
    let principal = amount.checked_sub(interest)?.min(remaining);
    let balance_after = remaining.checked_sub(principal)?;
    Ok(PaymentSplit {
        principal,
        interest,
        balance_before: remaining,
        balance_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_free_payment_is_all_principal() {
        let split = split_payment(Money::new(5_000), Money::new(20_000), 0).unwrap();
        assert_eq!(split.interest, Money::ZERO);
        assert_eq!(split.principal, Money::new(5_000));
        assert_eq!(split.balance_after, Money::new(15_000));
    }

    #[test]
    fn monthly_interest_is_taken_first() {
        // 12% APR on 1000.00 is 10.00 for the month.
        let split = split_payment(Money::new(20_000), Money::new(100_000), 1_200).unwrap();
        assert_eq!(split.interest, Money::new(1_000));
        assert_eq!(split.principal, Money::new(19_000));
        assert_eq!(split.balance_before, Money::new(100_000));
        assert_eq!(split.balance_after, Money::new(81_000));
    }

    #[test]
    fn interest_rounds_half_away_from_zero() {
        // 18.5% of 333.33 / 12 = 5.1388... -> 5.14
        let split = split_payment(Money::new(10_000), Money::new(33_333), 1_850).unwrap();
        assert_eq!(split.interest, Money::new(514));
    }

    #[test]
    fn interest_is_capped_at_payment() {
        let split = split_payment(Money::new(100), Money::new(1_000_000), 2_400).unwrap();
        assert_eq!(split.interest, Money::new(100));
        assert_eq!(split.principal, Money::ZERO);
        assert_eq!(split.balance_after, Money::new(1_000_000));
    }

    #[test]
    fn principal_is_capped_at_remaining() {
        let split = split_payment(Money::new(50_000), Money::new(10_000), 0).unwrap();
        assert_eq!(split.principal, Money::new(10_000));
        assert_eq!(split.balance_after, Money::ZERO);
    }

    #[test]
    fn non_positive_payment_is_rejected() {
        assert!(split_payment(Money::ZERO, Money::new(1), 0).is_err());
    }
}
