//! Integrity guards for decimal/cents mirrored columns and transfer linkage.
//!
//! Every monetary column is stored twice: the legacy decimal text and the
//! canonical `*_cents` integer. [`check_row`] runs after each row write inside
//! a unit of work and aborts the unit on the first problem; [`scan_row`] is the
//! same check in reporting form, used by the batch verifier.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, transactions::Transaction, transfers::Transfer};

/// Maximum allowed distance between `decimal * 100` and the stored cents,
/// expressed in cents. One part in 10^6 of a major unit.
pub const TOLERANCE_CENTS: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// One decimal/cents column pair as persisted on a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoneyPair<'a> {
    pub column: &'static str,
    pub decimal: Option<&'a str>,
    pub cents: Option<i64>,
}

impl<'a> MoneyPair<'a> {
    pub fn new(column: &'static str, decimal: Option<&'a str>, cents: Option<i64>) -> Self {
        Self {
            column,
            decimal,
            cents,
        }
    }
}

/// A persisted row that carries mirrored monetary columns.
pub trait MonetaryRow {
    const TABLE: &'static str;

    fn row_id(&self) -> &str;

    fn money_pairs(&self) -> Vec<MoneyPair<'_>>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum DriftProblem {
    MissingCents,
    MissingDecimal,
    UnparseableDecimal { decimal: String },
    Mismatch { decimal: String, cents: i64 },
}

/// A single column that failed the mirror check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub table: &'static str,
    pub row_id: String,
    pub column: &'static str,
    #[serde(flatten)]
    pub problem: DriftProblem,
}

impl std::fmt::Display for Drift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            table,
            row_id,
            column,
            problem,
        } = self;
        match problem {
            DriftProblem::MissingCents => {
                write!(f, "{table}.{column} of {row_id}: cents mirror missing")
            }
            DriftProblem::MissingDecimal => {
                write!(f, "{table}.{column} of {row_id}: decimal value missing")
            }
            DriftProblem::UnparseableDecimal { decimal } => {
                write!(f, "{table}.{column} of {row_id}: unparseable decimal {decimal:?}")
            }
            DriftProblem::Mismatch { decimal, cents } => write!(
                f,
                "{table}.{column} of {row_id}: decimal {decimal} disagrees with {cents} cents"
            ),
        }
    }
}

/// Checks a single pair. Both sides absent means the optional column is unset.
pub fn check_pair(pair: &MoneyPair<'_>) -> Option<DriftProblem> {
    match (pair.decimal, pair.cents) {
        (None, None) => None,
        (Some(_), None) => Some(DriftProblem::MissingCents),
        (None, Some(_)) => Some(DriftProblem::MissingDecimal),
        (Some(text), Some(cents)) => {
            let Ok(decimal) = Decimal::from_str(text.trim()) else {
                return Some(DriftProblem::UnparseableDecimal {
                    decimal: text.to_string(),
                });
            };
            let Some(expected) = decimal.checked_mul(Decimal::ONE_HUNDRED) else {
                return Some(DriftProblem::UnparseableDecimal {
                    decimal: text.to_string(),
                });
            };
            if (expected - Decimal::from(cents)).abs() > TOLERANCE_CENTS {
                Some(DriftProblem::Mismatch {
                    decimal: text.to_string(),
                    cents,
                })
            } else {
                None
            }
        }
    }
}

pub fn scan_row<R: MonetaryRow>(row: &R) -> Vec<Drift> {
    row.money_pairs()
        .iter()
        .filter_map(|pair| {
            check_pair(pair).map(|problem| Drift {
                table: R::TABLE,
                row_id: row.row_id().to_string(),
                column: pair.column,
                problem,
            })
        })
        .collect()
}

/// Write-time guard: the first drifting column aborts the unit.
pub fn check_row<R: MonetaryRow>(row: &R) -> ResultEngine<()> {
    match scan_row(row).into_iter().next() {
        Some(drift) => Err(EngineError::IntegrityViolation(drift.to_string())),
        None => Ok(()),
    }
}

/// Verifies that a transfer and its two legs point at each other canonically.
pub fn check_transfer_linkage(
    transfer: &Transfer,
    outgoing: &Transaction,
    incoming: &Transaction,
) -> ResultEngine<()> {
    let broken = |what: &str| {
        Err(EngineError::IntegrityViolation(format!(
            "transfer {}: {what}",
            transfer.id
        )))
    };

    if transfer.from_transaction_id != Some(outgoing.id)
        || transfer.to_transaction_id != Some(incoming.id)
    {
        return broken("leg ids do not match the transfer row");
    }
    if outgoing.paired_transaction_id != Some(incoming.id)
        || incoming.paired_transaction_id != Some(outgoing.id)
    {
        return broken("legs are not paired with each other");
    }
    let group: Option<Uuid> = outgoing.transfer_group_id;
    if group.is_none() || group != incoming.transfer_group_id {
        return broken("legs do not share a transfer group");
    }
    if outgoing.account_id != transfer.from_account_id
        || incoming.account_id != transfer.to_account_id
    {
        return broken("leg accounts do not match the transfer row");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        id: String,
        amount: String,
        amount_cents: Option<i64>,
        fees: Option<String>,
        fees_cents: Option<i64>,
    }

    impl MonetaryRow for Row {
        const TABLE: &'static str = "rows";

        fn row_id(&self) -> &str {
            &self.id
        }

        fn money_pairs(&self) -> Vec<MoneyPair<'_>> {
            vec![
                MoneyPair::new("amount", Some(&self.amount), self.amount_cents),
                MoneyPair::new("fees", self.fees.as_deref(), self.fees_cents),
            ]
        }
    }

    fn row(amount: &str, cents: Option<i64>) -> Row {
        Row {
            id: "r1".to_string(),
            amount: amount.to_string(),
            amount_cents: cents,
            fees: None,
            fees_cents: None,
        }
    }

    #[test]
    fn matching_mirrors_pass() {
        assert!(check_row(&row("25.50", Some(2550))).is_ok());
        assert!(check_row(&row("-0.01", Some(-1))).is_ok());
        assert!(check_row(&row("100", Some(10_000))).is_ok());
        assert!(check_row(&row("25.5000001", Some(2550))).is_ok());
    }

    #[test]
    fn unit_confusion_is_rejected() {
        let err = check_row(&row("25.50", Some(25))).unwrap_err();
        assert!(matches!(err, EngineError::IntegrityViolation(_)));

        let drifts = scan_row(&row("25.50", Some(2551)));
        assert_eq!(drifts.len(), 1);
        assert_eq!(
            drifts[0].problem,
            DriftProblem::Mismatch {
                decimal: "25.50".to_string(),
                cents: 2551
            }
        );
    }

    #[test]
    fn half_cent_drift_is_rejected() {
        assert!(check_row(&row("25.505", Some(2551))).is_err());
    }

    #[test]
    fn missing_sides_are_reported() {
        assert_eq!(
            scan_row(&row("1.00", None))[0].problem,
            DriftProblem::MissingCents
        );

        let mut r = row("1.00", Some(100));
        r.fees_cents = Some(5);
        assert_eq!(scan_row(&r)[0].problem, DriftProblem::MissingDecimal);
        assert_eq!(scan_row(&r)[0].column, "fees");
    }

    #[test]
    fn garbage_decimal_is_reported() {
        assert!(matches!(
            scan_row(&row("abc", Some(1)))[0].problem,
            DriftProblem::UnparseableDecimal { .. }
        ));
    }
}
