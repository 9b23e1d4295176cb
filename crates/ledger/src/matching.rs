//! Advisory transfer matching.
//!
//! Scores pairs of unlinked outflows and inflows on different accounts and
//! keeps the plausible ones. Nothing here writes; accepting a suggestion is a
//! separate, explicit operation.

use serde::{Deserialize, Serialize};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::Transaction;

const EXACT_AMOUNT_SCORE: u8 = 40;
const NEAR_AMOUNT_SCORE: u8 = 25;
const SAME_DAY_SCORE: u8 = 30;
const ONE_DAY_SCORE: u8 = 20;
const IN_WINDOW_SCORE: u8 = 10;
const DESCRIPTION_MAX_SCORE: u8 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub date_window_days: u32,
    pub medium_threshold: u8,
    pub high_threshold: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            date_window_days: 3,
            medium_threshold: 60,
            high_threshold: 85,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferSuggestion {
    pub outflow_id: Uuid,
    pub inflow_id: Uuid,
    pub score: u8,
    pub confidence: MatchConfidence,
}

/// Score of one outflow/inflow pair, or `None` when they cannot be a transfer.
pub fn score_pair(outflow: &Transaction, inflow: &Transaction, config: &MatchingConfig) -> Option<u8> {
    if outflow.account_id == inflow.account_id || outflow.id == inflow.id {
        return None;
    }

    let out_amount = outflow.amount.abs().cents();
    let in_amount = inflow.amount.abs().cents();
    let amount_score = if out_amount == in_amount {
        EXACT_AMOUNT_SCORE
    } else if i128::from((out_amount - in_amount).abs()) * 100
        <= i128::from(out_amount.max(in_amount))
    {
        NEAR_AMOUNT_SCORE
    } else {
        return None;
    };

    let days = (outflow.occurred_on - inflow.occurred_on).num_days().unsigned_abs();
    let date_score = match days {
        0 => SAME_DAY_SCORE,
        1 => ONE_DAY_SCORE,
        d if d <= u64::from(config.date_window_days) => IN_WINDOW_SCORE,
        _ => return None,
    };

    let description_score = match (
        outflow.description.as_deref().and_then(normalize_key),
        inflow.description.as_deref().and_then(normalize_key),
    ) {
        (Some(left), Some(right)) => description_similarity(&left, &right),
        _ => 0,
    };

    Some(amount_score + date_score + description_score)
}

pub fn confidence(score: u8, config: &MatchingConfig) -> Option<MatchConfidence> {
    if score >= config.high_threshold {
        Some(MatchConfidence::High)
    } else if score >= config.medium_threshold {
        Some(MatchConfidence::Medium)
    } else {
        None
    }
}

/// Greedy pairing: best score first, each transaction used at most once.
pub fn suggest(
    outflows: &[Transaction],
    inflows: &[Transaction],
    config: &MatchingConfig,
) -> Vec<TransferSuggestion> {
    let mut scored: Vec<(u8, u64, &Transaction, &Transaction)> = Vec::new();
    for outflow in outflows {
        for inflow in inflows {
            if let Some(score) = score_pair(outflow, inflow, config)
                && confidence(score, config).is_some()
            {
                let days = (outflow.occurred_on - inflow.occurred_on)
                    .num_days()
                    .unsigned_abs();
                scored.push((score, days, outflow, inflow));
            }
        }
    }
    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.id.cmp(&b.2.id))
            .then(a.3.id.cmp(&b.3.id))
    });

    let mut used: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (score, _, outflow, inflow) in scored {
        if used.contains(&outflow.id) || used.contains(&inflow.id) {
            continue;
        }
        let Some(confidence) = confidence(score, config) else {
            continue;
        };
        used.insert(outflow.id);
        used.insert(inflow.id);
        out.push(TransferSuggestion {
            outflow_id: outflow.id,
            inflow_id: inflow.id,
            score,
            confidence,
        });
    }
    out
}

fn description_similarity(left: &str, right: &str) -> u8 {
    let longest = left.chars().count().max(right.chars().count());
    if longest == 0 {
        return 0;
    }
    let distance = levenshtein(left, right).min(longest);
    let scaled = usize::from(DESCRIPTION_MAX_SCORE) * (longest - distance) / longest;
    u8::try_from(scaled).unwrap_or(DESCRIPTION_MAX_SCORE)
}

/// Lowercased, accent-free, punctuation-collapsed form of a description.
pub(crate) fn normalize_key(input: &str) -> Option<String> {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    let normalized = out.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

fn levenshtein(left: &str, right: &str) -> usize {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();

    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut costs: Vec<usize> = (0..=right.len()).collect();

    for (i, left_char) in left.iter().enumerate() {
        let mut last_cost = i;
        costs[0] = i + 1;
        for (j, right_char) in right.iter().enumerate() {
            let next_cost = costs[j + 1];
            let cost = if left_char == right_char {
                last_cost
            } else {
                last_cost + 1
            };
            costs[j + 1] = cost.min(costs[j] + 1).min(next_cost + 1);
            last_cost = next_cost;
        }
    }

    costs[right.len()]
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::{Money, TransactionKind};

    fn tx(
        account_id: Uuid,
        kind: TransactionKind,
        cents: i64,
        day: u32,
        description: Option<&str>,
    ) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            household_id: Uuid::nil(),
            account_id,
            created_by: "alice".to_string(),
            kind,
            amount: Money::new(cents),
            occurred_on: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            description: description.map(ToString::to_string),
            category_id: None,
            merchant_id: None,
            bill_id: None,
            debt_id: None,
            savings_goal_id: None,
            transfer_group_id: None,
            paired_transaction_id: None,
            idempotency_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize_key("  Café -- Épargne!! ").unwrap(), "cafe epargne");
        assert_eq!(normalize_key("***"), None);
    }

    #[test]
    fn identical_same_day_pair_scores_full() {
        let config = MatchingConfig::default();
        let checking = Uuid::new_v4();
        let savings = Uuid::new_v4();
        let out = tx(checking, TransactionKind::Expense, 2550, 10, Some("To savings"));
        let inc = tx(savings, TransactionKind::Income, 2550, 10, Some("to savings"));
        assert_eq!(score_pair(&out, &inc, &config), Some(100));
        assert_eq!(confidence(100, &config), Some(MatchConfidence::High));
    }

    #[test]
    fn amount_and_date_alone_are_medium() {
        let config = MatchingConfig::default();
        let out = tx(Uuid::new_v4(), TransactionKind::Expense, 2550, 10, None);
        let inc = tx(Uuid::new_v4(), TransactionKind::Income, 2550, 11, None);
        assert_eq!(score_pair(&out, &inc, &config), Some(60));
        assert_eq!(confidence(60, &config), Some(MatchConfidence::Medium));
        assert_eq!(confidence(59, &config), None);
    }

    #[test]
    fn implausible_pairs_are_skipped() {
        let config = MatchingConfig::default();
        let account = Uuid::new_v4();
        let out = tx(account, TransactionKind::Expense, 2550, 10, None);
        let same_account = tx(account, TransactionKind::Income, 2550, 10, None);
        assert_eq!(score_pair(&out, &same_account, &config), None);

        let far = tx(Uuid::new_v4(), TransactionKind::Income, 2550, 20, None);
        assert_eq!(score_pair(&out, &far, &config), None);

        let different = tx(Uuid::new_v4(), TransactionKind::Income, 9_999, 10, None);
        assert_eq!(score_pair(&out, &different, &config), None);
    }

    #[test]
    fn greedy_pairing_uses_each_transaction_once() {
        let config = MatchingConfig::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let out = tx(a, TransactionKind::Expense, 1000, 10, Some("move"));
        let best = tx(b, TransactionKind::Income, 1000, 10, Some("move"));
        let second = tx(b, TransactionKind::Income, 1000, 11, Some("move"));

        let suggestions = suggest(&[out.clone()], &[second, best.clone()], &config);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].outflow_id, out.id);
        assert_eq!(suggestions[0].inflow_id, best.id);
    }

    #[test]
    fn levenshtein_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }
}
