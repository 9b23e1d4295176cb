//! Account balance projection.
//!
//! Balances are a pure function of applied deltas: `apply_delta` does the
//! arithmetic, persistence belongs to the unit of work. Edits are expressed as
//! `(account, old_delta, new_delta)` entries so the old effect is always
//! reversed before the new one lands.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{Account, EngineError, Money, ResultEngine, TransactionKind};

/// Signed effect of a transaction on its account balance.
pub fn signed_delta(kind: TransactionKind, amount: Money) -> ResultEngine<Money> {
    match kind {
        TransactionKind::Expense | TransactionKind::TransferOut => amount.checked_neg(),
        TransactionKind::Income | TransactionKind::TransferIn | TransactionKind::Refund => {
            Ok(amount)
        }
        TransactionKind::Other => Ok(amount),
    }
}

/// New balances of an account after a delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Projection {
    pub current_balance: Money,
    pub available_balance: Option<Money>,
}

pub fn apply_delta(account: &Account, delta: Money) -> ResultEngine<Projection> {
    let current_balance = account.current_balance.checked_add(delta)?;
    let available_balance = account
        .available_balance
        .map(|available| available.checked_add(delta))
        .transpose()?;
    Ok(Projection {
        current_balance,
        available_balance,
    })
}

/// Balance changes collected while a unit of work computes its row set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalancePlan {
    updates: Vec<(Uuid, Money, Money)>,
}

impl BalancePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `account_id` moves from an old delta to a new one.
    pub fn change(&mut self, account_id: Uuid, old_delta: Money, new_delta: Money) {
        self.updates.push((account_id, old_delta, new_delta));
    }

    pub fn apply(&mut self, account_id: Uuid, delta: Money) {
        self.change(account_id, Money::ZERO, delta);
    }

    pub fn reverse(&mut self, account_id: Uuid, delta: Money) {
        self.change(account_id, delta, Money::ZERO);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Net delta per account, ordered by account id, zero nets dropped.
    pub fn net_by_account(&self) -> ResultEngine<BTreeMap<Uuid, Money>> {
        let mut out: BTreeMap<Uuid, Money> = BTreeMap::new();
        for (account_id, old_delta, new_delta) in &self.updates {
            let step = new_delta.checked_sub(*old_delta)?;
            let entry = out.entry(*account_id).or_default();
            *entry = entry.checked_add(step)?;
        }
        out.retain(|_, delta| !delta.is_zero());
        Ok(out)
    }
}

/// Ensures an account may receive new ledger activity.
pub fn ensure_active(account: &Account) -> ResultEngine<()> {
    if !account.is_active {
        return Err(EngineError::Validation(format!(
            "account {} is deactivated",
            account.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::AccountKind;

    fn account(balance: i64, available: Option<i64>) -> Account {
        Account {
            id: Uuid::new_v4(),
            household_id: Uuid::new_v4(),
            owner_user_id: "alice".to_string(),
            name: "Checking".to_string(),
            kind: AccountKind::Checking,
            opening_balance: Money::new(balance),
            current_balance: Money::new(balance),
            available_balance: available.map(Money::new),
            credit_limit: None,
            version: 0,
            is_active: true,
            last_activity_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sign_convention() {
        let amount = Money::new(1000);
        assert_eq!(
            signed_delta(TransactionKind::Expense, amount).unwrap(),
            Money::new(-1000)
        );
        assert_eq!(
            signed_delta(TransactionKind::TransferOut, amount).unwrap(),
            Money::new(-1000)
        );
        assert_eq!(signed_delta(TransactionKind::Income, amount).unwrap(), amount);
        assert_eq!(signed_delta(TransactionKind::TransferIn, amount).unwrap(), amount);
        assert_eq!(signed_delta(TransactionKind::Refund, amount).unwrap(), amount);
        assert_eq!(
            signed_delta(TransactionKind::Other, Money::new(-250)).unwrap(),
            Money::new(-250)
        );
    }

    #[test]
    fn apply_delta_shifts_available_balance_too() {
        let projected = apply_delta(&account(10_000, Some(9_000)), Money::new(-2_550)).unwrap();
        assert_eq!(projected.current_balance, Money::new(7_450));
        assert_eq!(projected.available_balance, Some(Money::new(6_450)));

        let projected = apply_delta(&account(100, None), Money::new(50)).unwrap();
        assert_eq!(projected.available_balance, None);
    }

    #[test]
    fn apply_delta_reports_overflow() {
        assert!(apply_delta(&account(i64::MAX, None), Money::new(1)).is_err());
    }

    #[test]
    fn edit_reverses_old_delta_before_applying_new() {
        let a = Uuid::new_v4();
        let mut plan = BalancePlan::new();
        plan.change(a, Money::new(-1_000), Money::new(-1_500));
        assert_eq!(plan.net_by_account().unwrap()[&a], Money::new(-500));
    }

    #[test]
    fn moving_a_transaction_between_accounts() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let mut plan = BalancePlan::new();
        plan.reverse(from, Money::new(-1_000));
        plan.apply(to, Money::new(-1_000));
        let net = plan.net_by_account().unwrap();
        assert_eq!(net[&from], Money::new(1_000));
        assert_eq!(net[&to], Money::new(-1_000));
    }

    #[test]
    fn zero_nets_are_dropped() {
        let a = Uuid::new_v4();
        let mut plan = BalancePlan::new();
        plan.apply(a, Money::new(300));
        plan.reverse(a, Money::new(300));
        assert!(plan.net_by_account().unwrap().is_empty());
    }
}
