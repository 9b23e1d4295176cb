use std::collections::HashMap;

use sea_orm::{QueryFilter, prelude::*, sea_query::Expr};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Account, BalancePlan, EngineError, Money, Projection, ResultEngine, Transaction, accounts,
    balance,
    events::WriteKind,
    guard::{self, MonetaryRow},
    transactions,
};

use super::{Engine, UnitOfWork};

/// An account balance rewritten by `recompute_balances`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceCorrection {
    pub account_id: Uuid,
    pub before: Money,
    pub after: Money,
}

/// `opening_balance + Σ deltas` for every account in `accounts`.
pub(super) fn expected_balances(
    accounts: &[Account],
    transactions: &[Transaction],
) -> ResultEngine<HashMap<Uuid, Money>> {
    let mut expected: HashMap<Uuid, Money> = accounts
        .iter()
        .map(|account| (account.id, account.opening_balance))
        .collect();
    for tx in transactions {
        let Some(balance) = expected.get_mut(&tx.account_id) else {
            continue;
        };
        *balance = balance.checked_add(balance::signed_delta(tx.kind, tx.amount)?)?;
    }
    Ok(expected)
}

impl<'c> UnitOfWork<'c> {
    /// Persists every net balance change of `plan`, one account at a time in
    /// account-id order.
    pub(super) async fn apply_plan(&self, plan: &BalancePlan) -> ResultEngine<()> {
        for (account_id, delta) in plan.net_by_account()? {
            let account = self.account(account_id).await?;
            let projection = balance::apply_delta(&account, delta)?;
            self.write_balance(&account, projection).await?;
        }
        Ok(())
    }

    /// Compare-and-set on the account version. Losing the race is transient:
    /// the whole unit is retried against fresh balances.
    async fn write_balance(&self, account: &Account, projection: Projection) -> ResultEngine<Account> {
        self.checkpoint(accounts::Model::TABLE, WriteKind::Update)?;
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::CurrentBalance,
                Expr::value(projection.current_balance.to_decimal_string()),
            )
            .col_expr(
                accounts::Column::CurrentBalanceCents,
                Expr::value(Some(projection.current_balance.cents())),
            )
            .col_expr(
                accounts::Column::AvailableBalance,
                Expr::value(projection.available_balance.map(Money::to_decimal_string)),
            )
            .col_expr(
                accounts::Column::AvailableBalanceCents,
                Expr::value(projection.available_balance.map(Money::cents)),
            )
            // Rows predating the cents mirror get the remaining mirrors filled here.
            .col_expr(
                accounts::Column::OpeningBalanceCents,
                Expr::value(Some(account.opening_balance.cents())),
            )
            .col_expr(
                accounts::Column::CreditLimitCents,
                Expr::value(account.credit_limit.map(Money::cents)),
            )
            .col_expr(accounts::Column::Version, Expr::value(account.version + 1))
            .filter(accounts::Column::Id.eq(account.id.to_string()))
            .filter(accounts::Column::Version.eq(account.version))
            .exec(self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::Transient(format!(
                "account {} was modified concurrently",
                account.id
            )));
        }

        let model = accounts::Entity::find_by_id(account.id.to_string())
            .one(self.db)
            .await?
            .ok_or_else(|| EngineError::Ownership(format!("account not exists {}", account.id)))?;
        guard::check_row(&model)?;
        Account::try_from(model)
    }

    /// Rewrites balances from `opening_balance` plus the transaction history.
    pub async fn recompute_balances(&self) -> ResultEngine<Vec<BalanceCorrection>> {
        let accounts = self.accounts().await?;
        let history: Vec<Transaction> = transactions::Entity::find()
            .filter(transactions::Column::HouseholdId.eq(self.household_id.to_string()))
            .all(self.db)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<ResultEngine<_>>()?;
        let expected = expected_balances(&accounts, &history)?;

        let mut corrections = Vec::new();
        for account in &accounts {
            let Some(after) = expected.get(&account.id).copied() else {
                continue;
            };
            if after == account.current_balance {
                continue;
            }
            let correction = after.checked_sub(account.current_balance)?;
            let projection = balance::apply_delta(account, correction)?;
            self.write_balance(account, projection).await?;
            corrections.push(BalanceCorrection {
                account_id: account.id,
                before: account.current_balance,
                after,
            });
        }
        Ok(corrections)
    }
}

impl Engine {
    /// Operator repair: recomputes every account balance of a household.
    pub async fn recompute_balances(&self, household_id: Uuid) -> ResultEngine<Vec<BalanceCorrection>> {
        self.execute_maintenance(household_id, |unit| {
            Box::pin(async move { unit.recompute_balances().await })
        })
        .await
    }
}
