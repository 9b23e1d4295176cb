use chrono::Utc;
use sea_orm::{QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    BalancePlan, EngineError, LedgerEvent, Money, NewTransactionCmd, ResultEngine, Split,
    SplitInput, Transaction, TransactionKind, TransactionPatch, TransferPatch, balance, splits,
    transactions,
    util::{normalize_optional_text, require_positive},
};

use super::{Engine, UnitOfWork};

/// `other` is a signed adjustment; every other kind carries a positive amount.
fn validate_amount(kind: TransactionKind, amount: Money) -> ResultEngine<()> {
    match kind {
        TransactionKind::Other if amount.is_zero() => Err(EngineError::Validation(
            "adjustment amount must not be 0".to_string(),
        )),
        TransactionKind::Other => Ok(()),
        _ => require_positive(amount, "transaction amount"),
    }
}

fn validate_links(bill_id: Option<Uuid>, debt_id: Option<Uuid>) -> ResultEngine<()> {
    if bill_id.is_some() && debt_id.is_some() {
        return Err(EngineError::Validation(
            "a transaction pays either a bill or a debt, not both".to_string(),
        ));
    }
    Ok(())
}

/// Category amounts for `input`, summing exactly to `total`.
fn resolve_splits(input: &SplitInput, total: Money) -> ResultEngine<Vec<(String, Money)>> {
    let resolved = match input {
        SplitInput::Amounts(amounts) => {
            let sum = amounts
                .iter()
                .try_fold(Money::ZERO, |acc, (_, amount)| acc.checked_add(*amount))?;
            if sum != total {
                return Err(EngineError::Validation(format!(
                    "splits sum to {sum}, transaction amount is {total}"
                )));
            }
            amounts.clone()
        }
        SplitInput::Weights(weights) => {
            let raw: Vec<u64> = weights.iter().map(|(_, w)| *w).collect();
            let shares = total.allocate(&raw)?;
            weights
                .iter()
                .zip(shares)
                .map(|((category, _), share)| (category.clone(), share))
                .collect()
        }
    };
    if resolved.is_empty() {
        return Err(EngineError::Validation("splits must not be empty".to_string()));
    }
    let mut out = Vec::with_capacity(resolved.len());
    for (category, amount) in resolved {
        let category = category.trim();
        if category.is_empty() {
            return Err(EngineError::Validation(
                "split category must not be empty".to_string(),
            ));
        }
        out.push((category.to_string(), amount));
    }
    Ok(out)
}

/// Re-divides existing splits over a new total in proportion to their old
/// amounts. Splits that were all zero are shared evenly.
fn reallocate_splits(existing: &[Split], total: Money) -> ResultEngine<Vec<(String, Money)>> {
    let weights: Vec<u64> = existing
        .iter()
        .map(|split| split.amount.cents().unsigned_abs())
        .collect();
    let shares = if weights.iter().all(|w| *w == 0) {
        total.split(existing.len())?
    } else {
        total.allocate(&weights)?
    };
    Ok(existing
        .iter()
        .zip(shares)
        .map(|(split, share)| (split.category_id.clone(), share))
        .collect())
}

impl<'c> UnitOfWork<'c> {
    /// Records a non-transfer transaction, its splits, the balance delta and,
    /// when it references a bill or debt, the payment.
    pub async fn create_transaction(&self, cmd: NewTransactionCmd) -> ResultEngine<Transaction> {
        self.ensure_scope(cmd.household_id)?;
        if cmd.kind.is_transfer() {
            return Err(EngineError::Validation(
                "transfer legs are created with create_transfer".to_string(),
            ));
        }
        validate_amount(cmd.kind, cmd.amount)?;
        validate_links(cmd.bill_id, cmd.debt_id)?;

        let idempotency_key = normalize_optional_text(cmd.idempotency_key.as_deref());
        if let Some(key) = &idempotency_key
            && let Some(existing) = self.transaction_by_key(key).await?
        {
            return Ok(existing);
        }

        let account = self.account(cmd.account_id).await?;
        balance::ensure_active(&account)?;
        if let Some(bill_id) = cmd.bill_id {
            self.bill(bill_id).await?;
        }
        if let Some(debt_id) = cmd.debt_id {
            self.debt(debt_id).await?;
        }
        let split_amounts = cmd
            .splits
            .as_ref()
            .map(|input| resolve_splits(input, cmd.amount))
            .transpose()?;

        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            account_id: account.id,
            created_by: self.user_id.to_string(),
            kind: cmd.kind,
            amount: cmd.amount,
            occurred_on: cmd.occurred_on,
            description: normalize_optional_text(cmd.description.as_deref()),
            category_id: normalize_optional_text(cmd.category_id.as_deref()),
            merchant_id: normalize_optional_text(cmd.merchant_id.as_deref()),
            bill_id: cmd.bill_id,
            debt_id: cmd.debt_id,
            savings_goal_id: normalize_optional_text(cmd.savings_goal_id.as_deref()),
            transfer_group_id: None,
            paired_transaction_id: None,
            idempotency_key: idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        };

        let model = match self.insert(transactions::ActiveModel::from(&tx)).await {
            Ok(model) => model,
            // Another writer stored the same key first; the retry finds it.
            Err(EngineError::Conflict(detail)) if idempotency_key.is_some() => {
                return Err(EngineError::Transient(detail));
            }
            Err(err) => return Err(err),
        };
        let tx = Transaction::try_from(model)?;

        if let Some(amounts) = split_amounts {
            self.insert_splits(tx.id, amounts).await?;
        }

        let mut plan = BalancePlan::new();
        plan.apply(tx.account_id, balance::signed_delta(tx.kind, tx.amount)?);
        self.apply_plan(&plan).await?;

        self.link_payment(&tx, None).await?;

        self.emit(LedgerEvent::TransactionRecorded {
            transaction_id: tx.id,
            account_id: tx.account_id,
        });
        Ok(tx)
    }

    /// Applies `patch`. Transfer legs are edited through their transfer so the
    /// sibling leg and the transfer row follow.
    pub async fn update_transaction(
        &self,
        transaction_id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        let current = self.transaction(transaction_id).await?;
        if let Some(transfer) = self.linked_transfer(&current).await? {
            return self.update_leg(&current, transfer.id, patch).await;
        }

        let kind = patch.kind.unwrap_or(current.kind);
        if kind.is_transfer() {
            return Err(EngineError::Validation(
                "use convert_to_transfer to turn a transaction into a transfer".to_string(),
            ));
        }
        let amount = patch.amount.unwrap_or(current.amount);
        validate_amount(kind, amount)?;
        let bill_id = patch.bill_id.unwrap_or(current.bill_id);
        let debt_id = patch.debt_id.unwrap_or(current.debt_id);
        validate_links(bill_id, debt_id)?;

        let account_id = patch.account_id.unwrap_or(current.account_id);
        if account_id != current.account_id {
            balance::ensure_active(&self.account(account_id).await?)?;
        }
        if let Some(bill_id) = bill_id
            && current.bill_id != Some(bill_id)
        {
            self.bill(bill_id).await?;
        }
        if let Some(debt_id) = debt_id
            && current.debt_id != Some(debt_id)
        {
            self.debt(debt_id).await?;
        }
        let new_splits = patch
            .splits
            .as_ref()
            .map(|input| resolve_splits(input, amount))
            .transpose()?;

        let relink = patch.touches_payment();
        let payment_key = if relink {
            self.reverse_payments_for(&current).await?
        } else {
            None
        };

        let mut updated = current.clone();
        updated.kind = kind;
        updated.amount = amount;
        updated.account_id = account_id;
        updated.bill_id = bill_id;
        updated.debt_id = debt_id;
        if let Some(occurred_on) = patch.occurred_on {
            updated.occurred_on = occurred_on;
        }
        if let Some(description) = &patch.description {
            updated.description = normalize_optional_text(description.as_deref());
        }
        if let Some(category_id) = &patch.category_id {
            updated.category_id = normalize_optional_text(category_id.as_deref());
        }
        updated.updated_at = Utc::now();
        let model = self.update(transactions::ActiveModel::from(&updated)).await?;
        let updated = Transaction::try_from(model)?;

        let mut plan = BalancePlan::new();
        let old_delta = balance::signed_delta(current.kind, current.amount)?;
        let new_delta = balance::signed_delta(updated.kind, updated.amount)?;
        if current.account_id == updated.account_id {
            plan.change(updated.account_id, old_delta, new_delta);
        } else {
            plan.reverse(current.account_id, old_delta);
            plan.apply(updated.account_id, new_delta);
        }
        self.apply_plan(&plan).await?;

        if let Some(amounts) = new_splits {
            self.replace_splits(updated.id, amounts).await?;
        } else if updated.amount != current.amount {
            let existing = self.splits_of(updated.id).await?;
            if !existing.is_empty() {
                let amounts = reallocate_splits(&existing, updated.amount)?;
                self.replace_splits(updated.id, amounts).await?;
            }
        }

        if relink {
            self.link_payment(&updated, payment_key).await?;
        }

        self.emit(LedgerEvent::TransactionUpdated {
            transaction_id: updated.id,
            account_id: updated.account_id,
        });
        Ok(updated)
    }

    /// Deletes a transaction after reversing its balance effect. Deleting a
    /// transfer leg deletes the whole transfer.
    pub async fn delete_transaction(&self, transaction_id: Uuid) -> ResultEngine<()> {
        let current = self.transaction(transaction_id).await?;
        if let Some(transfer) = self.linked_transfer(&current).await? {
            return self.delete_transfer(transfer.id).await;
        }

        self.reverse_payments_for(&current).await?;
        for split in self.splits_of(current.id).await? {
            self.delete::<splits::Entity>(split.id).await?;
        }
        self.delete::<transactions::Entity>(current.id).await?;

        let mut plan = BalancePlan::new();
        plan.reverse(
            current.account_id,
            balance::signed_delta(current.kind, current.amount)?,
        );
        self.apply_plan(&plan).await?;

        self.emit(LedgerEvent::TransactionDeleted {
            transaction_id: current.id,
            account_id: current.account_id,
        });
        Ok(())
    }

    /// Maps a leg-level patch onto its transfer. The amount of a leg patch is
    /// the transfer amount before fees.
    async fn update_leg(
        &self,
        leg: &Transaction,
        transfer_id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        if patch.kind.is_some_and(|kind| kind != leg.kind)
            || patch.bill_id.is_some()
            || patch.debt_id.is_some()
            || patch.splits.is_some()
        {
            return Err(EngineError::Validation(
                "kind, payment links and splits of a transfer leg cannot be edited".to_string(),
            ));
        }
        let transfer = self.transfer(transfer_id).await?;
        let is_outgoing = transfer.from_transaction_id == Some(leg.id);

        let mut transfer_patch = TransferPatch {
            amount: patch.amount,
            fees: None,
            from_account_id: None,
            to_account_id: None,
            occurred_on: patch.occurred_on,
            description: patch.description.clone(),
        };
        if let Some(account_id) = patch.account_id {
            if is_outgoing {
                transfer_patch.from_account_id = Some(account_id);
            } else {
                transfer_patch.to_account_id = Some(account_id);
            }
        }
        self.update_transfer(transfer_id, transfer_patch).await?;

        let mut refreshed = self.transaction(leg.id).await?;
        if let Some(category_id) = &patch.category_id {
            refreshed.category_id = normalize_optional_text(category_id.as_deref());
            refreshed.updated_at = Utc::now();
            let model = self
                .update(transactions::ActiveModel::from(&refreshed))
                .await?;
            refreshed = Transaction::try_from(model)?;
        }
        Ok(refreshed)
    }

    async fn transaction_by_key(&self, key: &str) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::HouseholdId.eq(self.household_id.to_string()))
            .filter(transactions::Column::CreatedBy.eq(self.user_id))
            .filter(transactions::Column::IdempotencyKey.eq(key))
            .one(self.db)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn insert_splits(
        &self,
        transaction_id: Uuid,
        amounts: Vec<(String, Money)>,
    ) -> ResultEngine<Vec<Split>> {
        let mut out = Vec::with_capacity(amounts.len());
        for (category_id, amount) in amounts {
            let split = Split {
                id: Uuid::new_v4(),
                transaction_id,
                category_id,
                amount,
                note: None,
            };
            let model = self.insert(splits::ActiveModel::from(&split)).await?;
            out.push(Split::try_from(model)?);
        }
        Ok(out)
    }

    async fn replace_splits(
        &self,
        transaction_id: Uuid,
        amounts: Vec<(String, Money)>,
    ) -> ResultEngine<Vec<Split>> {
        for split in self.splits_of(transaction_id).await? {
            self.delete::<splits::Entity>(split.id).await?;
        }
        self.insert_splits(transaction_id, amounts).await
    }

    /// Runs bill or debt linkage for a freshly written transaction.
    async fn link_payment(&self, tx: &Transaction, key: Option<String>) -> ResultEngine<()> {
        if let Some(bill_id) = tx.bill_id {
            self.record_bill_payment(bill_id, tx, key).await?;
        } else if let Some(debt_id) = tx.debt_id {
            self.record_debt_payment(debt_id, tx, key).await?;
        }
        Ok(())
    }
}

impl Engine {
    pub async fn create_transaction(&self, cmd: NewTransactionCmd) -> ResultEngine<Transaction> {
        let household_id = cmd.household_id;
        let user_id = cmd.user_id.clone();
        self.execute(household_id, &user_id, move |unit| {
            let cmd = cmd.clone();
            Box::pin(async move { unit.create_transaction(cmd).await })
        })
        .await
    }

    pub async fn update_transaction(
        &self,
        household_id: Uuid,
        user_id: &str,
        transaction_id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        self.execute(household_id, user_id, move |unit| {
            let patch = patch.clone();
            Box::pin(async move { unit.update_transaction(transaction_id, patch).await })
        })
        .await
    }

    pub async fn delete_transaction(
        &self,
        household_id: Uuid,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<()> {
        self.execute(household_id, user_id, move |unit| {
            Box::pin(async move { unit.delete_transaction(transaction_id).await })
        })
        .await
    }
}
