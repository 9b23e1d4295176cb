use chrono::Utc;
use uuid::Uuid;

use crate::{
    BalancePlan, EngineError, FeePolicy, LedgerEvent, Money, NewTransferCmd, ResultEngine,
    Transaction, TransactionKind, Transfer, TransferPatch, balance,
    guard::check_transfer_linkage,
    splits, transactions, transfers,
    util::normalize_optional_text,
};

use super::{Engine, UnitOfWork};

fn ensure_distinct(from_account_id: Uuid, to_account_id: Uuid) -> ResultEngine<()> {
    if from_account_id == to_account_id {
        return Err(EngineError::Validation(
            "transfer source and destination must differ".to_string(),
        ));
    }
    Ok(())
}

impl<'c> UnitOfWork<'c> {
    /// Creates both legs and the transfer row, and moves the money between
    /// the two accounts.
    pub async fn create_transfer(&self, cmd: NewTransferCmd) -> ResultEngine<Transfer> {
        self.ensure_scope(cmd.household_id)?;
        ensure_distinct(cmd.from_account_id, cmd.to_account_id)?;
        let from = self.account(cmd.from_account_id).await?;
        balance::ensure_active(&from)?;
        let to = self.account(cmd.to_account_id).await?;
        balance::ensure_active(&to)?;

        let fee_policy = cmd.fee_policy.unwrap_or(self.config().fee_policy);
        let (out_amount, in_amount) = fee_policy.leg_amounts(cmd.amount, cmd.fees)?;
        let description = normalize_optional_text(cmd.description.as_deref());

        let now = Utc::now();
        let group = Uuid::new_v4();
        let out_id = Uuid::new_v4();
        let in_id = Uuid::new_v4();
        let leg = |id: Uuid, paired: Uuid, account_id: Uuid, kind, amount| Transaction {
            id,
            household_id: self.household_id,
            account_id,
            created_by: self.user_id.to_string(),
            kind,
            amount,
            occurred_on: cmd.occurred_on,
            description: description.clone(),
            category_id: None,
            merchant_id: None,
            bill_id: None,
            debt_id: None,
            savings_goal_id: None,
            transfer_group_id: Some(group),
            paired_transaction_id: Some(paired),
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        };
        let outgoing = leg(out_id, in_id, from.id, TransactionKind::TransferOut, out_amount);
        let incoming = leg(in_id, out_id, to.id, TransactionKind::TransferIn, in_amount);
        let outgoing = Transaction::try_from(
            self.insert(transactions::ActiveModel::from(&outgoing))
                .await?,
        )?;
        let incoming = Transaction::try_from(
            self.insert(transactions::ActiveModel::from(&incoming))
                .await?,
        )?;

        let transfer = Transfer {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            from_account_id: from.id,
            to_account_id: to.id,
            amount: cmd.amount,
            fees: cmd.fees,
            fee_policy,
            occurred_on: cmd.occurred_on,
            description,
            from_transaction_id: Some(outgoing.id),
            to_transaction_id: Some(incoming.id),
            created_by: self.user_id.to_string(),
            created_at: now,
        };
        let transfer =
            Transfer::try_from(self.insert(transfers::ActiveModel::from(&transfer)).await?)?;

        let mut plan = BalancePlan::new();
        plan.apply(from.id, balance::signed_delta(outgoing.kind, outgoing.amount)?);
        plan.apply(to.id, balance::signed_delta(incoming.kind, incoming.amount)?);
        self.apply_plan(&plan).await?;

        check_transfer_linkage(&transfer, &outgoing, &incoming)?;
        self.emit(LedgerEvent::TransferRecorded {
            transfer_id: transfer.id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
        });
        Ok(transfer)
    }

    /// Rewrites the transfer row and both legs together. Legs of older
    /// transfers gain canonical linkage on their first edit.
    pub async fn update_transfer(
        &self,
        transfer_id: Uuid,
        patch: TransferPatch,
    ) -> ResultEngine<Transfer> {
        let current = self.transfer(transfer_id).await?;
        let (old_out, old_in) = self.transfer_legs(&current).await?;

        let from_account_id = patch.from_account_id.unwrap_or(current.from_account_id);
        let to_account_id = patch.to_account_id.unwrap_or(current.to_account_id);
        ensure_distinct(from_account_id, to_account_id)?;
        if from_account_id != current.from_account_id {
            balance::ensure_active(&self.account(from_account_id).await?)?;
        }
        if to_account_id != current.to_account_id {
            balance::ensure_active(&self.account(to_account_id).await?)?;
        }
        let amount = patch.amount.unwrap_or(current.amount);
        let fees = patch.fees.unwrap_or(current.fees);
        let (out_amount, in_amount) = current.fee_policy.leg_amounts(amount, fees)?;
        let occurred_on = patch.occurred_on.unwrap_or(current.occurred_on);
        let description = match &patch.description {
            Some(description) => normalize_optional_text(description.as_deref()),
            None => current.description.clone(),
        };

        let group = old_out
            .transfer_group_id
            .or(old_in.transfer_group_id)
            .unwrap_or_else(Uuid::new_v4);
        let now = Utc::now();
        let relink = |leg: &Transaction, paired: Uuid, account_id, kind, amount| Transaction {
            account_id,
            kind,
            amount,
            occurred_on,
            description: description.clone(),
            transfer_group_id: Some(group),
            paired_transaction_id: Some(paired),
            updated_at: now,
            ..leg.clone()
        };
        let outgoing = relink(
            &old_out,
            old_in.id,
            from_account_id,
            TransactionKind::TransferOut,
            out_amount,
        );
        let incoming = relink(
            &old_in,
            old_out.id,
            to_account_id,
            TransactionKind::TransferIn,
            in_amount,
        );
        let outgoing = Transaction::try_from(
            self.update(transactions::ActiveModel::from(&outgoing))
                .await?,
        )?;
        let incoming = Transaction::try_from(
            self.update(transactions::ActiveModel::from(&incoming))
                .await?,
        )?;

        let updated = Transfer {
            from_account_id,
            to_account_id,
            amount,
            fees,
            occurred_on,
            description,
            from_transaction_id: Some(outgoing.id),
            to_transaction_id: Some(incoming.id),
            ..current.clone()
        };
        let updated =
            Transfer::try_from(self.update(transfers::ActiveModel::from(&updated)).await?)?;

        let mut plan = BalancePlan::new();
        plan.reverse(
            old_out.account_id,
            balance::signed_delta(old_out.kind, old_out.amount)?,
        );
        plan.reverse(
            old_in.account_id,
            balance::signed_delta(old_in.kind, old_in.amount)?,
        );
        plan.apply(
            outgoing.account_id,
            balance::signed_delta(outgoing.kind, outgoing.amount)?,
        );
        plan.apply(
            incoming.account_id,
            balance::signed_delta(incoming.kind, incoming.amount)?,
        );
        self.apply_plan(&plan).await?;

        check_transfer_linkage(&updated, &outgoing, &incoming)?;
        self.emit(LedgerEvent::TransferUpdated {
            transfer_id: updated.id,
            from_account_id: updated.from_account_id,
            to_account_id: updated.to_account_id,
        });
        Ok(updated)
    }

    /// Deletes the transfer row and both legs and reverses both balance
    /// effects.
    pub async fn delete_transfer(&self, transfer_id: Uuid) -> ResultEngine<()> {
        let transfer = self.transfer(transfer_id).await?;
        let (outgoing, incoming) = self.transfer_legs(&transfer).await?;

        let mut plan = BalancePlan::new();
        for leg in [&outgoing, &incoming] {
            self.reverse_payments_for(leg).await?;
            for split in self.splits_of(leg.id).await? {
                self.delete::<splits::Entity>(split.id).await?;
            }
            plan.reverse(leg.account_id, balance::signed_delta(leg.kind, leg.amount)?);
        }
        self.delete::<transfers::Entity>(transfer.id).await?;
        self.delete::<transactions::Entity>(outgoing.id).await?;
        self.delete::<transactions::Entity>(incoming.id).await?;
        self.apply_plan(&plan).await?;

        self.emit(LedgerEvent::TransferDeleted {
            transfer_id: transfer.id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
        });
        Ok(())
    }

    /// Turns an expense (or income) into the outgoing (or incoming) leg of a
    /// new transfer with `counterpart_account_id` on the other side.
    pub async fn convert_to_transfer(
        &self,
        transaction_id: Uuid,
        counterpart_account_id: Uuid,
    ) -> ResultEngine<Transfer> {
        let tx = self.transaction(transaction_id).await?;
        if self.is_linked(&tx).await? {
            return Err(EngineError::Conflict(format!(
                "transaction {} is already part of a transfer",
                tx.id
            )));
        }
        let (own_kind, sibling_kind) = match tx.kind {
            TransactionKind::Expense => (TransactionKind::TransferOut, TransactionKind::TransferIn),
            TransactionKind::Income => (TransactionKind::TransferIn, TransactionKind::TransferOut),
            other => {
                return Err(EngineError::Validation(format!(
                    "only expenses and income can become transfers, got {}",
                    other.as_str()
                )));
            }
        };
        if tx.bill_id.is_some() || tx.debt_id.is_some() {
            return Err(EngineError::Validation(format!(
                "transaction {} pays a bill or debt and cannot become a transfer",
                tx.id
            )));
        }
        ensure_distinct(tx.account_id, counterpart_account_id)?;
        let counterpart = self.account(counterpart_account_id).await?;
        balance::ensure_active(&counterpart)?;

        let now = Utc::now();
        let group = Uuid::new_v4();
        let sibling_id = Uuid::new_v4();
        for split in self.splits_of(tx.id).await? {
            self.delete::<splits::Entity>(split.id).await?;
        }
        let own = Transaction {
            kind: own_kind,
            category_id: None,
            transfer_group_id: Some(group),
            paired_transaction_id: Some(sibling_id),
            updated_at: now,
            ..tx.clone()
        };
        let sibling = Transaction {
            id: sibling_id,
            account_id: counterpart.id,
            created_by: self.user_id.to_string(),
            kind: sibling_kind,
            merchant_id: None,
            savings_goal_id: None,
            paired_transaction_id: Some(tx.id),
            idempotency_key: None,
            created_at: now,
            ..own.clone()
        };
        let own = Transaction::try_from(self.update(transactions::ActiveModel::from(&own)).await?)?;
        let sibling =
            Transaction::try_from(self.insert(transactions::ActiveModel::from(&sibling)).await?)?;

        let (outgoing, incoming) = if own.kind == TransactionKind::TransferOut {
            (&own, &sibling)
        } else {
            (&sibling, &own)
        };
        let transfer = self
            .insert_transfer_row(outgoing, incoming, own.description.clone())
            .await?;

        // The converted row keeps its balance effect; only the new leg moves money.
        let mut plan = BalancePlan::new();
        plan.apply(
            sibling.account_id,
            balance::signed_delta(sibling.kind, sibling.amount)?,
        );
        self.apply_plan(&plan).await?;

        check_transfer_linkage(&transfer, outgoing, incoming)?;
        self.emit(LedgerEvent::TransferRecorded {
            transfer_id: transfer.id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
        });
        Ok(transfer)
    }

    /// Links an unlinked outflow and inflow into one transfer. Balances are
    /// unchanged: both rows already carry their effect.
    pub async fn accept_transfer_match(
        &self,
        outflow_id: Uuid,
        inflow_id: Uuid,
    ) -> ResultEngine<Transfer> {
        if outflow_id == inflow_id {
            return Err(EngineError::Validation(
                "a transaction cannot be matched with itself".to_string(),
            ));
        }
        let outflow = self.transaction(outflow_id).await?;
        let inflow = self.transaction(inflow_id).await?;
        for tx in [&outflow, &inflow] {
            if self.is_linked(tx).await? {
                return Err(EngineError::Conflict(format!(
                    "transaction {} is already linked to a transfer",
                    tx.id
                )));
            }
        }
        if outflow.kind != TransactionKind::Expense
            || !matches!(inflow.kind, TransactionKind::Income | TransactionKind::Refund)
        {
            return Err(EngineError::Validation(
                "a match pairs an expense with an income or refund".to_string(),
            ));
        }
        if outflow.account_id == inflow.account_id {
            return Err(EngineError::Validation(
                "matched transactions must be on different accounts".to_string(),
            ));
        }
        if outflow.amount != inflow.amount {
            return Err(EngineError::Validation(format!(
                "matched amounts differ: {} vs {}",
                outflow.amount, inflow.amount
            )));
        }
        for tx in [&outflow, &inflow] {
            if tx.bill_id.is_some() || tx.debt_id.is_some() {
                return Err(EngineError::Validation(format!(
                    "transaction {} pays a bill or debt and cannot become a transfer",
                    tx.id
                )));
            }
        }

        let now = Utc::now();
        let group = Uuid::new_v4();
        for tx in [&outflow, &inflow] {
            for split in self.splits_of(tx.id).await? {
                self.delete::<splits::Entity>(split.id).await?;
            }
        }
        let outgoing = Transaction {
            kind: TransactionKind::TransferOut,
            category_id: None,
            transfer_group_id: Some(group),
            paired_transaction_id: Some(inflow.id),
            updated_at: now,
            ..outflow.clone()
        };
        let incoming = Transaction {
            kind: TransactionKind::TransferIn,
            category_id: None,
            transfer_group_id: Some(group),
            paired_transaction_id: Some(outflow.id),
            updated_at: now,
            ..inflow.clone()
        };
        let outgoing =
            Transaction::try_from(self.update(transactions::ActiveModel::from(&outgoing)).await?)?;
        let incoming =
            Transaction::try_from(self.update(transactions::ActiveModel::from(&incoming)).await?)?;
        let description = outgoing
            .description
            .clone()
            .or_else(|| incoming.description.clone());
        let transfer = self
            .insert_transfer_row(&outgoing, &incoming, description)
            .await?;

        check_transfer_linkage(&transfer, &outgoing, &incoming)?;
        self.emit(LedgerEvent::TransferRecorded {
            transfer_id: transfer.id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
        });
        Ok(transfer)
    }

    /// Transfer row for two legs of equal amount, without fees.
    async fn insert_transfer_row(
        &self,
        outgoing: &Transaction,
        incoming: &Transaction,
        description: Option<String>,
    ) -> ResultEngine<Transfer> {
        let transfer = Transfer {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            from_account_id: outgoing.account_id,
            to_account_id: incoming.account_id,
            amount: outgoing.amount,
            fees: None::<Money>,
            fee_policy: FeePolicy::SourcePays,
            occurred_on: outgoing.occurred_on,
            description,
            from_transaction_id: Some(outgoing.id),
            to_transaction_id: Some(incoming.id),
            created_by: self.user_id.to_string(),
            created_at: Utc::now(),
        };
        Transfer::try_from(self.insert(transfers::ActiveModel::from(&transfer)).await?)
    }
}

impl Engine {
    pub async fn create_transfer(&self, cmd: NewTransferCmd) -> ResultEngine<Transfer> {
        let household_id = cmd.household_id;
        let user_id = cmd.user_id.clone();
        self.execute(household_id, &user_id, move |unit| {
            let cmd = cmd.clone();
            Box::pin(async move { unit.create_transfer(cmd).await })
        })
        .await
    }

    pub async fn update_transfer(
        &self,
        household_id: Uuid,
        user_id: &str,
        transfer_id: Uuid,
        patch: TransferPatch,
    ) -> ResultEngine<Transfer> {
        self.execute(household_id, user_id, move |unit| {
            let patch = patch.clone();
            Box::pin(async move { unit.update_transfer(transfer_id, patch).await })
        })
        .await
    }

    pub async fn delete_transfer(
        &self,
        household_id: Uuid,
        user_id: &str,
        transfer_id: Uuid,
    ) -> ResultEngine<()> {
        self.execute(household_id, user_id, move |unit| {
            Box::pin(async move { unit.delete_transfer(transfer_id).await })
        })
        .await
    }

    pub async fn convert_to_transfer(
        &self,
        household_id: Uuid,
        user_id: &str,
        transaction_id: Uuid,
        counterpart_account_id: Uuid,
    ) -> ResultEngine<Transfer> {
        self.execute(household_id, user_id, move |unit| {
            Box::pin(async move {
                unit.convert_to_transfer(transaction_id, counterpart_account_id)
                    .await
            })
        })
        .await
    }

    pub async fn accept_transfer_match(
        &self,
        household_id: Uuid,
        user_id: &str,
        outflow_id: Uuid,
        inflow_id: Uuid,
    ) -> ResultEngine<Transfer> {
        self.execute(household_id, user_id, move |unit| {
            Box::pin(async move { unit.accept_transfer_match(outflow_id, inflow_id).await })
        })
        .await
    }
}
