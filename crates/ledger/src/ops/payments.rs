//! Bill and debt payment linkage.
//!
//! A payment row is derived from exactly one outflow transaction and updates
//! the remaining balance of its bill or debt in the same unit. Milestones are
//! recorded after the unit commits.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, QueryFilter, QueryOrder, prelude::*};
use tracing::info;
use uuid::Uuid;

use crate::{
    Bill, BillPayment, BillStatus, Debt, DebtPayment, DebtStatus, EngineError, LedgerEvent,
    ResultEngine, Transaction, amortization, bill_payments, bills, debt_milestones,
    debt_payments, debts, transactions,
};

use super::{Engine, UnitOfWork};

fn normalize_key(key: &str) -> ResultEngine<String> {
    let key = key.trim();
    if key.is_empty() {
        return Err(EngineError::Validation(
            "idempotency key must not be empty".to_string(),
        ));
    }
    Ok(key.to_string())
}

fn ensure_outflow(tx: &Transaction, target: &str) -> ResultEngine<()> {
    if !tx.kind.is_outflow() {
        return Err(EngineError::Validation(format!(
            "only outflows can pay a {target}, transaction {} is {}",
            tx.id,
            tx.kind.as_str()
        )));
    }
    Ok(())
}

impl<'c> UnitOfWork<'c> {
    /// Applies `transaction_id` as a payment of `bill_id`.
    ///
    /// Replaying the same key for the same bill and transaction returns the
    /// original payment; any other reuse of the key is a conflict.
    pub async fn apply_bill_payment(
        &self,
        bill_id: Uuid,
        transaction_id: Uuid,
        idempotency_key: &str,
    ) -> ResultEngine<BillPayment> {
        let key = normalize_key(idempotency_key)?;
        if let Some(existing) = self.bill_payment_by_key(&key).await? {
            if existing.bill_id == bill_id && existing.transaction_id == transaction_id {
                return Ok(existing);
            }
            return Err(EngineError::Conflict(format!(
                "idempotency key {key} was used for a different bill payment"
            )));
        }

        self.bill(bill_id).await?;
        let tx = self.transaction(transaction_id).await?;
        if tx.bill_id.is_some_and(|linked| linked != bill_id) || tx.debt_id.is_some() {
            return Err(EngineError::Conflict(format!(
                "transaction {} is linked to another bill or debt",
                tx.id
            )));
        }
        if self.bill_payment_for(tx.id).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "transaction {} already paid its bill under another key",
                tx.id
            )));
        }
        ensure_outflow(&tx, "bill")?;

        let tx = if tx.bill_id.is_none() {
            let linked = Transaction {
                bill_id: Some(bill_id),
                updated_at: Utc::now(),
                ..tx
            };
            Transaction::try_from(
                self.update(transactions::ActiveModel::from(&linked))
                    .await?,
            )?
        } else {
            tx
        };
        self.record_bill_payment(bill_id, &tx, Some(key)).await
    }

    /// Applies `transaction_id` as a payment of `debt_id`, with the same key
    /// semantics as [`UnitOfWork::apply_bill_payment`].
    pub async fn apply_debt_payment(
        &self,
        debt_id: Uuid,
        transaction_id: Uuid,
        idempotency_key: &str,
    ) -> ResultEngine<DebtPayment> {
        let key = normalize_key(idempotency_key)?;
        if let Some(existing) = self.debt_payment_by_key(&key).await? {
            if existing.debt_id == debt_id && existing.transaction_id == transaction_id {
                return Ok(existing);
            }
            return Err(EngineError::Conflict(format!(
                "idempotency key {key} was used for a different debt payment"
            )));
        }

        self.debt(debt_id).await?;
        let tx = self.transaction(transaction_id).await?;
        if tx.debt_id.is_some_and(|linked| linked != debt_id) || tx.bill_id.is_some() {
            return Err(EngineError::Conflict(format!(
                "transaction {} is linked to another bill or debt",
                tx.id
            )));
        }
        if self.debt_payment_for(tx.id).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "transaction {} already paid its debt under another key",
                tx.id
            )));
        }
        ensure_outflow(&tx, "debt")?;

        let tx = if tx.debt_id.is_none() {
            let linked = Transaction {
                debt_id: Some(debt_id),
                updated_at: Utc::now(),
                ..tx
            };
            Transaction::try_from(
                self.update(transactions::ActiveModel::from(&linked))
                    .await?,
            )?
        } else {
            tx
        };
        self.record_debt_payment(debt_id, &tx, Some(key)).await
    }

    pub(super) async fn record_bill_payment(
        &self,
        bill_id: Uuid,
        tx: &Transaction,
        idempotency_key: Option<String>,
    ) -> ResultEngine<BillPayment> {
        ensure_outflow(tx, "bill")?;
        let bill = self.bill(bill_id).await?;
        let split =
            amortization::split_payment(tx.amount, bill.remaining_balance, bill.interest_rate_bps)?;

        let payment = BillPayment {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            bill_id: bill.id,
            transaction_id: tx.id,
            amount: tx.amount,
            principal_amount: split.principal,
            interest_amount: split.interest,
            balance_before_payment: split.balance_before,
            balance_after_payment: split.balance_after,
            idempotency_key: idempotency_key.clone(),
            created_at: Utc::now(),
        };
        let model = match self.insert(bill_payments::ActiveModel::from(&payment)).await {
            Ok(model) => model,
            Err(EngineError::Conflict(detail)) if idempotency_key.is_some() => {
                return Err(EngineError::Transient(detail));
            }
            Err(err) => return Err(err),
        };
        let payment = BillPayment::try_from(model)?;

        let bill = Bill {
            remaining_balance: split.balance_after,
            status: BillStatus::for_remaining(split.balance_after),
            ..bill
        };
        self.update(bills::ActiveModel::from(&bill)).await?;

        self.emit(LedgerEvent::BillPaid {
            bill_id: bill.id,
            payment_id: payment.id,
            remaining_balance: bill.remaining_balance,
        });
        Ok(payment)
    }

    pub(super) async fn record_debt_payment(
        &self,
        debt_id: Uuid,
        tx: &Transaction,
        idempotency_key: Option<String>,
    ) -> ResultEngine<DebtPayment> {
        ensure_outflow(tx, "debt")?;
        let debt = self.debt(debt_id).await?;
        let split =
            amortization::split_payment(tx.amount, debt.remaining_balance, debt.interest_rate_bps)?;

        let payment = DebtPayment {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            debt_id: debt.id,
            transaction_id: tx.id,
            amount: tx.amount,
            principal_amount: split.principal,
            interest_amount: split.interest,
            balance_before_payment: split.balance_before,
            balance_after_payment: split.balance_after,
            idempotency_key: idempotency_key.clone(),
            created_at: Utc::now(),
        };
        let model = match self.insert(debt_payments::ActiveModel::from(&payment)).await {
            Ok(model) => model,
            Err(EngineError::Conflict(detail)) if idempotency_key.is_some() => {
                return Err(EngineError::Transient(detail));
            }
            Err(err) => return Err(err),
        };
        let payment = DebtPayment::try_from(model)?;

        let debt = Debt {
            remaining_balance: split.balance_after,
            status: DebtStatus::for_remaining(split.balance_after),
            ..debt
        };
        self.update(debts::ActiveModel::from(&debt)).await?;

        self.emit(LedgerEvent::DebtPaid {
            debt_id: debt.id,
            payment_id: payment.id,
            remaining_balance: debt.remaining_balance,
        });
        Ok(payment)
    }

    /// Undoes the payment derived from `tx`, if any, restoring the principal
    /// to the bill or debt. Returns the idempotency key the payment carried.
    pub(super) async fn reverse_payments_for(
        &self,
        tx: &Transaction,
    ) -> ResultEngine<Option<String>> {
        let mut key = None;
        if let Some(payment) = self.bill_payment_for(tx.id).await? {
            let bill = self.bill(payment.bill_id).await?;
            let remaining_balance = bill
                .remaining_balance
                .checked_add(payment.principal_amount)?;
            self.delete::<bill_payments::Entity>(payment.id).await?;
            let bill = Bill {
                remaining_balance,
                status: BillStatus::for_remaining(remaining_balance),
                ..bill
            };
            self.update(bills::ActiveModel::from(&bill)).await?;
            self.emit(LedgerEvent::PaymentReversed {
                payment_id: payment.id,
                transaction_id: tx.id,
            });
            key = payment.idempotency_key;
        }
        if let Some(payment) = self.debt_payment_for(tx.id).await? {
            let debt = self.debt(payment.debt_id).await?;
            let remaining_balance = debt
                .remaining_balance
                .checked_add(payment.principal_amount)?;
            self.delete::<debt_payments::Entity>(payment.id).await?;
            let debt = Debt {
                remaining_balance,
                status: DebtStatus::for_remaining(remaining_balance),
                ..debt
            };
            self.update(debts::ActiveModel::from(&debt)).await?;
            self.emit(LedgerEvent::PaymentReversed {
                payment_id: payment.id,
                transaction_id: tx.id,
            });
            key = key.or(payment.idempotency_key);
        }
        Ok(key)
    }

    pub async fn bill_payments(&self, bill_id: Uuid) -> ResultEngine<Vec<BillPayment>> {
        self.bill(bill_id).await?;
        bill_payments::Entity::find()
            .filter(bill_payments::Column::BillId.eq(bill_id.to_string()))
            .order_by_asc(bill_payments::Column::CreatedAt)
            .all(self.db)
            .await?
            .into_iter()
            .map(BillPayment::try_from)
            .collect()
    }

    pub async fn debt_payments(&self, debt_id: Uuid) -> ResultEngine<Vec<DebtPayment>> {
        self.debt(debt_id).await?;
        debt_payments::Entity::find()
            .filter(debt_payments::Column::DebtId.eq(debt_id.to_string()))
            .order_by_asc(debt_payments::Column::CreatedAt)
            .all(self.db)
            .await?
            .into_iter()
            .map(DebtPayment::try_from)
            .collect()
    }

    /// Milestone percentages recorded for a debt, ascending.
    pub async fn debt_milestones(&self, debt_id: Uuid) -> ResultEngine<Vec<u8>> {
        self.debt(debt_id).await?;
        let rows = debt_milestones::Entity::find()
            .filter(debt_milestones::Column::DebtId.eq(debt_id.to_string()))
            .order_by_asc(debt_milestones::Column::Percentage)
            .all(self.db)
            .await?;
        rows.into_iter()
            .map(|row| {
                u8::try_from(row.percentage).map_err(|_| {
                    EngineError::IntegrityViolation(format!(
                        "invalid milestone percentage {} on debt {debt_id}",
                        row.percentage
                    ))
                })
            })
            .collect()
    }

    async fn bill_payment_by_key(&self, key: &str) -> ResultEngine<Option<BillPayment>> {
        bill_payments::Entity::find()
            .filter(bill_payments::Column::HouseholdId.eq(self.household_id.to_string()))
            .filter(bill_payments::Column::IdempotencyKey.eq(key))
            .one(self.db)
            .await?
            .map(BillPayment::try_from)
            .transpose()
    }

    async fn debt_payment_by_key(&self, key: &str) -> ResultEngine<Option<DebtPayment>> {
        debt_payments::Entity::find()
            .filter(debt_payments::Column::HouseholdId.eq(self.household_id.to_string()))
            .filter(debt_payments::Column::IdempotencyKey.eq(key))
            .one(self.db)
            .await?
            .map(DebtPayment::try_from)
            .transpose()
    }

    async fn bill_payment_for(&self, transaction_id: Uuid) -> ResultEngine<Option<BillPayment>> {
        bill_payments::Entity::find()
            .filter(bill_payments::Column::TransactionId.eq(transaction_id.to_string()))
            .one(self.db)
            .await?
            .map(BillPayment::try_from)
            .transpose()
    }

    async fn debt_payment_for(&self, transaction_id: Uuid) -> ResultEngine<Option<DebtPayment>> {
        debt_payments::Entity::find()
            .filter(debt_payments::Column::TransactionId.eq(transaction_id.to_string()))
            .one(self.db)
            .await?
            .map(DebtPayment::try_from)
            .transpose()
    }
}

impl Engine {
    pub async fn apply_bill_payment(
        &self,
        household_id: Uuid,
        user_id: &str,
        bill_id: Uuid,
        transaction_id: Uuid,
        idempotency_key: &str,
    ) -> ResultEngine<BillPayment> {
        let key = idempotency_key.to_string();
        self.execute(household_id, user_id, move |unit| {
            let key = key.clone();
            Box::pin(async move { unit.apply_bill_payment(bill_id, transaction_id, &key).await })
        })
        .await
    }

    pub async fn apply_debt_payment(
        &self,
        household_id: Uuid,
        user_id: &str,
        debt_id: Uuid,
        transaction_id: Uuid,
        idempotency_key: &str,
    ) -> ResultEngine<DebtPayment> {
        let key = idempotency_key.to_string();
        self.execute(household_id, user_id, move |unit| {
            let key = key.clone();
            Box::pin(async move { unit.apply_debt_payment(debt_id, transaction_id, &key).await })
        })
        .await
    }

    pub async fn bill_payments(
        &self,
        household_id: Uuid,
        user_id: &str,
        bill_id: Uuid,
    ) -> ResultEngine<Vec<BillPayment>> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.bill_payments(bill_id).await })
        })
        .await
    }

    pub async fn debt_payments(
        &self,
        household_id: Uuid,
        user_id: &str,
        debt_id: Uuid,
    ) -> ResultEngine<Vec<DebtPayment>> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.debt_payments(debt_id).await })
        })
        .await
    }

    pub async fn debt_milestones(
        &self,
        household_id: Uuid,
        user_id: &str,
        debt_id: Uuid,
    ) -> ResultEngine<Vec<u8>> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.debt_milestones(debt_id).await })
        })
        .await
    }

    /// Records every milestone the debt has reached and not yet recorded.
    /// Runs after the paying unit committed, outside its lock.
    pub(super) async fn record_debt_milestones(
        &self,
        household_id: Uuid,
        debt_id: Uuid,
    ) -> ResultEngine<()> {
        let Some(model) = debts::Entity::find_by_id(debt_id.to_string())
            .filter(debts::Column::HouseholdId.eq(household_id.to_string()))
            .one(&self.database)
            .await?
        else {
            return Ok(());
        };
        let debt = Debt::try_from(model)?;
        let recorded: HashSet<i32> = debt_milestones::Entity::find()
            .filter(debt_milestones::Column::DebtId.eq(debt_id.to_string()))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|row| row.percentage)
            .collect();

        for percentage in debt_milestones::reached(debt.percent_paid()) {
            let percentage = i32::from(percentage);
            if recorded.contains(&percentage) {
                continue;
            }
            let row = debt_milestones::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4().to_string()),
                household_id: ActiveValue::Set(household_id.to_string()),
                debt_id: ActiveValue::Set(debt_id.to_string()),
                percentage: ActiveValue::Set(percentage),
                reached_at: ActiveValue::Set(Utc::now()),
            };
            match row.insert(&self.database).await.map_err(EngineError::from) {
                Ok(_) => info!(%debt_id, percentage, "debt milestone reached"),
                // Recorded concurrently by another commit.
                Err(EngineError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
