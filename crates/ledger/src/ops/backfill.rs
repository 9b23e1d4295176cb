//! Operator backfills for rows written before the cents mirror and canonical
//! transfer linkage existed.

use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{
    ConnectionTrait, QueryFilter, TransactionTrait,
    prelude::*,
    sea_query::{Alias, Expr, Order, Query},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine, Transaction, Transfer, guard::check_transfer_linkage,
    transactions, transfers,
};

use super::{Engine, UnitOfWork};

/// A decimal column and its cents mirror.
#[derive(Clone, Copy, Debug)]
struct MoneyColumn {
    table: &'static str,
    decimal: &'static str,
    cents: &'static str,
}

const fn column(table: &'static str, decimal: &'static str, cents: &'static str) -> MoneyColumn {
    MoneyColumn {
        table,
        decimal,
        cents,
    }
}

const MONEY_COLUMNS: &[MoneyColumn] = &[
    column("accounts", "opening_balance", "opening_balance_cents"),
    column("accounts", "current_balance", "current_balance_cents"),
    column("accounts", "available_balance", "available_balance_cents"),
    column("accounts", "credit_limit", "credit_limit_cents"),
    column("transactions", "amount", "amount_cents"),
    column("transaction_splits", "amount", "amount_cents"),
    column("transfers", "amount", "amount_cents"),
    column("transfers", "fees", "fees_cents"),
    column("bills", "amount_due", "amount_due_cents"),
    column("bills", "remaining_balance", "remaining_balance_cents"),
    column("debts", "original_balance", "original_balance_cents"),
    column("debts", "remaining_balance", "remaining_balance_cents"),
    column("debts", "minimum_payment", "minimum_payment_cents"),
    column("bill_payments", "amount", "amount_cents"),
    column("bill_payments", "principal_amount", "principal_amount_cents"),
    column("bill_payments", "interest_amount", "interest_amount_cents"),
    column("bill_payments", "balance_before_payment", "balance_before_payment_cents"),
    column("bill_payments", "balance_after_payment", "balance_after_payment_cents"),
    column("debt_payments", "amount", "amount_cents"),
    column("debt_payments", "principal_amount", "principal_amount_cents"),
    column("debt_payments", "interest_amount", "interest_amount_cents"),
    column("debt_payments", "balance_before_payment", "balance_before_payment_cents"),
    column("debt_payments", "balance_after_payment", "balance_after_payment_cents"),
];

/// A legacy decimal the backfill refused to guess at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnparseableValue {
    pub table: String,
    pub column: String,
    pub row_id: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Cents values written, keyed by `table.column`.
    pub updated: BTreeMap<String, u64>,
    pub unparseable: Vec<UnparseableValue>,
    pub batches: u64,
}

impl BackfillReport {
    pub fn total_updated(&self) -> u64 {
        self.updated.values().sum()
    }
}

impl Engine {
    /// Fills every null `*_cents` column from its legacy decimal, one
    /// database transaction per batch. Values that do not parse are reported
    /// and left null.
    pub async fn backfill_money_cents(&self, batch_size: u64) -> ResultEngine<BackfillReport> {
        if batch_size == 0 {
            return Err(EngineError::Validation(
                "batch size must be > 0".to_string(),
            ));
        }
        let mut report = BackfillReport::default();
        for money_column in MONEY_COLUMNS {
            self.backfill_column(*money_column, batch_size, &mut report)
                .await?;
        }
        if report.unparseable.is_empty() {
            info!(
                updated = report.total_updated(),
                batches = report.batches,
                "money cents backfill finished"
            );
        } else {
            warn!(
                updated = report.total_updated(),
                unparseable = report.unparseable.len(),
                "money cents backfill left unparseable values"
            );
        }
        Ok(report)
    }

    async fn backfill_column(
        &self,
        money_column: MoneyColumn,
        batch_size: u64,
        report: &mut BackfillReport,
    ) -> ResultEngine<()> {
        let MoneyColumn {
            table,
            decimal,
            cents,
        } = money_column;
        let backend = self.database.get_database_backend();
        let key = format!("{table}.{decimal}");
        let mut cursor = String::new();

        loop {
            let select = Query::select()
                .column(Alias::new("id"))
                .column(Alias::new(decimal))
                .from(Alias::new(table))
                .and_where(Expr::col(Alias::new(cents)).is_null())
                .and_where(Expr::col(Alias::new(decimal)).is_not_null())
                .and_where(Expr::col(Alias::new("id")).gt(cursor.clone()))
                .order_by(Alias::new("id"), Order::Asc)
                .limit(batch_size)
                .to_owned();

            let txn = self.database.begin().await?;
            let rows = txn.query_all(backend.build(&select)).await?;
            let fetched = rows.len() as u64;
            let mut updated = 0;
            for row in rows {
                let id: String = row.try_get("", "id")?;
                let value: String = row.try_get("", decimal)?;
                cursor.clone_from(&id);
                let Ok(money) = value.parse::<Money>() else {
                    report.unparseable.push(UnparseableValue {
                        table: table.to_string(),
                        column: decimal.to_string(),
                        row_id: id,
                        value,
                    });
                    continue;
                };
                let update = Query::update()
                    .table(Alias::new(table))
                    .value(Alias::new(cents), money.cents())
                    .and_where(Expr::col(Alias::new("id")).eq(id))
                    .and_where(Expr::col(Alias::new(cents)).is_null())
                    .to_owned();
                updated += txn.execute(backend.build(&update)).await?.rows_affected();
            }
            txn.commit().await?;

            if fetched == 0 {
                break;
            }
            report.batches += 1;
            *report.updated.entry(key.clone()).or_default() += updated;
            if fetched < batch_size {
                break;
            }
        }
        Ok(())
    }

    /// Writes canonical linkage onto transfer legs that are only referenced
    /// by their transfer row. Balances are untouched.
    pub async fn backfill_transfer_linkage(&self, household_id: Uuid) -> ResultEngine<u64> {
        self.execute_maintenance(household_id, |unit| {
            Box::pin(async move { unit.backfill_transfer_linkage().await })
        })
        .await
    }
}

impl<'c> UnitOfWork<'c> {
    pub(super) async fn backfill_transfer_linkage(&self) -> ResultEngine<u64> {
        let rows = transfers::Entity::find()
            .filter(transfers::Column::HouseholdId.eq(self.household_id.to_string()))
            .all(self.db)
            .await?;
        let mut linked = 0;
        for row in rows {
            let transfer = Transfer::try_from(row)?;
            let (outgoing, incoming) = self.transfer_legs(&transfer).await?;
            if check_transfer_linkage(&transfer, &outgoing, &incoming).is_ok() {
                continue;
            }
            let group = outgoing
                .transfer_group_id
                .or(incoming.transfer_group_id)
                .unwrap_or_else(Uuid::new_v4);
            let now = Utc::now();
            let outgoing = Transaction {
                transfer_group_id: Some(group),
                paired_transaction_id: Some(incoming.id),
                updated_at: now,
                ..outgoing
            };
            let incoming = Transaction {
                transfer_group_id: Some(group),
                paired_transaction_id: Some(outgoing.id),
                updated_at: now,
                ..incoming
            };
            let outgoing =
                Transaction::try_from(self.update(transactions::ActiveModel::from(&outgoing)).await?)?;
            let incoming =
                Transaction::try_from(self.update(transactions::ActiveModel::from(&incoming)).await?)?;
            check_transfer_linkage(&transfer, &outgoing, &incoming)?;
            linked += 1;
        }
        Ok(linked)
    }
}
