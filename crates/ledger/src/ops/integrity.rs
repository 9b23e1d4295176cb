//! Batch ledger verification for operators.

use std::collections::{BTreeMap, HashMap, HashSet};

use sea_orm::{
    DatabaseConnection, EntityTrait, FromQueryResult, Iterable, PaginatorTrait,
    PrimaryKeyToColumn, QueryOrder,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    Account, Drift, Money, ResultEngine, Transaction, Transfer, accounts, bill_payments, bills,
    debt_payments, debts,
    guard::{self, MonetaryRow},
    splits, transactions, transfers,
};

use super::{Engine, balances::expected_balances};

const PAGE_SIZE: u64 = 500;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub account_id: Uuid,
    pub recorded: Money,
    pub expected: Money,
}

/// Result of [`Engine::verify_ledger_integrity`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub rows_checked: BTreeMap<String, u64>,
    pub drifts: Vec<Drift>,
    /// Transactions carrying transfer linkage with no transfer row or sibling.
    pub orphaned_legs: Vec<Uuid>,
    /// Transfers with a missing leg.
    pub incomplete_transfers: Vec<Uuid>,
    /// Legs linked only through the transfer row.
    pub legs_missing_canonical_linkage: Vec<Uuid>,
    pub balance_mismatches: Vec<BalanceMismatch>,
}

impl IntegrityReport {
    /// No drift, no orphans and balances that match their history. Legs
    /// still waiting for canonical linkage do not count against this.
    pub fn is_consistent(&self) -> bool {
        self.drifts.is_empty()
            && self.orphaned_legs.is_empty()
            && self.incomplete_transfers.is_empty()
            && self.balance_mismatches.is_empty()
    }

    pub fn needs_linkage_backfill(&self) -> bool {
        !self.legs_missing_canonical_linkage.is_empty()
    }
}

/// Scans every row of `E`, recording drifts and returning the models.
async fn scan_table<E>(
    db: &DatabaseConnection,
    report: &mut IntegrityReport,
) -> ResultEngine<Vec<E::Model>>
where
    E: EntityTrait,
    E::Model: MonetaryRow + FromQueryResult + Sized + Send + Sync + 'static,
{
    let mut select = E::find();
    for key in E::PrimaryKey::iter() {
        select = select.order_by_asc(key.into_column());
    }
    let mut pages = select.paginate(db, PAGE_SIZE);
    let mut out = Vec::new();
    while let Some(rows) = pages.fetch_and_next().await? {
        for row in rows {
            report.drifts.extend(guard::scan_row(&row));
            out.push(row);
        }
    }
    report
        .rows_checked
        .insert(<E::Model as MonetaryRow>::TABLE.to_string(), out.len() as u64);
    Ok(out)
}

/// Converts what parses. Rows that do not are already reported as drift.
fn parse_all<M, T>(models: Vec<M>) -> Vec<T>
where
    T: TryFrom<M>,
{
    models
        .into_iter()
        .filter_map(|model| T::try_from(model).ok())
        .collect()
}

fn check_linkage(report: &mut IntegrityReport, transfers: &[Transfer], txs: &[Transaction]) {
    let by_id: HashMap<Uuid, &Transaction> = txs.iter().map(|tx| (tx.id, tx)).collect();
    let mut referenced: HashSet<Uuid> = HashSet::new();

    for transfer in transfers {
        let outgoing = transfer.from_transaction_id.and_then(|id| by_id.get(&id));
        let incoming = transfer.to_transaction_id.and_then(|id| by_id.get(&id));
        referenced.extend(transfer.from_transaction_id);
        referenced.extend(transfer.to_transaction_id);
        let (Some(outgoing), Some(incoming)) = (outgoing, incoming) else {
            report.incomplete_transfers.push(transfer.id);
            continue;
        };
        for leg in [outgoing, incoming] {
            if !leg.has_canonical_linkage() {
                report.legs_missing_canonical_linkage.push(leg.id);
            }
        }
    }

    for tx in txs {
        let linked = tx.kind.is_transfer() || tx.has_canonical_linkage();
        let sibling_missing = tx
            .paired_transaction_id
            .is_some_and(|paired| !by_id.contains_key(&paired));
        if (linked && !referenced.contains(&tx.id)) || sibling_missing {
            report.orphaned_legs.push(tx.id);
        }
    }
}

impl Engine {
    /// Compares decimal and cents mirrors on every monetary table, checks
    /// transfer linkage and recomputes every account balance. Read-only.
    pub async fn verify_ledger_integrity(&self) -> ResultEngine<IntegrityReport> {
        let db = &self.database;
        let mut report = IntegrityReport::default();

        let account_rows = scan_table::<accounts::Entity>(db, &mut report).await?;
        let tx_rows = scan_table::<transactions::Entity>(db, &mut report).await?;
        let transfer_rows = scan_table::<transfers::Entity>(db, &mut report).await?;
        scan_table::<splits::Entity>(db, &mut report).await?;
        scan_table::<bills::Entity>(db, &mut report).await?;
        scan_table::<debts::Entity>(db, &mut report).await?;
        scan_table::<bill_payments::Entity>(db, &mut report).await?;
        scan_table::<debt_payments::Entity>(db, &mut report).await?;

        let accounts: Vec<Account> = parse_all(account_rows);
        let txs: Vec<Transaction> = parse_all(tx_rows);
        let transfers: Vec<Transfer> = parse_all(transfer_rows);
        check_linkage(&mut report, &transfers, &txs);

        let expected = expected_balances(&accounts, &txs)?;
        for account in &accounts {
            if let Some(expected) = expected.get(&account.id).copied()
                && expected != account.current_balance
            {
                report.balance_mismatches.push(BalanceMismatch {
                    account_id: account.id,
                    recorded: account.current_balance,
                    expected,
                });
            }
        }

        if report.is_consistent() {
            info!(tables = report.rows_checked.len(), "ledger integrity verified");
        } else {
            warn!(
                drifts = report.drifts.len(),
                orphaned_legs = report.orphaned_legs.len(),
                incomplete_transfers = report.incomplete_transfers.len(),
                balance_mismatches = report.balance_mismatches.len(),
                "ledger integrity problems found"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::{FeePolicy, TransactionKind};

    fn tx(kind: TransactionKind) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            household_id: Uuid::nil(),
            account_id: Uuid::new_v4(),
            created_by: "alice".to_string(),
            kind,
            amount: Money::new(500),
            occurred_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: None,
            category_id: None,
            merchant_id: None,
            bill_id: None,
            debt_id: None,
            savings_goal_id: None,
            transfer_group_id: None,
            paired_transaction_id: None,
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transfer(from: &Transaction, to: Option<&Transaction>) -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            household_id: Uuid::nil(),
            from_account_id: from.account_id,
            to_account_id: to.map_or_else(Uuid::new_v4, |t| t.account_id),
            amount: from.amount,
            fees: None,
            fee_policy: FeePolicy::SourcePays,
            occurred_on: from.occurred_on,
            description: None,
            from_transaction_id: Some(from.id),
            to_transaction_id: Some(to.map_or_else(Uuid::new_v4, |t| t.id)),
            created_by: "alice".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn legacy_legs_are_reported_but_consistent() {
        let out = tx(TransactionKind::TransferOut);
        let inc = tx(TransactionKind::TransferIn);
        let mut report = IntegrityReport::default();
        check_linkage(&mut report, &[transfer(&out, Some(&inc))], &[out.clone(), inc.clone()]);
        assert!(report.is_consistent());
        assert!(report.needs_linkage_backfill());
        assert_eq!(report.legs_missing_canonical_linkage, vec![out.id, inc.id]);
    }

    #[test]
    fn leg_without_transfer_row_is_orphaned() {
        let mut leg = tx(TransactionKind::Expense);
        leg.transfer_group_id = Some(Uuid::new_v4());
        let mut report = IntegrityReport::default();
        check_linkage(&mut report, &[], &[leg.clone(), tx(TransactionKind::Income)]);
        assert_eq!(report.orphaned_legs, vec![leg.id]);
        assert!(!report.is_consistent());
    }

    #[test]
    fn transfer_missing_a_leg_is_incomplete() {
        let out = tx(TransactionKind::TransferOut);
        let row = transfer(&out, None);
        let mut report = IntegrityReport::default();
        check_linkage(&mut report, std::slice::from_ref(&row), &[out]);
        assert_eq!(report.incomplete_transfers, vec![row.id]);
    }
}
