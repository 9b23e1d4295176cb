mod common;

use chrono::Utc;
use common::{OWNER, cents, day, fixture};
use ledger::{
    DriftProblem, EngineError, ErrorKind, LinkageSource, NewBillCmd, NewTransactionCmd,
    NewTransferCmd, TransactionKind, TransactionPatch,
};
use sea_orm::Value;
use uuid::Uuid;

#[tokio::test]
async fn drift_aborts_the_next_write_and_shows_in_verification() {
    let fx = fixture().await;
    fx.exec(
        "UPDATE accounts SET opening_balance = ? WHERE id = ?",
        vec!["1.00".into(), fx.checking.id.to_string().into()],
    )
    .await;

    let err = fx
        .engine
        .create_transaction(NewTransactionCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            TransactionKind::Expense,
            cents(500),
            day(1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IntegrityViolation(_)), "{err}");
    assert_eq!(fx.count("transactions").await, 0);
    assert_eq!(fx.balance(fx.checking.id).await, cents(100_000));

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert!(!report.is_consistent());
    assert_eq!(report.drifts.len(), 1);
    let drift = &report.drifts[0];
    assert_eq!(drift.table, "accounts");
    assert_eq!(drift.column, "opening_balance");
    assert_eq!(drift.row_id, fx.checking.id.to_string());
    assert!(matches!(drift.problem, DriftProblem::Mismatch { cents: 100_000, .. }));
}

#[tokio::test]
async fn recompute_repairs_a_balance_that_disagrees_with_history() {
    let fx = fixture().await;
    fx.engine
        .create_transaction(NewTransactionCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            TransactionKind::Expense,
            cents(2_500),
            day(1),
        ))
        .await
        .unwrap();
    fx.exec(
        "UPDATE accounts SET current_balance = ?, current_balance_cents = ? WHERE id = ?",
        vec![
            "5.00".into(),
            500_i64.into(),
            fx.checking.id.to_string().into(),
        ],
    )
    .await;

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert_eq!(report.balance_mismatches.len(), 1);
    assert_eq!(report.balance_mismatches[0].expected, cents(97_500));
    assert_eq!(report.balance_mismatches[0].recorded, cents(500));

    let corrections = fx.engine.recompute_balances(fx.household_id).await.unwrap();
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0].account_id, fx.checking.id);
    assert_eq!(corrections[0].after, cents(97_500));
    assert_eq!(fx.balance(fx.checking.id).await, cents(97_500));

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert!(report.is_consistent(), "{report:?}");
    assert!(
        fx.engine
            .recompute_balances(fx.household_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn cents_backfill_fills_legacy_rows_and_reports_garbage() {
    let fx = fixture().await;
    let tx = fx
        .engine
        .create_transaction(NewTransactionCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            TransactionKind::Expense,
            cents(1_999),
            day(1),
        ))
        .await
        .unwrap();
    let bill = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Power", cents(4_000)))
        .await
        .unwrap();
    fx.exec(
        "UPDATE transactions SET amount_cents = NULL WHERE id = ?",
        vec![tx.id.to_string().into()],
    )
    .await;
    fx.exec(
        "UPDATE accounts SET current_balance_cents = NULL WHERE id = ?",
        vec![fx.checking.id.to_string().into()],
    )
    .await;
    fx.exec(
        "UPDATE bills SET amount_due = ?, amount_due_cents = NULL WHERE id = ?",
        vec!["forty".into(), bill.id.to_string().into()],
    )
    .await;

    let before = fx.engine.verify_ledger_integrity().await.unwrap();
    assert_eq!(before.drifts.len(), 3);
    assert!(
        before
            .drifts
            .iter()
            .all(|drift| drift.problem == DriftProblem::MissingCents)
    );

    let err = fx.engine.backfill_money_cents(0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let report = fx.engine.backfill_money_cents(1).await.unwrap();
    assert_eq!(report.total_updated(), 2);
    assert_eq!(report.updated.get("transactions.amount"), Some(&1));
    assert_eq!(report.updated.get("accounts.current_balance"), Some(&1));
    assert_eq!(report.unparseable.len(), 1);
    assert_eq!(report.unparseable[0].table, "bills");
    assert_eq!(report.unparseable[0].value, "forty");

    let after = fx.engine.verify_ledger_integrity().await.unwrap();
    assert_eq!(after.drifts.len(), 1);
    assert_eq!(after.drifts[0].table, "bills");
    assert_eq!(fx.balance(fx.checking.id).await, cents(98_001));

    let again = fx.engine.backfill_money_cents(100).await.unwrap();
    assert_eq!(again.total_updated(), 0);
}

#[tokio::test]
async fn oversized_legacy_decimals_are_reported_not_parsed() {
    let fx = fixture().await;
    fx.exec(
        "UPDATE accounts SET credit_limit = ?, credit_limit_cents = NULL WHERE id = ?",
        vec![
            "10000000000000000000000000000".into(),
            fx.checking.id.to_string().into(),
        ],
    )
    .await;

    let report = fx.engine.backfill_money_cents(100).await.unwrap();
    assert_eq!(report.total_updated(), 0);
    assert_eq!(report.unparseable.len(), 1);
    assert_eq!(report.unparseable[0].table, "accounts");
    assert_eq!(report.unparseable[0].column, "credit_limit");
    assert_eq!(report.unparseable[0].row_id, fx.checking.id.to_string());

    let verified = fx.engine.verify_ledger_integrity().await.unwrap();
    assert_eq!(verified.drifts.len(), 1);
    assert_eq!(verified.drifts[0].column, "credit_limit");
    assert_eq!(verified.drifts[0].problem, DriftProblem::MissingCents);
}

#[tokio::test]
async fn legs_linked_only_by_the_transfer_row_resolve_and_backfill() {
    let fx = fixture().await;
    let transfer = fx
        .engine
        .create_transfer(NewTransferCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            fx.savings.id,
            cents(700),
            day(1),
        ))
        .await
        .unwrap();
    fx.exec(
        "UPDATE transactions SET transfer_group_id = NULL, paired_transaction_id = NULL",
        vec![],
    )
    .await;

    let out_id = transfer.from_transaction_id.unwrap();
    let side = fx
        .engine
        .query(fx.household_id, OWNER, move |unit| {
            Box::pin(async move {
                let tx = unit.transaction(out_id).await?;
                unit.resolve_transfer_side(&tx).await
            })
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(side.source, LinkageSource::TransferRecord);
    assert_eq!(side.counterpart_account_id, fx.savings.id);
    assert_eq!(side.transfer_id, Some(transfer.id));

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert!(report.is_consistent(), "{report:?}");
    assert!(report.needs_linkage_backfill());
    assert_eq!(report.legs_missing_canonical_linkage.len(), 2);

    let linked = fx
        .engine
        .backfill_transfer_linkage(fx.household_id)
        .await
        .unwrap();
    assert_eq!(linked, 1);
    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert!(!report.needs_linkage_backfill());

    let outgoing = fx
        .engine
        .transaction(fx.household_id, OWNER, out_id)
        .await
        .unwrap();
    assert_eq!(outgoing.paired_transaction_id, transfer.to_transaction_id);
    assert_eq!(fx.balance(fx.checking.id).await, cents(99_300));
}

#[tokio::test]
async fn editing_a_leg_linked_only_by_the_transfer_row_writes_canonical_linkage() {
    let fx = fixture().await;
    let transfer = fx
        .engine
        .create_transfer(NewTransferCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            fx.savings.id,
            cents(700),
            day(1),
        ))
        .await
        .unwrap();
    fx.exec(
        "UPDATE transactions SET transfer_group_id = NULL, paired_transaction_id = NULL",
        vec![],
    )
    .await;
    let out_id = transfer.from_transaction_id.unwrap();
    let in_id = transfer.to_transaction_id.unwrap();

    let incoming = fx
        .engine
        .update_transaction(
            fx.household_id,
            OWNER,
            in_id,
            TransactionPatch::new().amount(cents(900)),
        )
        .await
        .unwrap();
    assert_eq!(incoming.amount, cents(900));
    assert_eq!(incoming.paired_transaction_id, Some(out_id));
    assert!(incoming.transfer_group_id.is_some());

    let outgoing = fx
        .engine
        .transaction(fx.household_id, OWNER, out_id)
        .await
        .unwrap();
    assert_eq!(outgoing.amount, cents(900));
    assert_eq!(outgoing.paired_transaction_id, Some(in_id));
    assert_eq!(outgoing.transfer_group_id, incoming.transfer_group_id);

    let row = fx
        .engine
        .transfer(fx.household_id, OWNER, transfer.id)
        .await
        .unwrap();
    assert_eq!(row.amount, cents(900));
    assert_eq!(row.from_transaction_id, Some(out_id));
    assert_eq!(row.to_transaction_id, Some(in_id));
    assert_eq!(fx.balance(fx.checking.id).await, cents(99_100));
    assert_eq!(fx.balance(fx.savings.id).await, cents(900));

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert!(report.is_consistent(), "{report:?}");
    assert!(!report.needs_linkage_backfill());
}

#[tokio::test]
async fn merchant_only_legs_are_readable_but_not_editable() {
    let fx = fixture().await;
    let leg_id = Uuid::new_v4();
    let now = Utc::now();
    fx.exec(
        "INSERT INTO transactions \
         (id, household_id, account_id, created_by, kind, amount, amount_cents, occurred_on, \
          merchant_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            leg_id.to_string().into(),
            fx.household_id.to_string().into(),
            fx.checking.id.to_string().into(),
            OWNER.into(),
            "transfer_out".into(),
            "12.00".into(),
            1_200_i64.into(),
            Value::from(day(1)),
            fx.savings.id.to_string().into(),
            Value::from(now),
            Value::from(now),
        ],
    )
    .await;

    let side = fx
        .engine
        .query(fx.household_id, OWNER, move |unit| {
            Box::pin(async move {
                let tx = unit.transaction(leg_id).await?;
                unit.resolve_transfer_side(&tx).await
            })
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(side.source, LinkageSource::LegacyMerchant);
    assert_eq!(side.counterpart_account_id, fx.savings.id);
    assert_eq!(side.transfer_id, None);

    let err = fx
        .engine
        .delete_transaction(fx.household_id, OWNER, leg_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    assert_eq!(fx.count("transactions").await, 1);

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert_eq!(report.orphaned_legs, vec![leg_id]);
}

#[tokio::test]
async fn transfer_with_a_missing_leg_is_reported() {
    let fx = fixture().await;
    let transfer = fx
        .engine
        .create_transfer(NewTransferCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            fx.savings.id,
            cents(300),
            day(1),
        ))
        .await
        .unwrap();
    fx.exec(
        "DELETE FROM transactions WHERE id = ?",
        vec![transfer.to_transaction_id.unwrap().to_string().into()],
    )
    .await;

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert_eq!(report.incomplete_transfers, vec![transfer.id]);
    assert!(report.orphaned_legs.contains(&transfer.from_transaction_id.unwrap()));

    let err = fx
        .engine
        .delete_transfer(fx.household_id, OWNER, transfer.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
}
