mod common;

use common::{Fixture, OWNER, VIEWER, cents, day, fixture};
use ledger::{ErrorKind, MatchConfidence, NewTransactionCmd, NewTransferCmd, TransactionKind};
use uuid::Uuid;

async fn record(
    fx: &Fixture,
    account_id: Uuid,
    kind: TransactionKind,
    amount: i64,
    on: u32,
    description: &str,
) -> Uuid {
    fx.engine
        .create_transaction(
            NewTransactionCmd::new(
                fx.household_id,
                OWNER,
                account_id,
                kind,
                cents(amount),
                day(on),
            )
            .description(description),
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn suggestions_pair_mirrored_rows_without_writing() {
    let fx = fixture().await;
    let outflow = record(
        &fx,
        fx.checking.id,
        TransactionKind::Expense,
        5_000,
        3,
        "Transfer to savings",
    )
    .await;
    let inflow = record(
        &fx,
        fx.savings.id,
        TransactionKind::Income,
        5_000,
        3,
        "Transfer to savings",
    )
    .await;
    // Far away in time: never a candidate.
    record(&fx, fx.savings.id, TransactionKind::Income, 5_000, 20, "Refund").await;

    let suggestions = fx
        .engine
        .suggest_transfer_matches(fx.household_id, VIEWER)
        .await
        .unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].outflow_id, outflow);
    assert_eq!(suggestions[0].inflow_id, inflow);
    assert_eq!(suggestions[0].confidence, MatchConfidence::High);

    let unchanged = fx
        .engine
        .transaction(fx.household_id, OWNER, outflow)
        .await
        .unwrap();
    assert_eq!(unchanged.kind, TransactionKind::Expense);
    assert_eq!(unchanged.transfer_group_id, None);
}

#[tokio::test]
async fn accepting_a_match_links_without_moving_money() {
    let fx = fixture().await;
    let outflow = record(&fx, fx.checking.id, TransactionKind::Expense, 2_000, 1, "move").await;
    let inflow = record(&fx, fx.savings.id, TransactionKind::Income, 2_000, 2, "move").await;
    assert_eq!(fx.balance(fx.checking.id).await, cents(98_000));
    assert_eq!(fx.balance(fx.savings.id).await, cents(2_000));

    let transfer = fx
        .engine
        .accept_transfer_match(fx.household_id, OWNER, outflow, inflow)
        .await
        .unwrap();
    assert_eq!(transfer.from_transaction_id, Some(outflow));
    assert_eq!(transfer.to_transaction_id, Some(inflow));
    assert_eq!(fx.balance(fx.checking.id).await, cents(98_000));
    assert_eq!(fx.balance(fx.savings.id).await, cents(2_000));

    let outgoing = fx
        .engine
        .transaction(fx.household_id, OWNER, outflow)
        .await
        .unwrap();
    assert_eq!(outgoing.kind, TransactionKind::TransferOut);
    assert_eq!(outgoing.paired_transaction_id, Some(inflow));

    assert!(
        fx.engine
            .suggest_transfer_matches(fx.household_id, OWNER)
            .await
            .unwrap()
            .is_empty()
    );
    let err = fx
        .engine
        .accept_transfer_match(fx.household_id, OWNER, outflow, inflow)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let report = fx.engine.verify_ledger_integrity().await.unwrap();
    assert!(report.is_consistent(), "{report:?}");
}

#[tokio::test]
async fn mismatched_pairs_are_rejected() {
    let fx = fixture().await;
    let outflow = record(&fx, fx.checking.id, TransactionKind::Expense, 2_000, 1, "a").await;
    let smaller = record(&fx, fx.savings.id, TransactionKind::Income, 1_990, 1, "a").await;
    let same_account = record(&fx, fx.checking.id, TransactionKind::Income, 2_000, 1, "a").await;

    for (out, inc, kind) in [
        (outflow, smaller, ErrorKind::Validation),
        (outflow, same_account, ErrorKind::Validation),
        (smaller, outflow, ErrorKind::Validation),
        (outflow, outflow, ErrorKind::Validation),
        (outflow, Uuid::new_v4(), ErrorKind::Ownership),
    ] {
        let err = fx
            .engine
            .accept_transfer_match(fx.household_id, OWNER, out, inc)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind);
    }
    assert_eq!(fx.count("transfers").await, 0);
}

#[tokio::test]
async fn rows_linked_by_an_older_transfer_record_conflict() {
    let fx = fixture().await;
    let transfer = fx
        .engine
        .create_transfer(NewTransferCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            fx.savings.id,
            cents(2_000),
            day(1),
        ))
        .await
        .unwrap();
    // Older rows: plain kinds, linked only through the transfer row.
    fx.exec(
        "UPDATE transactions SET \
         kind = CASE kind WHEN 'transfer_out' THEN 'expense' ELSE 'income' END, \
         transfer_group_id = NULL, paired_transaction_id = NULL",
        vec![],
    )
    .await;
    let old_out = transfer.from_transaction_id.unwrap();
    let old_in = transfer.to_transaction_id.unwrap();

    let outflow = record(&fx, fx.checking.id, TransactionKind::Expense, 2_000, 1, "move").await;
    let inflow = record(&fx, fx.savings.id, TransactionKind::Income, 2_000, 1, "move").await;

    for (out, inc) in [(old_out, inflow), (outflow, old_in)] {
        let err = fx
            .engine
            .accept_transfer_match(fx.household_id, OWNER, out, inc)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
    assert_eq!(fx.count("transfers").await, 1);

    let suggestions = fx
        .engine
        .suggest_transfer_matches(fx.household_id, OWNER)
        .await
        .unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].outflow_id, outflow);
    assert_eq!(suggestions[0].inflow_id, inflow);
}
