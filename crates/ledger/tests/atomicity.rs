mod common;

use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use common::{Fixture, OWNER, cents, day, fixture_with, open_account};
use ledger::{
    EngineConfig, ErrorKind, NewBillCmd, NewDebtCmd, NewTransactionCmd, NewTransferCmd,
    PendingWrite, ResultEngine, SplitInput, TransactionKind, TransactionPatch, TransferPatch,
    WriteInterceptor,
};
use sea_orm::DbErr;

/// Fails the write at `target` once armed, and records every write it sees.
#[derive(Debug)]
struct FailAt {
    target: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FailAt {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            target: AtomicUsize::new(usize::MAX),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn arm(&self, ordinal: usize) {
        self.seen.lock().unwrap().clear();
        self.target.store(ordinal, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.seen.lock().unwrap().clear();
        self.target.store(usize::MAX, Ordering::SeqCst);
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl WriteInterceptor for FailAt {
    fn before_write(&self, write: &PendingWrite<'_>) -> Result<(), DbErr> {
        self.seen.lock().unwrap().push(write.table.to_string());
        if write.ordinal == self.target.load(Ordering::SeqCst) {
            return Err(DbErr::Custom(format!(
                "injected failure on {} #{}",
                write.table, write.ordinal
            )));
        }
        Ok(())
    }
}

async fn setup() -> (Fixture, Arc<FailAt>) {
    let interceptor = FailAt::new();
    let config = EngineConfig {
        max_retries: 0,
        ..EngineConfig::default()
    };
    let fx = fixture_with(config, Some(interceptor.clone())).await;
    interceptor.disarm();
    (fx, interceptor)
}

/// Fails `op` at each of its writes in turn and checks that every failed
/// attempt leaves the ledger tables untouched. Returns how many writes the
/// final, successful attempt performed.
async fn fail_each_write<T, Op, Fut>(fx: &Fixture, interceptor: &FailAt, op: Op) -> usize
where
    Op: Fn() -> Fut,
    Fut: Future<Output = ResultEngine<T>>,
{
    let before = fx.snapshot().await;
    let mut ordinal = 0;
    loop {
        assert!(ordinal < 32, "operation never succeeded");
        interceptor.arm(ordinal);
        match op().await {
            Ok(_) => break,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Database, "write #{ordinal}: {err}");
                assert_eq!(interceptor.seen().len(), ordinal + 1);
                interceptor.disarm();
                assert_eq!(fx.snapshot().await, before, "write #{ordinal}");
                ordinal += 1;
            }
        }
    }
    let writes = interceptor.seen().len();
    interceptor.disarm();
    assert_eq!(writes, ordinal);
    writes
}

fn transfer_cmd(fx: &Fixture) -> NewTransferCmd {
    NewTransferCmd::new(
        fx.household_id,
        OWNER,
        fx.checking.id,
        fx.savings.id,
        cents(10_000),
        day(1),
    )
    .fees(cents(250))
}

#[tokio::test]
async fn transfer_is_all_or_nothing_at_every_write() {
    let (fx, interceptor) = setup().await;
    fx.engine.create_transfer(transfer_cmd(&fx)).await.unwrap();
    let writes = interceptor.seen();
    assert_eq!(
        writes,
        vec!["transactions", "transactions", "transfers", "accounts", "accounts"]
    );

    for ordinal in 0..writes.len() {
        let (fx, interceptor) = setup().await;
        interceptor.arm(ordinal);
        let err = fx.engine.create_transfer(transfer_cmd(&fx)).await;
        assert!(err.is_err(), "write #{ordinal} should have failed the unit");

        assert_eq!(fx.count("transactions").await, 0, "write #{ordinal}");
        assert_eq!(fx.count("transfers").await, 0, "write #{ordinal}");
        interceptor.disarm();
        assert_eq!(fx.balance(fx.checking.id).await, cents(100_000));
        assert_eq!(fx.balance(fx.savings.id).await, cents(0));
    }
}

#[tokio::test]
async fn debt_payment_rolls_back_with_its_transaction() {
    let (fx, interceptor) = setup().await;
    let debt = fx
        .engine
        .new_debt(NewDebtCmd::new(fx.household_id, OWNER, "Loan", cents(50_000)))
        .await
        .unwrap();
    let cmd = NewTransactionCmd::new(
        fx.household_id,
        OWNER,
        fx.checking.id,
        TransactionKind::Expense,
        cents(5_000),
        day(1),
    )
    .debt_id(debt.id);

    // transaction, account, payment, debt
    interceptor.arm(3);
    fx.engine.create_transaction(cmd.clone()).await.unwrap_err();
    assert_eq!(interceptor.seen().last().map(String::as_str), Some("debts"));
    interceptor.disarm();

    assert_eq!(fx.count("transactions").await, 0);
    assert_eq!(fx.count("debt_payments").await, 0);
    assert_eq!(fx.balance(fx.checking.id).await, cents(100_000));
    let debt_after = fx
        .engine
        .debt(fx.household_id, OWNER, debt.id)
        .await
        .unwrap();
    assert_eq!(debt_after.remaining_balance, cents(50_000));

    fx.engine.create_transaction(cmd).await.unwrap();
    assert_eq!(fx.count("debt_payments").await, 1);
}

#[tokio::test]
async fn failed_units_emit_no_activity_touch() {
    let (fx, interceptor) = setup().await;
    interceptor.arm(0);
    fx.engine
        .create_transfer(transfer_cmd(&fx))
        .await
        .unwrap_err();
    interceptor.disarm();

    let account = fx
        .engine
        .account(fx.household_id, OWNER, fx.checking.id)
        .await
        .unwrap();
    assert_eq!(account.last_activity_at, None);
    assert_eq!(account.version, 0);
}

#[tokio::test]
async fn transfer_update_is_all_or_nothing_at_every_write() {
    let (fx, interceptor) = setup().await;
    let cash = open_account(&fx.engine, fx.household_id, "Cash", 5_000).await;
    let transfer = fx.engine.create_transfer(transfer_cmd(&fx)).await.unwrap();
    let patch = TransferPatch::new()
        .amount(cents(12_000))
        .fees(Some(cents(100)))
        .to_account_id(cash.id);

    let writes = fail_each_write(&fx, &interceptor, || {
        fx.engine
            .update_transfer(fx.household_id, OWNER, transfer.id, patch.clone())
    })
    .await;
    // two legs, the transfer row, three accounts
    assert_eq!(writes, 6);
    assert_eq!(fx.balance(fx.checking.id).await, cents(87_900));
    assert_eq!(fx.balance(fx.savings.id).await, cents(0));
    assert_eq!(fx.balance(cash.id).await, cents(17_000));
}

#[tokio::test]
async fn deleting_a_leg_is_all_or_nothing_at_every_write() {
    let (fx, interceptor) = setup().await;
    let transfer = fx.engine.create_transfer(transfer_cmd(&fx)).await.unwrap();
    let incoming = transfer.to_transaction_id.unwrap();

    let writes = fail_each_write(&fx, &interceptor, || {
        fx.engine
            .delete_transaction(fx.household_id, OWNER, incoming)
    })
    .await;
    assert_eq!(writes, 5);
    assert_eq!(fx.count("transactions").await, 0);
    assert_eq!(fx.count("transfers").await, 0);
    assert_eq!(fx.balance(fx.checking.id).await, cents(100_000));
    assert_eq!(fx.balance(fx.savings.id).await, cents(0));
}

#[tokio::test]
async fn bill_linked_edit_is_all_or_nothing_at_every_write() {
    let (fx, interceptor) = setup().await;
    let bill = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Rent", cents(10_000)))
        .await
        .unwrap();
    let tx = fx
        .engine
        .create_transaction(
            NewTransactionCmd::new(
                fx.household_id,
                OWNER,
                fx.checking.id,
                TransactionKind::Expense,
                cents(4_000),
                day(1),
            )
            .bill_id(bill.id)
            .splits(SplitInput::Amounts(vec![
                ("rent".to_string(), cents(3_000)),
                ("fees".to_string(), cents(1_000)),
            ])),
        )
        .await
        .unwrap();

    let writes = fail_each_write(&fx, &interceptor, || {
        fx.engine.update_transaction(
            fx.household_id,
            OWNER,
            tx.id,
            TransactionPatch::new().amount(cents(6_000)),
        )
    })
    .await;
    // payment reversal, transaction, account, splits, payment re-applied
    assert!(writes >= 7, "only {writes} writes");
    assert_eq!(fx.balance(fx.checking.id).await, cents(94_000));
    let bill = fx
        .engine
        .bill(fx.household_id, OWNER, bill.id)
        .await
        .unwrap();
    assert_eq!(bill.remaining_balance, cents(4_000));
    let total: i64 = fx
        .engine
        .splits(fx.household_id, OWNER, tx.id)
        .await
        .unwrap()
        .iter()
        .map(|split| split.amount.cents())
        .sum();
    assert_eq!(total, 6_000);
}

#[tokio::test]
async fn operations_composed_in_one_unit_commit_together() {
    let (fx, interceptor) = setup().await;
    let expense = NewTransactionCmd::new(
        fx.household_id,
        OWNER,
        fx.checking.id,
        TransactionKind::Expense,
        cents(1_000),
        day(1),
    );
    let transfer = transfer_cmd(&fx);

    let writes = fail_each_write(&fx, &interceptor, || {
        let expense = expense.clone();
        let transfer = transfer.clone();
        fx.engine.execute(fx.household_id, OWNER, move |unit| {
            let expense = expense.clone();
            let transfer = transfer.clone();
            Box::pin(async move {
                let tx = unit.create_transaction(expense).await?;
                let transfer = unit.create_transfer(transfer).await?;
                Ok((tx, transfer))
            })
        })
    })
    .await;
    // expense and its account, then the five transfer writes
    assert_eq!(writes, 7);
    assert_eq!(fx.count("transactions").await, 3);
    assert_eq!(fx.balance(fx.checking.id).await, cents(88_750));
    assert_eq!(fx.balance(fx.savings.id).await, cents(10_000));
}

#[tokio::test]
async fn timed_out_unit_rolls_back_as_transient() {
    let config = EngineConfig {
        max_retries: 0,
        write_timeout_ms: 200,
        ..EngineConfig::default()
    };
    let fx = fixture_with(config, None).await;
    let expense = NewTransactionCmd::new(
        fx.household_id,
        OWNER,
        fx.checking.id,
        TransactionKind::Expense,
        cents(1_000),
        day(1),
    );

    let err = fx
        .engine
        .execute(fx.household_id, OWNER, move |unit| {
            let expense = expense.clone();
            Box::pin(async move {
                unit.create_transaction(expense).await?;
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(())
            })
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(err.is_retryable());
    assert_eq!(fx.count("transactions").await, 0);
    assert_eq!(fx.balance(fx.checking.id).await, cents(100_000));
}
