mod common;

use common::{Fixture, OWNER, cents, day, fixture};
use ledger::{
    BillStatus, DebtStatus, ErrorKind, NewBillCmd, NewDebtCmd, NewTransactionCmd,
    TransactionKind, TransactionPatch,
};
use uuid::Uuid;

async fn expense(fx: &Fixture, amount: i64) -> Uuid {
    fx.engine
        .create_transaction(NewTransactionCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            TransactionKind::Expense,
            cents(amount),
            day(1),
        ))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn bill_payment_is_idempotent_per_key() {
    let fx = fixture().await;
    let bill = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Power", cents(8_000)).due_on(day(15)))
        .await
        .unwrap();
    let tx_id = expense(&fx, 5_000).await;

    let first = fx
        .engine
        .apply_bill_payment(fx.household_id, OWNER, bill.id, tx_id, "pay-1")
        .await
        .unwrap();
    let replay = fx
        .engine
        .apply_bill_payment(fx.household_id, OWNER, bill.id, tx_id, "pay-1")
        .await
        .unwrap();
    assert_eq!(first.id, replay.id);
    assert_eq!(first.balance_before_payment, cents(8_000));
    assert_eq!(first.balance_after_payment, cents(3_000));
    assert_eq!(fx.count("bill_payments").await, 1);

    let bill = fx
        .engine
        .bill(fx.household_id, OWNER, bill.id)
        .await
        .unwrap();
    assert_eq!(bill.remaining_balance, cents(3_000));
    assert_eq!(bill.status, BillStatus::Open);

    let linked = fx
        .engine
        .transaction(fx.household_id, OWNER, tx_id)
        .await
        .unwrap();
    assert_eq!(linked.bill_id, Some(bill.id));
}

#[tokio::test]
async fn reused_keys_and_paid_transactions_conflict() {
    let fx = fixture().await;
    let power = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Power", cents(8_000)))
        .await
        .unwrap();
    let water = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Water", cents(3_000)))
        .await
        .unwrap();
    let first_tx = expense(&fx, 1_000).await;
    let second_tx = expense(&fx, 1_000).await;

    fx.engine
        .apply_bill_payment(fx.household_id, OWNER, power.id, first_tx, "k1")
        .await
        .unwrap();

    let err = fx
        .engine
        .apply_bill_payment(fx.household_id, OWNER, power.id, second_tx, "k1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = fx
        .engine
        .apply_bill_payment(fx.household_id, OWNER, power.id, first_tx, "k2")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = fx
        .engine
        .apply_bill_payment(fx.household_id, OWNER, water.id, first_tx, "k3")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = fx
        .engine
        .apply_bill_payment(fx.household_id, OWNER, water.id, second_tx, "   ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn income_cannot_pay_a_bill() {
    let fx = fixture().await;
    let bill = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Power", cents(8_000)))
        .await
        .unwrap();
    let income = fx
        .engine
        .create_transaction(NewTransactionCmd::new(
            fx.household_id,
            OWNER,
            fx.checking.id,
            TransactionKind::Income,
            cents(1_000),
            day(1),
        ))
        .await
        .unwrap();

    let err = fx
        .engine
        .apply_bill_payment(fx.household_id, OWNER, bill.id, income.id, "k")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(fx.count("bill_payments").await, 0);
}

#[tokio::test]
async fn debt_payments_split_interest_and_record_milestones() {
    let fx = fixture().await;
    let debt = fx
        .engine
        .new_debt(
            NewDebtCmd::new(fx.household_id, OWNER, "Card", cents(120_000))
                .interest_rate_bps(1_200)
                .minimum_payment(cents(2_500)),
        )
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
                cents(40_000),
                day(1),
            )
            .debt_id(debt.id),
        )
        .await
        .unwrap();
    let payments = fx
        .engine
        .debt_payments(fx.household_id, OWNER, debt.id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].transaction_id, tx.id);
    assert_eq!(payments[0].interest_amount, cents(1_200));
    assert_eq!(payments[0].principal_amount, cents(38_800));
    assert_eq!(payments[0].balance_after_payment, cents(81_200));
    assert_eq!(
        fx.engine
            .debt_milestones(fx.household_id, OWNER, debt.id)
            .await
            .unwrap(),
        vec![25]
    );

    let payoff = expense(&fx, 90_000).await;
    let payment = fx
        .engine
        .apply_debt_payment(fx.household_id, OWNER, debt.id, payoff, "payoff")
        .await
        .unwrap();
    assert_eq!(payment.interest_amount, cents(812));
    assert_eq!(payment.principal_amount, cents(81_200));
    assert_eq!(payment.balance_after_payment, cents(0));

    let debt = fx
        .engine
        .debt(fx.household_id, OWNER, debt.id)
        .await
        .unwrap();
    assert_eq!(debt.status, DebtStatus::PaidOff);
    assert_eq!(
        fx.engine
            .debt_milestones(fx.household_id, OWNER, debt.id)
            .await
            .unwrap(),
        vec![25, 50, 75, 100]
    );
}

#[tokio::test]
async fn editing_or_deleting_the_transaction_reverses_the_payment() {
    let fx = fixture().await;
    let bill = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Rent", cents(10_000)))
        .await
        .unwrap();
    let tx_id = expense(&fx, 10_000).await;
    fx.engine
        .apply_bill_payment(fx.household_id, OWNER, bill.id, tx_id, "rent-march")
        .await
        .unwrap();
    let paid = fx
        .engine
        .bill(fx.household_id, OWNER, bill.id)
        .await
        .unwrap();
    assert_eq!(paid.status, BillStatus::Paid);

    fx.engine
        .update_transaction(
            fx.household_id,
            OWNER,
            tx_id,
            TransactionPatch::new().amount(cents(6_000)),
        )
        .await
        .unwrap();
    let payments = fx
        .engine
        .bill_payments(fx.household_id, OWNER, bill.id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, cents(6_000));
    assert_eq!(payments[0].idempotency_key.as_deref(), Some("rent-march"));
    let bill_after_edit = fx
        .engine
        .bill(fx.household_id, OWNER, bill.id)
        .await
        .unwrap();
    assert_eq!(bill_after_edit.remaining_balance, cents(4_000));
    assert_eq!(bill_after_edit.status, BillStatus::Open);

    fx.engine
        .delete_transaction(fx.household_id, OWNER, tx_id)
        .await
        .unwrap();
    let restored = fx
        .engine
        .bill(fx.household_id, OWNER, bill.id)
        .await
        .unwrap();
    assert_eq!(restored.remaining_balance, cents(10_000));
    assert_eq!(fx.count("bill_payments").await, 0);
    assert_eq!(fx.balance(fx.checking.id).await, cents(100_000));
}

#[tokio::test]
async fn a_transaction_pays_a_bill_or_a_debt_not_both() {
    let fx = fixture().await;
    let bill = fx
        .engine
        .new_bill(NewBillCmd::new(fx.household_id, OWNER, "Power", cents(1_000)))
        .await
        .unwrap();
    let debt = fx
        .engine
        .new_debt(NewDebtCmd::new(fx.household_id, OWNER, "Loan", cents(1_000)))
        .await
        .unwrap();

    let err = fx
        .engine
        .create_transaction(
            NewTransactionCmd::new(
                fx.household_id,
                OWNER,
                fx.checking.id,
                TransactionKind::Expense,
                cents(500),
                day(1),
            )
            .bill_id(bill.id)
            .debt_id(debt.id),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(fx.count("transactions").await, 0);
}
