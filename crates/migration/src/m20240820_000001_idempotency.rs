use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transactions {
    Table,
    HouseholdId,
    CreatedBy,
    IdempotencyKey,
}

#[derive(Iden)]
enum BillPayments {
    Table,
    HouseholdId,
    TransactionId,
    IdempotencyKey,
}

#[derive(Iden)]
enum DebtPayments {
    Table,
    HouseholdId,
    TransactionId,
    IdempotencyKey,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ─────────────────────────────────────────────────────────────────
        // transactions
        // ─────────────────────────────────────────────────────────────────
        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .add_column(ColumnDef::new(Transactions::IdempotencyKey).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-transactions-household_id-created_by-idempotency_key")
                    .table(Transactions::Table)
                    .col(Transactions::HouseholdId)
                    .col(Transactions::CreatedBy)
                    .col(Transactions::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────
        // bill_payments
        // ─────────────────────────────────────────────────────────────────
        manager
            .alter_table(
                Table::alter()
                    .table(BillPayments::Table)
                    .add_column(ColumnDef::new(BillPayments::IdempotencyKey).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-bill_payments-household_id-idempotency_key")
                    .table(BillPayments::Table)
                    .col(BillPayments::HouseholdId)
                    .col(BillPayments::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // One payment per transaction.
        manager
            .create_index(
                Index::create()
                    .name("uidx-bill_payments-transaction_id")
                    .table(BillPayments::Table)
                    .col(BillPayments::TransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────
        // debt_payments
        // ─────────────────────────────────────────────────────────────────
        manager
            .alter_table(
                Table::alter()
                    .table(DebtPayments::Table)
                    .add_column(ColumnDef::new(DebtPayments::IdempotencyKey).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-debt_payments-household_id-idempotency_key")
                    .table(DebtPayments::Table)
                    .col(DebtPayments::HouseholdId)
                    .col(DebtPayments::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-debt_payments-transaction_id")
                    .table(DebtPayments::Table)
                    .col(DebtPayments::TransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "uidx-debt_payments-transaction_id",
            "uidx-debt_payments-household_id-idempotency_key",
        ] {
            manager
                .drop_index(Index::drop().name(name).table(DebtPayments::Table).to_owned())
                .await?;
        }
        manager
            .alter_table(
                Table::alter()
                    .table(DebtPayments::Table)
                    .drop_column(DebtPayments::IdempotencyKey)
                    .to_owned(),
            )
            .await?;

        for name in [
            "uidx-bill_payments-transaction_id",
            "uidx-bill_payments-household_id-idempotency_key",
        ] {
            manager
                .drop_index(Index::drop().name(name).table(BillPayments::Table).to_owned())
                .await?;
        }
        manager
            .alter_table(
                Table::alter()
                    .table(BillPayments::Table)
                    .drop_column(BillPayments::IdempotencyKey)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("uidx-transactions-household_id-created_by-idempotency_key")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .drop_column(Transactions::IdempotencyKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
