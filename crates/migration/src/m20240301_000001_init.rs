//! Initial ledger schema.
//!
//! Monetary columns are decimal text here; the integer cents mirrors, the
//! canonical transfer linkage and the idempotency keys arrive in later
//! migrations, so a database migrated up to this point looks like the oldest
//! production rows.
//!
//! - `households` / `household_members`: tenancy and roles
//! - `accounts`: balances with an optimistic `version`
//! - `transactions` / `transaction_splits`: money movement per account
//! - `transfers`: pairs of transaction legs
//! - `bills`, `debts` and their payments, `debt_milestones`

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Households {
    Table,
    Id,
    Name,
    Currency,
    CreatedAt,
}

#[derive(Iden)]
pub enum HouseholdMembers {
    Table,
    HouseholdId,
    UserId,
    Role,
}

#[derive(Iden)]
pub enum Accounts {
    Table,
    Id,
    HouseholdId,
    OwnerUserId,
    Name,
    Kind,
    OpeningBalance,
    CurrentBalance,
    AvailableBalance,
    CreditLimit,
    Version,
    IsActive,
    LastActivityAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Transactions {
    Table,
    Id,
    HouseholdId,
    AccountId,
    CreatedBy,
    Kind,
    Amount,
    OccurredOn,
    Description,
    CategoryId,
    MerchantId,
    BillId,
    DebtId,
    SavingsGoalId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum TransactionSplits {
    Table,
    Id,
    TransactionId,
    CategoryId,
    Amount,
    Note,
}

#[derive(Iden)]
pub enum Transfers {
    Table,
    Id,
    HouseholdId,
    FromAccountId,
    ToAccountId,
    Amount,
    Fees,
    FeePolicy,
    OccurredOn,
    Description,
    FromTransactionId,
    ToTransactionId,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
pub enum Bills {
    Table,
    Id,
    HouseholdId,
    Name,
    AmountDue,
    RemainingBalance,
    InterestRateBps,
    Status,
    DueOn,
    CreatedAt,
}

#[derive(Iden)]
pub enum Debts {
    Table,
    Id,
    HouseholdId,
    Name,
    OriginalBalance,
    RemainingBalance,
    InterestRateBps,
    MinimumPayment,
    Status,
    CreatedAt,
}

#[derive(Iden)]
pub enum BillPayments {
    Table,
    Id,
    HouseholdId,
    BillId,
    TransactionId,
    Amount,
    PrincipalAmount,
    InterestAmount,
    BalanceBeforePayment,
    BalanceAfterPayment,
    CreatedAt,
}

#[derive(Iden)]
pub enum DebtPayments {
    Table,
    Id,
    HouseholdId,
    DebtId,
    TransactionId,
    Amount,
    PrincipalAmount,
    InterestAmount,
    BalanceBeforePayment,
    BalanceAfterPayment,
    CreatedAt,
}

#[derive(Iden)]
pub enum DebtMilestones {
    Table,
    Id,
    HouseholdId,
    DebtId,
    Percentage,
    ReachedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ─────────────────────────────────────────────────────────────────
        // households
        // ─────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Households::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Households::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Households::Name).string().not_null())
                    .col(
                        ColumnDef::new(Households::Currency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(Households::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HouseholdMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HouseholdMembers::HouseholdId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HouseholdMembers::UserId).string().not_null())
                    .col(ColumnDef::new(HouseholdMembers::Role).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(HouseholdMembers::HouseholdId)
                            .col(HouseholdMembers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-household_members-household_id")
                            .from(HouseholdMembers::Table, HouseholdMembers::HouseholdId)
                            .to(Households::Table, Households::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────
        // accounts
        // ─────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Accounts::HouseholdId).string().not_null())
                    .col(ColumnDef::new(Accounts::OwnerUserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(ColumnDef::new(Accounts::OpeningBalance).string().not_null())
                    .col(ColumnDef::new(Accounts::CurrentBalance).string().not_null())
                    .col(ColumnDef::new(Accounts::AvailableBalance).string())
                    .col(ColumnDef::new(Accounts::CreditLimit).string())
                    .col(
                        ColumnDef::new(Accounts::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Accounts::LastActivityAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-household_id")
                            .from(Accounts::Table, Accounts::HouseholdId)
                            .to(Households::Table, Households::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-household_id")
                    .table(Accounts::Table)
                    .col(Accounts::HouseholdId)
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────
        // transactions
        // ─────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::HouseholdId).string().not_null())
                    .col(ColumnDef::new(Transactions::AccountId).string().not_null())
                    .col(ColumnDef::new(Transactions::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Amount).string().not_null())
                    .col(ColumnDef::new(Transactions::OccurredOn).date().not_null())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(ColumnDef::new(Transactions::CategoryId).string())
                    .col(ColumnDef::new(Transactions::MerchantId).string())
                    .col(ColumnDef::new(Transactions::BillId).string())
                    .col(ColumnDef::new(Transactions::DebtId).string())
                    .col(ColumnDef::new(Transactions::SavingsGoalId).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-household_id")
                            .from(Transactions::Table, Transactions::HouseholdId)
                            .to(Households::Table, Households::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-account_id")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-household_id-occurred_on")
                    .table(Transactions::Table)
                    .col(Transactions::HouseholdId)
                    .col(Transactions::OccurredOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-account_id")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TransactionSplits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionSplits::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransactionSplits::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionSplits::CategoryId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransactionSplits::Amount).string().not_null())
                    .col(ColumnDef::new(TransactionSplits::Note).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transaction_splits-transaction_id")
                            .from(TransactionSplits::Table, TransactionSplits::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transaction_splits-transaction_id")
                    .table(TransactionSplits::Table)
                    .col(TransactionSplits::TransactionId)
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────
        // transfers
        // ─────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transfers::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Transfers::HouseholdId).string().not_null())
                    .col(ColumnDef::new(Transfers::FromAccountId).string().not_null())
                    .col(ColumnDef::new(Transfers::ToAccountId).string().not_null())
                    .col(ColumnDef::new(Transfers::Amount).string().not_null())
                    .col(ColumnDef::new(Transfers::Fees).string())
                    .col(
                        ColumnDef::new(Transfers::FeePolicy)
                            .string()
                            .not_null()
                            .default("source_pays"),
                    )
                    .col(ColumnDef::new(Transfers::OccurredOn).date().not_null())
                    .col(ColumnDef::new(Transfers::Description).string())
                    .col(ColumnDef::new(Transfers::FromTransactionId).string())
                    .col(ColumnDef::new(Transfers::ToTransactionId).string())
                    .col(ColumnDef::new(Transfers::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Transfers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-household_id")
                            .from(Transfers::Table, Transfers::HouseholdId)
                            .to(Households::Table, Households::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-from_transaction_id")
                    .table(Transfers::Table)
                    .col(Transfers::FromTransactionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-to_transaction_id")
                    .table(Transfers::Table)
                    .col(Transfers::ToTransactionId)
                    .to_owned(),
            )
            .await?;

        // ─────────────────────────────────────────────────────────────────
        // bills & debts
        // ─────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Bills::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bills::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Bills::HouseholdId).string().not_null())
                    .col(ColumnDef::new(Bills::Name).string().not_null())
                    .col(ColumnDef::new(Bills::AmountDue).string().not_null())
                    .col(ColumnDef::new(Bills::RemainingBalance).string().not_null())
                    .col(
                        ColumnDef::new(Bills::InterestRateBps)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Bills::Status)
                            .string()
                            .not_null()
                            .default("open"),
                    )
                    .col(ColumnDef::new(Bills::DueOn).date())
                    .col(
                        ColumnDef::new(Bills::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bills-household_id")
                            .from(Bills::Table, Bills::HouseholdId)
                            .to(Households::Table, Households::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Debts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Debts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Debts::HouseholdId).string().not_null())
                    .col(ColumnDef::new(Debts::Name).string().not_null())
                    .col(ColumnDef::new(Debts::OriginalBalance).string().not_null())
                    .col(ColumnDef::new(Debts::RemainingBalance).string().not_null())
                    .col(
                        ColumnDef::new(Debts::InterestRateBps)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Debts::MinimumPayment).string())
                    .col(
                        ColumnDef::new(Debts::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Debts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-debts-household_id")
                            .from(Debts::Table, Debts::HouseholdId)
                            .to(Households::Table, Households::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BillPayments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BillPayments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BillPayments::HouseholdId).string().not_null())
                    .col(ColumnDef::new(BillPayments::BillId).string().not_null())
                    .col(ColumnDef::new(BillPayments::TransactionId).string().not_null())
                    .col(ColumnDef::new(BillPayments::Amount).string().not_null())
                    .col(ColumnDef::new(BillPayments::PrincipalAmount).string().not_null())
                    .col(ColumnDef::new(BillPayments::InterestAmount).string().not_null())
                    .col(
                        ColumnDef::new(BillPayments::BalanceBeforePayment)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillPayments::BalanceAfterPayment)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillPayments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bill_payments-bill_id")
                            .from(BillPayments::Table, BillPayments::BillId)
                            .to(Bills::Table, Bills::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bill_payments-transaction_id")
                            .from(BillPayments::Table, BillPayments::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DebtPayments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DebtPayments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DebtPayments::HouseholdId).string().not_null())
                    .col(ColumnDef::new(DebtPayments::DebtId).string().not_null())
                    .col(ColumnDef::new(DebtPayments::TransactionId).string().not_null())
                    .col(ColumnDef::new(DebtPayments::Amount).string().not_null())
                    .col(ColumnDef::new(DebtPayments::PrincipalAmount).string().not_null())
                    .col(ColumnDef::new(DebtPayments::InterestAmount).string().not_null())
                    .col(
                        ColumnDef::new(DebtPayments::BalanceBeforePayment)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DebtPayments::BalanceAfterPayment)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DebtPayments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-debt_payments-debt_id")
                            .from(DebtPayments::Table, DebtPayments::DebtId)
                            .to(Debts::Table, Debts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-debt_payments-transaction_id")
                            .from(DebtPayments::Table, DebtPayments::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DebtMilestones::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DebtMilestones::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DebtMilestones::HouseholdId).string().not_null())
                    .col(ColumnDef::new(DebtMilestones::DebtId).string().not_null())
                    .col(ColumnDef::new(DebtMilestones::Percentage).integer().not_null())
                    .col(
                        ColumnDef::new(DebtMilestones::ReachedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-debt_milestones-debt_id")
                            .from(DebtMilestones::Table, DebtMilestones::DebtId)
                            .to(Debts::Table, Debts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-debt_milestones-debt_id-percentage")
                    .table(DebtMilestones::Table)
                    .col(DebtMilestones::DebtId)
                    .col(DebtMilestones::Percentage)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DebtMilestones::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DebtPayments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BillPayments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Debts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bills::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TransactionSplits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HouseholdMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Households::Table).to_owned())
            .await?;
        Ok(())
    }
}
