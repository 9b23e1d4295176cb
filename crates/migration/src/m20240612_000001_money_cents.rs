//! Integer cents mirrors next to every legacy decimal money column.
//!
//! Columns stay nullable: rows written before this migration carry only the
//! decimal until the admin backfill fills them in.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// `(table, cents column)` pairs added by this migration.
const CENTS_COLUMNS: &[(&str, &str)] = &[
    ("accounts", "opening_balance_cents"),
    ("accounts", "current_balance_cents"),
    ("accounts", "available_balance_cents"),
    ("accounts", "credit_limit_cents"),
    ("transactions", "amount_cents"),
    ("transaction_splits", "amount_cents"),
    ("transfers", "amount_cents"),
    ("transfers", "fees_cents"),
    ("bills", "amount_due_cents"),
    ("bills", "remaining_balance_cents"),
    ("debts", "original_balance_cents"),
    ("debts", "remaining_balance_cents"),
    ("debts", "minimum_payment_cents"),
    ("bill_payments", "amount_cents"),
    ("bill_payments", "principal_amount_cents"),
    ("bill_payments", "interest_amount_cents"),
    ("bill_payments", "balance_before_payment_cents"),
    ("bill_payments", "balance_after_payment_cents"),
    ("debt_payments", "amount_cents"),
    ("debt_payments", "principal_amount_cents"),
    ("debt_payments", "interest_amount_cents"),
    ("debt_payments", "balance_before_payment_cents"),
    ("debt_payments", "balance_after_payment_cents"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite accepts a single column per ALTER TABLE.
        for (table, column) in CENTS_COLUMNS {
            manager
                .alter_table(
                    Table::alter()
                        .table(Alias::new(*table))
                        .add_column(ColumnDef::new(Alias::new(*column)).big_integer())
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, column) in CENTS_COLUMNS.iter().rev() {
            manager
                .alter_table(
                    Table::alter()
                        .table(Alias::new(*table))
                        .drop_column(Alias::new(*column))
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}
