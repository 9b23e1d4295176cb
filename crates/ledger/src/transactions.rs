//! Transaction primitives.
//!
//! A `Transaction` moves money from or into exactly one account. Transfer legs
//! additionally carry canonical linkage: a shared `transfer_group_id` and a
//! direct `paired_transaction_id` pointing at the sibling leg.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money,
    guard::{MonetaryRow, MoneyPair},
    util::{parse_optional_uuid, parse_uuid, stored_money},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Expense,
    Income,
    TransferOut,
    TransferIn,
    Refund,
    /// Signed manual adjustment, applied as-is.
    Other,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
            Self::Refund => "refund",
            Self::Other => "other",
        }
    }

    pub fn is_transfer(self) -> bool {
        matches!(self, Self::TransferOut | Self::TransferIn)
    }

    /// Kinds whose amount leaves the account.
    pub fn is_outflow(self) -> bool {
        matches!(self, Self::Expense | Self::TransferOut)
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer_out" => Ok(Self::TransferOut),
            "transfer_in" => Ok(Self::TransferIn),
            "refund" => Ok(Self::Refund),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub household_id: Uuid,
    pub account_id: Uuid,
    pub created_by: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub occurred_on: NaiveDate,
    pub description: Option<String>,
    pub category_id: Option<String>,
    /// Merchant reference. Transfer legs written before canonical linkage
    /// existed stored the counterpart account id here.
    pub merchant_id: Option<String>,
    pub bill_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub savings_goal_id: Option<String>,
    pub transfer_group_id: Option<Uuid>,
    pub paired_transaction_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// True when the row carries canonical transfer linkage.
    pub fn has_canonical_linkage(&self) -> bool {
        self.transfer_group_id.is_some() || self.paired_transaction_id.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub household_id: String,
    pub account_id: String,
    pub created_by: String,
    pub kind: String,
    pub amount: String,
    pub amount_cents: Option<i64>,
    pub occurred_on: Date,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub merchant_id: Option<String>,
    pub bill_id: Option<String>,
    pub debt_id: Option<String>,
    pub savings_goal_id: Option<String>,
    pub transfer_group_id: Option<String>,
    pub paired_transaction_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Accounts,
    #[sea_orm(has_many = "super::splits::Entity")]
    Splits,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl MonetaryRow for Model {
    const TABLE: &'static str = "transactions";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn money_pairs(&self) -> Vec<MoneyPair<'_>> {
        vec![MoneyPair::new(
            "amount",
            Some(&self.amount),
            self.amount_cents,
        )]
    }
}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            household_id: ActiveValue::Set(tx.household_id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            created_by: ActiveValue::Set(tx.created_by.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount: ActiveValue::Set(tx.amount.to_decimal_string()),
            amount_cents: ActiveValue::Set(Some(tx.amount.cents())),
            occurred_on: ActiveValue::Set(tx.occurred_on),
            description: ActiveValue::Set(tx.description.clone()),
            category_id: ActiveValue::Set(tx.category_id.clone()),
            merchant_id: ActiveValue::Set(tx.merchant_id.clone()),
            bill_id: ActiveValue::Set(tx.bill_id.map(|id| id.to_string())),
            debt_id: ActiveValue::Set(tx.debt_id.map(|id| id.to_string())),
            savings_goal_id: ActiveValue::Set(tx.savings_goal_id.clone()),
            transfer_group_id: ActiveValue::Set(tx.transfer_group_id.map(|id| id.to_string())),
            paired_transaction_id: ActiveValue::Set(
                tx.paired_transaction_id.map(|id| id.to_string()),
            ),
            idempotency_key: ActiveValue::Set(tx.idempotency_key.clone()),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            household_id: parse_uuid(&model.household_id, "household")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount: stored_money(
                Some(&model.amount),
                model.amount_cents,
                "transactions.amount",
            )?,
            bill_id: parse_optional_uuid(model.bill_id.as_deref(), "bill")?,
            debt_id: parse_optional_uuid(model.debt_id.as_deref(), "debt")?,
            transfer_group_id: parse_optional_uuid(
                model.transfer_group_id.as_deref(),
                "transfer group",
            )?,
            paired_transaction_id: parse_optional_uuid(
                model.paired_transaction_id.as_deref(),
                "paired transaction",
            )?,
            created_by: model.created_by,
            occurred_on: model.occurred_on,
            description: model.description,
            category_id: model.category_id,
            merchant_id: model.merchant_id,
            savings_goal_id: model.savings_goal_id,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
