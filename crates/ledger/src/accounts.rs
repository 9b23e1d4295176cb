//! The module contains `Account` and its persistence model.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money,
    guard::{MonetaryRow, MoneyPair},
    util::{parse_uuid, stored_money, stored_optional_money},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Checking,
    Savings,
    CreditCard,
    Cash,
    Investment,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::CreditCard => "credit_card",
            Self::Cash => "cash",
            Self::Investment => "investment",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit_card" => Ok(Self::CreditCard),
            "cash" => Ok(Self::Cash),
            "investment" => Ok(Self::Investment),
            other => Err(EngineError::Validation(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

/// An account: a bank account, a card, a wallet.
///
/// `current_balance` is only ever changed by applying transaction deltas
/// inside a unit of work. `version` increments on every balance write and is
/// the optimistic concurrency token for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub household_id: Uuid,
    pub owner_user_id: String,
    pub name: String,
    pub kind: AccountKind,
    pub opening_balance: Money,
    pub current_balance: Money,
    pub available_balance: Option<Money>,
    pub credit_limit: Option<Money>,
    pub version: i64,
    pub is_active: bool,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub household_id: String,
    pub owner_user_id: String,
    pub name: String,
    pub kind: String,
    pub opening_balance: String,
    pub opening_balance_cents: Option<i64>,
    pub current_balance: String,
    pub current_balance_cents: Option<i64>,
    pub available_balance: Option<String>,
    pub available_balance_cents: Option<i64>,
    pub credit_limit: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub version: i64,
    pub is_active: bool,
    pub last_activity_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::households::Entity",
        from = "Column::HouseholdId",
        to = "super::households::Column::Id"
    )]
    Households,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::households::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Households.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl MonetaryRow for Model {
    const TABLE: &'static str = "accounts";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn money_pairs(&self) -> Vec<MoneyPair<'_>> {
        vec![
            MoneyPair::new(
                "opening_balance",
                Some(&self.opening_balance),
                self.opening_balance_cents,
            ),
            MoneyPair::new(
                "current_balance",
                Some(&self.current_balance),
                self.current_balance_cents,
            ),
            MoneyPair::new(
                "available_balance",
                self.available_balance.as_deref(),
                self.available_balance_cents,
            ),
            MoneyPair::new(
                "credit_limit",
                self.credit_limit.as_deref(),
                self.credit_limit_cents,
            ),
        ]
    }
}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            household_id: ActiveValue::Set(account.household_id.to_string()),
            owner_user_id: ActiveValue::Set(account.owner_user_id.clone()),
            name: ActiveValue::Set(account.name.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            opening_balance: ActiveValue::Set(account.opening_balance.to_decimal_string()),
            opening_balance_cents: ActiveValue::Set(Some(account.opening_balance.cents())),
            current_balance: ActiveValue::Set(account.current_balance.to_decimal_string()),
            current_balance_cents: ActiveValue::Set(Some(account.current_balance.cents())),
            available_balance: ActiveValue::Set(
                account.available_balance.map(Money::to_decimal_string),
            ),
            available_balance_cents: ActiveValue::Set(account.available_balance.map(Money::cents)),
            credit_limit: ActiveValue::Set(account.credit_limit.map(Money::to_decimal_string)),
            credit_limit_cents: ActiveValue::Set(account.credit_limit.map(Money::cents)),
            version: ActiveValue::Set(account.version),
            is_active: ActiveValue::Set(account.is_active),
            last_activity_at: ActiveValue::Set(account.last_activity_at),
            created_at: ActiveValue::Set(account.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            household_id: parse_uuid(&model.household_id, "household")?,
            opening_balance: stored_money(
                Some(&model.opening_balance),
                model.opening_balance_cents,
                "accounts.opening_balance",
            )?,
            current_balance: stored_money(
                Some(&model.current_balance),
                model.current_balance_cents,
                "accounts.current_balance",
            )?,
            available_balance: stored_optional_money(
                model.available_balance.as_deref(),
                model.available_balance_cents,
                "accounts.available_balance",
            )?,
            credit_limit: stored_optional_money(
                model.credit_limit.as_deref(),
                model.credit_limit_cents,
                "accounts.credit_limit",
            )?,
            owner_user_id: model.owner_user_id,
            name: model.name,
            kind: AccountKind::try_from(model.kind.as_str())?,
            version: model.version,
            is_active: model.is_active,
            last_activity_at: model.last_activity_at,
            created_at: model.created_at,
        })
    }
}
