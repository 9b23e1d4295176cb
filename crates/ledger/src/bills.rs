//! Bills: recurring or one-off amounts owed, paid down by transactions.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money,
    guard::{MonetaryRow, MoneyPair},
    util::{parse_uuid, stored_money},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Open,
    Paid,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Paid => "paid",
        }
    }

    pub fn for_remaining(remaining: Money) -> Self {
        if remaining.is_positive() {
            Self::Open
        } else {
            Self::Paid
        }
    }
}

impl TryFrom<&str> for BillStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "open" => Ok(Self::Open),
            "paid" => Ok(Self::Paid),
            other => Err(EngineError::Validation(format!(
                "invalid bill status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub household_id: Uuid,
    pub name: String,
    pub amount_due: Money,
    pub remaining_balance: Money,
    /// Annual rate in basis points; most bills carry none.
    pub interest_rate_bps: u32,
    pub status: BillStatus,
    pub due_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub amount_due: String,
    pub amount_due_cents: Option<i64>,
    pub remaining_balance: String,
    pub remaining_balance_cents: Option<i64>,
    pub interest_rate_bps: i32,
    pub status: String,
    pub due_on: Option<Date>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bill_payments::Entity")]
    Payments,
}

impl Related<super::bill_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl MonetaryRow for Model {
    const TABLE: &'static str = "bills";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn money_pairs(&self) -> Vec<MoneyPair<'_>> {
        vec![
            MoneyPair::new("amount_due", Some(&self.amount_due), self.amount_due_cents),
            MoneyPair::new(
                "remaining_balance",
                Some(&self.remaining_balance),
                self.remaining_balance_cents,
            ),
        ]
    }
}

impl From<&Bill> for ActiveModel {
    fn from(bill: &Bill) -> Self {
        Self {
            id: ActiveValue::Set(bill.id.to_string()),
            household_id: ActiveValue::Set(bill.household_id.to_string()),
            name: ActiveValue::Set(bill.name.clone()),
            amount_due: ActiveValue::Set(bill.amount_due.to_decimal_string()),
            amount_due_cents: ActiveValue::Set(Some(bill.amount_due.cents())),
            remaining_balance: ActiveValue::Set(bill.remaining_balance.to_decimal_string()),
            remaining_balance_cents: ActiveValue::Set(Some(bill.remaining_balance.cents())),
            interest_rate_bps: ActiveValue::Set(
                i32::try_from(bill.interest_rate_bps).unwrap_or(i32::MAX),
            ),
            status: ActiveValue::Set(bill.status.as_str().to_string()),
            due_on: ActiveValue::Set(bill.due_on),
            created_at: ActiveValue::Set(bill.created_at),
        }
    }
}

impl TryFrom<Model> for Bill {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "bill")?,
            household_id: parse_uuid(&model.household_id, "household")?,
            amount_due: stored_money(
                Some(&model.amount_due),
                model.amount_due_cents,
                "bills.amount_due",
            )?,
            remaining_balance: stored_money(
                Some(&model.remaining_balance),
                model.remaining_balance_cents,
                "bills.remaining_balance",
            )?,
            interest_rate_bps: u32::try_from(model.interest_rate_bps).map_err(|_| {
                EngineError::IntegrityViolation(format!(
                    "negative interest rate on bill {}",
                    model.id
                ))
            })?,
            status: BillStatus::try_from(model.status.as_str())?,
            name: model.name,
            due_on: model.due_on,
            created_at: model.created_at,
        })
    }
}
