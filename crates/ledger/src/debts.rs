//! Debts: interest-bearing balances paid down by transactions.

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
pub enum DebtStatus {
    Active,
    PaidOff,
}

impl DebtStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PaidOff => "paid_off",
        }
    }

    pub fn for_remaining(remaining: Money) -> Self {
        if remaining.is_positive() {
            Self::Active
        } else {
            Self::PaidOff
        }
    }
}

impl TryFrom<&str> for DebtStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "paid_off" => Ok(Self::PaidOff),
            other => Err(EngineError::Validation(format!(
                "invalid debt status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub id: Uuid,
    pub household_id: Uuid,
    pub name: String,
    pub original_balance: Money,
    pub remaining_balance: Money,
    /// Annual interest rate in basis points (`1850` is 18.50%).
    pub interest_rate_bps: u32,
    pub minimum_payment: Option<Money>,
    pub status: DebtStatus,
    pub created_at: DateTime<Utc>,
}

impl Debt {
    /// Whole percentage of the original balance already repaid, floored.
    pub fn percent_paid(&self) -> u8 {
        if !self.original_balance.is_positive() {
            return 100;
        }
        let paid = self
            .original_balance
            .checked_sub(self.remaining_balance)
            .map_or(0, |paid| paid.cents().max(0));
        let pct = i128::from(paid) * 100 / i128::from(self.original_balance.cents());
        u8::try_from(pct.clamp(0, 100)).unwrap_or(100)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "debts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub original_balance: String,
    pub original_balance_cents: Option<i64>,
    pub remaining_balance: String,
    pub remaining_balance_cents: Option<i64>,
    pub interest_rate_bps: i32,
    pub minimum_payment: Option<String>,
    pub minimum_payment_cents: Option<i64>,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::debt_payments::Entity")]
    Payments,
    #[sea_orm(has_many = "super::debt_milestones::Entity")]
    Milestones,
}

impl Related<super::debt_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::debt_milestones::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Milestones.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl MonetaryRow for Model {
    const TABLE: &'static str = "debts";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn money_pairs(&self) -> Vec<MoneyPair<'_>> {
        vec![
            MoneyPair::new(
                "original_balance",
                Some(&self.original_balance),
                self.original_balance_cents,
            ),
            MoneyPair::new(
                "remaining_balance",
                Some(&self.remaining_balance),
                self.remaining_balance_cents,
            ),
            MoneyPair::new(
                "minimum_payment",
                self.minimum_payment.as_deref(),
                self.minimum_payment_cents,
            ),
        ]
    }
}

impl From<&Debt> for ActiveModel {
    fn from(debt: &Debt) -> Self {
        Self {
            id: ActiveValue::Set(debt.id.to_string()),
            household_id: ActiveValue::Set(debt.household_id.to_string()),
            name: ActiveValue::Set(debt.name.clone()),
            original_balance: ActiveValue::Set(debt.original_balance.to_decimal_string()),
            original_balance_cents: ActiveValue::Set(Some(debt.original_balance.cents())),
            remaining_balance: ActiveValue::Set(debt.remaining_balance.to_decimal_string()),
            remaining_balance_cents: ActiveValue::Set(Some(debt.remaining_balance.cents())),
            interest_rate_bps: ActiveValue::Set(
                i32::try_from(debt.interest_rate_bps).unwrap_or(i32::MAX),
            ),
            minimum_payment: ActiveValue::Set(debt.minimum_payment.map(Money::to_decimal_string)),
            minimum_payment_cents: ActiveValue::Set(debt.minimum_payment.map(Money::cents)),
            status: ActiveValue::Set(debt.status.as_str().to_string()),
            created_at: ActiveValue::Set(debt.created_at),
        }
    }
}

impl TryFrom<Model> for Debt {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "debt")?,
            household_id: parse_uuid(&model.household_id, "household")?,
            original_balance: stored_money(
                Some(&model.original_balance),
                model.original_balance_cents,
                "debts.original_balance",
            )?,
            remaining_balance: stored_money(
                Some(&model.remaining_balance),
                model.remaining_balance_cents,
                "debts.remaining_balance",
            )?,
            minimum_payment: stored_optional_money(
                model.minimum_payment.as_deref(),
                model.minimum_payment_cents,
                "debts.minimum_payment",
            )?,
            interest_rate_bps: u32::try_from(model.interest_rate_bps).map_err(|_| {
                EngineError::IntegrityViolation(format!(
                    "negative interest rate on debt {}",
                    model.id
                ))
            })?,
            status: DebtStatus::try_from(model.status.as_str())?,
            name: model.name,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debt(original: i64, remaining: i64) -> Debt {
        Debt {
            id: Uuid::new_v4(),
            household_id: Uuid::new_v4(),
            name: "Car".to_string(),
            original_balance: Money::new(original),
            remaining_balance: Money::new(remaining),
            interest_rate_bps: 0,
            minimum_payment: None,
            status: DebtStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percent_paid_is_floored() {
        assert_eq!(debt(10_000, 10_000).percent_paid(), 0);
        assert_eq!(debt(10_000, 7_501).percent_paid(), 24);
        assert_eq!(debt(10_000, 5_000).percent_paid(), 50);
        assert_eq!(debt(10_000, 0).percent_paid(), 100);
        assert_eq!(debt(10_000, 12_000).percent_paid(), 0);
        assert_eq!(debt(i64::MAX, i64::MIN).percent_paid(), 0);
    }
}
