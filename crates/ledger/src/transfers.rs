//! The module contains `Transfer`, the record pairing two transaction legs.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine,
    guard::{MonetaryRow, MoneyPair},
    util::{parse_optional_uuid, parse_uuid, stored_money, stored_optional_money},
};

/// Who bears the transfer fees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// Source leg is `amount + fees`, destination receives `amount`.
    #[default]
    SourcePays,
    /// Source leg is `amount`, destination receives `amount - fees`.
    DeductedFromDestination,
}

impl FeePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourcePays => "source_pays",
            Self::DeductedFromDestination => "deducted_from_destination",
        }
    }

    /// Amounts of the outgoing and incoming legs for a transfer.
    pub fn leg_amounts(self, amount: Money, fees: Option<Money>) -> ResultEngine<(Money, Money)> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "transfer amount must be > 0".to_string(),
            ));
        }
        let fees = fees.unwrap_or(Money::ZERO);
        if fees.is_negative() {
            return Err(EngineError::Validation(
                "transfer fees must be >= 0".to_string(),
            ));
        }
        match self {
            Self::SourcePays => Ok((amount.checked_add(fees)?, amount)),
            Self::DeductedFromDestination => {
                if fees >= amount {
                    return Err(EngineError::Validation(
                        "transfer fees must be below the amount".to_string(),
                    ));
                }
                Ok((amount, amount.checked_sub(fees)?))
            }
        }
    }
}

impl TryFrom<&str> for FeePolicy {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "source_pays" => Ok(Self::SourcePays),
            "deducted_from_destination" => Ok(Self::DeductedFromDestination),
            other => Err(EngineError::Validation(format!(
                "invalid fee policy: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub household_id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Money,
    pub fees: Option<Money>,
    pub fee_policy: FeePolicy,
    pub occurred_on: NaiveDate,
    pub description: Option<String>,
    pub from_transaction_id: Option<Uuid>,
    pub to_transaction_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub household_id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount: String,
    pub amount_cents: Option<i64>,
    pub fees: Option<String>,
    pub fees_cents: Option<i64>,
    pub fee_policy: String,
    pub occurred_on: Date,
    pub description: Option<String>,
    pub from_transaction_id: Option<String>,
    pub to_transaction_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl MonetaryRow for Model {
    const TABLE: &'static str = "transfers";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn money_pairs(&self) -> Vec<MoneyPair<'_>> {
        vec![
            MoneyPair::new("amount", Some(&self.amount), self.amount_cents),
            MoneyPair::new("fees", self.fees.as_deref(), self.fees_cents),
        ]
    }
}

impl From<&Transfer> for ActiveModel {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: ActiveValue::Set(transfer.id.to_string()),
            household_id: ActiveValue::Set(transfer.household_id.to_string()),
            from_account_id: ActiveValue::Set(transfer.from_account_id.to_string()),
            to_account_id: ActiveValue::Set(transfer.to_account_id.to_string()),
            amount: ActiveValue::Set(transfer.amount.to_decimal_string()),
            amount_cents: ActiveValue::Set(Some(transfer.amount.cents())),
            fees: ActiveValue::Set(transfer.fees.map(Money::to_decimal_string)),
            fees_cents: ActiveValue::Set(transfer.fees.map(Money::cents)),
            fee_policy: ActiveValue::Set(transfer.fee_policy.as_str().to_string()),
            occurred_on: ActiveValue::Set(transfer.occurred_on),
            description: ActiveValue::Set(transfer.description.clone()),
            from_transaction_id: ActiveValue::Set(
                transfer.from_transaction_id.map(|id| id.to_string()),
            ),
            to_transaction_id: ActiveValue::Set(
                transfer.to_transaction_id.map(|id| id.to_string()),
            ),
            created_by: ActiveValue::Set(transfer.created_by.clone()),
            created_at: ActiveValue::Set(transfer.created_at),
        }
    }
}

impl TryFrom<Model> for Transfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transfer")?,
            household_id: parse_uuid(&model.household_id, "household")?,
            from_account_id: parse_uuid(&model.from_account_id, "account")?,
            to_account_id: parse_uuid(&model.to_account_id, "account")?,
            amount: stored_money(
                Some(&model.amount),
                model.amount_cents,
                "transfers.amount",
            )?,
            fees: stored_optional_money(model.fees.as_deref(), model.fees_cents, "transfers.fees")?,
            fee_policy: FeePolicy::try_from(model.fee_policy.as_str())?,
            from_transaction_id: parse_optional_uuid(
                model.from_transaction_id.as_deref(),
                "transaction",
            )?,
            to_transaction_id: parse_optional_uuid(
                model.to_transaction_id.as_deref(),
                "transaction",
            )?,
            occurred_on: model.occurred_on,
            description: model.description,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_pays_charges_fees_on_outgoing_leg() {
        let (out, inc) = FeePolicy::SourcePays
            .leg_amounts(Money::new(2550), Some(Money::new(100)))
            .unwrap();
        assert_eq!(out, Money::new(2650));
        assert_eq!(inc, Money::new(2550));
    }

    #[test]
    fn deducted_from_destination_reduces_incoming_leg() {
        let (out, inc) = FeePolicy::DeductedFromDestination
            .leg_amounts(Money::new(2550), Some(Money::new(50)))
            .unwrap();
        assert_eq!(out, Money::new(2550));
        assert_eq!(inc, Money::new(2500));

        assert!(
            FeePolicy::DeductedFromDestination
                .leg_amounts(Money::new(50), Some(Money::new(50)))
                .is_err()
        );
    }

    #[test]
    fn invalid_amounts_are_rejected() {
        assert!(FeePolicy::SourcePays.leg_amounts(Money::ZERO, None).is_err());
        assert!(
            FeePolicy::SourcePays
                .leg_amounts(Money::new(10), Some(Money::new(-1)))
                .is_err()
        );
    }
}
