//! A payment applied against a bill, derived from one transaction.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money,
    guard::{MonetaryRow, MoneyPair},
    util::{parse_uuid, stored_money},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPayment {
    pub id: Uuid,
    pub household_id: Uuid,
    pub bill_id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Money,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub balance_before_payment: Money,
    pub balance_after_payment: Money,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bill_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub household_id: String,
    pub bill_id: String,
    pub transaction_id: String,
    pub amount: String,
    pub amount_cents: Option<i64>,
    pub principal_amount: String,
    pub principal_amount_cents: Option<i64>,
    pub interest_amount: String,
    pub interest_amount_cents: Option<i64>,
    pub balance_before_payment: String,
    pub balance_before_payment_cents: Option<i64>,
    pub balance_after_payment: String,
    pub balance_after_payment_cents: Option<i64>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bills::Entity",
        from = "Column::BillId",
        to = "super::bills::Column::Id"
    )]
    Bills,
}

impl Related<super::bills::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bills.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl MonetaryRow for Model {
    const TABLE: &'static str = "bill_payments";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn money_pairs(&self) -> Vec<MoneyPair<'_>> {
        vec![
            MoneyPair::new("amount", Some(&self.amount), self.amount_cents),
            MoneyPair::new(
                "principal_amount",
                Some(&self.principal_amount),
                self.principal_amount_cents,
            ),
            MoneyPair::new(
                "interest_amount",
                Some(&self.interest_amount),
                self.interest_amount_cents,
            ),
            MoneyPair::new(
                "balance_before_payment",
                Some(&self.balance_before_payment),
                self.balance_before_payment_cents,
            ),
            MoneyPair::new(
                "balance_after_payment",
                Some(&self.balance_after_payment),
                self.balance_after_payment_cents,
            ),
        ]
    }
}

impl From<&BillPayment> for ActiveModel {
    fn from(payment: &BillPayment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id.to_string()),
            household_id: ActiveValue::Set(payment.household_id.to_string()),
            bill_id: ActiveValue::Set(payment.bill_id.to_string()),
            transaction_id: ActiveValue::Set(payment.transaction_id.to_string()),
            amount: ActiveValue::Set(payment.amount.to_decimal_string()),
            amount_cents: ActiveValue::Set(Some(payment.amount.cents())),
            principal_amount: ActiveValue::Set(payment.principal_amount.to_decimal_string()),
            principal_amount_cents: ActiveValue::Set(Some(payment.principal_amount.cents())),
            interest_amount: ActiveValue::Set(payment.interest_amount.to_decimal_string()),
            interest_amount_cents: ActiveValue::Set(Some(payment.interest_amount.cents())),
            balance_before_payment: ActiveValue::Set(
                payment.balance_before_payment.to_decimal_string(),
            ),
            balance_before_payment_cents: ActiveValue::Set(Some(
                payment.balance_before_payment.cents(),
            )),
            balance_after_payment: ActiveValue::Set(
                payment.balance_after_payment.to_decimal_string(),
            ),
            balance_after_payment_cents: ActiveValue::Set(Some(
                payment.balance_after_payment.cents(),
            )),
            idempotency_key: ActiveValue::Set(payment.idempotency_key.clone()),
            created_at: ActiveValue::Set(payment.created_at),
        }
    }
}

impl TryFrom<Model> for BillPayment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "bill payment")?,
            household_id: parse_uuid(&model.household_id, "household")?,
            bill_id: parse_uuid(&model.bill_id, "bill")?,
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            amount: stored_money(
                Some(&model.amount),
                model.amount_cents,
                "bill_payments.amount",
            )?,
            principal_amount: stored_money(
                Some(&model.principal_amount),
                model.principal_amount_cents,
                "bill_payments.principal_amount",
            )?,
            interest_amount: stored_money(
                Some(&model.interest_amount),
                model.interest_amount_cents,
                "bill_payments.interest_amount",
            )?,
            balance_before_payment: stored_money(
                Some(&model.balance_before_payment),
                model.balance_before_payment_cents,
                "bill_payments.balance_before_payment",
            )?,
            balance_after_payment: stored_money(
                Some(&model.balance_after_payment),
                model.balance_after_payment_cents,
                "bill_payments.balance_after_payment",
            )?,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
        })
    }
}
