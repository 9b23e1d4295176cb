//! Payoff milestones reached by a debt (25/50/75/100 % repaid).

use sea_orm::entity::prelude::*;

/// Percentages that are recorded as milestones.
pub const MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// Milestones reached at `percent_paid`, ascending.
pub fn reached(percent_paid: u8) -> impl Iterator<Item = u8> {
    MILESTONES.into_iter().filter(move |m| *m <= percent_paid)
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "debt_milestones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub household_id: String,
    pub debt_id: String,
    pub percentage: i32,
    pub reached_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::debts::Entity",
        from = "Column::DebtId",
        to = "super::debts::Column::Id"
    )]
    Debts,
}

impl Related<super::debts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Debts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
