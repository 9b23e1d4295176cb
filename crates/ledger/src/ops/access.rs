use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    Account, Bill, Debt, EngineError, Household, MemberRole, ResultEngine, Split, Transaction,
    Transfer, accounts, bills, debts, household_members, households, splits, transactions,
    transfers,
};

use super::{Access, Engine, UnitOfWork};

/// Generates a household-scoped lookup returning the domain type. Rows of
/// other households are reported exactly like missing ones.
macro_rules! impl_find_in_household {
    ($fn_name:ident, $module:ident, $domain:ty, $err_msg:literal) => {
        pub async fn $fn_name(&self, id: Uuid) -> ResultEngine<$domain> {
            let model = $module::Entity::find_by_id(id.to_string())
                .filter($module::Column::HouseholdId.eq(self.household_id.to_string()))
                .one(self.db)
                .await?
                .ok_or_else(|| EngineError::Ownership(format!("{} {id}", $err_msg)))?;
            <$domain>::try_from(model)
        }
    };
}

impl<'c> UnitOfWork<'c> {
    impl_find_in_household!(account, accounts, Account, "account not exists");
    impl_find_in_household!(transaction, transactions, Transaction, "transaction not exists");
    impl_find_in_household!(transfer, transfers, Transfer, "transfer not exists");
    impl_find_in_household!(bill, bills, Bill, "bill not exists");
    impl_find_in_household!(debt, debts, Debt, "debt not exists");

    pub(super) async fn authorize(&self) -> ResultEngine<()> {
        let household = households::Entity::find_by_id(self.household_id.to_string())
            .one(self.db)
            .await?;
        if household.is_none() {
            return Err(EngineError::Ownership(format!(
                "household not exists {}",
                self.household_id
            )));
        }
        if self.access == Access::Maintenance {
            return Ok(());
        }

        let role = member_role(self.db, self.household_id, self.user_id)
            .await?
            .ok_or_else(|| {
                EngineError::Ownership(format!("household not exists {}", self.household_id))
            })?;
        if self.access == Access::Write && !role.can_write() {
            return Err(EngineError::Ownership(format!(
                "user {} cannot write to household {}",
                self.user_id, self.household_id
            )));
        }
        Ok(())
    }

    /// Commands carry their household; it must be the unit's.
    pub(super) fn ensure_scope(&self, household_id: Uuid) -> ResultEngine<()> {
        if household_id != self.household_id {
            return Err(EngineError::Ownership(format!(
                "household {household_id} is outside this unit of work"
            )));
        }
        Ok(())
    }

    pub async fn household(&self) -> ResultEngine<Household> {
        let model = households::Entity::find_by_id(self.household_id.to_string())
            .one(self.db)
            .await?
            .ok_or_else(|| {
                EngineError::Ownership(format!("household not exists {}", self.household_id))
            })?;
        Household::try_from(model)
    }

    pub async fn accounts(&self) -> ResultEngine<Vec<Account>> {
        accounts::Entity::find()
            .filter(accounts::Column::HouseholdId.eq(self.household_id.to_string()))
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    pub async fn transactions_for_account(&self, account_id: Uuid) -> ResultEngine<Vec<Transaction>> {
        self.account(account_id).await?;
        transactions::Entity::find()
            .filter(transactions::Column::HouseholdId.eq(self.household_id.to_string()))
            .filter(transactions::Column::AccountId.eq(account_id.to_string()))
            .order_by_asc(transactions::Column::OccurredOn)
            .order_by_asc(transactions::Column::CreatedAt)
            .all(self.db)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    pub async fn splits(&self, transaction_id: Uuid) -> ResultEngine<Vec<Split>> {
        self.transaction(transaction_id).await?;
        self.splits_of(transaction_id).await
    }

    pub(super) async fn splits_of(&self, transaction_id: Uuid) -> ResultEngine<Vec<Split>> {
        splits::Entity::find()
            .filter(splits::Column::TransactionId.eq(transaction_id.to_string()))
            .order_by_asc(splits::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Split::try_from)
            .collect()
    }
}

pub(super) async fn member_role<C: ConnectionTrait>(
    db: &C,
    household_id: Uuid,
    user_id: &str,
) -> ResultEngine<Option<MemberRole>> {
    let row = household_members::Entity::find_by_id((household_id.to_string(), user_id.to_string()))
        .one(db)
        .await?;
    row.as_ref()
        .map(|m| MemberRole::try_from(m.role.as_str()))
        .transpose()
}

impl Engine {
    pub async fn account(
        &self,
        household_id: Uuid,
        user_id: &str,
        account_id: Uuid,
    ) -> ResultEngine<Account> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.account(account_id).await })
        })
        .await
    }

    pub async fn transaction(
        &self,
        household_id: Uuid,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.transaction(transaction_id).await })
        })
        .await
    }

    pub async fn transfer(
        &self,
        household_id: Uuid,
        user_id: &str,
        transfer_id: Uuid,
    ) -> ResultEngine<Transfer> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.transfer(transfer_id).await })
        })
        .await
    }

    /// Oldest first.
    pub async fn account_transactions(
        &self,
        household_id: Uuid,
        user_id: &str,
        account_id: Uuid,
    ) -> ResultEngine<Vec<Transaction>> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.transactions_for_account(account_id).await })
        })
        .await
    }

    pub async fn bill(&self, household_id: Uuid, user_id: &str, bill_id: Uuid) -> ResultEngine<Bill> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.bill(bill_id).await })
        })
        .await
    }

    pub async fn debt(&self, household_id: Uuid, user_id: &str, debt_id: Uuid) -> ResultEngine<Debt> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.debt(debt_id).await })
        })
        .await
    }

    pub async fn splits(
        &self,
        household_id: Uuid,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<Vec<Split>> {
        self.query(household_id, user_id, move |unit| {
            Box::pin(async move { unit.splits(transaction_id).await })
        })
        .await
    }
}
