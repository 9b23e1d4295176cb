//! Seeding operations for households and the entities the ledger points at.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, TransactionTrait};
use tracing::info;
use uuid::Uuid;

use crate::{
    Account, Bill, BillStatus, Currency, Debt, DebtStatus, EngineError, Household, MemberRole,
    NewAccountCmd, NewBillCmd, NewDebtCmd, ResultEngine, accounts, bills, debts,
    household_members, households,
    util::{normalize_required_name, require_positive},
};

use super::{Engine, UnitOfWork, access::member_role, with_tx};

impl<'c> UnitOfWork<'c> {
    pub async fn new_account(&self, cmd: NewAccountCmd) -> ResultEngine<Account> {
        self.ensure_scope(cmd.household_id)?;
        let name = normalize_required_name(&cmd.name, "account")?;
        if cmd.credit_limit.is_some_and(|limit| limit.is_negative()) {
            return Err(EngineError::Validation(
                "credit limit must be >= 0".to_string(),
            ));
        }
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            owner_user_id: self.user_id.to_string(),
            name,
            kind: cmd.kind,
            opening_balance: cmd.opening_balance,
            current_balance: cmd.opening_balance,
            available_balance: cmd.available_balance,
            credit_limit: cmd.credit_limit,
            version: 0,
            is_active: true,
            last_activity_at: None,
            created_at: now,
        };
        Account::try_from(self.insert(accounts::ActiveModel::from(&account)).await?)
    }

    /// Soft delete: the account keeps its history but takes no new activity.
    pub async fn deactivate_account(&self, account_id: Uuid) -> ResultEngine<Account> {
        let account = self.account(account_id).await?;
        if !account.is_active {
            return Ok(account);
        }
        let account = Account {
            is_active: false,
            version: account.version + 1,
            ..account
        };
        Account::try_from(self.update(accounts::ActiveModel::from(&account)).await?)
    }

    pub async fn new_bill(&self, cmd: NewBillCmd) -> ResultEngine<Bill> {
        self.ensure_scope(cmd.household_id)?;
        let name = normalize_required_name(&cmd.name, "bill")?;
        require_positive(cmd.amount_due, "bill amount")?;
        let bill = Bill {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            name,
            amount_due: cmd.amount_due,
            remaining_balance: cmd.amount_due,
            interest_rate_bps: cmd.interest_rate_bps,
            status: BillStatus::Open,
            due_on: cmd.due_on,
            created_at: Utc::now(),
        };
        Bill::try_from(self.insert(bills::ActiveModel::from(&bill)).await?)
    }

    pub async fn new_debt(&self, cmd: NewDebtCmd) -> ResultEngine<Debt> {
        self.ensure_scope(cmd.household_id)?;
        let name = normalize_required_name(&cmd.name, "debt")?;
        require_positive(cmd.balance, "debt balance")?;
        if let Some(minimum) = cmd.minimum_payment {
            require_positive(minimum, "minimum payment")?;
        }
        let debt = Debt {
            id: Uuid::new_v4(),
            household_id: self.household_id,
            name,
            original_balance: cmd.balance,
            remaining_balance: cmd.balance,
            interest_rate_bps: cmd.interest_rate_bps,
            minimum_payment: cmd.minimum_payment,
            status: DebtStatus::Active,
            created_at: Utc::now(),
        };
        Debt::try_from(self.insert(debts::ActiveModel::from(&debt)).await?)
    }
}

impl Engine {
    /// Add a new household owned by `owner`.
    pub async fn new_household(
        &self,
        name: &str,
        owner: &str,
        currency: Option<Currency>,
    ) -> ResultEngine<Household> {
        let name = normalize_required_name(name, "household")?;
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(EngineError::Validation(
                "household owner must not be empty".to_string(),
            ));
        }
        let household = Household::new(name, currency.unwrap_or_default());
        let entry: households::ActiveModel = (&household).into();
        with_tx!(self, |db_tx| {
            entry.insert(&db_tx).await?;
            let membership = household_members::ActiveModel {
                household_id: ActiveValue::Set(household.id.to_string()),
                user_id: ActiveValue::Set(owner.to_string()),
                role: ActiveValue::Set(MemberRole::Owner.as_str().to_string()),
            };
            membership.insert(&db_tx).await?;
            Ok::<_, EngineError>(())
        })?;
        info!(household_id = %household.id, "household created");
        Ok(household)
    }

    /// Only owners may add members.
    pub async fn add_household_member(
        &self,
        household_id: Uuid,
        acting_user: &str,
        user_id: &str,
        role: MemberRole,
    ) -> ResultEngine<()> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(EngineError::Validation(
                "member user id must not be empty".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            match member_role(&db_tx, household_id, acting_user).await? {
                Some(MemberRole::Owner) => {}
                Some(_) => {
                    return Err(EngineError::Ownership(format!(
                        "user {acting_user} cannot manage members of household {household_id}"
                    )));
                }
                None => {
                    return Err(EngineError::Ownership(format!(
                        "household not exists {household_id}"
                    )));
                }
            }
            if member_role(&db_tx, household_id, user_id).await?.is_some() {
                return Err(EngineError::Conflict(format!(
                    "user {user_id} is already a member of household {household_id}"
                )));
            }
            let membership = household_members::ActiveModel {
                household_id: ActiveValue::Set(household_id.to_string()),
                user_id: ActiveValue::Set(user_id.to_string()),
                role: ActiveValue::Set(role.as_str().to_string()),
            };
            membership.insert(&db_tx).await?;
            Ok(())
        })
    }

    pub async fn new_account(&self, cmd: NewAccountCmd) -> ResultEngine<Account> {
        let household_id = cmd.household_id;
        let user_id = cmd.user_id.clone();
        self.execute(household_id, &user_id, move |unit| {
            let cmd = cmd.clone();
            Box::pin(async move { unit.new_account(cmd).await })
        })
        .await
    }

    pub async fn deactivate_account(
        &self,
        household_id: Uuid,
        user_id: &str,
        account_id: Uuid,
    ) -> ResultEngine<Account> {
        self.execute(household_id, user_id, move |unit| {
            Box::pin(async move { unit.deactivate_account(account_id).await })
        })
        .await
    }

    pub async fn new_bill(&self, cmd: NewBillCmd) -> ResultEngine<Bill> {
        let household_id = cmd.household_id;
        let user_id = cmd.user_id.clone();
        self.execute(household_id, &user_id, move |unit| {
            let cmd = cmd.clone();
            Box::pin(async move { unit.new_bill(cmd).await })
        })
        .await
    }

    pub async fn new_debt(&self, cmd: NewDebtCmd) -> ResultEngine<Debt> {
        let household_id = cmd.household_id;
        let user_id = cmd.user_id.clone();
        self.execute(household_id, &user_id, move |unit| {
            let cmd = cmd.clone();
            Box::pin(async move { unit.new_debt(cmd).await })
        })
        .await
    }
}
