//! Command structs for ledger write operations.
//!
//! These types group parameters for creates and patches, keeping call sites
//! readable and avoiding long argument lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{AccountKind, FeePolicy, Money, TransactionKind};

/// How a transaction amount is divided across categories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitInput {
    /// Explicit amounts; they must sum to the transaction amount.
    Amounts(Vec<(String, Money)>),
    /// Relative weights (e.g. percentages); allocated with the last share
    /// taking the remainder.
    Weights(Vec<(String, u64)>),
}

/// Create a non-transfer transaction.
#[derive(Clone, Debug)]
pub struct NewTransactionCmd {
    pub household_id: Uuid,
    pub user_id: String,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Money,
    pub occurred_on: NaiveDate,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub merchant_id: Option<String>,
    pub bill_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub savings_goal_id: Option<String>,
    pub splits: Option<SplitInput>,
    pub idempotency_key: Option<String>,
}

impl NewTransactionCmd {
    #[must_use]
    pub fn new(
        household_id: Uuid,
        user_id: impl Into<String>,
        account_id: Uuid,
        kind: TransactionKind,
        amount: Money,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            household_id,
            user_id: user_id.into(),
            account_id,
            kind,
            amount,
            occurred_on,
            description: None,
            category_id: None,
            merchant_id: None,
            bill_id: None,
            debt_id: None,
            savings_goal_id: None,
            splits: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    #[must_use]
    pub fn merchant_id(mut self, merchant_id: impl Into<String>) -> Self {
        self.merchant_id = Some(merchant_id.into());
        self
    }

    #[must_use]
    pub fn bill_id(mut self, bill_id: Uuid) -> Self {
        self.bill_id = Some(bill_id);
        self
    }

    #[must_use]
    pub fn debt_id(mut self, debt_id: Uuid) -> Self {
        self.debt_id = Some(debt_id);
        self
    }

    #[must_use]
    pub fn savings_goal_id(mut self, savings_goal_id: impl Into<String>) -> Self {
        self.savings_goal_id = Some(savings_goal_id.into());
        self
    }

    #[must_use]
    pub fn splits(mut self, splits: SplitInput) -> Self {
        self.splits = Some(splits);
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Partial update of a transaction. `None` leaves a field untouched; the
/// `Option<Option<_>>` fields can also clear a link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub amount: Option<Money>,
    pub kind: Option<TransactionKind>,
    pub account_id: Option<Uuid>,
    pub occurred_on: Option<NaiveDate>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<String>>,
    pub bill_id: Option<Option<Uuid>>,
    pub debt_id: Option<Option<Uuid>>,
    pub splits: Option<SplitInput>,
}

impl TransactionPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn occurred_on(mut self, occurred_on: NaiveDate) -> Self {
        self.occurred_on = Some(occurred_on);
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Option<String>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn bill_id(mut self, bill_id: Option<Uuid>) -> Self {
        self.bill_id = Some(bill_id);
        self
    }

    #[must_use]
    pub fn debt_id(mut self, debt_id: Option<Uuid>) -> Self {
        self.debt_id = Some(debt_id);
        self
    }

    #[must_use]
    pub fn splits(mut self, splits: SplitInput) -> Self {
        self.splits = Some(splits);
        self
    }

    /// True when the patch changes what a linked payment was computed from.
    pub(crate) fn touches_payment(&self) -> bool {
        self.amount.is_some()
            || self.kind.is_some()
            || self.bill_id.is_some()
            || self.debt_id.is_some()
    }
}

/// Create a transfer between two accounts of the same household.
#[derive(Clone, Debug)]
pub struct NewTransferCmd {
    pub household_id: Uuid,
    pub user_id: String,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Money,
    pub occurred_on: NaiveDate,
    pub fees: Option<Money>,
    pub fee_policy: Option<FeePolicy>,
    pub description: Option<String>,
}

impl NewTransferCmd {
    #[must_use]
    pub fn new(
        household_id: Uuid,
        user_id: impl Into<String>,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Money,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            household_id,
            user_id: user_id.into(),
            from_account_id,
            to_account_id,
            amount,
            occurred_on,
            fees: None,
            fee_policy: None,
            description: None,
        }
    }

    #[must_use]
    pub fn fees(mut self, fees: Money) -> Self {
        self.fees = Some(fees);
        self
    }

    #[must_use]
    pub fn fee_policy(mut self, fee_policy: FeePolicy) -> Self {
        self.fee_policy = Some(fee_policy);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a transfer; applied to the transfer row and both legs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferPatch {
    pub amount: Option<Money>,
    pub fees: Option<Option<Money>>,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub occurred_on: Option<NaiveDate>,
    pub description: Option<Option<String>>,
}

impl TransferPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn fees(mut self, fees: Option<Money>) -> Self {
        self.fees = Some(fees);
        self
    }

    #[must_use]
    pub fn from_account_id(mut self, account_id: Uuid) -> Self {
        self.from_account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn to_account_id(mut self, account_id: Uuid) -> Self {
        self.to_account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn occurred_on(mut self, occurred_on: NaiveDate) -> Self {
        self.occurred_on = Some(occurred_on);
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }
}

/// Open a new account.
#[derive(Clone, Debug)]
pub struct NewAccountCmd {
    pub household_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub kind: AccountKind,
    pub opening_balance: Money,
    pub available_balance: Option<Money>,
    pub credit_limit: Option<Money>,
}

impl NewAccountCmd {
    #[must_use]
    pub fn new(
        household_id: Uuid,
        user_id: impl Into<String>,
        name: impl Into<String>,
        kind: AccountKind,
        opening_balance: Money,
    ) -> Self {
        Self {
            household_id,
            user_id: user_id.into(),
            name: name.into(),
            kind,
            opening_balance,
            available_balance: None,
            credit_limit: None,
        }
    }

    #[must_use]
    pub fn available_balance(mut self, available: Money) -> Self {
        self.available_balance = Some(available);
        self
    }

    #[must_use]
    pub fn credit_limit(mut self, limit: Money) -> Self {
        self.credit_limit = Some(limit);
        self
    }
}

/// Register a bill.
#[derive(Clone, Debug)]
pub struct NewBillCmd {
    pub household_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub amount_due: Money,
    pub interest_rate_bps: u32,
    pub due_on: Option<NaiveDate>,
}

impl NewBillCmd {
    #[must_use]
    pub fn new(
        household_id: Uuid,
        user_id: impl Into<String>,
        name: impl Into<String>,
        amount_due: Money,
    ) -> Self {
        Self {
            household_id,
            user_id: user_id.into(),
            name: name.into(),
            amount_due,
            interest_rate_bps: 0,
            due_on: None,
        }
    }

    #[must_use]
    pub fn interest_rate_bps(mut self, bps: u32) -> Self {
        self.interest_rate_bps = bps;
        self
    }

    #[must_use]
    pub fn due_on(mut self, due_on: NaiveDate) -> Self {
        self.due_on = Some(due_on);
        self
    }
}

/// Register a debt.
#[derive(Clone, Debug)]
pub struct NewDebtCmd {
    pub household_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub balance: Money,
    pub interest_rate_bps: u32,
    pub minimum_payment: Option<Money>,
}

impl NewDebtCmd {
    #[must_use]
    pub fn new(
        household_id: Uuid,
        user_id: impl Into<String>,
        name: impl Into<String>,
        balance: Money,
    ) -> Self {
        Self {
            household_id,
            user_id: user_id.into(),
            name: name.into(),
            balance,
            interest_rate_bps: 0,
            minimum_payment: None,
        }
    }

    #[must_use]
    pub fn interest_rate_bps(mut self, bps: u32) -> Self {
        self.interest_rate_bps = bps;
        self
    }

    #[must_use]
    pub fn minimum_payment(mut self, minimum: Money) -> Self {
        self.minimum_payment = Some(minimum);
        self
    }
}
