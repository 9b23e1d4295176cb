//! Ledger-integrity core of a household finance application.
//!
//! Every monetary mutation runs inside one [`UnitOfWork`] obtained from
//! [`Engine::execute`]: it commits all its rows together or none of them.
//! Amounts are integer cents ([`Money`]); the legacy decimal columns are
//! derived and checked against the cents mirror on every write.

pub use accounts::{Account, AccountKind};
pub use amortization::PaymentSplit;
pub use balance::{BalancePlan, Projection};
pub use bill_payments::BillPayment;
pub use bills::{Bill, BillStatus};
pub use commands::{
    NewAccountCmd, NewBillCmd, NewDebtCmd, NewTransactionCmd, NewTransferCmd, SplitInput,
    TransactionPatch, TransferPatch,
};
pub use config::EngineConfig;
pub use currency::Currency;
pub use debt_payments::DebtPayment;
pub use debts::{Debt, DebtStatus};
pub use error::{EngineError, ErrorKind};
pub use events::{
    LedgerEvent, LedgerObserver, PendingWrite, TracingObserver, WriteInterceptor, WriteKind,
};
pub use guard::{Drift, DriftProblem, MonetaryRow, MoneyPair};
pub use household_members::MemberRole;
pub use households::Household;
pub use matching::{MatchConfidence, MatchingConfig, TransferSuggestion};
pub use money::Money;
pub use ops::{
    BackfillReport, BalanceCorrection, BalanceMismatch, Engine, EngineBuilder, IntegrityReport,
    LinkageSource, TransferSide, UnitFuture, UnitOfWork, UnparseableValue,
};
pub use splits::Split;
pub use touch::{TouchConfig, TouchThrottle};
pub use transactions::{Transaction, TransactionKind};
pub use transfers::{FeePolicy, Transfer};

pub mod amortization;
pub mod balance;
pub mod guard;
pub mod matching;

mod accounts;
mod bill_payments;
mod bills;
mod commands;
mod config;
mod currency;
mod debt_milestones;
mod debt_payments;
mod debts;
mod error;
mod events;
mod household_members;
mod households;
mod money;
mod ops;
mod splits;
mod touch;
mod transactions;
mod transfers;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
