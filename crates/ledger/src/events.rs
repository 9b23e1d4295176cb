//! Ledger events and post-commit hooks.
//!
//! Events are buffered by a unit of work and handed to the observer only after
//! the unit commits. Observers and interceptors are injected through
//! [`EngineBuilder`](crate::EngineBuilder).

use std::fmt;

use sea_orm::DbErr;
use serde::Serialize;
use uuid::Uuid;

use crate::{Money, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransactionRecorded {
        transaction_id: Uuid,
        account_id: Uuid,
    },
    TransactionUpdated {
        transaction_id: Uuid,
        account_id: Uuid,
    },
    TransactionDeleted {
        transaction_id: Uuid,
        account_id: Uuid,
    },
    TransferRecorded {
        transfer_id: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
    },
    TransferUpdated {
        transfer_id: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
    },
    TransferDeleted {
        transfer_id: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
    },
    BillPaid {
        bill_id: Uuid,
        payment_id: Uuid,
        remaining_balance: Money,
    },
    DebtPaid {
        debt_id: Uuid,
        payment_id: Uuid,
        remaining_balance: Money,
    },
    PaymentReversed {
        payment_id: Uuid,
        transaction_id: Uuid,
    },
}

impl LedgerEvent {
    /// Accounts whose activity timestamp this event refreshes.
    pub fn touched_accounts(&self) -> Vec<Uuid> {
        match self {
            Self::TransactionRecorded { account_id, .. }
            | Self::TransactionUpdated { account_id, .. }
            | Self::TransactionDeleted { account_id, .. } => vec![*account_id],
            Self::TransferRecorded {
                from_account_id,
                to_account_id,
                ..
            }
            | Self::TransferUpdated {
                from_account_id,
                to_account_id,
                ..
            }
            | Self::TransferDeleted {
                from_account_id,
                to_account_id,
                ..
            } => vec![*from_account_id, *to_account_id],
            Self::BillPaid { .. } | Self::DebtPaid { .. } | Self::PaymentReversed { .. } => {
                Vec::new()
            }
        }
    }
}

/// Receives committed events. Failures are logged and never undo the commit.
pub trait LedgerObserver: Send + Sync + fmt::Debug {
    fn notify(&self, event: &LedgerEvent) -> ResultEngine<()>;
}

/// Default observer: one `tracing` line per event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl LedgerObserver for TracingObserver {
    fn notify(&self, event: &LedgerEvent) -> ResultEngine<()> {
        tracing::info!(?event, "ledger event committed");
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// A row write about to happen inside a unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingWrite<'a> {
    pub table: &'a str,
    pub kind: WriteKind,
    /// Zero-based position of this write within its unit.
    pub ordinal: usize,
}

/// Hook called before every row write of a unit. An error fails the write
/// exactly as a storage error would.
pub trait WriteInterceptor: Send + Sync + fmt::Debug {
    fn before_write(&self, write: &PendingWrite<'_>) -> Result<(), DbErr>;
}
