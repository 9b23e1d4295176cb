//! Transfer linkage resolution across old and new row shapes.
//!
//! Reads try canonical linkage first (`paired_transaction_id`), then the
//! transfer row's leg ids, then the overloaded `merchant_id` of the oldest
//! legs. Everything that knows about the older shapes lives here so it can be
//! removed once linkage is backfilled.

use sea_orm::{Condition, QueryFilter, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Transaction, Transfer, transactions, transfers};

use super::UnitOfWork;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageSource {
    /// `transfer_group_id` / `paired_transaction_id` on the transaction.
    Canonical,
    /// Only the transfer row references the leg.
    TransferRecord,
    /// The leg's `merchant_id` holds the counterpart account id.
    LegacyMerchant,
}

/// The other side of a transfer leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferSide {
    pub source: LinkageSource,
    pub counterpart_account_id: Uuid,
    pub counterpart_transaction_id: Option<Uuid>,
    pub transfer_id: Option<Uuid>,
}

impl<'c> UnitOfWork<'c> {
    /// Resolves where `tx` moves money to or from, if it is a transfer leg.
    pub async fn resolve_transfer_side(&self, tx: &Transaction) -> ResultEngine<Option<TransferSide>> {
        if let Some(paired_id) = tx.paired_transaction_id {
            let sibling = self.transaction(paired_id).await.map_err(|err| match err {
                EngineError::Ownership(_) => EngineError::IntegrityViolation(format!(
                    "transaction {} is paired with missing transaction {paired_id}",
                    tx.id
                )),
                other => other,
            })?;
            let transfer = self.transfer_referencing(tx.id).await?;
            return Ok(Some(TransferSide {
                source: LinkageSource::Canonical,
                counterpart_account_id: sibling.account_id,
                counterpart_transaction_id: Some(sibling.id),
                transfer_id: transfer.map(|t| t.id),
            }));
        }

        if let Some(transfer) = self.transfer_referencing(tx.id).await? {
            let (counterpart_account_id, counterpart_transaction_id) =
                if transfer.from_transaction_id == Some(tx.id) {
                    (transfer.to_account_id, transfer.to_transaction_id)
                } else {
                    (transfer.from_account_id, transfer.from_transaction_id)
                };
            return Ok(Some(TransferSide {
                source: LinkageSource::TransferRecord,
                counterpart_account_id,
                counterpart_transaction_id,
                transfer_id: Some(transfer.id),
            }));
        }

        if tx.kind.is_transfer()
            && let Some(candidate) = tx
                .merchant_id
                .as_deref()
                .and_then(|value| Uuid::parse_str(value).ok())
            && let Ok(account) = self.account(candidate).await
        {
            return Ok(Some(TransferSide {
                source: LinkageSource::LegacyMerchant,
                counterpart_account_id: account.id,
                counterpart_transaction_id: None,
                transfer_id: None,
            }));
        }

        Ok(None)
    }

    /// The transfer a leg belongs to, or `None` for ordinary transactions.
    ///
    /// A transfer-typed or canonically linked transaction without a transfer
    /// row is an orphan and reported as an integrity violation.
    pub(super) async fn linked_transfer(&self, tx: &Transaction) -> ResultEngine<Option<Transfer>> {
        let side = self.resolve_transfer_side(tx).await?;
        match side.and_then(|s| s.transfer_id) {
            Some(transfer_id) => self.transfer(transfer_id).await.map(Some),
            None if tx.kind.is_transfer() || tx.has_canonical_linkage() => {
                Err(EngineError::IntegrityViolation(format!(
                    "transfer leg {} has no transfer record",
                    tx.id
                )))
            }
            None => Ok(None),
        }
    }

    /// Both legs of a transfer. A missing leg is an integrity violation.
    pub(super) async fn transfer_legs(
        &self,
        transfer: &Transfer,
    ) -> ResultEngine<(Transaction, Transaction)> {
        let missing = |side: &str| {
            EngineError::IntegrityViolation(format!(
                "transfer {} is missing its {side} leg",
                transfer.id
            ))
        };
        let out_id = transfer.from_transaction_id.ok_or_else(|| missing("outgoing"))?;
        let in_id = transfer.to_transaction_id.ok_or_else(|| missing("incoming"))?;
        let leg_error = |side: &'static str| {
            move |err: EngineError| match err {
                EngineError::Ownership(_) => missing(side),
                other => other,
            }
        };
        let outgoing = self
            .transaction(out_id)
            .await
            .map_err(leg_error("outgoing"))?;
        let incoming = self
            .transaction(in_id)
            .await
            .map_err(leg_error("incoming"))?;
        Ok((outgoing, incoming))
    }

    async fn transfer_referencing(&self, transaction_id: Uuid) -> ResultEngine<Option<Transfer>> {
        let id = transaction_id.to_string();
        transfers::Entity::find()
            .filter(transfers::Column::HouseholdId.eq(self.household_id.to_string()))
            .filter(
                Condition::any()
                    .add(transfers::Column::FromTransactionId.eq(id.clone()))
                    .add(transfers::Column::ToTransactionId.eq(id)),
            )
            .one(self.db)
            .await?
            .map(Transfer::try_from)
            .transpose()
    }

    /// True when either canonical or legacy linkage exists for `tx`.
    pub(super) async fn is_linked(&self, tx: &Transaction) -> ResultEngine<bool> {
        if tx.kind.is_transfer() || tx.has_canonical_linkage() {
            return Ok(true);
        }
        Ok(self.resolve_transfer_side(tx).await?.is_some())
    }

    /// Ids of every transaction referenced by a transfer row of the household.
    pub(super) async fn transfer_referenced_ids(&self) -> ResultEngine<Vec<Uuid>> {
        let rows = transfers::Entity::find()
            .filter(transfers::Column::HouseholdId.eq(self.household_id.to_string()))
            .all(self.db)
            .await?;
        let mut ids = Vec::with_capacity(rows.len() * 2);
        for row in rows {
            let transfer = Transfer::try_from(row)?;
            ids.extend(transfer.from_transaction_id);
            ids.extend(transfer.to_transaction_id);
        }
        Ok(ids)
    }

    pub(super) async fn unlinked_transactions(&self) -> ResultEngine<Vec<Transaction>> {
        let referenced: std::collections::HashSet<Uuid> =
            self.transfer_referenced_ids().await?.into_iter().collect();
        let rows = transactions::Entity::find()
            .filter(transactions::Column::HouseholdId.eq(self.household_id.to_string()))
            .filter(transactions::Column::TransferGroupId.is_null())
            .filter(transactions::Column::PairedTransactionId.is_null())
            .all(self.db)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let tx = Transaction::try_from(row)?;
            if tx.kind.is_transfer() || referenced.contains(&tx.id) {
                continue;
            }
            out.push(tx);
        }
        Ok(out)
    }
}
