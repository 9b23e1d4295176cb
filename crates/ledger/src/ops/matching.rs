use uuid::Uuid;

use crate::{ResultEngine, TransactionKind, TransferSuggestion, matching};

use super::{Engine, UnitOfWork};

impl<'c> UnitOfWork<'c> {
    /// Candidate transfer pairs among unlinked transactions. Nothing is
    /// persisted; accepting a pair goes through `accept_transfer_match`.
    pub async fn suggest_transfer_matches(&self) -> ResultEngine<Vec<TransferSuggestion>> {
        let (outflows, inflows): (Vec<_>, Vec<_>) = self
            .unlinked_transactions()
            .await?
            .into_iter()
            .filter(|tx| {
                matches!(
                    tx.kind,
                    TransactionKind::Expense | TransactionKind::Income | TransactionKind::Refund
                )
            })
            .partition(|tx| tx.kind == TransactionKind::Expense);
        Ok(matching::suggest(
            &outflows,
            &inflows,
            &self.config().matching,
        ))
    }
}

impl Engine {
    pub async fn suggest_transfer_matches(
        &self,
        household_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<TransferSuggestion>> {
        self.query(household_id, user_id, |unit| {
            Box::pin(async move { unit.suggest_transfer_matches().await })
        })
        .await
    }

    /// Operator variant of [`Engine::suggest_transfer_matches`] that needs no
    /// membership.
    pub async fn suggest_transfer_matches_for(
        &self,
        household_id: Uuid,
    ) -> ResultEngine<Vec<TransferSuggestion>> {
        self.execute_maintenance(household_id, |unit| {
            Box::pin(async move { unit.suggest_transfer_matches().await })
        })
        .await
    }
}
