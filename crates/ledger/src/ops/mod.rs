use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, PrimaryKeyTrait, QueryFilter, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    EngineConfig, EngineError, LedgerEvent, LedgerObserver, ResultEngine, TouchThrottle,
    TracingObserver, WriteInterceptor, WriteKind, accounts,
    events::PendingWrite,
    guard::{self, MonetaryRow},
};

mod access;
mod backfill;
mod balances;
mod integrity;
mod legacy;
mod matching;
mod payments;
mod setup;
mod transactions;
mod transfers;

pub use backfill::{BackfillReport, UnparseableValue};
pub use balances::BalanceCorrection;
pub use integrity::{BalanceMismatch, IntegrityReport};
pub use legacy::{LinkageSource, TransferSide};

/// Run a block inside a plain DB transaction, committing on success. Used by
/// the setup operations that run before a household unit can exist.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Future returned by a unit-of-work closure.
pub type UnitFuture<'c, T> = Pin<Box<dyn Future<Output = ResultEngine<T>> + Send + 'c>>;

/// Actor used by maintenance units that are not run on behalf of a member.
const SYSTEM_ACTOR: &str = "system";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    /// Household must exist; no membership required.
    Maintenance,
}

/// One async mutex per household. Units of different households never share
/// a lock.
#[derive(Debug, Default)]
struct HouseholdLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl HouseholdLocks {
    async fn acquire(&self, household_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(inner.entry(household_id).or_default())
        };
        lock.lock_owned().await
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    config: EngineConfig,
    locks: HouseholdLocks,
    touch: Arc<TouchThrottle>,
    observer: Arc<dyn LedgerObserver>,
    interceptor: Option<Arc<dyn WriteInterceptor>>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn touch_throttle(&self) -> &TouchThrottle {
        &self.touch
    }

    /// Runs `work` as one atomic unit on behalf of `user_id`.
    ///
    /// The unit holds the household's write lock, commits only if `work`
    /// returns `Ok`, and rolls back every write otherwise. Transient failures
    /// (including the write timeout) re-run the whole closure up to
    /// `max_retries` times. Events emitted by the unit reach the observer only
    /// after the commit, outside the lock.
    ///
    /// ```rust,ignore
    /// let transfer = engine
    ///     .execute(household_id, "alice", |unit| {
    ///         let cmd = cmd.clone();
    ///         Box::pin(async move { unit.create_transfer(cmd).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn execute<T, F>(&self, household_id: Uuid, user_id: &str, work: F) -> ResultEngine<T>
    where
        T: Send,
        F: for<'c> Fn(UnitOfWork<'c>) -> UnitFuture<'c, T> + Send + Sync,
    {
        self.execute_with(Access::Write, household_id, user_id, &work)
            .await
    }

    /// Runs `work` as a read-only unit. Any write attempt fails the unit.
    pub async fn query<T, F>(&self, household_id: Uuid, user_id: &str, work: F) -> ResultEngine<T>
    where
        T: Send,
        F: for<'c> Fn(UnitOfWork<'c>) -> UnitFuture<'c, T> + Send + Sync,
    {
        self.run_unit(Access::Read, household_id, user_id, &work)
            .await
            .map(|(value, _)| value)
    }

    async fn execute_maintenance<T, F>(&self, household_id: Uuid, work: F) -> ResultEngine<T>
    where
        T: Send,
        F: for<'c> Fn(UnitOfWork<'c>) -> UnitFuture<'c, T> + Send + Sync,
    {
        self.execute_with(Access::Maintenance, household_id, SYSTEM_ACTOR, &work)
            .await
    }

    async fn execute_with<T, F>(
        &self,
        access: Access,
        household_id: Uuid,
        user_id: &str,
        work: &F,
    ) -> ResultEngine<T>
    where
        T: Send,
        F: for<'c> Fn(UnitOfWork<'c>) -> UnitFuture<'c, T> + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = {
                let _guard = self.locks.acquire(household_id).await;
                self.run_unit(access, household_id, user_id, work).await
            };
            match result {
                Ok((value, events)) => {
                    self.after_commit(household_id, events).await;
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(%household_id, attempt, error = %err, "retrying unit of work");
                    tokio::time::sleep(self.config.backoff(attempt)).await;
                }
                Err(err) => {
                    if let EngineError::IntegrityViolation(detail) = &err {
                        error!(%household_id, %detail, "integrity violation, unit rolled back");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn run_unit<T, F>(
        &self,
        access: Access,
        household_id: Uuid,
        user_id: &str,
        work: &F,
    ) -> ResultEngine<(T, Vec<LedgerEvent>)>
    where
        T: Send,
        F: for<'c> Fn(UnitOfWork<'c>) -> UnitFuture<'c, T> + Send + Sync,
    {
        let db_tx = self.database.begin().await?;
        let writes = AtomicUsize::new(0);
        let events = Mutex::new(Vec::new());

        let outcome = {
            let unit = UnitOfWork {
                engine: self,
                db: &db_tx,
                household_id,
                user_id,
                access,
                writes: &writes,
                events: &events,
            };
            match unit.authorize().await {
                Ok(()) => match tokio::time::timeout(self.config.write_timeout(), work(unit)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Transient(format!(
                        "unit of work timed out after {} ms",
                        self.config.write_timeout_ms
                    ))),
                },
                Err(err) => Err(err),
            }
        };

        match outcome {
            Ok(value) => {
                db_tx.commit().await?;
                let events = events.into_inner().unwrap_or_else(PoisonError::into_inner);
                debug!(
                    %household_id,
                    writes = writes.load(Ordering::SeqCst),
                    events = events.len(),
                    "unit of work committed"
                );
                Ok((value, events))
            }
            Err(err) => {
                if let Err(rollback_err) = db_tx.rollback().await {
                    warn!(%household_id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Non-critical side effects. Failures are logged and swallowed.
    async fn after_commit(&self, household_id: Uuid, events: Vec<LedgerEvent>) {
        let now = Instant::now();
        let mut touched: BTreeSet<Uuid> = BTreeSet::new();
        for event in &events {
            if let Err(err) = self.observer.notify(event) {
                warn!(?event, error = %err, "ledger observer failed");
            }
            if let LedgerEvent::DebtPaid { debt_id, .. } = event
                && let Err(err) = self.record_debt_milestones(household_id, *debt_id).await
            {
                warn!(%debt_id, error = %err, "recording debt milestones failed");
            }
            touched.extend(event.touched_accounts());
        }
        for account_id in touched {
            if !self.touch.should_touch(account_id, now) {
                continue;
            }
            let result = accounts::Entity::update_many()
                .col_expr(accounts::Column::LastActivityAt, Expr::value(Utc::now()))
                .filter(accounts::Column::Id.eq(account_id.to_string()))
                .exec(&self.database)
                .await;
            if let Err(err) = result {
                warn!(%account_id, error = %err, "touching account failed");
            }
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    config: EngineConfig,
    touch: Option<Arc<TouchThrottle>>,
    observer: Option<Arc<dyn LedgerObserver>>,
    interceptor: Option<Arc<dyn WriteInterceptor>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Share a touch throttle; by default one is built from the config.
    pub fn touch_throttle(mut self, touch: Arc<TouchThrottle>) -> EngineBuilder {
        self.touch = Some(touch);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LedgerObserver>) -> EngineBuilder {
        self.observer = Some(observer);
        self
    }

    /// Install a hook that runs before every row write (fault injection).
    pub fn interceptor(mut self, interceptor: Arc<dyn WriteInterceptor>) -> EngineBuilder {
        self.interceptor = Some(interceptor);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let touch = self
            .touch
            .unwrap_or_else(|| Arc::new(TouchThrottle::from_config(&self.config.touch)));
        Ok(Engine {
            database: self.database,
            locks: HouseholdLocks::default(),
            touch,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            interceptor: self.interceptor,
            config: self.config,
        })
    }
}

/// Handle to one in-flight atomic unit.
///
/// Every ledger write goes through it: the interceptor sees the write first,
/// the integrity guard checks the persisted row after. Methods on the unit
/// compose; calling several of them inside one [`Engine::execute`] closure
/// commits them together.
#[derive(Clone, Copy)]
pub struct UnitOfWork<'c> {
    engine: &'c Engine,
    db: &'c DatabaseTransaction,
    household_id: Uuid,
    user_id: &'c str,
    access: Access,
    writes: &'c AtomicUsize,
    events: &'c Mutex<Vec<LedgerEvent>>,
}

impl fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("household_id", &self.household_id)
            .field("user_id", &self.user_id)
            .field("access", &self.access)
            .field("writes", &self.write_count())
            .finish()
    }
}

impl<'c> UnitOfWork<'c> {
    pub fn household_id(&self) -> Uuid {
        self.household_id
    }

    pub fn user_id(&self) -> &'c str {
        self.user_id
    }

    /// Row writes attempted so far in this unit.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn config(&self) -> &'c EngineConfig {
        &self.engine.config
    }

    fn emit(&self, event: LedgerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn checkpoint(&self, table: &str, kind: WriteKind) -> ResultEngine<()> {
        if self.access == Access::Read {
            return Err(EngineError::Validation(format!(
                "write to {table} attempted in a read-only unit"
            )));
        }
        let ordinal = self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(interceptor) = &self.engine.interceptor {
            interceptor.before_write(&PendingWrite {
                table,
                kind,
                ordinal,
            })?;
        }
        Ok(())
    }

    async fn insert<A>(&self, row: A) -> ResultEngine<<A::Entity as EntityTrait>::Model>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'c,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A> + MonetaryRow,
    {
        self.checkpoint(
            <<A::Entity as EntityTrait>::Model as MonetaryRow>::TABLE,
            WriteKind::Insert,
        )?;
        let model = row.insert(self.db).await?;
        guard::check_row(&model)?;
        Ok(model)
    }

    async fn update<A>(&self, row: A) -> ResultEngine<<A::Entity as EntityTrait>::Model>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'c,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A> + MonetaryRow,
    {
        self.checkpoint(
            <<A::Entity as EntityTrait>::Model as MonetaryRow>::TABLE,
            WriteKind::Update,
        )?;
        let model = row.update(self.db).await?;
        guard::check_row(&model)?;
        Ok(model)
    }

    async fn delete<E>(&self, id: Uuid) -> ResultEngine<()>
    where
        E: EntityTrait,
        E::Model: MonetaryRow,
        String: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        self.checkpoint(<E::Model as MonetaryRow>::TABLE, WriteKind::Delete)?;
        let result = E::delete_by_id(id.to_string()).exec(self.db).await?;
        if result.rows_affected != 1 {
            return Err(EngineError::IntegrityViolation(format!(
                "expected to delete one {} row {id}, deleted {}",
                <E::Model as MonetaryRow>::TABLE,
                result.rows_affected
            )));
        }
        Ok(())
    }
}
