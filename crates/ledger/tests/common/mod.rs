#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use ledger::{
    Account, AccountKind, Currency, Engine, EngineConfig, MemberRole, Money, NewAccountCmd,
    WriteInterceptor,
};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement, Value};
use uuid::Uuid;

pub const OWNER: &str = "alice";
pub const EDITOR: &str = "bob";
pub const VIEWER: &str = "victor";
pub const OUTSIDER: &str = "mallory";

/// Tables a monetary unit of work may write.
pub const LEDGER_TABLES: [&str; 8] = [
    "accounts",
    "transactions",
    "transaction_splits",
    "transfers",
    "bills",
    "bill_payments",
    "debts",
    "debt_payments",
];

pub struct Fixture {
    pub engine: Engine,
    pub db: DatabaseConnection,
    pub household_id: Uuid,
    pub checking: Account,
    pub savings: Account,
}

/// In-memory database with every migration applied. A single pooled
/// connection keeps all queries on the same in-memory file.
pub async fn database() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn fixture() -> Fixture {
    fixture_with(EngineConfig::default(), None).await
}

pub async fn fixture_with(
    config: EngineConfig,
    interceptor: Option<Arc<dyn WriteInterceptor>>,
) -> Fixture {
    let db = database().await;
    let mut builder = Engine::builder().database(db.clone()).config(config);
    if let Some(interceptor) = interceptor {
        builder = builder.interceptor(interceptor);
    }
    let engine = builder.build().await.unwrap();

    let household = engine
        .new_household("Home", OWNER, Some(Currency::Usd))
        .await
        .unwrap();
    engine
        .add_household_member(household.id, OWNER, EDITOR, MemberRole::Editor)
        .await
        .unwrap();
    engine
        .add_household_member(household.id, OWNER, VIEWER, MemberRole::Viewer)
        .await
        .unwrap();

    let checking = open_account(&engine, household.id, "Checking", 100_000).await;
    let savings = open_account(&engine, household.id, "Savings", 0).await;

    Fixture {
        engine,
        db,
        household_id: household.id,
        checking,
        savings,
    }
}

pub async fn open_account(engine: &Engine, household_id: Uuid, name: &str, cents: i64) -> Account {
    engine
        .new_account(NewAccountCmd::new(
            household_id,
            OWNER,
            name,
            AccountKind::Checking,
            Money::new(cents),
        ))
        .await
        .unwrap()
}

impl Fixture {
    pub async fn balance(&self, account_id: Uuid) -> Money {
        self.engine
            .account(self.household_id, OWNER, account_id)
            .await
            .unwrap()
            .current_balance
    }

    pub async fn exec(&self, sql: &str, values: Vec<Value>) {
        exec(&self.db, sql, values).await;
    }

    pub async fn count(&self, table: &str) -> i64 {
        let row = self
            .db
            .query_one(Statement::from_string(
                self.db.get_database_backend(),
                format!("SELECT COUNT(*) AS n FROM {table}"),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", "n").unwrap()
    }
}

impl Fixture {
    /// Every row of `table`, each rendered with SQLite `quote()`, in rowid
    /// order.
    pub async fn rows(&self, table: &str) -> Vec<String> {
        let backend = self.db.get_database_backend();
        let columns: Vec<String> = self
            .db
            .query_all(Statement::from_string(
                backend,
                format!("SELECT name FROM pragma_table_info('{table}')"),
            ))
            .await
            .unwrap()
            .iter()
            .map(|row| row.try_get::<String>("", "name").unwrap())
            .collect();
        let rendered = columns
            .iter()
            .map(|column| format!("quote(\"{column}\")"))
            .collect::<Vec<_>>()
            .join(" || '|' || ");
        self.db
            .query_all(Statement::from_string(
                backend,
                format!("SELECT {rendered} AS row FROM {table} ORDER BY rowid"),
            ))
            .await
            .unwrap()
            .iter()
            .map(|row| row.try_get::<String>("", "row").unwrap())
            .collect()
    }

    /// Contents of every ledger table.
    pub async fn snapshot(&self) -> Vec<(&'static str, Vec<String>)> {
        let mut tables = Vec::with_capacity(LEDGER_TABLES.len());
        for table in LEDGER_TABLES {
            tables.push((table, self.rows(table).await));
        }
        tables
    }
}

pub async fn exec(db: &DatabaseConnection, sql: &str, values: Vec<Value>) {
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        sql,
        values,
    ))
    .await
    .unwrap();
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

pub fn cents(value: i64) -> Money {
    Money::new(value)
}
