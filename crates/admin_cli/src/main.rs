use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ledger::Engine;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Serialize;
use uuid::Uuid;

mod settings;

type AdminResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "ledger_admin")]
#[command(about = "Operator tooling for the household ledger (migrations, backfills, verification)")]
struct Cli {
    /// Settings file, without extension.
    #[arg(long, default_value = "ledger")]
    config: String,

    /// Overrides `database.url` from the settings.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations.
    Migrate(MigrateArgs),
    /// Fill missing cents mirrors or canonical transfer linkage.
    Backfill(Backfill),
    /// Scan every monetary table and report drift, orphans and bad balances.
    Verify,
    /// Rewrite the balances of a household from its transaction history.
    RecomputeBalances(HouseholdArgs),
    /// List likely transfer pairs among unlinked transactions.
    SuggestTransfers(HouseholdArgs),
}

#[derive(Args, Debug)]
struct MigrateArgs {
    /// Only print the migration status.
    #[arg(long)]
    status: bool,
}

#[derive(Args, Debug)]
struct Backfill {
    #[command(subcommand)]
    command: BackfillCommand,
}

#[derive(Subcommand, Debug)]
enum BackfillCommand {
    Cents {
        #[arg(long, default_value_t = 500)]
        batch_size: u64,
    },
    Linkage(HouseholdArgs),
}

#[derive(Args, Debug)]
struct HouseholdArgs {
    household_id: Uuid,
}

#[tokio::main]
async fn main() -> AdminResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger={level},ledger_admin={level},migration={level}",
            level = settings.log.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .unwrap_or_else(|| settings.database.url.clone());
    let db = connect(&url, settings.database.max_connections).await?;

    if let Command::Migrate(args) = &cli.command {
        if args.status {
            Migrator::status(&db).await?;
        } else {
            Migrator::up(&db, None).await?;
            tracing::info!("migrations applied");
        }
        return Ok(());
    }

    let engine = Engine::builder()
        .database(db)
        .config(settings.engine)
        .build()
        .await?;

    match cli.command {
        Command::Migrate(_) => {}
        Command::Backfill(Backfill {
            command: BackfillCommand::Cents { batch_size },
        }) => print_json(&engine.backfill_money_cents(batch_size).await?)?,
        Command::Backfill(Backfill {
            command: BackfillCommand::Linkage(args),
        }) => {
            let linked = engine.backfill_transfer_linkage(args.household_id).await?;
            print_json(&serde_json::json!({ "transfers_linked": linked }))?;
        }
        Command::Verify => {
            let report = engine.verify_ledger_integrity().await?;
            print_json(&report)?;
            if !report.is_consistent() {
                std::process::exit(1);
            }
        }
        Command::RecomputeBalances(args) => {
            print_json(&engine.recompute_balances(args.household_id).await?)?
        }
        Command::SuggestTransfers(args) => {
            print_json(&engine.suggest_transfer_matches_for(args.household_id).await?)?
        }
    }

    Ok(())
}

async fn connect(url: &str, max_connections: u32) -> AdminResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .max_connections(max_connections.max(1))
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Ok(Database::connect(options).await?)
}

fn print_json<T: Serialize>(value: &T) -> AdminResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
