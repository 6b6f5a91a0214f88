use clap::{Parser, ValueEnum};
use db_infra::config::db::{DbConfig, DbKind, RuntimeEnv};
use db_infra::{orchestrate_migration, DbInfraError};
use migration::MigrationCommand;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, ValueEnum)]
enum Env {
    Prod,
    Test,
}

impl From<Env> for RuntimeEnv {
    fn from(env: Env) -> Self {
        match env {
            Env::Prod => RuntimeEnv::Prod,
            Env::Test => RuntimeEnv::Test,
        }
    }
}

/// Apply or inspect the dim_dates schema on PostgreSQL.
///
/// In-memory SQLite lives only as long as one process, so tests migrate it
/// themselves and it is not a target here.
#[derive(Parser)]
#[command(name = "migration")]
struct Args {
    /// up | down | fresh | reset | refresh | status
    #[arg(value_parser = parse_command)]
    command: MigrationCommand,

    /// Runtime environment (selects PG_DB or PG_TEST_DB)
    #[arg(short, long, value_enum, default_value = "test")]
    env: Env,
}

fn parse_command(raw: &str) -> Result<MigrationCommand, String> {
    raw.trim().to_ascii_lowercase().parse()
}

/// Cancel `token` on the first ctrl-c so the lock wait or migrator stops cleanly.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("… interrupt received, cancelling");
            token.cancel();
        }
    });
}

async fn run(args: Args, cancel: &CancellationToken) -> Result<String, DbInfraError> {
    let env = RuntimeEnv::from(args.env);
    let target = DbConfig::from_env(env)?;
    orchestrate_migration(env, DbKind::Postgres, args.command, cancel).await?;
    Ok(format!(
        "{:?} finished on '{}' at {}:{}",
        args.command, target.database, target.host, target.port
    ))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_env_filter("migration=info,db_infra=info,sqlx=warn")
        .init();

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    match run(Args::parse(), &cancel).await {
        Ok(summary) => println!("✓ {summary}"),
        Err(e @ DbInfraError::Config { .. }) => {
            eprintln!("✗ {e}");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("✗ Migration failed: {e}");
            std::process::exit(1);
        }
    }
}
