use clap::{Parser, ValueEnum};
use db_infra::config::db::{DbConfig, RuntimeEnv};
use db_infra::{ensure_database, DbInfraError, ProvisionOutcome};
use tracing::info;

#[derive(Clone, Copy, ValueEnum)]
enum Env {
    Prod,
    Test,
}

#[derive(Parser)]
#[command(name = "db-create")]
#[command(about = "Create the datedim PostgreSQL database if it does not exist")]
struct Args {
    /// Runtime environment (selects PG_DB or PG_TEST_DB)
    #[arg(short, long, value_enum, default_value = "prod")]
    env: Env,
}

fn exit_code(err: &DbInfraError) -> i32 {
    match err {
        DbInfraError::Config { .. } => 2,
        _ => 1,
    }
}

async fn run(env: RuntimeEnv) -> Result<(), DbInfraError> {
    let config = DbConfig::from_env(env)?;
    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        user = %config.user,
        "connecting to PostgreSQL"
    );

    match ensure_database(&config).await? {
        ProvisionOutcome::AlreadyExists => {
            println!("✓ Database '{}' already exists", config.database);
        }
        ProvisionOutcome::Created => {
            println!("✓ Database '{}' created", config.database);
        }
    }

    let env_flag = match env {
        RuntimeEnv::Prod => "prod",
        RuntimeEnv::Test => "test",
    };
    println!();
    println!("Next steps:");
    println!("  migration up --env {env_flag}");
    println!("  datedim --env {env_flag} seed 2000-01-01 2030-12-31");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_env_filter("db_create=info,db_infra=info,sqlx=warn")
        .init();

    let args = Args::parse();
    let env = match args.env {
        Env::Prod => RuntimeEnv::Prod,
        Env::Test => RuntimeEnv::Test,
    };

    if let Err(e) = run(env).await {
        eprintln!("✗ {e}");
        std::process::exit(exit_code(&e));
    }
}
