use clap::{Parser, Subcommand, ValueEnum};
use datedim::db::txn::with_txn;
use datedim::domain::calendar::parse_date;
use datedim::repos::dim_dates;
use datedim::{telemetry, AppError, DimDate};
use db_infra::config::db::{DbKind, RuntimeEnv};
use db_infra::build_app_pool;
use time::Date;

#[derive(Clone, Copy, ValueEnum)]
enum Env {
    Prod,
    Test,
}

#[derive(Parser)]
#[command(name = "datedim")]
#[command(about = "Populate and inspect the dim_dates date dimension")]
struct Args {
    /// Runtime environment
    #[arg(short, long, value_enum, default_value = "prod", global = true)]
    env: Env,

    /// Print results (and logs) as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register every date from START to END (inclusive) that is not present yet
    Seed {
        #[arg(value_parser = parse_date_arg)]
        start: Date,
        #[arg(value_parser = parse_date_arg)]
        end: Date,
    },
    /// Register a single date
    Add {
        #[arg(value_parser = parse_date_arg)]
        date: Date,
    },
    /// Show the stored calendar fields for a date
    Show {
        #[arg(value_parser = parse_date_arg)]
        date: Date,
    },
    /// Check that the stored fields for a date match a fresh derivation
    Verify {
        #[arg(value_parser = parse_date_arg)]
        date: Date,
    },
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    parse_date(raw).map_err(|e| format!("expected a valid YYYY-MM-DD date: {e}"))
}

fn print_row(row: &DimDate, json: bool) -> Result<(), AppError> {
    if json {
        let out = serde_json::to_string(row)
            .map_err(|e| AppError::internal(format!("failed to serialize row: {e}")))?;
        println!("{out}");
        return Ok(());
    }
    let f = row.fields();
    println!("date:        {} (date_key {})", row.date(), row.date_key());
    println!("  day:         {}", f.day());
    println!("  week:        {}", f.week());
    println!("  month:       {}", f.month());
    println!("  quarter:     {}", f.quarter());
    println!("  year:        {}", f.year());
    println!("  day_of_week: {} ({})", f.day_of_week(), f.day_of_week_name());
    Ok(())
}

async fn run(args: Args) -> Result<(), AppError> {
    let env = match args.env {
        Env::Prod => RuntimeEnv::Prod,
        Env::Test => RuntimeEnv::Test,
    };
    let db = build_app_pool(env, DbKind::Postgres).await?;
    let json = args.json;

    match args.command {
        Command::Seed { start, end } => {
            let report = with_txn(&db, |txn| {
                Box::pin(async move { Ok::<_, AppError>(dim_dates::seed_range(txn, start, end).await?) })
            })
            .await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "inserted": report.inserted, "skipped": report.skipped })
                );
            } else {
                println!(
                    "✓ seeded {start}..={end}: {} inserted, {} already present",
                    report.inserted, report.skipped
                );
            }
        }
        Command::Add { date } => {
            let row = with_txn(&db, |txn| {
                Box::pin(async move { Ok::<_, AppError>(dim_dates::register_date(txn, date).await?) })
            })
            .await?;
            print_row(&row, json)?;
        }
        Command::Show { date } => match dim_dates::find_by_date(&db, date).await? {
            Some(row) => print_row(&row, json)?,
            None => {
                return Err(AppError::NotFound {
                    code: "DATE_NOT_FOUND",
                    detail: format!("date {date} not registered"),
                })
            }
        },
        Command::Verify { date } => {
            let consistent = dim_dates::verify(&db, date).await?;
            if json {
                println!("{}", serde_json::json!({ "date": date.to_string(), "consistent": consistent }));
            } else if consistent {
                println!("✓ {date} verified");
            } else {
                println!("✗ {date} stored fields disagree with a fresh derivation");
            }
            if !consistent {
                return Err(AppError::internal(format!("{date} failed verification")));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    telemetry::init_tracing(args.json);

    if let Err(e) = run(args).await {
        tracing::error!(code = e.code(), "{e}");
        eprintln!("✗ {e}");
        std::process::exit(e.exit_code());
    }
}
