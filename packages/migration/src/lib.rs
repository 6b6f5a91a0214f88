pub use sea_orm_migration::prelude::*;
pub use sea_orm_migration::sea_orm::{ConnectionTrait, DatabaseConnection};
use sea_orm_migration::sea_orm::{DatabaseBackend, Statement};

mod m20251130_000001_create_dim_dates;
mod m20251130_000002_dim_dates_trigger;

pub use m20251130_000001_create_dim_dates::DIM_DATES_DATE_KEY;
pub use m20251130_000002_dim_dates_trigger::{
    SQLITE_INSERT_TRIGGER, SQLITE_UPDATE_TRIGGER, TRIGGER_FUNCTION, TRIGGER_NAME,
};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251130_000001_create_dim_dates::Migration),
            Box::new(m20251130_000002_dim_dates_trigger::Migration),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationCommand {
    Up,
    Down,
    Fresh,
    Reset,
    Refresh,
    Status,
}

impl std::str::FromStr for MigrationCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "fresh" => Ok(Self::Fresh),
            "reset" => Ok(Self::Reset),
            "refresh" => Ok(Self::Refresh),
            "status" => Ok(Self::Status),
            other => Err(format!(
                "unknown migration command '{other}' (expected up, down, fresh, reset, refresh or status)"
            )),
        }
    }
}

/// Run `command` directly against `db`; shared by the CLI orchestration and tests.
pub async fn migrate(db: &DatabaseConnection, command: MigrationCommand) -> Result<(), DbErr> {
    let before = SchemaState::read(db).await?;
    tracing::info!(command = ?command, "▶ {before}");

    let result = match command {
        MigrationCommand::Up => Migrator::up(db, None).await,
        MigrationCommand::Down => Migrator::down(db, None).await,
        MigrationCommand::Fresh => Migrator::fresh(db).await,
        MigrationCommand::Reset => Migrator::reset(db).await,
        MigrationCommand::Refresh => Migrator::refresh(db).await,
        MigrationCommand::Status => Migrator::status(db).await,
    };

    if let Err(e) = result {
        tracing::error!(command = ?command, database = %before.database, "❌ failed: {e}");
        return Err(e);
    }
    if command != MigrationCommand::Status {
        let after = SchemaState::read(db).await?;
        tracing::info!(command = ?command, "✅ {after}");
    }
    Ok(())
}

/// Snapshot of the schema as seen by the migrator.
#[derive(Debug)]
struct SchemaState {
    backend: DatabaseBackend,
    database: String,
    applied: usize,
    defined: usize,
    /// `None` on backends without field triggers.
    trigger_installed: Option<bool>,
}

impl SchemaState {
    async fn read(db: &DatabaseConnection) -> Result<Self, DbErr> {
        let backend = db.get_database_backend();
        let (database, trigger_installed) = match backend {
            DatabaseBackend::Postgres => {
                let database = query_text(db, "SELECT current_database() AS v").await?;
                let trigger = Statement::from_sql_and_values(
                    backend,
                    "SELECT 1 AS present FROM pg_trigger WHERE tgname = $1",
                    vec![TRIGGER_NAME.into()],
                );
                let installed = db.query_one(trigger).await?.is_some();
                (database, Some(installed))
            }
            DatabaseBackend::Sqlite => {
                let file = query_text(
                    db,
                    "SELECT file AS v FROM pragma_database_list WHERE name = 'main'",
                )
                .await?;
                let database = if file.is_empty() { ":memory:".to_string() } else { file };
                let trigger = Statement::from_sql_and_values(
                    backend,
                    "SELECT 1 AS present FROM sqlite_master WHERE type = 'trigger' AND name = ?",
                    vec![SQLITE_UPDATE_TRIGGER.into()],
                );
                let installed = db.query_one(trigger).await?.is_some();
                (database, Some(installed))
            }
            _ => ("<unsupported>".to_string(), None),
        };

        Ok(Self {
            backend,
            database,
            applied: count_applied_migrations(db).await.unwrap_or(0),
            defined: Migrator::migrations().len(),
            trigger_installed,
        })
    }
}

impl std::fmt::Display for SchemaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} db={} migrations={}/{}",
            self.backend, self.database, self.applied, self.defined
        )?;
        if let Some(installed) = self.trigger_installed {
            write!(f, " triggers={}", if installed { "present" } else { "absent" })?;
        }
        Ok(())
    }
}

async fn query_text(db: &DatabaseConnection, sql: &str) -> Result<String, DbErr> {
    let stmt = Statement::from_string(db.get_database_backend(), sql);
    Ok(match db.query_one(stmt).await? {
        Some(row) => row.try_get::<String>("", "v").unwrap_or_default(),
        None => String::new(),
    })
}

/// Number of applied migrations; 0 before the migration table exists.
pub async fn count_applied_migrations(db: &DatabaseConnection) -> Result<usize, DbErr> {
    match Migrator::get_applied_migrations(db).await {
        Ok(migrations) => Ok(migrations.len()),
        Err(DbErr::Exec(_)) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Name of the newest applied migration, if any.
pub async fn get_latest_migration_version(
    db: &DatabaseConnection,
) -> Result<Option<String>, DbErr> {
    match Migrator::get_applied_migrations(db).await {
        Ok(migrations) => Ok(migrations.last().map(|m| m.name().to_string())),
        Err(DbErr::Exec(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_commands_parse_from_cli_words() {
        assert_eq!("up".parse::<MigrationCommand>(), Ok(MigrationCommand::Up));
        assert_eq!("status".parse::<MigrationCommand>(), Ok(MigrationCommand::Status));
        let err = "sideways".parse::<MigrationCommand>().unwrap_err();
        assert!(err.contains("sideways"));
    }

    #[test]
    fn schema_state_mentions_trigger_only_when_known() {
        let mut state = SchemaState {
            backend: DatabaseBackend::Sqlite,
            database: ":memory:".to_string(),
            applied: 2,
            defined: 2,
            trigger_installed: None,
        };
        assert_eq!(state.to_string(), "Sqlite db=:memory: migrations=2/2");

        state.trigger_installed = Some(false);
        assert_eq!(
            state.to_string(),
            "Sqlite db=:memory: migrations=2/2 triggers=absent"
        );

        state.backend = DatabaseBackend::Postgres;
        state.database = "datedim".to_string();
        state.trigger_installed = Some(true);
        assert_eq!(
            state.to_string(),
            "Postgres db=datedim migrations=2/2 triggers=present"
        );
    }

    #[test]
    fn trigger_migration_is_last() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "m20251130_000001_create_dim_dates".to_string(),
                "m20251130_000002_dim_dates_trigger".to_string(),
            ]
        );
    }
}
