use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

pub const TRIGGER_FUNCTION: &str = "populate_dim_dates_fields";
pub const TRIGGER_NAME: &str = "trg_populate_dim_dates";
pub const SQLITE_INSERT_TRIGGER: &str = "trg_populate_dim_dates_insert";
pub const SQLITE_UPDATE_TRIGGER: &str = "trg_populate_dim_dates_update";

// EXTRACT(WEEK) is the ISO-8601 week and EXTRACT(DOW) counts from Sunday = 0,
// matching the in-process deriver in the datedim crate.
const CREATE_FUNCTION_SQL: &str = r#"
CREATE OR REPLACE FUNCTION populate_dim_dates_fields()
RETURNS TRIGGER AS $$
BEGIN
    NEW.day := EXTRACT(DAY FROM NEW.date);
    NEW.week := EXTRACT(WEEK FROM NEW.date);
    NEW.month := EXTRACT(MONTH FROM NEW.date);
    NEW.quarter := EXTRACT(QUARTER FROM NEW.date);
    NEW.year := EXTRACT(YEAR FROM NEW.date);
    NEW.day_of_week := EXTRACT(DOW FROM NEW.date);

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#;

const CREATE_TRIGGER_SQL: &str = r#"
DROP TRIGGER IF EXISTS trg_populate_dim_dates ON dim_dates;

CREATE TRIGGER trg_populate_dim_dates
    BEFORE INSERT OR UPDATE ON dim_dates
    FOR EACH ROW
    EXECUTE FUNCTION populate_dim_dates_fields();
"#;

const DROP_TRIGGER_SQL: &str = "DROP TRIGGER IF EXISTS trg_populate_dim_dates ON dim_dates;";
const DROP_FUNCTION_SQL: &str = "DROP FUNCTION IF EXISTS populate_dim_dates_fields();";

// SQLite has no BEFORE-row assignment, so the AFTER triggers rewrite the stored row.
// The ISO week is the ordinal week of the Thursday in the same Monday-based week;
// this avoids strftime('%V'), which older bundled SQLite builds lack.
// recursive_triggers is off by default, so the inner UPDATE does not re-fire.
const SQLITE_REDERIVE_BODY: &str = r#"
    UPDATE dim_dates SET
        day = CAST(strftime('%d', NEW.date) AS INTEGER),
        week = (CAST(strftime('%j', date(NEW.date,
            (3 - (CAST(strftime('%w', NEW.date) AS INTEGER) + 6) % 7) || ' days')) AS INTEGER) - 1) / 7 + 1,
        month = CAST(strftime('%m', NEW.date) AS INTEGER),
        quarter = (CAST(strftime('%m', NEW.date) AS INTEGER) + 2) / 3,
        year = CAST(strftime('%Y', NEW.date) AS INTEGER),
        day_of_week = CAST(strftime('%w', NEW.date) AS INTEGER)
    WHERE date_key = NEW.date_key;
"#;

fn sqlite_create_sql(name: &str, event: &str) -> String {
    format!(
        "CREATE TRIGGER IF NOT EXISTS {name} AFTER {event} ON dim_dates FOR EACH ROW BEGIN {SQLITE_REDERIVE_BODY} END;"
    )
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        match manager.get_database_backend() {
            DatabaseBackend::Postgres => {
                conn.execute_unprepared(CREATE_FUNCTION_SQL).await?;
                conn.execute_unprepared(CREATE_TRIGGER_SQL).await?;
            }
            DatabaseBackend::Sqlite => {
                conn.execute_unprepared(&sqlite_create_sql(SQLITE_INSERT_TRIGGER, "INSERT"))
                    .await?;
                conn.execute_unprepared(&sqlite_create_sql(
                    SQLITE_UPDATE_TRIGGER,
                    "UPDATE OF date, day, week, month, quarter, year, day_of_week",
                ))
                .await?;
            }
            other => {
                tracing::debug!(backend = ?other, "skipping dim_dates trigger");
            }
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        match manager.get_database_backend() {
            DatabaseBackend::Postgres => {
                // Trigger first: the function cannot be dropped while the trigger references it.
                conn.execute_unprepared(DROP_TRIGGER_SQL).await?;
                conn.execute_unprepared(DROP_FUNCTION_SQL).await?;
            }
            DatabaseBackend::Sqlite => {
                for name in [SQLITE_INSERT_TRIGGER, SQLITE_UPDATE_TRIGGER] {
                    conn.execute_unprepared(&format!("DROP TRIGGER IF EXISTS {name};"))
                        .await?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
