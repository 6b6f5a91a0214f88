use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::{ColumnDef, Index, Table};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub(crate) enum DimDates {
    Table,
    DateKey,
    Date,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    DayOfWeek,
}

/// Name of the unique index on `dim_dates.date`; error mapping matches on it.
pub const DIM_DATES_DATE_KEY: &str = "dim_dates_date_key";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DimDates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DimDates::DateKey)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DimDates::Date).date().not_null())
                    .col(ColumnDef::new(DimDates::Day).integer().not_null().default(0))
                    .col(ColumnDef::new(DimDates::Week).integer().not_null().default(0))
                    .col(ColumnDef::new(DimDates::Month).integer().not_null().default(0))
                    .col(ColumnDef::new(DimDates::Quarter).integer().not_null().default(0))
                    .col(ColumnDef::new(DimDates::Year).integer().not_null().default(0))
                    .col(ColumnDef::new(DimDates::DayOfWeek).integer().not_null().default(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(DIM_DATES_DATE_KEY)
                    .table(DimDates::Table)
                    .col(DimDates::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DimDates::Table).if_exists().to_owned())
            .await
    }
}
