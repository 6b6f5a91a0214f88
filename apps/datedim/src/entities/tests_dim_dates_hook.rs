//! Whatever an active model or a bulk statement carries for the derived
//! columns, the stored values come from the date.

use datedim_test_support::db::memory_db;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DbErr,
    EntityTrait, IntoActiveModel, QueryFilter,
};
use time::macros::date;

use super::dim_dates::{self, DATE_MISSING, DATE_OUT_OF_RANGE};
use crate::domain::calendar::derive;
use crate::error::AppError;
use crate::repos::dim_dates as repo;

fn tampered(date: time::Date) -> dim_dates::ActiveModel {
    dim_dates::ActiveModel {
        date: ActiveValue::Set(date),
        day: ActiveValue::Set(99),
        week: ActiveValue::Set(99),
        month: ActiveValue::Set(99),
        quarter: ActiveValue::Set(99),
        year: ActiveValue::Set(1900),
        day_of_week: ActiveValue::Set(99),
        ..Default::default()
    }
}

#[tokio::test]
async fn insert_overrides_supplied_fields() -> Result<(), AppError> {
    let db = memory_db().await?;

    let model = tampered(date!(2025 - 01 - 25)).insert(&db).await?;

    assert_eq!(
        (model.day, model.week, model.month, model.quarter, model.year, model.day_of_week),
        (25, 4, 1, 1, 2025, 6)
    );
    assert!(repo::verify(&db, date!(2025 - 01 - 25)).await?);
    Ok(())
}

#[tokio::test]
async fn update_cannot_tamper_with_fields() -> Result<(), AppError> {
    let db = memory_db().await?;
    let row = repo::register_date(&db, date!(2025 - 07 - 04)).await?;

    let stored = dim_dates::Entity::find_by_id(row.date_key())
        .one(&db)
        .await?
        .expect("row exists");
    let mut am = stored.into_active_model();
    am.quarter = ActiveValue::Set(1);
    am.day_of_week = ActiveValue::Set(0);
    let updated = am.update(&db).await?;

    assert_eq!(updated.quarter, 3);
    assert_eq!(updated.day_of_week, 5);
    assert!(repo::verify(&db, date!(2025 - 07 - 04)).await?);
    Ok(())
}

#[tokio::test]
async fn update_many_moving_the_date_rederives_fields() -> Result<(), AppError> {
    let db = memory_db().await?;
    repo::register_date(&db, date!(2025 - 01 - 15)).await?;

    dim_dates::Entity::update_many()
        .col_expr(dim_dates::Column::Date, Expr::value(date!(2025 - 12 - 29)))
        .filter(dim_dates::Column::Date.eq(date!(2025 - 01 - 15)))
        .exec(&db)
        .await?;

    assert!(repo::verify(&db, date!(2025 - 12 - 29)).await?);
    let moved = repo::find_by_date(&db, date!(2025 - 12 - 29))
        .await?
        .expect("row exists");
    assert_eq!(*moved.fields(), derive(date!(2025 - 12 - 29)).unwrap());
    assert_eq!((moved.fields().week(), moved.fields().day_of_week()), (1, 1));
    Ok(())
}

#[tokio::test]
async fn update_many_on_derived_columns_is_undone() -> Result<(), AppError> {
    let db = memory_db().await?;
    repo::register_date(&db, date!(2024 - 02 - 29)).await?;

    dim_dates::Entity::update_many()
        .col_expr(dim_dates::Column::Quarter, Expr::value(4))
        .col_expr(dim_dates::Column::Week, Expr::value(40))
        .exec(&db)
        .await?;

    assert!(repo::verify(&db, date!(2024 - 02 - 29)).await?);
    Ok(())
}

#[tokio::test]
async fn entity_insert_without_hook_is_rederived() -> Result<(), AppError> {
    let db = memory_db().await?;

    dim_dates::Entity::insert(tampered(date!(2023 - 01 - 01)))
        .exec(&db)
        .await?;

    let row = repo::find_by_date(&db, date!(2023 - 01 - 01))
        .await?
        .expect("row exists");
    assert_eq!(row.fields().week(), 52);
    assert_eq!(row.fields().day_of_week(), 0);
    assert!(repo::verify(&db, date!(2023 - 01 - 01)).await?);
    Ok(())
}

#[tokio::test]
async fn raw_sql_writes_are_rederived() -> Result<(), AppError> {
    let db = memory_db().await?;

    db.execute_unprepared(
        "INSERT INTO dim_dates (date, day, week, month, quarter, year, day_of_week) \
         VALUES ('2021-01-01', 1, 1, 1, 1, 1, 1)",
    )
    .await?;
    let row = repo::find_by_date(&db, date!(2021 - 01 - 01))
        .await?
        .expect("row exists");
    assert_eq!(row.fields().week(), 53);
    assert_eq!(row.fields().day_of_week(), 5);

    db.execute_unprepared("UPDATE dim_dates SET date = '2025-07-04' WHERE date = '2021-01-01'")
        .await?;
    let moved = repo::find_by_date(&db, date!(2025 - 07 - 04))
        .await?
        .expect("row exists");
    assert_eq!(moved.date_key(), row.date_key());
    assert_eq!(*moved.fields(), derive(date!(2025 - 07 - 04)).unwrap());
    Ok(())
}

#[tokio::test]
async fn insert_without_date_is_refused() -> Result<(), AppError> {
    let db = memory_db().await?;
    let am = dim_dates::ActiveModel::new();

    let err = am.insert(&db).await.expect_err("no date");
    match err {
        DbErr::Custom(msg) => assert!(msg.starts_with(DATE_MISSING), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn insert_out_of_range_year() -> Result<(), AppError> {
    let db = memory_db().await?;
    let year_zero =
        time::Date::from_calendar_date(0, time::Month::January, 1).expect("valid in time");
    let am = dim_dates::ActiveModel {
        date: ActiveValue::Set(year_zero),
        ..Default::default()
    };

    let err = am.insert(&db).await.expect_err("year 0");
    match &err {
        DbErr::Custom(msg) => assert_eq!(msg, &format!("{DATE_OUT_OF_RANGE}0")),
        other => panic!("unexpected error: {other:?}"),
    }

    let domain: crate::DomainError = err.into();
    assert!(domain.is_out_of_range());
    Ok(())
}

// An update that leaves the date untouched also leaves the derived columns out.
#[tokio::test]
async fn update_without_date_clears_derived_values() -> Result<(), AppError> {
    let db = memory_db().await?;
    let am = dim_dates::ActiveModel {
        date_key: ActiveValue::Unchanged(1),
        day: ActiveValue::Set(31),
        week: ActiveValue::Set(1),
        ..Default::default()
    };

    let prepared = am.before_save(&db, false).await?;
    assert!(matches!(prepared.date, ActiveValue::NotSet));
    assert!(matches!(prepared.day, ActiveValue::NotSet));
    assert!(matches!(prepared.week, ActiveValue::NotSet));
    assert!(matches!(prepared.day_of_week, ActiveValue::NotSet));
    Ok(())
}
