//! SeaORM adapter for the date dimension.
//!
//! Every write goes through `ActiveModelTrait` so `before_save` derives the
//! calendar columns. Bulk writes that skip the hook are still corrected by
//! the table triggers.

use std::collections::BTreeSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use time::Date;

use crate::entities::dim_dates;

pub mod dto;

pub use dto::DimDateCreate;

pub async fn find_by_date<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    date: Date,
) -> Result<Option<dim_dates::Model>, sea_orm::DbErr> {
    dim_dates::Entity::find()
        .filter(dim_dates::Column::Date.eq(date))
        .one(conn)
        .await
}

pub async fn find_by_key<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    date_key: i32,
) -> Result<Option<dim_dates::Model>, sea_orm::DbErr> {
    dim_dates::Entity::find_by_id(date_key).one(conn).await
}

/// Rows with `start <= date <= end`, ordered by date.
pub async fn find_in_range<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    start: Date,
    end: Date,
) -> Result<Vec<dim_dates::Model>, sea_orm::DbErr> {
    dim_dates::Entity::find()
        .filter(dim_dates::Column::Date.between(start, end))
        .order_by_asc(dim_dates::Column::Date)
        .all(conn)
        .await
}

/// The set of dates already present in `start..=end`.
pub async fn existing_dates<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    start: Date,
    end: Date,
) -> Result<BTreeSet<Date>, sea_orm::DbErr> {
    let dates: Vec<Date> = dim_dates::Entity::find()
        .select_only()
        .column(dim_dates::Column::Date)
        .filter(dim_dates::Column::Date.between(start, end))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(dates.into_iter().collect())
}

pub async fn create<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    dto: DimDateCreate,
) -> Result<dim_dates::Model, sea_orm::DbErr> {
    dto.into_active_model().insert(conn).await
}

/// Move an existing row to a new date; the hook re-derives every calendar column.
pub async fn update_date<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    existing: dim_dates::Model,
    new_date: Date,
) -> Result<dim_dates::Model, sea_orm::DbErr> {
    let mut active: dim_dates::ActiveModel = existing.into();
    active.date = Set(new_date);
    active.update(conn).await
}

pub async fn delete_by_dates<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    dates: &[Date],
) -> Result<u64, sea_orm::DbErr> {
    if dates.is_empty() {
        return Ok(0);
    }
    let result = dim_dates::Entity::delete_many()
        .filter(dim_dates::Column::Date.is_in(dates.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
