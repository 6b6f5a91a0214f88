use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::calendar::{derive, CalendarError, CalendarFields};

/// `DbErr::Custom` prefix for writes whose date year is unsupported; the
/// remainder of the message is the year.
pub const DATE_OUT_OF_RANGE: &str = "DATE_OUT_OF_RANGE:";
/// `DbErr::Custom` prefix for inserts that carry no date.
pub const DATE_MISSING: &str = "DATE_MISSING:";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dim_dates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub date_key: i32,
    #[sea_orm(unique)]
    pub date: Date,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub quarter: i32,
    pub year: i32,
    pub day_of_week: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModel {
    fn apply_fields(&mut self, fields: CalendarFields) {
        self.day = ActiveValue::Set(i32::from(fields.day()));
        self.week = ActiveValue::Set(i32::from(fields.week()));
        self.month = ActiveValue::Set(i32::from(fields.month()));
        self.quarter = ActiveValue::Set(i32::from(fields.quarter()));
        self.year = ActiveValue::Set(fields.year());
        self.day_of_week = ActiveValue::Set(i32::from(fields.day_of_week()));
    }

    fn clear_fields(&mut self) {
        self.day = ActiveValue::NotSet;
        self.week = ActiveValue::NotSet;
        self.month = ActiveValue::NotSet;
        self.quarter = ActiveValue::NotSet;
        self.year = ActiveValue::NotSet;
        self.day_of_week = ActiveValue::NotSet;
    }
}

/// Write-path enforcement: derived columns always come from `date`.
///
/// Callers cannot persist their own values for the derived columns through
/// the active model. When an update does not touch `date`, the derived
/// columns are left out of the statement entirely.
#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let date = match &self.date {
            ActiveValue::Set(date) | ActiveValue::Unchanged(date) => *date,
            ActiveValue::NotSet if insert => {
                return Err(DbErr::Custom(format!(
                    "{DATE_MISSING}dim_dates rows require a date"
                )));
            }
            ActiveValue::NotSet => {
                self.clear_fields();
                return Ok(self);
            }
        };

        let fields = derive(date).map_err(|CalendarError::OutOfRange { year }| {
            DbErr::Custom(format!("{DATE_OUT_OF_RANGE}{year}"))
        })?;
        self.apply_fields(fields);
        Ok(self)
    }
}
