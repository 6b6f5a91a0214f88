//! DTOs for the dim_dates adapter.

use sea_orm::ActiveValue::{NotSet, Set};
use time::Date;

use crate::entities::dim_dates;

/// Insert payload. Only the date is supplied; the entity hook fills in the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimDateCreate {
    pub date: Date,
}

impl DimDateCreate {
    pub fn new(date: Date) -> Self {
        Self { date }
    }

    pub(super) fn into_active_model(self) -> dim_dates::ActiveModel {
        dim_dates::ActiveModel {
            date_key: NotSet,
            date: Set(self.date),
            day: NotSet,
            week: NotSet,
            month: NotSet,
            quarter: NotSet,
            year: NotSet,
            day_of_week: NotSet,
        }
    }
}
