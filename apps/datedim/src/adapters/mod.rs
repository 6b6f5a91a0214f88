//! SeaORM adapters. Functions here speak `sea_orm::DbErr`; repositories
//! translate into domain errors.

pub mod dim_dates_sea;
