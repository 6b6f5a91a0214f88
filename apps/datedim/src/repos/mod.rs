pub mod dim_dates;
