pub mod dim_dates;

#[cfg(test)]
mod tests_dim_dates_hook;
