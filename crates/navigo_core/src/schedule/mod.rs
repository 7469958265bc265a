//! Recurring wall-clock jobs.

pub mod daily_reset;
