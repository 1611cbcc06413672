pub mod bar;
pub mod day_series;
