pub mod stats;

pub use stats::{median, median_absolute_deviation, nan_median, MAD_TO_SIGMA};
