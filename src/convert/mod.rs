//! Converters for sources that are not CSV.

mod floats;
mod format;
mod parquet;

pub use self::parquet::parquet_to_sample;
pub use floats::floats_to_sample;
