mod csv_source;
mod models;
mod normalizer;

pub use csv_source::{CsvReadStats, CsvTrackSource};
pub use models::*;
pub use normalizer::{clean_value, is_missing, normalize_row, split_artists, RawRecord};
