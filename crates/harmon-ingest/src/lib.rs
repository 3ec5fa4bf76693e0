//! CSV ingestion for the harmonization engine.

#![deny(unsafe_code)]

mod csv_table;
mod error;

pub use csv_table::{profile_columns, read_table, read_table_from_reader};
pub use error::IngestError;
