//! Ingestion of tabular data into datasets.
//!
//! A [`Dataset`] binds records to the bundle they conform to. Batches come
//! from any [`TabularSource`] (an in-memory [`Table`], a [`CsvTable`] or a
//! polars `DataFrame`) and are validated row by row against the bundle's
//! capture base.

pub mod csv_table;
pub mod dataset;
pub mod error;
pub mod frame;
pub mod inference;
pub mod source;
mod validate;

pub use csv_table::CsvTable;
pub use dataset::{Dataset, FeedReport, RowFailure};
pub use error::{FeedError, IngestError};
pub use frame::{any_to_value, records_to_dataframe};
pub use inference::{infer_bundle, infer_frame_bundle};
pub use source::{TabularSource, Table};
