//! m2io: semantic data interoperability.
//!
//! A [`Session`] loads schema bundles, ingests tabular data into datasets
//! validated against them, resolves crosswalks between bundles and applies
//! them, recording every step in one append-only event log.
//!
//! ```ignore
//! use m2io_core::{Session, SessionConfig};
//!
//! let session = Session::with_config(SessionConfig::load(path)?)?;
//! let source = session.load_bundle(&std::fs::read_to_string("standard1.json")?)?;
//! let dataset = session.dataset(source.digest().as_str())?;
//! dataset.feed(&table)?;
//! let outcome = session.transform(&dataset, "Standard2@1.0", &spec)?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use error::SessionError;
pub use logging::{LogConfig, LogFormat, init_logging, init_logging_with_writer};
pub use session::Session;

pub use m2io_bundle::{Bundle, BundleRegistry, BundleStore};
pub use m2io_ingest::{CsvTable, Dataset, FeedReport, Table, TabularSource};
pub use m2io_map::{CrosswalkPlan, LinkageSpec, TransformDirective};
pub use m2io_model::{
    AttributeType, EventKind, EventLog, EventQuery, FillPolicy, IngestOptions, Record,
    TransformOptions, UnknownAttributePolicy, Value,
};
pub use m2io_transform::{TransformOutcome, TransformReport};
