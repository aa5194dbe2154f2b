use std::path::PathBuf;

use m2io_bundle::BundleError;
use m2io_ingest::FeedError;
use m2io_map::LinkError;
use m2io_transform::TransformError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no bundle named {reference} is loaded")]
    UnknownBundle { reference: String },

    #[error("failed to read bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
