//! Movie catalog: local rows merged with remote metadata.

mod controller;
mod types;

pub use controller::{MovieController, AVAILABLE_IDS_NAMESPACE, PLACEHOLDER_POSTER};
pub use types::*;

use thiserror::Error;

use crate::db::DbError;
use crate::metadata::MetadataError;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum MovieError {
    #[error("Movie not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Metadata provider error: {0}")]
    Provider(#[from] MetadataError),

    #[error(transparent)]
    Database(#[from] DbError),
}
