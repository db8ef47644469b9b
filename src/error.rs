//! Error types for the ingestion and synchronization pipeline.
//!
//! Each kind maps to a distinct recovery policy:
//!
//! | Kind | Policy |
//! |------|--------|
//! | [`ValidationError`] | resource skipped, collection continues |
//! | [`StorageError`] | persist aborts before any catalog mutation |
//! | [`CatalogError`] | the whole batch/pass aborts |
//! | [`IndexError`] | resource marked failed for the pass, retried next run |

use std::path::PathBuf;
use thiserror::Error;

/// A resource failed pre-persistence validation.
///
/// Validation never has side effects: no content is written and no
/// catalog row is created for a rejected resource.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("resource has empty content")]
    EmptyContent,
    #[error("resource has an empty filename")]
    EmptyFilename,
}

/// Content store I/O failure (permissions, disk full, missing blob).
#[derive(Debug, Error)]
#[error("content store failure at {path}: {source}")]
pub struct StorageError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The catalog store rejected a query or is unreachable.
///
/// Fatal for the current batch; the caller retries on the next
/// scheduled run.
#[derive(Debug, Error)]
#[error("catalog store error: {0}")]
pub struct CatalogError(#[from] pub sqlx::Error);

/// Embedding or search-index backend failure.
///
/// Scoped to a single resource during reconciliation; other resources
/// in the same pass are unaffected.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index backend error: {0}")]
    Backend(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// Unified error for pipeline entry points.
///
/// Validation failures are not represented here: persistence maps them
/// to a skip outcome instead of an error.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("{0}")]
    Config(String),
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::Catalog(CatalogError(e))
    }
}
