//! Collector seam: sources that produce resources each ingest cycle.

use async_trait::async_trait;

use crate::error::IngestError;
use crate::resource::Resource;

/// A source of resources.
///
/// Collectors are stateless between cycles: each `collect` call returns
/// the full set of resources the source currently offers, and the
/// persistence layer deduplicates by content hash.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable source name, recorded as `source_type` metadata.
    fn name(&self) -> &str;

    /// Gather every resource the source currently holds.
    async fn collect(&self) -> Result<Vec<Box<dyn Resource>>, IngestError>;
}
