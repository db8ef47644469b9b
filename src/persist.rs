//! Persistence: the validate → store → catalog pipeline.
//!
//! Every resource flows through [`PersistenceService::persist`] in a
//! fixed order: validation first (no side effects on rejection), then
//! the content write, then the catalog upsert. The catalog row is only
//! written after the blob is durable, so a catalog record always points
//! at content that exists. Retirement reverses the order: the catalog
//! row goes first, then the blob, so a crash mid-retire leaves at worst
//! an orphaned blob rather than a dangling record.

use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogRecord};
use crate::content_store::{ContentStore, Locator};
use crate::error::IngestError;
use crate::resource::{validate, Resource};

/// Outcome of a single persist call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// First time this content was seen; blob written, record created.
    Stored(Locator),
    /// Content already present; metadata refreshed on the existing row.
    Refreshed(Locator),
    /// Validation rejected the resource; nothing was written.
    Skipped(String),
}

/// Writes resources into the content store and the catalog.
#[derive(Debug, Clone)]
pub struct PersistenceService {
    store: ContentStore,
    catalog: Catalog,
}

impl PersistenceService {
    pub fn new(store: ContentStore, catalog: Catalog) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Blob location for a resource: `<source_type>/<hash>/<file_name>`.
    fn locator_for(resource: &dyn Resource) -> Locator {
        let metadata = resource.metadata();
        let source_type = metadata
            .extra
            .get("source_type")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        Locator::new(format!(
            "{}/{}/{}",
            source_type,
            resource.hash(),
            metadata.file_name
        ))
    }

    /// Persist one resource. Idempotent for identical content; a repeat
    /// call refreshes the catalog metadata and leaves the blob alone.
    pub async fn persist(&self, resource: &dyn Resource) -> Result<PersistOutcome, IngestError> {
        if let Err(e) = validate(resource) {
            warn!(filename = %resource.filename(), error = %e, "skipping invalid resource");
            return Ok(PersistOutcome::Skipped(e.to_string()));
        }

        if let Some(existing) = self.catalog.get(resource.hash()).await? {
            // Known content: the stored path (and the file_name in its
            // tail) is pinned to the first persist, even if the same
            // bytes arrive under a new filename. Restores the blob if
            // it went missing.
            let locator = Locator::new(existing.path);
            self.store.write(locator.as_str(), resource.content())?;

            let mut record = CatalogRecord::from_resource(resource, &locator);
            record.file_name = existing.file_name;
            self.catalog.upsert(&record).await?;
            return Ok(PersistOutcome::Refreshed(locator));
        }

        let locator = Self::locator_for(resource);
        let locator = self.store.write(locator.as_str(), resource.content())?;

        let record = CatalogRecord::from_resource(resource, &locator);
        self.catalog.upsert(&record).await?;

        info!(hash = %record.resource_hash, path = %locator.as_str(), "persisted resource");
        Ok(PersistOutcome::Stored(locator))
    }

    /// Persist a batch, isolating per-resource failures. Storage errors
    /// skip the resource; a catalog error aborts the batch.
    pub async fn persist_all(
        &self,
        resources: &[Box<dyn Resource>],
    ) -> Result<Vec<PersistOutcome>, IngestError> {
        let mut outcomes = Vec::with_capacity(resources.len());
        for resource in resources {
            match self.persist(resource.as_ref()).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(IngestError::Storage(e)) => {
                    warn!(filename = %resource.filename(), error = %e, "storage failure, resource skipped");
                    outcomes.push(PersistOutcome::Skipped(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    /// Remove a resource from the catalog and the content store.
    ///
    /// Idempotent: retiring an unknown hash is a no-op. The search index
    /// is not touched here; reconciliation deletes its chunks on the
    /// next pass.
    pub async fn retire(&self, hash: &str) -> Result<bool, IngestError> {
        let Some(record) = self.catalog.get(hash).await? else {
            return Ok(false);
        };

        self.catalog.delete(hash).await?;
        self.store.delete(&Locator::new(record.path))?;
        info!(hash = %hash, "retired resource");
        Ok(true)
    }

    /// Retire every resource whose metadata matches `key = value`.
    /// Returns the hashes retired.
    pub async fn retire_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>, IngestError> {
        let hashes = self.catalog.find_by_metadata(key, value).await?;
        for hash in &hashes {
            self.retire(hash).await?;
        }
        Ok(hashes)
    }
}
