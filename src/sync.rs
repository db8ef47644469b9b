//! Index reconciliation: converge the search index onto the catalog.
//!
//! Each pass diffs the catalog (source of truth) against the index and
//! applies the difference: catalog-only hashes are chunked, embedded,
//! and upserted; index-only hashes are deleted; hashes present in both
//! are left alone. Chunk identity is content-derived, so a pass over an
//! unchanged corpus writes nothing.
//!
//! One writer at a time: an engine holds an internal lock for the
//! duration of a pass, and an overlapping trigger is rejected rather
//! than queued. Per-resource index failures are isolated — the pass
//! continues and the failed hash is naturally retried on the next pass,
//! because it is still catalog-only.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::chunker::chunk_content;
use crate::config::{ChunkingConfig, SyncConfig};
use crate::content_store::{ContentStore, Locator};
use crate::embedding::Embedder;
use crate::error::{IndexError, IngestError};
use crate::index::{IndexedChunk, SearchIndex};

/// The work a reconciliation pass will perform, computed up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Catalog hashes missing from the index, in catalog order.
    pub to_add: Vec<String>,
    /// Index hashes no longer in the catalog.
    pub to_delete: Vec<String>,
    /// Hashes present on both sides; untouched.
    pub unchanged: usize,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }
}

/// Diff catalog hashes against indexed hashes.
pub fn compute_plan(catalog_hashes: &[String], indexed: &HashSet<String>) -> SyncPlan {
    let catalog_set: HashSet<&str> = catalog_hashes.iter().map(String::as_str).collect();

    let to_add = catalog_hashes
        .iter()
        .filter(|h| !indexed.contains(h.as_str()))
        .cloned()
        .collect();

    let mut to_delete: Vec<String> = indexed
        .iter()
        .filter(|h| !catalog_set.contains(h.as_str()))
        .cloned()
        .collect();
    to_delete.sort();

    let unchanged = catalog_hashes
        .iter()
        .filter(|h| indexed.contains(h.as_str()))
        .count();

    SyncPlan {
        to_add,
        to_delete,
        unchanged,
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Hashes whose index write failed this pass; retried next pass.
    pub failed: Vec<String>,
}

/// Drives the catalog → index convergence.
pub struct IndexSyncEngine {
    catalog: Catalog,
    store: ContentStore,
    index: Arc<dyn SearchIndex>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    batch_size: usize,
    pass_lock: Mutex<()>,
}

impl IndexSyncEngine {
    pub fn new(
        catalog: Catalog,
        store: ContentStore,
        index: Arc<dyn SearchIndex>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        sync: &SyncConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            index,
            embedder,
            chunking,
            batch_size: sync.batch_size,
            pass_lock: Mutex::new(()),
        }
    }

    /// Compute the current plan without applying it.
    pub async fn plan(&self) -> Result<SyncPlan, IngestError> {
        let catalog_hashes: Vec<String> = self
            .catalog
            .list_all()
            .await?
            .into_iter()
            .map(|f| f.resource_hash)
            .collect();
        let indexed = self.index.list_indexed_hashes().await?;
        Ok(compute_plan(&catalog_hashes, &indexed))
    }

    /// Run one reconciliation pass.
    ///
    /// Returns `Ok(None)` when another pass already holds the writer
    /// lock. Cancellation is honored between resources; work already
    /// applied stays applied.
    pub async fn run_pass(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncReport>, IngestError> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            warn!("reconciliation pass already running, skipping trigger");
            return Ok(None);
        };

        Ok(Some(self.reconcile(cancel).await?))
    }

    /// Wipe the index, then rebuild it from the catalog. The writer
    /// lock is held across both steps, so no other pass can observe
    /// the wiped index.
    pub async fn full_reset(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncReport>, IngestError> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            warn!("reconciliation pass already running, skipping reset");
            return Ok(None);
        };

        let indexed = self.index.list_indexed_hashes().await?;
        info!(count = indexed.len(), "full reset: clearing index");
        for hash in indexed {
            self.index.delete_by_hash(&hash).await?;
        }

        Ok(Some(self.reconcile(cancel).await?))
    }

    /// The pass body. Caller must hold `pass_lock`.
    async fn reconcile(&self, cancel: &CancellationToken) -> Result<SyncReport, IngestError> {
        let plan = self.plan().await?;
        if plan.is_noop() {
            debug!(unchanged = plan.unchanged, "index already converged");
            return Ok(SyncReport {
                unchanged: plan.unchanged,
                ..SyncReport::default()
            });
        }

        info!(
            to_add = plan.to_add.len(),
            to_delete = plan.to_delete.len(),
            unchanged = plan.unchanged,
            "starting reconciliation pass"
        );

        let mut report = SyncReport {
            unchanged: plan.unchanged,
            ..SyncReport::default()
        };

        for hash in &plan.to_delete {
            if cancel.is_cancelled() {
                info!("reconciliation cancelled mid-pass");
                return Ok(report);
            }
            match self.index.delete_by_hash(hash).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    error!(hash = %hash, error = %e, "failed to delete stale chunks");
                    report.failed.push(hash.clone());
                }
            }
        }

        for hash in &plan.to_add {
            if cancel.is_cancelled() {
                info!("reconciliation cancelled mid-pass");
                return Ok(report);
            }
            match self.index_resource(hash).await {
                Ok(()) => report.added += 1,
                Err(IngestError::Catalog(e)) => return Err(e.into()),
                Err(e) => {
                    error!(hash = %hash, error = %e, "failed to index resource");
                    report.failed.push(hash.clone());
                }
            }
        }

        info!(
            added = report.added,
            deleted = report.deleted,
            failed = report.failed.len(),
            "reconciliation pass complete"
        );
        Ok(report)
    }

    /// Chunk, embed, and upsert one catalog resource.
    async fn index_resource(&self, hash: &str) -> Result<(), IngestError> {
        let record = self.catalog.get(hash).await?.ok_or_else(|| {
            // Raced with a retire between plan and apply; treat as a
            // per-resource failure so the next pass settles it.
            IngestError::Index(IndexError::Backend(format!(
                "catalog record vanished for {}",
                hash
            )))
        })?;

        let bytes = self.store.read(&Locator::new(record.path))?;
        let text = String::from_utf8_lossy(&bytes);

        let mut chunks = chunk_content(
            hash,
            &text,
            self.chunking.chunk_size,
            self.chunking.chunk_overlap,
        );
        self.embed_chunks(&mut chunks).await?;

        self.index.upsert_chunks(hash, &chunks).await?;
        debug!(hash = %hash, chunks = chunks.len(), "indexed resource");
        Ok(())
    }

    async fn embed_chunks(&self, chunks: &mut [IndexedChunk]) -> Result<(), IndexError> {
        if self.embedder.dims() == 0 {
            return Ok(());
        }

        for batch in chunks.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(IndexError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }
        Ok(())
    }

    /// Run passes on a fixed interval until cancelled. A pass failure
    /// is logged and the loop keeps going.
    pub async fn run_scheduled(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduled reconciliation stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_pass(&cancel).await {
                        error!(error = %e, "scheduled reconciliation pass failed");
                    }
                }
            }
        }
    }
}
