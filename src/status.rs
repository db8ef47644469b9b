//! Status reporting: a snapshot of catalog vs index convergence.

use sqlx::Row;

use crate::context::IngestContext;
use crate::error::IngestError;
use crate::index::SearchIndex;
use crate::sync::compute_plan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub resources: usize,
    pub indexed: usize,
    pub pending_add: usize,
    pub stale: usize,
    /// (source_type, count) pairs, ordered by source_type.
    pub by_source: Vec<(String, i64)>,
}

impl StatusReport {
    pub fn is_converged(&self) -> bool {
        self.pending_add == 0 && self.stale == 0
    }
}

pub async fn collect_status(ctx: &IngestContext) -> Result<StatusReport, IngestError> {
    let catalog_hashes: Vec<String> = ctx
        .catalog
        .list_all()
        .await?
        .into_iter()
        .map(|f| f.resource_hash)
        .collect();
    let indexed = ctx.index.list_indexed_hashes().await?;
    let plan = compute_plan(&catalog_hashes, &indexed);

    let rows = sqlx::query(
        "SELECT source_type, COUNT(*) AS n FROM resources GROUP BY source_type ORDER BY source_type",
    )
    .fetch_all(ctx.catalog.pool())
    .await
    .map_err(crate::error::CatalogError::from)?;

    Ok(StatusReport {
        resources: catalog_hashes.len(),
        indexed: indexed.len(),
        pending_add: plan.to_add.len(),
        stale: plan.to_delete.len(),
        by_source: rows
            .iter()
            .map(|row| (row.get("source_type"), row.get("n")))
            .collect(),
    })
}
