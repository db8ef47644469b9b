//! The ingestion catalog: a durable table of resource records keyed by
//! content hash.
//!
//! The catalog is the single source of truth for "what has been
//! ingested". A record's hash never changes — a content change produces
//! a new hash and thus a new record, with the old one explicitly
//! retired. Upserts from concurrent producers for the same hash race
//! harmlessly: content fields are identity-determined and metadata
//! refresh is last-writer-wins.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::content_store::Locator;
use crate::error::CatalogError;
use crate::metadata::ResourceMetadata;
use crate::resource::Resource;

/// One durable catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub resource_hash: String,
    pub path: String,
    pub file_name: String,
    pub display_name: String,
    pub source_type: String,
    pub url: Option<String>,
    pub ticket_id: Option<String>,
    pub suffix: Option<String>,
    pub size_bytes: i64,
    pub original_path: Option<String>,
    pub base_path: Option<String>,
    pub relative_path: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub ingested_at: String,
    pub extra_json: String,
    pub extra_text: String,
}

impl CatalogRecord {
    /// Build a record from a validated resource and its content locator.
    pub fn from_resource(resource: &dyn Resource, locator: &Locator) -> Self {
        Self::from_parts(
            resource.hash(),
            locator,
            &resource.metadata(),
            resource.content().len(),
        )
    }

    fn from_parts(
        hash: &str,
        locator: &Locator,
        metadata: &ResourceMetadata,
        content_len: usize,
    ) -> Self {
        let (promoted, _) = metadata.partition_extra();
        let get = |key: &str| promoted.get(key).cloned();

        let size_bytes = get("size_bytes")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(content_len as i64);

        Self {
            resource_hash: hash.to_string(),
            path: locator.as_str().to_string(),
            file_name: metadata.file_name.clone(),
            display_name: metadata.display_name.clone().unwrap_or_default(),
            source_type: get("source_type").unwrap_or_else(|| "unknown".to_string()),
            url: get("url"),
            ticket_id: get("ticket_id"),
            suffix: get("suffix"),
            size_bytes,
            original_path: get("original_path"),
            base_path: get("base_path"),
            relative_path: get("relative_path"),
            created_at: get("created_at"),
            modified_at: get("modified_at"),
            ingested_at: get("ingested_at").unwrap_or_else(|| Utc::now().to_rfc3339()),
            extra_json: metadata.extra_json(),
            extra_text: metadata.extra_text(),
        }
    }
}

/// Lightweight (hash, locator, size) view of a record, used for cheap
/// diffing during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub resource_hash: String,
    pub path: String,
    pub size_bytes: i64,
}

/// Handle to the `resources` table.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the `resources` table and its secondary indexes.
    /// Idempotent.
    pub async fn migrate(&self) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                resource_hash TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                source_type TEXT NOT NULL DEFAULT 'unknown',
                url TEXT,
                ticket_id TEXT,
                suffix TEXT,
                size_bytes INTEGER NOT NULL,
                original_path TEXT,
                base_path TEXT,
                relative_path TEXT,
                created_at TEXT,
                modified_at TEXT,
                ingested_at TEXT NOT NULL,
                extra_json TEXT NOT NULL DEFAULT '{}',
                extra_text TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_resources_source_type ON resources(source_type)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_url ON resources(url)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_ticket_id ON resources(ticket_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert, or refresh the non-identity fields if the hash already
    /// exists. `resource_hash` and `path` are immutable per hash.
    pub async fn upsert(&self, record: &CatalogRecord) -> Result<(), CatalogError> {
        debug!(
            hash = %record.resource_hash,
            source_type = %record.source_type,
            path = %record.path,
            "upserting catalog record"
        );

        sqlx::query(
            r#"
            INSERT INTO resources (
                resource_hash, path, file_name, display_name, source_type,
                url, ticket_id, suffix, size_bytes, original_path,
                base_path, relative_path, created_at, modified_at,
                ingested_at, extra_json, extra_text
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(resource_hash) DO UPDATE SET
                file_name = excluded.file_name,
                display_name = excluded.display_name,
                source_type = excluded.source_type,
                url = excluded.url,
                ticket_id = excluded.ticket_id,
                suffix = excluded.suffix,
                size_bytes = excluded.size_bytes,
                original_path = excluded.original_path,
                base_path = excluded.base_path,
                relative_path = excluded.relative_path,
                created_at = excluded.created_at,
                modified_at = excluded.modified_at,
                ingested_at = excluded.ingested_at,
                extra_json = excluded.extra_json,
                extra_text = excluded.extra_text
            "#,
        )
        .bind(&record.resource_hash)
        .bind(&record.path)
        .bind(&record.file_name)
        .bind(&record.display_name)
        .bind(&record.source_type)
        .bind(&record.url)
        .bind(&record.ticket_id)
        .bind(&record.suffix)
        .bind(record.size_bytes)
        .bind(&record.original_path)
        .bind(&record.base_path)
        .bind(&record.relative_path)
        .bind(&record.created_at)
        .bind(&record.modified_at)
        .bind(&record.ingested_at)
        .bind(&record.extra_json)
        .bind(&record.extra_text)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, hash: &str) -> Result<Option<CatalogRecord>, CatalogError> {
        let row = sqlx::query("SELECT * FROM resources WHERE resource_hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row_to_record(&row)))
    }

    /// All active records as lightweight fingerprints, ordered by hash
    /// for deterministic reconciliation.
    pub async fn list_all(&self) -> Result<Vec<Fingerprint>, CatalogError> {
        let rows = sqlx::query(
            "SELECT resource_hash, path, size_bytes FROM resources ORDER BY resource_hash",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Fingerprint {
                resource_hash: row.get("resource_hash"),
                path: row.get("path"),
                size_bytes: row.get("size_bytes"),
            })
            .collect())
    }

    pub async fn delete(&self, hash: &str) -> Result<(), CatalogError> {
        sqlx::query("DELETE FROM resources WHERE resource_hash = ?")
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hashes whose metadata matches `key = value`. Promoted keys hit
    /// their column; unknown keys fall back to the free-text field.
    pub async fn find_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>, CatalogError> {
        let rows = if crate::metadata::INDEXED_METADATA_KEYS.contains(&key) {
            sqlx::query(&format!(
                "SELECT resource_hash FROM resources WHERE {} = ?",
                key
            ))
            .bind(value)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query("SELECT resource_hash FROM resources WHERE extra_text LIKE ?")
                .bind(format!("%{}:{}%", key, value))
                .fetch_all(&self.pool)
                .await?
        };

        Ok(rows.iter().map(|row| row.get("resource_hash")).collect())
    }

    /// Search the catalog for the retrieval read path.
    ///
    /// `filters` is a list of groups OR-ed together; within a group the
    /// key/value pairs are AND-ed. Promoted keys compare against their
    /// column, everything else falls back to `extra_text LIKE`. A
    /// non-empty `query` additionally matches free text across the
    /// name, source, and path columns. Results come back most recently
    /// touched first. An empty query with no filters matches nothing.
    pub async fn search(
        &self,
        query: &str,
        filters: &[BTreeMap<String, String>],
        limit: Option<i64>,
    ) -> Result<Vec<CatalogRecord>, CatalogError> {
        if query.is_empty() && filters.iter().all(|group| group.is_empty()) {
            return Ok(Vec::new());
        }

        let mut where_clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        let mut group_clauses: Vec<String> = Vec::new();
        for group in filters {
            if group.is_empty() {
                continue;
            }
            let mut sub_clauses = Vec::new();
            for (key, value) in group {
                if crate::metadata::INDEXED_METADATA_KEYS.contains(&key.as_str()) {
                    sub_clauses.push(format!("{} = ?", key));
                    params.push(value.clone());
                } else {
                    sub_clauses.push("extra_text LIKE ?".to_string());
                    params.push(format!("%{}:{}%", key, value));
                }
            }
            group_clauses.push(format!("({})", sub_clauses.join(" AND ")));
        }
        if !group_clauses.is_empty() {
            where_clauses.push(format!("({})", group_clauses.join(" OR ")));
        }

        if !query.is_empty() {
            let like = format!("%{}%", query);
            let columns = [
                "file_name",
                "source_type",
                "url",
                "ticket_id",
                "path",
                "original_path",
                "relative_path",
                "extra_text",
            ];
            let clause = columns
                .iter()
                .map(|column| format!("{} LIKE ?", column))
                .collect::<Vec<_>>()
                .join(" OR ");
            where_clauses.push(format!("({})", clause));
            for _ in columns {
                params.push(like.clone());
            }
        }

        let mut sql = "SELECT * FROM resources".to_string();
        if !where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY COALESCE(modified_at, created_at, ingested_at, '') DESC");
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut stmt = sqlx::query(&sql);
        for param in &params {
            stmt = stmt.bind(param);
        }
        if let Some(limit) = limit {
            stmt = stmt.bind(limit);
        }

        let rows = stmt.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> CatalogRecord {
    CatalogRecord {
        resource_hash: row.get("resource_hash"),
        path: row.get("path"),
        file_name: row.get("file_name"),
        display_name: row.get("display_name"),
        source_type: row.get("source_type"),
        url: row.get("url"),
        ticket_id: row.get("ticket_id"),
        suffix: row.get("suffix"),
        size_bytes: row.get("size_bytes"),
        original_path: row.get("original_path"),
        base_path: row.get("base_path"),
        relative_path: row.get("relative_path"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
        ingested_at: row.get("ingested_at"),
        extra_json: row.get("extra_json"),
        extra_text: row.get("extra_text"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::resource::{RawResource, Resource};

    async fn test_catalog() -> Catalog {
        let pool = db::connect_memory().await.unwrap();
        let catalog = Catalog::new(pool);
        catalog.migrate().await.unwrap();
        catalog
    }

    fn record_for(content: &[u8], file_name: &str) -> CatalogRecord {
        let resource = RawResource::new(file_name, content.to_vec());
        let locator = Locator::new(format!("unknown/{}/{}", resource.hash(), file_name));
        CatalogRecord::from_resource(&resource, &locator)
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let catalog = test_catalog().await;
        let record = record_for(b"hello world", "doc.txt");

        catalog.upsert(&record).await.unwrap();
        let fetched = catalog.get(&record.resource_hash).await.unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.size_bytes, 11);
    }

    #[tokio::test]
    async fn test_upsert_same_hash_is_single_row() {
        let catalog = test_catalog().await;
        let mut record = record_for(b"hello world", "doc.txt");

        catalog.upsert(&record).await.unwrap();
        record.display_name = "Renamed".to_string();
        catalog.upsert(&record).await.unwrap();

        let all = catalog.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        let fetched = catalog.get(&record.resource_hash).await.unwrap().unwrap();
        assert_eq!(fetched.display_name, "Renamed");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let catalog = test_catalog().await;
        assert!(catalog.get("no-such-hash").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let catalog = test_catalog().await;
        let record = record_for(b"bytes", "a.txt");
        catalog.upsert(&record).await.unwrap();

        catalog.delete(&record.resource_hash).await.unwrap();
        assert!(catalog.get(&record.resource_hash).await.unwrap().is_none());
        assert!(catalog.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_hash() {
        let catalog = test_catalog().await;
        for content in [&b"alpha"[..], b"beta", b"gamma"] {
            catalog.upsert(&record_for(content, "f.txt")).await.unwrap();
        }

        let all = catalog.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        let hashes: Vec<_> = all.iter().map(|f| f.resource_hash.clone()).collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
    }

    #[tokio::test]
    async fn test_find_by_metadata_promoted_column() {
        let catalog = test_catalog().await;
        let resource = RawResource::new("t.txt", b"ticketed".to_vec()).with_metadata(
            crate::metadata::ResourceMetadata::new("t.txt").with_extra("ticket_id", "RT-42"),
        );
        let locator = Locator::new("tickets/x/t.txt");
        catalog
            .upsert(&CatalogRecord::from_resource(&resource, &locator))
            .await
            .unwrap();

        let hits = catalog.find_by_metadata("ticket_id", "RT-42").await.unwrap();
        assert_eq!(hits, vec![resource.hash().to_string()]);
        assert!(catalog
            .find_by_metadata("ticket_id", "RT-999")
            .await
            .unwrap()
            .is_empty());
    }

    async fn seed_search_catalog(catalog: &Catalog) {
        let docs = [
            ("guide.md", "rust guide", "docs", "2024-03-01T00:00:00Z", "eng"),
            ("notes.md", "meeting notes", "docs", "2024-01-01T00:00:00Z", "ops"),
            ("ticket.txt", "outage report", "tickets", "2024-02-01T00:00:00Z", "ops"),
        ];
        for (name, body, source, modified, dept) in docs {
            let resource = RawResource::new(name, body.as_bytes().to_vec()).with_metadata(
                crate::metadata::ResourceMetadata::new(name)
                    .with_extra("source_type", source)
                    .with_extra("modified_at", modified)
                    .with_extra("department", dept),
            );
            let locator = Locator::new(format!("{}/{}/{}", source, resource.hash(), name));
            catalog
                .upsert(&CatalogRecord::from_resource(&resource, &locator))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_search_query_matches_file_name_and_orders_by_recency() {
        let catalog = test_catalog().await;
        seed_search_catalog(&catalog).await;

        let hits = catalog.search("md", &[], None).await.unwrap();
        let names: Vec<_> = hits.iter().map(|r| r.file_name.as_str()).collect();
        // guide.md (March) before notes.md (January).
        assert_eq!(names, vec!["guide.md", "notes.md"]);
    }

    #[tokio::test]
    async fn test_search_filter_group_ands_keys() {
        let catalog = test_catalog().await;
        seed_search_catalog(&catalog).await;

        let mut group = std::collections::BTreeMap::new();
        group.insert("source_type".to_string(), "docs".to_string());
        group.insert("department".to_string(), "ops".to_string());

        let hits = catalog.search("", &[group], None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_name, "notes.md");
    }

    #[tokio::test]
    async fn test_search_filter_groups_or_together() {
        let catalog = test_catalog().await;
        seed_search_catalog(&catalog).await;

        let mut docs = std::collections::BTreeMap::new();
        docs.insert("source_type".to_string(), "docs".to_string());
        let mut tickets = std::collections::BTreeMap::new();
        tickets.insert("source_type".to_string(), "tickets".to_string());

        let hits = catalog.search("", &[docs, tickets], None).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_search_limit_truncates_after_ordering() {
        let catalog = test_catalog().await;
        seed_search_catalog(&catalog).await;

        let hits = catalog.search("md", &[], Some(1)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_name, "guide.md");
    }

    #[tokio::test]
    async fn test_search_empty_query_and_filters_matches_nothing() {
        let catalog = test_catalog().await;
        seed_search_catalog(&catalog).await;

        assert!(catalog.search("", &[], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_metadata_freeform_key() {
        let catalog = test_catalog().await;
        let resource = RawResource::new("n.txt", b"note".to_vec()).with_metadata(
            crate::metadata::ResourceMetadata::new("n.txt").with_extra("department", "physics"),
        );
        let locator = Locator::new("notes/x/n.txt");
        catalog
            .upsert(&CatalogRecord::from_resource(&resource, &locator))
            .await
            .unwrap();

        let hits = catalog
            .find_by_metadata("department", "physics")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
