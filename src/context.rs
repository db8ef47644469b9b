//! Wiring: one place that opens the database, builds the services, and
//! hands out ready-to-use handles.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::content_store::ContentStore;
use crate::db;
use crate::embedding::{create_embedder, Embedder};
use crate::index::{SearchIndex, SqliteSearchIndex};
use crate::persist::PersistenceService;
use crate::sync::IndexSyncEngine;

/// Open handles to every service the pipeline needs.
pub struct IngestContext {
    pub config: Config,
    pub catalog: Catalog,
    pub store: ContentStore,
    pub index: Arc<SqliteSearchIndex>,
    pub persistence: PersistenceService,
    pub sync: IndexSyncEngine,
    pool: sqlx::SqlitePool,
}

impl IngestContext {
    /// Connect to the database, run migrations, and build all services.
    pub async fn open(config: Config) -> Result<Self> {
        if let Some(parent) = config.storage.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::create_dir_all(&config.storage.content_root).with_context(|| {
            format!(
                "Failed to create content root {}",
                config.storage.content_root.display()
            )
        })?;

        let pool = db::connect(&config.storage.db_path)
            .await
            .context("Failed to open catalog database")?;

        let catalog = Catalog::new(pool.clone());
        catalog.migrate().await.context("Catalog migration failed")?;

        let index = Arc::new(SqliteSearchIndex::new(pool.clone()));
        index.migrate().await.context("Index migration failed")?;

        let store = ContentStore::new(&config.storage.content_root);
        let persistence = PersistenceService::new(store.clone(), catalog.clone());

        let embedder: Arc<dyn Embedder> = create_embedder(&config.embedding)
            .context("Failed to initialize embedder")?
            .into();
        let sync = IndexSyncEngine::new(
            catalog.clone(),
            store.clone(),
            index.clone() as Arc<dyn SearchIndex>,
            embedder,
            config.chunking.clone(),
            &config.sync,
        );

        Ok(Self {
            config,
            catalog,
            store,
            index,
            persistence,
            sync,
            pool,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
