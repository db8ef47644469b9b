//! Filesystem collector: walks a directory tree and yields matching
//! files as resources.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::collector::Collector;
use crate::config::FilesystemCollectorConfig;
use crate::error::IngestError;
use crate::metadata::ResourceMetadata;
use crate::resource::{RawResource, Resource};

pub const SOURCE_TYPE: &str = "local_files";

pub struct FilesystemCollector {
    config: FilesystemCollectorConfig,
    include: GlobSet,
    exclude: GlobSet,
}

impl FilesystemCollector {
    pub fn new(config: FilesystemCollectorConfig) -> Result<Self, IngestError> {
        let include = build_globset(&config.include_globs)?;
        let exclude = build_globset(&config.exclude_globs)?;
        Ok(Self {
            config,
            include,
            exclude,
        })
    }

    fn matches(&self, relative: &Path) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }

    fn resource_for(&self, path: &Path, relative: &Path) -> std::io::Result<RawResource> {
        let content = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut metadata = ResourceMetadata::new(&file_name)
            .with_extra("source_type", SOURCE_TYPE)
            .with_extra("original_path", path.to_string_lossy())
            .with_extra("base_path", self.config.root.to_string_lossy())
            .with_extra("relative_path", relative.to_string_lossy())
            .with_extra("size_bytes", content.len().to_string());

        if let Some(suffix) = path.extension() {
            metadata = metadata.with_extra("suffix", suffix.to_string_lossy());
        }

        let fs_meta = std::fs::metadata(path)?;
        if let Ok(created) = fs_meta.created() {
            metadata = metadata.with_extra("created_at", to_rfc3339(created));
        }
        if let Ok(modified) = fs_meta.modified() {
            metadata = metadata.with_extra("modified_at", to_rfc3339(modified));
        }

        Ok(RawResource::new(file_name, content).with_metadata(metadata))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IngestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| IngestError::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| IngestError::Config(e.to_string()))
}

fn to_rfc3339(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

#[async_trait]
impl Collector for FilesystemCollector {
    fn name(&self) -> &str {
        SOURCE_TYPE
    }

    async fn collect(&self) -> Result<Vec<Box<dyn Resource>>, IngestError> {
        let mut resources: Vec<Box<dyn Resource>> = Vec::new();

        let walker = WalkDir::new(&self.config.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.config.root)
                .unwrap_or_else(|_| entry.path());
            if !self.matches(relative) {
                continue;
            }

            match self.resource_for(entry.path(), relative) {
                Ok(resource) => resources.push(Box::new(resource)),
                Err(e) => {
                    // One unreadable file must not sink the cycle.
                    warn!(path = %entry.path().display(), error = %e, "skipping unreadable file");
                }
            }
        }

        debug!(count = resources.len(), root = %self.config.root.display(), "collected files");
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> FilesystemCollectorConfig {
        FilesystemCollectorConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: vec!["**/drafts/**".to_string()],
            follow_symlinks: false,
        }
    }

    #[tokio::test]
    async fn test_collects_matching_files_only() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.md"), "# alpha").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "beta").unwrap();
        std::fs::write(tmp.path().join("c.bin"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(tmp.path().join("drafts")).unwrap();
        std::fs::write(tmp.path().join("drafts/d.md"), "draft").unwrap();

        let collector = FilesystemCollector::new(config_for(tmp.path())).unwrap();
        let resources = collector.collect().await.unwrap();

        let names: Vec<_> = resources.iter().map(|r| r.filename()).collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[tokio::test]
    async fn test_metadata_carries_paths_and_suffix() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/note.md"), "content").unwrap();

        let collector = FilesystemCollector::new(config_for(tmp.path())).unwrap();
        let resources = collector.collect().await.unwrap();
        assert_eq!(resources.len(), 1);

        let metadata = resources[0].metadata();
        assert_eq!(metadata.extra.get("source_type").unwrap(), SOURCE_TYPE);
        assert_eq!(metadata.extra.get("suffix").unwrap(), "md");
        assert_eq!(metadata.extra.get("relative_path").unwrap(), "sub/note.md");
        assert_eq!(metadata.extra.get("size_bytes").unwrap(), "7");
        assert!(metadata.extra.contains_key("modified_at"));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_for(tmp.path());
        config.include_globs = vec!["[".to_string()];
        assert!(FilesystemCollector::new(config).is_err());
    }
}
