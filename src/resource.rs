//! The [`Resource`] capability trait.
//!
//! Any producer type that can supply a content hash, a filename, and
//! content bytes is an ingestible resource. Metadata is optional and
//! defaults to a payload carrying only the filename. Collectors hand
//! boxed resources to the persistence layer and discard them after the
//! collection cycle.

use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::metadata::ResourceMetadata;

/// One ingestible unit of content.
///
/// `hash()` must be a pure function of the content bytes — it is the
/// resource's permanent identity. A content change yields a new hash
/// and therefore a new catalog record.
pub trait Resource: Send + Sync {
    /// Content-derived identity (lowercase hex SHA-256 of the bytes).
    fn hash(&self) -> &str;

    /// Filename under which the content is stored.
    fn filename(&self) -> &str;

    /// Raw content bytes.
    fn content(&self) -> &[u8];

    /// Normalized metadata; defaults to just the filename.
    fn metadata(&self) -> ResourceMetadata {
        ResourceMetadata::new(self.filename())
    }
}

/// Compute the canonical content hash for a byte payload.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Reject resources with empty content or an empty/whitespace filename.
///
/// Has no side effects; callers skip the resource and continue the
/// collection cycle.
pub fn validate(resource: &dyn Resource) -> Result<(), ValidationError> {
    if resource.content().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if resource.filename().trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }
    Ok(())
}

/// A resource built directly from in-memory bytes.
///
/// Used by collectors that already hold the full payload, and by tests.
#[derive(Debug, Clone)]
pub struct RawResource {
    hash: String,
    file_name: String,
    content: Vec<u8>,
    metadata: Option<ResourceMetadata>,
}

impl RawResource {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        let hash = content_hash(&content);
        Self {
            hash,
            file_name: file_name.into(),
            content,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ResourceMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl Resource for RawResource {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn filename(&self) -> &str {
        &self.file_name
    }

    fn content(&self) -> &[u8] {
        &self.content
    }

    fn metadata(&self) -> ResourceMetadata {
        self.metadata
            .clone()
            .unwrap_or_else(|| ResourceMetadata::new(self.filename()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_content_derived() {
        let a = RawResource::new("a.txt", b"hello world".to_vec());
        let b = RawResource::new("b.txt", b"hello world".to_vec());
        assert_eq!(a.hash(), b.hash());

        let c = RawResource::new("a.txt", b"hello world!".to_vec());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_validate_empty_content() {
        let r = RawResource::new("a.txt", Vec::new());
        assert_eq!(validate(&r), Err(ValidationError::EmptyContent));
    }

    #[test]
    fn test_validate_whitespace_filename() {
        let r = RawResource::new("   ", b"content".to_vec());
        assert_eq!(validate(&r), Err(ValidationError::EmptyFilename));
    }

    #[test]
    fn test_default_metadata_carries_filename() {
        let r = RawResource::new("notes.md", b"content".to_vec());
        assert_eq!(r.metadata().file_name, "notes.md");
        assert!(r.metadata().extra.is_empty());
    }
}
