//! Resource metadata normalization and flattening.
//!
//! [`ResourceMetadata`] is the normalized key/value payload attached to a
//! resource. A fixed set of keys ([`INDEXED_METADATA_KEYS`]) is promoted
//! to dedicated catalog columns; everything else is carried as an opaque
//! JSON blob plus a searchable free-text field.

use std::collections::BTreeMap;

/// Metadata keys promoted to indexed catalog columns.
///
/// This is the single canonical list: it drives both the `resources`
/// table shape and the structured portion of index payloads. Keys not
/// in this list only ever reach the free-text field.
pub const INDEXED_METADATA_KEYS: &[&str] = &[
    "source_type",
    "url",
    "ticket_id",
    "suffix",
    "size_bytes",
    "original_path",
    "base_path",
    "relative_path",
    "created_at",
    "modified_at",
    "ingested_at",
];

/// Normalized metadata for one resource.
///
/// `file_name` is required and non-empty; `display_name` is UI-only;
/// `extra` holds free-form string pairs. Unknown keys are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub file_name: String,
    pub display_name: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl ResourceMetadata {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            display_name: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Flat view of the full payload, including `file_name` and
    /// `display_name`, used to build the free-text field.
    pub fn as_flat_map(&self) -> BTreeMap<String, String> {
        let mut map = self.extra.clone();
        map.insert("file_name".to_string(), self.file_name.clone());
        if let Some(display_name) = &self.display_name {
            map.insert("display_name".to_string(), display_name.clone());
        }
        map
    }

    /// Split `extra` into promoted (indexed) keys and the remainder.
    pub fn partition_extra(&self) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        let mut promoted = BTreeMap::new();
        let mut rest = BTreeMap::new();
        for (key, value) in &self.extra {
            if INDEXED_METADATA_KEYS.contains(&key.as_str()) {
                promoted.insert(key.clone(), value.clone());
            } else {
                rest.insert(key.clone(), value.clone());
            }
        }
        (promoted, rest)
    }

    /// Serialize the non-promoted remainder as sorted JSON.
    pub fn extra_json(&self) -> String {
        let (_, rest) = self.partition_extra();
        serde_json::to_string(&rest).unwrap_or_else(|_| "{}".to_string())
    }

    /// Build the searchable free-text field: `key:value value` pairs
    /// over the whole payload, space-joined.
    pub fn extra_text(&self) -> String {
        let mut parts = Vec::new();
        for (key, value) in self.as_flat_map() {
            parts.push(format!("{}:{}", key, value));
            parts.push(value);
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceMetadata {
        let mut meta = ResourceMetadata::new("doc.txt");
        meta.display_name = Some("Doc".to_string());
        meta.extra
            .insert("source_type".to_string(), "local_files".to_string());
        meta.extra
            .insert("size_bytes".to_string(), "11".to_string());
        meta.extra
            .insert("department".to_string(), "physics".to_string());
        meta
    }

    #[test]
    fn test_partition_promotes_only_indexed_keys() {
        let (promoted, rest) = sample().partition_extra();
        assert_eq!(promoted.get("source_type").unwrap(), "local_files");
        assert_eq!(promoted.get("size_bytes").unwrap(), "11");
        assert!(!promoted.contains_key("department"));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.get("department").unwrap(), "physics");
    }

    #[test]
    fn test_extra_json_excludes_promoted_keys() {
        let json = sample().extra_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["department"], "physics");
        assert!(parsed.get("source_type").is_none());
    }

    #[test]
    fn test_extra_text_contains_all_pairs() {
        let text = sample().extra_text();
        assert!(text.contains("department:physics"));
        assert!(text.contains("source_type:local_files"));
        assert!(text.contains("file_name:doc.txt"));
        assert!(text.contains("display_name:Doc"));
    }

    #[test]
    fn test_empty_metadata() {
        let meta = ResourceMetadata::new("a.md");
        assert_eq!(meta.extra_json(), "{}");
        assert_eq!(meta.extra_text(), "file_name:a.md a.md");
    }
}
