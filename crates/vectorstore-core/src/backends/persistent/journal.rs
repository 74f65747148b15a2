//! Single-file on-disk journal for the persistent exact-scan backend
//! (spec §4.4 "Journal format")
//!
//! One self-describing JSON document per collection. Writes go through a
//! temp-file-then-rename so a crash mid-write cannot corrupt a previously
//! committed journal, the same durability shape config-file loading
//! assumes elsewhere in this stack, generalized to a write path.

use crate::error::{Operation, VectorStoreError, VectorStoreResult};
use crate::types::{Payload, Vector, VectorId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub id: VectorId,
    pub vector: Vector,
    pub payload: Payload,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JournalDocument {
    entries: Vec<JournalRecord>,
}

/// Handle to a single collection's journal file.
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// `base_dir/<collection_name>.json`.
    #[must_use]
    pub fn new(base_dir: &Path, collection_name: &str) -> Self {
        Self {
            path: base_dir.join(format!("{collection_name}.json")),
        }
    }

    /// Read every record, or an empty list if the file does not yet exist.
    pub fn load(&self) -> VectorStoreResult<Vec<JournalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            VectorStoreError::backend_failure_with_source(
                Operation::Connect,
                format!("failed to read journal at {}", self.path.display()),
                e,
            )
        })?;
        let doc: JournalDocument = serde_json::from_str(&contents).map_err(|e| {
            VectorStoreError::backend_failure_with_source(
                Operation::Connect,
                format!("failed to parse journal at {}", self.path.display()),
                e,
            )
        })?;
        Ok(doc.entries)
    }

    /// Rewrite the entire journal, via temp-file-then-rename.
    pub fn save_all(&self, records: &[JournalRecord]) -> VectorStoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VectorStoreError::backend_failure_with_source(
                    Operation::Insert,
                    "failed to create journal directory",
                    e,
                )
            })?;
        }

        let doc = JournalDocument {
            entries: records.to_vec(),
        };
        let serialized = serde_json::to_string_pretty(&doc).map_err(|e| {
            VectorStoreError::backend_failure_with_source(
                Operation::Insert,
                "failed to serialize journal",
                e,
            )
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized).map_err(|e| {
            VectorStoreError::backend_failure_with_source(
                Operation::Insert,
                "failed to write journal temp file",
                e,
            )
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            VectorStoreError::backend_failure_with_source(
                Operation::Insert,
                "failed to commit journal temp file",
                e,
            )
        })?;
        Ok(())
    }

    /// Drop the journal file entirely (spec §4.4 `deleteCollection`).
    pub fn delete_file(&self) -> VectorStoreResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| {
                VectorStoreError::backend_failure_with_source(
                    Operation::DeleteCollection,
                    "failed to remove journal file",
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path(), "coll");
        let records = vec![JournalRecord {
            id: 1,
            vector: vec![1.0, 0.0],
            payload: [("tag".to_string(), json!("x"))].into_iter().collect(),
        }];
        journal.save_all(&records).unwrap();
        let loaded = journal.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 1);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path(), "missing");
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn delete_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path(), "coll");
        journal.delete_file().unwrap();
        journal.save_all(&[]).unwrap();
        journal.delete_file().unwrap();
        journal.delete_file().unwrap();
    }
}
