//! JSON document stores.
//!
//! Records live as one JSON document per id. The [`DocumentStore`] trait is
//! the repository seam injected into the router and the typed accessors in
//! [`records`]; the filesystem implementation backs production and the
//! in-memory one backs tests. Writers use whole-document replace semantics
//! (write to a temp file, then rename) so concurrent readers on the same
//! directory never observe a half-written record and no in-process locking
//! is needed.

pub mod records;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid record id `{0}`")]
    InvalidId(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Record ids become filenames, so the character set is restricted: ASCII
/// alphanumerics plus `-`, `_` and `.`, at most 128 chars, and no leading
/// dot. Everything else is rejected before touching the filesystem.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

/// Keyed JSON document repository.
pub trait DocumentStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Value>, StoreError>;
    fn list(&self) -> Result<Vec<(String, Value)>, StoreError>;
    fn put(&self, id: &str, doc: &Value) -> Result<(), StoreError>;
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// One `<id>.json` file per document under a single directory.
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl DocumentStore for FsDocumentStore {
    fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        validate_id(id)?;
        let path = self.path(id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Read { path, source: e }),
        };
        match serde_json::from_str(&contents) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed record");
                Ok(None)
            }
        }
    }

    fn list(&self) -> Result<Vec<(String, Value)>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut docs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(id) = record_id(&path) else {
                continue;
            };
            match self.get(&id) {
                Ok(Some(doc)) => docs.push((id, doc)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record");
                }
            }
        }
        docs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(docs)
    }

    fn put(&self, id: &str, doc: &Value) -> Result<(), StoreError> {
        validate_id(id)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::Write {
            path: self.dir.clone(),
            source: e,
        })?;

        let contents = serde_json::to_string_pretty(doc).map_err(StoreError::Encode)?;
        let path = self.path(id);
        let tmp = self.dir.join(format!("{id}.json.tmp"));
        std::fs::write(&tmp, contents).map_err(|e| StoreError::Write {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::Write { path, source: e })
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        let path = self.path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Write { path, source: e }),
        }
    }
}

/// Extract the record id from a `<id>.json` path; `None` for anything else
/// (temp files, subdirectories, stray content).
fn record_id(path: &Path) -> Option<String> {
    if path.extension()? != "json" {
        return None;
    }
    let id = path.file_stem()?.to_str()?.to_string();
    validate_id(&id).ok()?;
    Some(id)
}

/// In-memory substitute with the same semantics, for tests.
#[derive(Clone, Default)]
pub struct MemDocumentStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemDocumentStore {
    fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        validate_id(id)?;
        Ok(self.inner.read().get(id).cloned())
    }

    fn list(&self) -> Result<Vec<(String, Value)>, StoreError> {
        let mut docs: Vec<(String, Value)> = self
            .inner
            .read()
            .iter()
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();
        docs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(docs)
    }

    fn put(&self, id: &str, doc: &Value) -> Result<(), StoreError> {
        validate_id(id)?;
        self.inner.write().insert(id.to_string(), doc.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        Ok(self.inner.write().remove(id).is_some())
    }
}
