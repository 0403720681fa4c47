//! Flat-file JSON backend — one file per collection, whole-file rewrite on
//! every write.
//!
//! Every mutating operation holds the collection's write mutex across its
//! whole read-modify-write cycle. Overlapping `update` calls from the
//! scheduler and the command router would otherwise silently drop writes.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::filter::Filter;

/// A single JSON-array collection file.
pub struct JsonCollection {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCollection {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Read the whole collection. A missing file reads as empty; a record
    /// that is not a JSON object is logged and skipped.
    async fn read_all(&self) -> Result<Vec<Value>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let parsed: Value = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", self.path.display())))?;

        let Value::Array(docs) = parsed else {
            return Err(StoreError::Serialization(format!(
                "{}: expected a JSON array",
                self.path.display()
            )));
        };

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            if doc.is_object() {
                records.push(doc);
            } else {
                warn!(path = %self.path.display(), "Skipping non-object record");
            }
        }
        Ok(records)
    }

    async fn write_all(&self, docs: &[Value]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&docs)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| self.io_err(e))
    }

    /// Insert a document, generating its `id`. Returns the stored document.
    pub async fn insert(&self, mut doc: Value) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().await;

        let id = Uuid::new_v4().to_string();
        doc.as_object_mut()
            .ok_or_else(|| StoreError::Serialization("document must be a JSON object".into()))?
            .insert("id".to_string(), Value::String(id));

        let mut docs = self.read_all().await?;
        docs.push(doc.clone());
        self.write_all(&docs).await?;
        Ok(doc)
    }

    /// Point lookup by id.
    pub async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let docs = self.read_all().await?;
        Ok(docs.into_iter().find(|d| doc_id(d) == Some(id)))
    }

    /// Scan for documents matching the filter, in file order.
    pub async fn scan(&self, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let docs = self.read_all().await?;
        Ok(docs.into_iter().filter(|d| filter.matches(d)).collect())
    }

    /// Shallow-merge `partial` over the document with the given id and
    /// rewrite the file. Top-level fields are replaced whole, so callers
    /// updating a sub-document must supply the full sub-document.
    pub async fn update(&self, id: &str, partial: Value) -> Result<Option<Value>, StoreError> {
        let partial = match partial {
            Value::Object(map) => map,
            _ => {
                return Err(StoreError::Serialization(
                    "partial update must be a JSON object".into(),
                ));
            }
        };

        let _guard = self.write_lock.lock().await;

        let mut docs = self.read_all().await?;
        let Some(target) = docs.iter_mut().find(|d| doc_id(d) == Some(id)) else {
            return Ok(None);
        };

        merge_shallow(target, &partial);
        let merged = target.clone();
        self.write_all(&docs).await?;
        Ok(Some(merged))
    }

    /// Delete by id. Returns whether a document was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut docs = self.read_all().await?;
        let before = docs.len();
        docs.retain(|d| doc_id(d) != Some(id));
        if docs.len() == before {
            return Ok(false);
        }
        self.write_all(&docs).await?;
        Ok(true)
    }
}

fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

fn merge_shallow(target: &mut Value, partial: &Map<String, Value>) {
    if let Some(map) = target.as_object_mut() {
        for (key, value) in partial {
            // The id is store-owned and never rewritten by a partial.
            if key == "id" {
                continue;
            }
            map.insert(key.clone(), value.clone());
        }
    }
}

/// The on-disk store: a directory of collection files.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open (or create) the data directory. Failure here is fatal — the
    /// process must not start serving with an unusable store.
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| StoreError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        info!(path = %dir.display(), "Store opened");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Handle to a named collection (`users` → `users.json`).
    pub fn collection(&self, name: &str) -> JsonCollection {
        JsonCollection::new(self.dir.join(format!("{name}.json")))
    }
}
