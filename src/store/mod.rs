//! Persistence layer — flat-file JSON document store.
//!
//! Two collections (`users`, `tasks`) of JSON documents keyed by a generated
//! uuid. The backend supports point lookup, predicate-filtered scans, and a
//! shallow-merge partial update; every write rewrites the whole collection
//! file under a single-writer lock.

pub mod filter;
pub mod json_backend;

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use filter::Filter;
pub use json_backend::{JsonCollection, JsonStore};

use crate::error::StoreError;

/// Typed view over a [`JsonCollection`]. Records are plain value types; all
/// persistence behavior lives here, never on the records themselves.
pub struct Collection<T> {
    inner: JsonCollection,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(inner: JsonCollection) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Store a record, returning it with its generated id filled in.
    pub async fn create(&self, record: &T) -> Result<T, StoreError> {
        let doc = to_doc(record)?;
        let stored = self.inner.insert(doc).await?;
        from_doc(stored)
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self.inner.get(id).await? {
            Some(doc) => Ok(decode_lossy(doc)),
            None => Ok(None),
        }
    }

    /// Records matching the filter. A record that fails to decode is logged
    /// and skipped rather than failing the whole scan.
    pub async fn scan(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let docs = self.inner.scan(filter).await?;
        Ok(docs.into_iter().filter_map(decode_lossy).collect())
    }

    /// Shallow-merge a partial document over the stored record.
    pub async fn update(
        &self,
        id: &str,
        partial: serde_json::Value,
    ) -> Result<Option<T>, StoreError> {
        match self.inner.update(id, partial).await? {
            Some(doc) => Ok(Some(from_doc(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }
}

fn to_doc<T: Serialize>(record: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_doc<T: DeserializeOwned>(doc: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_lossy<T: DeserializeOwned>(doc: serde_json::Value) -> Option<T> {
    match serde_json::from_value(doc) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping undecodable record: {e}");
            None
        }
    }
}
