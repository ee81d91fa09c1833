//! In-memory store, for tests and offline runs.

use std::collections::HashMap;

use uuid::Uuid;

use super::Store;
use crate::error::StoreError;
use crate::ics::NativeRecord;
use crate::kind::ResourceKind;

/// Keeps documents per kind in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<ResourceKind, Vec<(String, NativeRecord)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.collections.get(&kind).map_or(0, Vec::len)
    }

    fn find(&self, kind: ResourceKind, id: &str) -> Option<&NativeRecord> {
        self.collections
            .get(&kind)?
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, native)| native)
    }
}

impl Store for MemoryStore {
    async fn put(
        &mut self,
        kind: ResourceKind,
        native: &NativeRecord,
        id: Option<&str>,
    ) -> Result<String, StoreError> {
        if native.component() != Some(kind) {
            return Err(StoreError::Backend(format!(
                "Document does not contain a {} component",
                kind.component_name()
            )));
        }

        let id = id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let stamped = native.with_uid(&id);

        let collection = self.collections.entry(kind).or_default();
        match collection.iter_mut().find(|(key, _)| *key == id) {
            Some((_, existing)) => *existing = stamped,
            None => collection.push((id.clone(), stamped)),
        }
        Ok(id)
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<NativeRecord>, StoreError> {
        Ok(self.find(kind, id).cloned())
    }

    async fn delete(&mut self, kind: ResourceKind, id: &str) -> Result<bool, StoreError> {
        let Some(collection) = self.collections.get_mut(&kind) else {
            return Ok(false);
        };
        let before = collection.len();
        collection.retain(|(key, _)| key != id);
        Ok(collection.len() < before)
    }

    async fn list_all(&self, kind: ResourceKind) -> Result<Vec<NativeRecord>, StoreError> {
        Ok(self
            .collections
            .get(&kind)
            .map(|c| c.iter().map(|(_, native)| native.clone()).collect())
            .unwrap_or_default())
    }
}
