//! In-process store handler.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use warden_core::{Error, Result};

use crate::kv::{paginate_keys, Item, KeyValueStore, Page};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    revision: u64,
}

/// In-process key-value store.
///
/// Cheap to clone; clones share the underlying map. Suitable for tests and
/// for ephemeral single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        let entries = self.entries.read();
        Ok(entries.get(key).map(|e| Item {
            key: key.to_string(),
            value: e.value.clone(),
            revision: e.revision,
        }))
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(Error::already_exists(format!("key {key:?}")));
        }
        entries.insert(key.to_string(), Entry { value, revision: 1 });
        Ok(1)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let mut entries = self.entries.write();
        let revision = entries.get(key).map_or(1, |e| e.revision + 1);
        entries.insert(key.to_string(), Entry { value, revision });
        Ok(revision)
    }

    async fn put_if_revision(&self, key: &str, value: Vec<u8>, expected: u64) -> Result<u64> {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if entry.revision == expected => {
                entry.value = value;
                entry.revision += 1;
                Ok(entry.revision)
            }
            Some(entry) => Err(Error::compare_failed(format!(
                "key {key:?}: revision {} != expected {expected}",
                entry.revision
            ))),
            None => Err(Error::compare_failed(format!("key {key:?}: gone"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        match entries.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("key {key:?}"))),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page> {
        let entries = self.entries.read();
        let keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let (page_keys, next_page_token) = paginate_keys(&keys, page_size, page_token);

        let items = page_keys
            .into_iter()
            .filter_map(|key| {
                entries.get(&key).map(|e| Item {
                    value: e.value.clone(),
                    revision: e.revision,
                    key,
                })
            })
            .collect();

        Ok(Page {
            items,
            next_page_token,
        })
    }
}
