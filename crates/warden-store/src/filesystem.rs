//! Filesystem-backed store handler.
//!
//! One JSON document per key under a base directory. Keys may contain
//! path separators (e.g. `devices/<id>`), so listing walks the directory
//! tree recursively and strips the `.json` suffix from persisted names.
//!
//! Mutations are serialized through a single async mutex: revisions are
//! only meaningful with one writing process per data directory, which is
//! how the CLI uses this handler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use warden_core::{Error, Result};

use crate::kv::{paginate_keys, Item, KeyValueStore, Page};

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    revision: u64,
    value_hex: String,
}

/// Filesystem-backed key-value store.
#[derive(Debug)]
pub struct FilesystemStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilesystemStore {
    /// Create a store rooted at `base_path`. The directory is created on
    /// first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.json"))
    }

    async fn read_document(&self, key: &str) -> Result<Option<Document>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::unavailable(format!("read {}: {e}", path.display()))),
        };
        let doc: Document = serde_json::from_slice(&bytes)
            .map_err(|e| Error::internal(format!("corrupt document {}: {e}", path.display())))?;
        Ok(Some(doc))
    }

    async fn write_document(&self, key: &str, doc: &Document) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::unavailable(format!("mkdir {}: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec(doc)
            .map_err(|e| Error::internal(format!("encode document: {e}")))?;
        fs::write(&path, bytes)
            .await
            .map_err(|e| Error::unavailable(format!("write {}: {e}", path.display())))?;
        Ok(())
    }

    fn item_from(key: &str, doc: Document) -> Result<Item> {
        let value = hex::decode(&doc.value_hex)
            .map_err(|e| Error::internal(format!("corrupt value for key {key:?}: {e}")))?;
        Ok(Item {
            key: key.to_string(),
            value,
            revision: doc.revision,
        })
    }

    async fn collect_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut stack = vec![self.base_path.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::unavailable(format!(
                        "read dir {}: {e}",
                        dir.display()
                    )))
                }
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                Error::unavailable(format!("read dir entry in {}: {e}", dir.display()))
            })? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Some(key) = key_from_path(&self.base_path, &path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

fn key_from_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let s = relative.to_str()?;
    let key = s.strip_suffix(".json")?;
    Some(key.replace(std::path::MAIN_SEPARATOR, "/"))
}

#[async_trait]
impl KeyValueStore for FilesystemStore {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        match self.read_document(key).await? {
            Some(doc) => Ok(Some(Self::item_from(key, doc)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        if self.read_document(key).await?.is_some() {
            return Err(Error::already_exists(format!("key {key:?}")));
        }
        let doc = Document {
            revision: 1,
            value_hex: hex::encode(&value),
        };
        self.write_document(key, &doc).await?;
        Ok(1)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let revision = self.read_document(key).await?.map_or(1, |d| d.revision + 1);
        let doc = Document {
            revision,
            value_hex: hex::encode(&value),
        };
        self.write_document(key, &doc).await?;
        Ok(revision)
    }

    async fn put_if_revision(&self, key: &str, value: Vec<u8>, expected: u64) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        match self.read_document(key).await? {
            Some(doc) if doc.revision == expected => {
                let doc = Document {
                    revision: expected + 1,
                    value_hex: hex::encode(&value),
                };
                self.write_document(key, &doc).await?;
                Ok(doc.revision)
            }
            Some(doc) => Err(Error::compare_failed(format!(
                "key {key:?}: revision {} != expected {expected}",
                doc.revision
            ))),
            None => Err(Error::compare_failed(format!("key {key:?}: gone"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("key {key:?}")))
            }
            Err(e) => Err(Error::unavailable(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page> {
        let keys = self.collect_keys(prefix).await?;
        let (page_keys, next_page_token) = paginate_keys(&keys, page_size, page_token);

        let mut items = Vec::with_capacity(page_keys.len());
        for key in page_keys {
            // A key deleted mid-listing is simply skipped; listing is
            // best-effort under concurrent mutation.
            if let Some(doc) = self.read_document(&key).await? {
                items.push(Self::item_from(&key, doc)?);
            }
        }

        Ok(Page {
            items,
            next_page_token,
        })
    }
}
