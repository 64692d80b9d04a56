//! The key-value store trait and its item/page types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_core::Result;

/// A stored item together with its revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Full key of the item.
    pub key: String,
    /// Opaque value bytes.
    pub value: Vec<u8>,
    /// Generation counter, bumped on every successful write. Revision 0
    /// never exists; the first write of a key produces revision 1.
    pub revision: u64,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Items in key order.
    pub items: Vec<Item>,
    /// Cursor for the next page; `None` when this page is the last.
    pub next_page_token: Option<String>,
}

/// Narrow interface to the shared device/lock store.
///
/// Listing is key-ordered with an exclusive-start cursor and is
/// best-effort under concurrent mutation: a record inserted or deleted
/// mid-listing may be missed or seen twice across pages.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a single item, or `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Item>>;

    /// Write a new key. Fails `AlreadyExists` when the key is present.
    /// Returns the item's initial revision.
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64>;

    /// Write a key unconditionally. Returns the new revision.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64>;

    /// Write a key only if its current revision equals `expected`.
    /// Fails `CompareFailed` when the revision moved or the key vanished;
    /// the caller should re-read and retry.
    async fn put_if_revision(&self, key: &str, value: Vec<u8>, expected: u64) -> Result<u64>;

    /// Delete a key. Fails `NotFound` when absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List up to `page_size` items whose keys start with `prefix`,
    /// starting after the `page_token` cursor when one is given.
    async fn list(&self, prefix: &str, page_size: usize, page_token: Option<&str>)
        -> Result<Page>;
}

/// Shared cursor arithmetic for handlers that materialize a sorted key set.
///
/// `keys` must be sorted ascending and already filtered to the prefix.
/// Returns the keys of the requested page and the next cursor.
pub(crate) fn paginate_keys(
    keys: &[String],
    page_size: usize,
    page_token: Option<&str>,
) -> (Vec<String>, Option<String>) {
    let start = match page_token {
        // Exclusive start: resume after the cursor key.
        Some(token) => keys.partition_point(|k| k.as_str() <= token),
        None => 0,
    };
    let page: Vec<String> = keys[start..].iter().take(page_size).cloned().collect();
    let next = if start + page.len() < keys.len() {
        page.last().cloned()
    } else {
        None
    };
    (page, next)
}
