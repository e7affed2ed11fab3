mod bucket;
mod memory;

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use common::{is_audio_key, InventoryItem};
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub use bucket::{BucketClient, BucketConfig};
pub use memory::{MemoryStore, StoredObject};

/// An object returned by a prefix listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// How object bytes are retrieved for reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Authenticated download through the bucket API.
    #[default]
    Signed,
    /// Download from the bucket's public base URL.
    Public,
}

#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Fetch { key: String, message: String },
    Put { key: String, message: String },
    Config(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(message) => write!(f, "store unavailable: {}", message),
            StoreError::Fetch { key, message } => {
                write!(f, "failed to fetch {}: {}", key, message)
            }
            StoreError::Put { key, message } => write!(f, "failed to upload {}: {}", key, message),
            StoreError::Config(message) => write!(f, "store config error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// Capability interface over a bucket.
pub trait ObjectStore: Send + Sync {
    /// Every object under `prefix`, across all listing pages.
    fn list_objects(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<ObjectEntry>, StoreError>> + Send;

    fn fetch_object(&self, key: &str) -> impl Future<Output = Result<Bytes, StoreError>> + Send;

    /// Single-shot upload, overwriting any existing object at `key`.
    fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        public: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Time-limited GET URL. Signs locally; performs no network I/O.
    fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Public URL of `key`, when the bucket is served publicly.
    fn public_url(&self, key: &str) -> Option<String>;

    /// Audio objects under `prefix`, in listing order.
    fn list_songs(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<InventoryItem>, StoreError>> + Send {
        async move {
            let objects = self.list_objects(prefix).await?;
            Ok(objects
                .into_iter()
                .filter(|entry| is_audio_key(&entry.key))
                .map(|entry| InventoryItem {
                    key: entry.key,
                    size: entry.size,
                })
                .collect())
        }
    }
}

/// `base` followed by the key's segments, each percent-encoded.
pub fn join_public_url(base: &str, key: &str) -> String {
    let base = base.trim_end_matches('/');
    let mut url = match Url::parse(base) {
        Ok(url) => url,
        Err(_) => return format!("{}/{}", base, key),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(key.split('/'));
    }
    url.to_string()
}
