use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{join_public_url, ObjectEntry, ObjectStore, StoreError};

const MEMORY_PUBLIC_BASE: &str = "memory://bucket";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub public: bool,
}

#[derive(Default)]
struct MemoryInner {
    objects: BTreeMap<String, StoredObject>,
    fail_listing: bool,
    fail_fetch: HashSet<String>,
    hang_fetch: HashSet<String>,
    fail_put: HashSet<String>,
    put_delay: HashMap<String, Duration>,
    put_log: Vec<String>,
}

/// Bucket held in process memory. Lists in key order like S3 does.
///
/// Failures can be injected per key, which makes it the bucket of choice for
/// exercising the builder's isolation rules.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, body: impl Into<Bytes>) {
        self.inner.lock().objects.insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
                public: false,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.inner.lock().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().objects.contains_key(key)
    }

    /// Keys passed to `put_object`, in call order, including failed ones.
    pub fn put_log(&self) -> Vec<String> {
        self.inner.lock().put_log.clone()
    }

    pub fn fail_listing(&self, fail: bool) {
        self.inner.lock().fail_listing = fail;
    }

    pub fn fail_fetch(&self, key: &str) {
        self.inner.lock().fail_fetch.insert(key.to_string());
    }

    /// Fetches of `key` never complete.
    pub fn hang_fetch(&self, key: &str) {
        self.inner.lock().hang_fetch.insert(key.to_string());
    }

    pub fn fail_put(&self, key: &str) {
        self.inner.lock().fail_put.insert(key.to_string());
    }

    /// Uploads of `key` complete only after `delay`.
    pub fn delay_put(&self, key: &str, delay: Duration) {
        self.inner.lock().put_delay.insert(key.to_string(), delay);
    }
}

impl ObjectStore for MemoryStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let inner = self.inner.lock();
        if inner.fail_listing {
            return Err(StoreError::Unavailable("listing disabled".to_string()));
        }
        Ok(inner
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                size: object.body.len() as u64,
            })
            .collect())
    }

    async fn fetch_object(&self, key: &str) -> Result<Bytes, StoreError> {
        let hang = {
            let inner = self.inner.lock();
            if inner.fail_fetch.contains(key) {
                return Err(StoreError::Fetch {
                    key: key.to_string(),
                    message: "injected failure".to_string(),
                });
            }
            inner.hang_fetch.contains(key)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        self.inner
            .lock()
            .objects
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| StoreError::Fetch {
                key: key.to_string(),
                message: "not found".to_string(),
            })
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        public: bool,
    ) -> Result<(), StoreError> {
        let delay = self.inner.lock().put_delay.get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock();
        inner.put_log.push(key.to_string());
        if inner.fail_put.contains(key) {
            return Err(StoreError::Put {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        inner.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                public,
            },
        );
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        Ok(format!(
            "{}?expires={}",
            join_public_url(MEMORY_PUBLIC_BASE, key),
            ttl.as_secs()
        ))
    }

    fn public_url(&self, key: &str) -> Option<String> {
        Some(join_public_url(MEMORY_PUBLIC_BASE, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_fetch() {
        let store = MemoryStore::new();
        store
            .put_object("covers/a.jpg", Bytes::from_static(b"img"), "image/jpeg", true)
            .await
            .unwrap();
        let object = store.get("covers/a.jpg").unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        assert!(object.public);
        assert_eq!(store.fetch_object("covers/a.jpg").await.unwrap(), Bytes::from_static(b"img"));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let store = MemoryStore::new();
        store.insert("playlists/Pop/a.mp3", b"a".to_vec());
        store.fail_fetch("playlists/Pop/a.mp3");
        store.fail_put("covers/a.jpg");
        store.fail_listing(true);

        assert!(matches!(
            store.fetch_object("playlists/Pop/a.mp3").await,
            Err(StoreError::Fetch { .. })
        ));
        assert!(matches!(
            store
                .put_object("covers/a.jpg", Bytes::new(), "image/jpeg", true)
                .await,
            Err(StoreError::Put { .. })
        ));
        assert!(!store.contains("covers/a.jpg"));
        assert!(matches!(
            store.list_objects("playlists/").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_is_a_fetch_error() {
        let store = MemoryStore::new();
        assert!(store.fetch_object("nope.mp3").await.is_err());
    }
}
