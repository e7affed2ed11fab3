use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use common::SongRecord;
use store::{ObjectStore, StoreError};
use tracing::{info, warn};

const CATALOG_CONTENT_TYPE: &str = "application/json";

#[derive(Debug)]
pub enum PublishError {
    Serialize(serde_json::Error),
    LocalWrite { path: PathBuf, source: std::io::Error },
    Upload(StoreError),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Serialize(err) => write!(f, "catalog serialization failed: {}", err),
            PublishError::LocalWrite { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            PublishError::Upload(err) => write!(f, "catalog upload failed: {}", err),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialize(err)
    }
}

/// Outcome of the two independent catalog writes.
#[derive(Debug)]
pub struct PublishReport {
    pub bytes: usize,
    pub local: Result<PathBuf, PublishError>,
    pub remote: Result<String, PublishError>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.local.is_ok() && self.remote.is_ok()
    }
}

pub struct CatalogPublisher<S> {
    store: Arc<S>,
    local_path: PathBuf,
    remote_key: String,
}

impl<S: ObjectStore> CatalogPublisher<S> {
    pub fn new(store: Arc<S>, local_path: PathBuf, remote_key: impl Into<String>) -> Self {
        Self {
            store,
            local_path,
            remote_key: remote_key.into(),
        }
    }

    /// Writes the catalog locally and uploads it as a public object.
    ///
    /// Neither write waits on or undoes the other. Only serialization
    /// failure is returned as an error.
    pub async fn publish(&self, catalog: &[SongRecord]) -> Result<PublishReport, PublishError> {
        let document = Bytes::from(encode_catalog(catalog)?);

        let (local, remote) = tokio::join!(
            write_local(&self.local_path, document.clone()),
            self.upload(document.clone())
        );
        match &local {
            Ok(path) => info!("Catalog written to {}", path.display()),
            Err(err) => warn!("{}", err),
        }
        match &remote {
            Ok(key) => info!("Catalog uploaded to {}", key),
            Err(err) => warn!("{}", err),
        }

        Ok(PublishReport {
            bytes: document.len(),
            local,
            remote,
        })
    }

    async fn upload(&self, document: Bytes) -> Result<String, PublishError> {
        self.store
            .put_object(&self.remote_key, document, CATALOG_CONTENT_TYPE, true)
            .await
            .map_err(PublishError::Upload)?;
        Ok(self.remote_key.clone())
    }
}

/// Pretty-printed JSON array, two-space indent, record field order.
pub fn encode_catalog(catalog: &[SongRecord]) -> Result<Vec<u8>, PublishError> {
    Ok(serde_json::to_vec_pretty(catalog)?)
}

pub fn decode_catalog(bytes: &[u8]) -> Result<Vec<SongRecord>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Replaces `path` through a sibling temp file so readers never see a
/// partial document.
async fn write_local(path: &Path, document: Bytes) -> Result<PathBuf, PublishError> {
    let local_err = |source: std::io::Error| PublishError::LocalWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(local_err)?;
        }
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "catalog".to_string());
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));
    tokio::fs::write(&tmp_path, &document)
        .await
        .map_err(local_err)?;
    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(local_err(err));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    fn sample() -> Vec<SongRecord> {
        let mut first = SongRecord::degraded("Pop", "Song A");
        first.name = "Hit".to_string();
        first.cover = Some("https://pub.example.dev/covers/Song_A.jpg".to_string());
        vec![first, SongRecord::degraded("Rock", "track1")]
    }

    #[tokio::test]
    async fn writes_both_copies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("metadata.json");
        let store = MemoryStore::new();
        let publisher = CatalogPublisher::new(Arc::new(store.clone()), path.clone(), "metadata.json");

        let report = publisher.publish(&sample()).await.unwrap();

        assert!(report.is_complete());
        let local = std::fs::read(&path).unwrap();
        assert_eq!(decode_catalog(&local).unwrap(), sample());
        let remote = store.get("metadata.json").unwrap();
        assert_eq!(remote.body.as_ref(), local.as_slice());
        assert_eq!(remote.content_type, "application/json");
        assert!(remote.public);
        assert!(!dir.path().join("out").join(".metadata.json.tmp").exists());
    }

    #[tokio::test]
    async fn upload_failure_keeps_local_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let store = MemoryStore::new();
        store.fail_put("metadata.json");
        let publisher = CatalogPublisher::new(Arc::new(store.clone()), path.clone(), "metadata.json");

        let report = publisher.publish(&sample()).await.unwrap();

        assert!(report.local.is_ok());
        assert!(matches!(report.remote, Err(PublishError::Upload(_))));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn local_failure_keeps_upload() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should go makes the rename fail.
        let path = dir.path().join("metadata.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        let store = MemoryStore::new();
        let publisher = CatalogPublisher::new(Arc::new(store.clone()), path, "metadata.json");

        let report = publisher.publish(&sample()).await.unwrap();

        assert!(matches!(report.local, Err(PublishError::LocalWrite { .. })));
        assert!(report.remote.is_ok());
        assert!(store.contains("metadata.json"));
    }

    #[test]
    fn document_is_pretty_with_stable_keys() {
        let text = String::from_utf8(encode_catalog(&sample()[1..]).unwrap()).unwrap();
        assert_eq!(
            text,
            "[\n  {\n    \"playlist\": \"Rock\",\n    \"name\": \"track1\",\n    \"artist\": \"Unknown Artist\",\n    \"album\": \"Unknown Album\",\n    \"filename\": \"track1\",\n    \"cover\": null\n  }\n]"
        );
    }

    #[test]
    fn empty_catalog_is_an_empty_array() {
        assert_eq!(encode_catalog(&[]).unwrap(), b"[]".to_vec());
    }
}
