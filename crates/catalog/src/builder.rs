use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::{
    cover_key, filename_stem, playlist_from_key, Catalog, InventoryItem, SongRecord,
    DEFAULT_SOURCE_PREFIX, UNKNOWN_ALBUM, UNKNOWN_ARTIST,
};
use futures_util::stream::{self, StreamExt};
use metadata::{CoverArt, TagMetadata, TagReader};
use serde::{Deserialize, Serialize};
use store::{ObjectStore, StoreError};
use tracing::{debug, info, warn};

/// Where a record's `url` comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPolicy {
    /// Signed URL minted at build time; stale once the TTL runs out.
    Signed,
    /// No URL in the catalog; the server resolves one per request.
    #[default]
    Omit,
    /// Public bucket URL, only valid for publicly served buckets.
    Public,
}

#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub prefix: String,
    pub url_policy: UrlPolicy,
    pub signed_url_ttl: Duration,
    pub concurrency: usize,
    pub item_timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_SOURCE_PREFIX.to_string(),
            url_policy: UrlPolicy::Omit,
            signed_url_ttl: Duration::from_secs(3600),
            concurrency: 4,
            item_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DegradeReason {
    Fetch(String),
    Parse(String),
    Timeout(Duration),
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::Fetch(message) => write!(f, "fetch failed: {}", message),
            DegradeReason::Parse(message) => write!(f, "tag parse failed: {}", message),
            DegradeReason::Timeout(limit) => write!(f, "timed out after {:?}", limit),
        }
    }
}

/// Result of processing one inventory item. Both variants carry a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    Ok(SongRecord),
    Degraded(SongRecord, DegradeReason),
}

impl ItemOutcome {
    pub fn record(&self) -> &SongRecord {
        match self {
            ItemOutcome::Ok(record) | ItemOutcome::Degraded(record, _) => record,
        }
    }

    fn into_record(self) -> SongRecord {
        match self {
            ItemOutcome::Ok(record) | ItemOutcome::Degraded(record, _) => record,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoverStatus {
    Absent,
    Uploaded { key: String },
    Failed { key: String, message: String },
    /// Uploaded, but the store has no public URL to link it with.
    Unlinked { key: String },
    /// Another song later in the listing owns the same cover key.
    Collided { key: String },
}

#[derive(Clone, Debug)]
pub struct ProcessedItem {
    pub key: String,
    pub outcome: ItemOutcome,
    pub cover: CoverStatus,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub catalog: Catalog,
    pub listed: usize,
    pub degraded: Vec<(String, DegradeReason)>,
    pub covers_uploaded: usize,
    pub cover_failures: Vec<(String, String)>,
    pub cover_collisions: usize,
    pub duplicates_replaced: usize,
}

#[derive(Debug)]
pub enum BuildError {
    Store(StoreError),
    Policy(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Store(err) => write!(f, "inventory listing failed: {}", err),
            BuildError::Policy(message) => write!(f, "url policy error: {}", message),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<StoreError> for BuildError {
    fn from(err: StoreError) -> Self {
        BuildError::Store(err)
    }
}

pub struct CatalogBuilder<S, R> {
    store: Arc<S>,
    reader: Arc<R>,
    options: BuildOptions,
}

impl<S, R> CatalogBuilder<S, R>
where
    S: ObjectStore,
    R: TagReader + 'static,
{
    pub fn new(store: Arc<S>, reader: Arc<R>, options: BuildOptions) -> Self {
        Self {
            store,
            reader,
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Builds a fresh catalog from the current bucket inventory.
    ///
    /// Only a failed listing (or an unusable URL policy) fails the build;
    /// per-song problems end up as degraded records in the report.
    pub async fn build(&self) -> Result<BuildReport, BuildError> {
        self.check_policy().await?;
        let items = self.store.list_songs(&self.options.prefix).await?;
        info!(
            "Found {} songs under {}",
            items.len(),
            self.options.prefix
        );

        let concurrency = self.options.concurrency.max(1);
        let examined: Vec<Examined> = stream::iter(items.iter())
            .map(|item| self.examine_bounded(item))
            .buffered(concurrency)
            .collect()
            .await;

        let owners = cover_owners(&examined);
        let processed: Vec<ProcessedItem> = stream::iter(examined.into_iter().enumerate())
            .map(|(index, examined)| {
                let owns_cover = owners.get(&cover_key(&examined.filename)) == Some(&index);
                self.finish(examined, owns_cover)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let report = assemble(items.len(), processed);
        info!(
            "Catalog built: {} records, {} degraded, {} covers uploaded",
            report.catalog.len(),
            report.degraded.len(),
            report.covers_uploaded
        );
        Ok(report)
    }

    async fn check_policy(&self) -> Result<(), BuildError> {
        match self.options.url_policy {
            UrlPolicy::Omit => Ok(()),
            UrlPolicy::Signed => self
                .store
                .signed_url(&self.options.prefix, self.options.signed_url_ttl)
                .await
                .map(|_| ())
                .map_err(|err| BuildError::Policy(err.to_string())),
            UrlPolicy::Public => match self.store.public_url(&self.options.prefix) {
                Some(_) => Ok(()),
                None => Err(BuildError::Policy(
                    "public url policy needs a public base url".to_string(),
                )),
            },
        }
    }

    /// Fetch and parse under the per-item timeout. Cover uploads happen
    /// later and are not bounded by it.
    async fn examine_bounded(&self, item: &InventoryItem) -> Examined {
        let limit = self.options.item_timeout;
        let tags = match tokio::time::timeout(limit, self.examine(item)).await {
            Ok(tags) => tags,
            Err(_) => Err(DegradeReason::Timeout(limit)),
        };
        Examined {
            key: item.key.clone(),
            filename: filename_stem(&item.key),
            tags,
        }
    }

    async fn examine(&self, item: &InventoryItem) -> Result<TagMetadata, DegradeReason> {
        debug!("Processing {}", item.key);
        let bytes = self
            .store
            .fetch_object(&item.key)
            .await
            .map_err(|err| DegradeReason::Fetch(err.to_string()))?;
        self.read_tags(&item.key, bytes)
            .await
            .map_err(DegradeReason::Parse)
    }

    /// Turns an examined item into its record, uploading the cover when this
    /// item owns the cover key.
    async fn finish(&self, examined: Examined, owns_cover: bool) -> ProcessedItem {
        let Examined {
            key,
            filename,
            tags,
        } = examined;
        let tags = match tags {
            Ok(tags) => tags,
            Err(reason) => {
                warn!("Degraded record for {}: {}", key, reason);
                return ProcessedItem {
                    outcome: ItemOutcome::Degraded(self.degraded_record(&key).await, reason),
                    key,
                    cover: CoverStatus::Absent,
                };
            }
        };

        let TagMetadata {
            title,
            artist,
            album,
            picture,
        } = tags;
        let cover = match picture {
            Some(_) if !owns_cover => {
                let cover = cover_key(&filename);
                warn!(
                    "Cover key {} is taken by a later song; {} keeps no cover",
                    cover, key
                );
                CoverStatus::Collided { key: cover }
            }
            Some(picture) => self.upload_cover(&filename, picture).await,
            None => CoverStatus::Absent,
        };
        let cover_url = match &cover {
            CoverStatus::Uploaded { key } => self.store.public_url(key),
            _ => None,
        };

        let record = SongRecord {
            playlist: playlist_from_key(&self.options.prefix, &key),
            name: title.unwrap_or_else(|| filename.clone()),
            artist: artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            filename,
            cover: cover_url,
            url: self.record_url(&key).await,
        };
        ProcessedItem {
            key,
            outcome: ItemOutcome::Ok(record),
            cover,
        }
    }

    async fn read_tags(&self, key: &str, bytes: Bytes) -> Result<TagMetadata, String> {
        let media_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let reader = Arc::clone(&self.reader);
        let parsed = tokio::task::spawn_blocking(move || {
            reader
                .read_tags(&bytes, &media_type)
                .map_err(|err| err.to_string())
        })
        .await;
        match parsed {
            Ok(result) => result,
            Err(err) => Err(format!("tag reader panicked: {}", err)),
        }
    }

    async fn upload_cover(&self, filename: &str, picture: CoverArt) -> CoverStatus {
        let key = cover_key(filename);
        let content_type = picture.content_type();
        match self
            .store
            .put_object(&key, Bytes::from(picture.data), &content_type, true)
            .await
        {
            Ok(()) => {
                if self.store.public_url(&key).is_some() {
                    info!("Cover uploaded: {}", key);
                    CoverStatus::Uploaded { key }
                } else {
                    warn!("Cover {} uploaded but no public base url is configured", key);
                    CoverStatus::Unlinked { key }
                }
            }
            Err(err) => {
                warn!("Cover upload failed for {}: {}", key, err);
                CoverStatus::Failed {
                    key,
                    message: err.to_string(),
                }
            }
        }
    }

    async fn degraded_record(&self, key: &str) -> SongRecord {
        let mut record = SongRecord::degraded(
            &playlist_from_key(&self.options.prefix, key),
            &filename_stem(key),
        );
        record.url = self.record_url(key).await;
        record
    }

    async fn record_url(&self, key: &str) -> Option<String> {
        match self.options.url_policy {
            UrlPolicy::Omit => None,
            UrlPolicy::Public => self.store.public_url(key),
            UrlPolicy::Signed => {
                match self.store.signed_url(key, self.options.signed_url_ttl).await {
                    Ok(url) => Some(url),
                    Err(err) => {
                        warn!("Failed to sign url for {}: {}", key, err);
                        None
                    }
                }
            }
        }
    }
}

/// A listed item after fetch and tag parsing, before any upload.
struct Examined {
    key: String,
    filename: String,
    tags: Result<TagMetadata, DegradeReason>,
}

/// Index of the last listed item that carries a picture for each cover key.
/// Items whose fetch or parse failed never own a key.
fn cover_owners(examined: &[Examined]) -> HashMap<String, usize> {
    let mut owners = HashMap::new();
    for (index, item) in examined.iter().enumerate() {
        if matches!(&item.tags, Ok(tags) if tags.picture.is_some()) {
            owners.insert(cover_key(&item.filename), index);
        }
    }
    owners
}

/// Collects processed items in listing order. A later record with the same
/// `(playlist, filename)` replaces the earlier one and keeps its own position.
pub fn assemble(listed: usize, processed: Vec<ProcessedItem>) -> BuildReport {
    let mut report = BuildReport {
        listed,
        ..BuildReport::default()
    };
    let mut slots: Vec<Option<SongRecord>> = Vec::with_capacity(processed.len());
    let mut seen: HashMap<(String, String), usize> = HashMap::new();

    for item in processed {
        match item.cover {
            CoverStatus::Uploaded { .. } | CoverStatus::Unlinked { .. } => {
                report.covers_uploaded += 1
            }
            CoverStatus::Failed { key, message } => report.cover_failures.push((key, message)),
            CoverStatus::Collided { .. } => report.cover_collisions += 1,
            CoverStatus::Absent => {}
        }
        if let ItemOutcome::Degraded(_, reason) = &item.outcome {
            report.degraded.push((item.key.clone(), reason.clone()));
        }

        let record = item.outcome.into_record();
        let pair = (record.playlist.clone(), record.filename.clone());
        if let Some(previous) = seen.insert(pair, slots.len()) {
            warn!(
                "Duplicate song {}/{}; {} replaces the earlier entry",
                record.playlist, record.filename, item.key
            );
            slots[previous] = None;
            report.duplicates_replaced += 1;
        }
        slots.push(Some(record));
    }

    report.catalog = slots.into_iter().flatten().collect();
    report
}
