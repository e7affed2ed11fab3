use std::time::Duration;

use catalog::UrlPolicy;
use common::SongRecord;
use store::{join_public_url, BucketClient, ObjectStore};
use tracing::warn;

/// Resolves the playable URL of a record at request time.
pub struct UrlResolver {
    policy: UrlPolicy,
    prefix: String,
    signer: Option<BucketClient>,
    public_base_url: Option<String>,
    ttl: Duration,
}

impl UrlResolver {
    pub fn new(
        policy: UrlPolicy,
        prefix: impl Into<String>,
        signer: Option<BucketClient>,
        public_base_url: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            policy,
            prefix: prefix.into(),
            signer,
            public_base_url,
            ttl,
        }
    }

    /// `Signed` and `Public` always recompute from the record's key. `Omit`
    /// keeps a URL stored in the catalog and otherwise signs, falling back to
    /// the public bucket URL.
    pub async fn resolve(&self, record: &SongRecord) -> Option<String> {
        match self.policy {
            UrlPolicy::Signed => self.signed(record).await,
            UrlPolicy::Public => self.public(record),
            UrlPolicy::Omit => {
                if let Some(url) = &record.url {
                    return Some(url.clone());
                }
                match self.signed(record).await {
                    Some(url) => Some(url),
                    None => self.public(record),
                }
            }
        }
    }

    async fn signed(&self, record: &SongRecord) -> Option<String> {
        let signer = self.signer.as_ref()?;
        let key = record.song_key(&self.prefix);
        match signer.signed_url(&key, self.ttl).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!("Failed to sign {}: {}", key, err);
                None
            }
        }
    }

    fn public(&self, record: &SongRecord) -> Option<String> {
        let base = self.public_base_url.as_deref()?;
        Some(join_public_url(base, &record.song_key(&self.prefix)))
    }
}
