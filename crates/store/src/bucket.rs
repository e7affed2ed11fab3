use std::time::Duration;

use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore as _, PutOptions, PutPayload, RetryConfig,
};
use reqwest::{Client, Method};
use tracing::debug;

use crate::{join_public_url, FetchMode, ObjectEntry, ObjectStore, StoreError};

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Debug)]
pub struct BucketConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_base_url: Option<String>,
    pub fetch_mode: FetchMode,
    pub request_timeout: Duration,
}

/// Path-style client for S3-compatible storage (R2, MinIO, S3).
///
/// Requests are never retried; a failed call surfaces to the caller.
#[derive(Clone, Debug)]
pub struct BucketClient {
    s3: AmazonS3,
    http: Client,
    public_base_url: Option<String>,
    fetch_mode: FetchMode,
}

impl BucketClient {
    pub fn new(config: BucketConfig) -> Result<Self, StoreError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(StoreError::Config("endpoint is required".to_string()));
        }
        if config.bucket.trim().is_empty() {
            return Err(StoreError::Config("bucket name is required".to_string()));
        }
        if config.access_key.trim().is_empty() || config.secret_key.trim().is_empty() {
            return Err(StoreError::Config("access credentials are not set".to_string()));
        }
        if config.fetch_mode == FetchMode::Public && config.public_base_url.is_none() {
            return Err(StoreError::Config(
                "public fetch mode needs a public base url".to_string(),
            ));
        }
        let region = match config.region.trim() {
            "" => "auto",
            region => region,
        };

        let options = ClientOptions::new()
            .with_timeout(config.request_timeout)
            .with_allow_http(endpoint.starts_with("http://"));
        let s3 = AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_region(region)
            .with_bucket_name(config.bucket.trim())
            .with_access_key_id(config.access_key.trim())
            .with_secret_access_key(config.secret_key.trim())
            .with_virtual_hosted_style_request(false)
            .with_client_options(options)
            .with_retry(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            })
            .build()
            .map_err(|err| StoreError::Config(err.to_string()))?;
        let http = Client::builder()
            .user_agent("sangeet/0.1")
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| StoreError::Config(err.to_string()))?;

        Ok(Self {
            s3,
            http,
            public_base_url: config.public_base_url,
            fetch_mode: config.fetch_mode,
        })
    }

    async fn fetch_public(&self, key: &str) -> Result<Bytes, String> {
        let url = self
            .public_url(key)
            .ok_or_else(|| "public fetch mode needs a public base url".to_string())?;
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("http {}", response.status()));
        }
        response.bytes().await.map_err(|err| err.to_string())
    }

    async fn fetch_signed(&self, key: &str) -> Result<Bytes, String> {
        let path = object_path(key)?;
        let result = self.s3.get(&path).await.map_err(|err| err.to_string())?;
        result.bytes().await.map_err(|err| err.to_string())
    }
}

/// Bucket keys are used verbatim; `Path::from` would re-encode them.
fn object_path(key: &str) -> Result<ObjectPath, String> {
    ObjectPath::parse(key).map_err(|err| err.to_string())
}

impl ObjectStore for BucketClient {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let prefix = object_path(prefix.trim_end_matches('/')).map_err(StoreError::Unavailable)?;
        let objects: Vec<ObjectEntry> = self
            .s3
            .list(Some(&prefix))
            .map_ok(|meta| ObjectEntry {
                key: meta.location.to_string(),
                size: meta.size as u64,
            })
            .try_collect()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        debug!("Listed {} objects under {}", objects.len(), prefix);
        Ok(objects)
    }

    async fn fetch_object(&self, key: &str) -> Result<Bytes, StoreError> {
        let fetched = match self.fetch_mode {
            FetchMode::Signed => self.fetch_signed(key).await,
            FetchMode::Public => self.fetch_public(key).await,
        };
        fetched.map_err(|message| StoreError::Fetch {
            key: key.to_string(),
            message,
        })
    }

    /// R2 has no per-object ACLs; `public` objects are served through the
    /// bucket's public base URL.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        public: bool,
    ) -> Result<(), StoreError> {
        let put_err = |message: String| StoreError::Put {
            key: key.to_string(),
            message,
        };
        let path = object_path(key).map_err(put_err)?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };
        self.s3
            .put_opts(&path, PutPayload::from(body), options)
            .await
            .map_err(|err| put_err(err.to_string()))?;
        debug!("Uploaded {} (public: {})", key, public);
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let path = object_path(key).map_err(StoreError::Config)?;
        let url = self
            .s3
            .signed_url(Method::GET, &path, ttl)
            .await
            .map_err(|err| StoreError::Config(err.to_string()))?;
        Ok(url.to_string())
    }

    fn public_url(&self, key: &str) -> Option<String> {
        self.public_base_url
            .as_deref()
            .map(|base| join_public_url(base, key))
    }
}
