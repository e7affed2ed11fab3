use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{CATALOG_KEY, DEFAULT_COVER, DEFAULT_SOURCE_PREFIX};
use serde::{Deserialize, Serialize};
use store::{BucketConfig, FetchMode};

use crate::builder::{BuildOptions, UrlPolicy};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SangeetConfig {
    pub version: u32,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_base_url: String,
    pub source_prefix: String,
    pub url_policy: UrlPolicy,
    pub fetch_mode: FetchMode,
    pub signed_url_ttl_secs: u64,
    pub concurrency: usize,
    pub item_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub catalog_path: String,
    pub catalog_key: String,
    pub default_cover: String,
    pub port: u16,
}

impl Default for SangeetConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            endpoint: "".to_string(),
            region: "auto".to_string(),
            bucket: "".to_string(),
            access_key: "".to_string(),
            secret_key: "".to_string(),
            public_base_url: "".to_string(),
            source_prefix: DEFAULT_SOURCE_PREFIX.to_string(),
            url_policy: UrlPolicy::Omit,
            fetch_mode: FetchMode::Signed,
            signed_url_ttl_secs: 3600,
            concurrency: 4,
            item_timeout_secs: 120,
            request_timeout_secs: 60,
            catalog_path: CATALOG_KEY.to_string(),
            catalog_key: CATALOG_KEY.to_string(),
            default_cover: DEFAULT_COVER.to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

impl SangeetConfig {
    pub fn public_base_url(&self) -> Option<String> {
        let trimmed = self.public_base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs.max(1))
    }

    pub fn bucket_config(&self) -> Result<BucketConfig, ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint is not set".to_string()));
        }
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("bucket is not set".to_string()));
        }
        Ok(BucketConfig {
            endpoint: self.endpoint.trim().to_string(),
            region: self.region.clone(),
            bucket: self.bucket.trim().to_string(),
            access_key: self.access_key.trim().to_string(),
            secret_key: self.secret_key.trim().to_string(),
            public_base_url: self.public_base_url(),
            fetch_mode: self.fetch_mode,
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        })
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            prefix: self.source_prefix.clone(),
            url_policy: self.url_policy,
            signed_url_ttl: self.signed_url_ttl(),
            concurrency: self.concurrency.max(1),
            item_timeout: Duration::from_secs(self.item_timeout_secs.max(1)),
        }
    }

    /// Environment variables win over file values.
    pub fn apply_env(&mut self, vars: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, name: &str| {
            if let Some(value) = vars(name).filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };
        set(&mut self.endpoint, "R2_ENDPOINT");
        set(&mut self.access_key, "R2_ACCESS_KEY");
        set(&mut self.secret_key, "R2_SECRET_KEY");
        set(&mut self.bucket, "R2_BUCKET_NAME");
        set(&mut self.public_base_url, "PUBLIC_R2_URL");
        if let Some(port) = vars("PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            self.port = port;
        }
    }

    fn normalize(&mut self) {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        if self.region.trim().is_empty() {
            self.region = "auto".to_string();
        }
        if self.source_prefix.trim().is_empty() {
            self.source_prefix = DEFAULT_SOURCE_PREFIX.to_string();
        }
        if !self.source_prefix.ends_with('/') {
            self.source_prefix.push('/');
        }
        if self.signed_url_ttl_secs == 0 {
            self.signed_url_ttl_secs = 3600;
        }
        if self.concurrency == 0 {
            self.concurrency = 1;
        }
        if self.catalog_path.trim().is_empty() {
            self.catalog_path = CATALOG_KEY.to_string();
        }
        if self.catalog_key.trim().is_empty() {
            self.catalog_key = CATALOG_KEY.to_string();
        }
        if self.default_cover.trim().is_empty() {
            self.default_cover = DEFAULT_COVER.to_string();
        }
        if self.port == 0 {
            self.port = 3000;
        }
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("SANGEET_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Reads the config file, creating it with defaults when missing, then
/// applies process environment overrides.
pub fn load_config(path: &Path) -> Result<(SangeetConfig, bool), ConfigError> {
    let (mut config, created) = load_or_create_config(path)?;
    config.apply_env(|name| env::var(name).ok());
    config.normalize();
    Ok((config, created))
}

pub fn load_or_create_config(path: &Path) -> Result<(SangeetConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: SangeetConfig = if contents.trim().is_empty() {
            SangeetConfig::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.normalize();
        return Ok((config, false));
    }

    let config = SangeetConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &SangeetConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}
