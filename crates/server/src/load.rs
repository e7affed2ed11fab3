use std::path::Path;

use catalog::decode_catalog;
use common::SongRecord;
use reqwest::Client;
use tracing::{info, warn};

/// Loads the published catalog once at startup: the local copy when present,
/// otherwise the public object. A catalog that cannot be loaded serves as
/// empty.
pub async fn load_catalog(
    local_path: &Path,
    remote_url: Option<&str>,
    client: &Client,
) -> Vec<SongRecord> {
    if local_path.exists() {
        match read_local(local_path).await {
            Ok(catalog) => {
                info!("Loaded {} songs from {}", catalog.len(), local_path.display());
                return catalog;
            }
            Err(err) => warn!("Failed to load {}: {}", local_path.display(), err),
        }
    }

    if let Some(url) = remote_url {
        info!("Fetching catalog from {}", url);
        match fetch_remote(client, url).await {
            Ok(catalog) => {
                info!("Loaded {} songs from {}", catalog.len(), url);
                return catalog;
            }
            Err(err) => warn!("Failed to load catalog from {}: {}", url, err),
        }
    }

    warn!("No catalog available; serving an empty library");
    Vec::new()
}

async fn read_local(path: &Path) -> Result<Vec<SongRecord>, String> {
    let bytes = tokio::fs::read(path).await.map_err(|err| err.to_string())?;
    decode_catalog(&bytes).map_err(|err| err.to_string())
}

async fn fetch_remote(client: &Client, url: &str) -> Result<Vec<SongRecord>, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| err.to_string())?;
    if !response.status().is_success() {
        return Err(format!("http {}", response.status()));
    }
    let bytes = response.bytes().await.map_err(|err| err.to_string())?;
    decode_catalog(&bytes).map_err(|err| err.to_string())
}
