use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use catalog::config::{config_path_from_env, load_config, resolve_path};
use catalog::{build_and_publish, CatalogPublisher};
use metadata::LoftyTagReader;
use store::BucketClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config_path_from_env);
    let (config, created) = load_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    }

    let store = Arc::new(BucketClient::new(config.bucket_config()?)?);
    let publisher = CatalogPublisher::new(
        Arc::clone(&store),
        resolve_path(&config_path, &config.catalog_path),
        config.catalog_key.clone(),
    );

    let (report, published) = build_and_publish(
        store,
        Arc::new(LoftyTagReader),
        config.build_options(),
        &publisher,
    )
    .await?;

    println!(
        "Catalog: {} songs from {} objects ({} degraded, {} covers uploaded, {} cover failures, {} cover collisions, {} duplicates replaced)",
        report.catalog.len(),
        report.listed,
        report.degraded.len(),
        report.covers_uploaded,
        report.cover_failures.len(),
        report.cover_collisions,
        report.duplicates_replaced,
    );

    if let Err(err) = &published.local {
        return Err(format!("local catalog not written: {}", err).into());
    }
    if let Err(err) = &published.remote {
        return Err(format!("catalog not uploaded: {}", err).into());
    }
    Ok(())
}
