mod api;
mod load;
mod resolve;
mod state;
mod utils;

use std::sync::Arc;

use api::api_router;
use catalog::config::{config_path_from_env, load_config, resolve_path};
use load::load_catalog;
use reqwest::Client;
use resolve::UrlResolver;
use state::AppState;
use store::{join_public_url, BucketClient};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let signer = match config.bucket_config() {
        Ok(bucket) => match BucketClient::new(bucket) {
            Ok(client) => Some(client),
            Err(err) => {
                warn!("Bucket client unavailable, URLs will not be signed: {}", err);
                None
            }
        },
        Err(err) => {
            warn!("Bucket not configured, URLs will not be signed: {}", err);
            None
        }
    };
    let public_base_url = config.public_base_url();

    let client = Client::builder().user_agent("sangeet/0.1").build()?;
    let catalog_path = resolve_path(&config_path, &config.catalog_path);
    let remote_catalog = public_base_url
        .as_deref()
        .map(|base| join_public_url(base, &config.catalog_key));
    let catalog = load_catalog(&catalog_path, remote_catalog.as_deref(), &client).await;

    let resolver = UrlResolver::new(
        config.url_policy,
        config.source_prefix.clone(),
        signer,
        public_base_url,
        config.signed_url_ttl(),
    );
    let state = AppState {
        catalog: Arc::new(catalog),
        resolver: Arc::new(resolver),
        default_cover: Arc::from(config.default_cover.as_str()),
    };

    let app = api_router(state)
        .layer(CorsLayer::permissive())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
