pub mod builder;
pub mod config;
pub mod publish;

use std::sync::Arc;

use metadata::TagReader;
use store::ObjectStore;
use tracing::{info, warn};

pub use builder::{
    BuildError, BuildOptions, BuildReport, CatalogBuilder, CoverStatus, DegradeReason,
    ItemOutcome, ProcessedItem, UrlPolicy,
};
pub use publish::{decode_catalog, encode_catalog, CatalogPublisher, PublishError, PublishReport};

/// One full run: build from the bucket, then publish.
///
/// A listing failure returns before anything is written, so the previously
/// published catalog stays in place.
pub async fn build_and_publish<S, R>(
    store: Arc<S>,
    reader: Arc<R>,
    options: BuildOptions,
    publisher: &CatalogPublisher<S>,
) -> Result<(BuildReport, PublishReport), PipelineError>
where
    S: ObjectStore,
    R: TagReader + 'static,
{
    let builder = CatalogBuilder::new(store, reader, options);
    let report = builder.build().await?;
    if !report.degraded.is_empty() || !report.cover_failures.is_empty() {
        warn!(
            "{} degraded records, {} missing covers",
            report.degraded.len(),
            report.cover_failures.len()
        );
    }
    let published = publisher.publish(&report.catalog).await?;
    info!(
        "Published {} records ({} bytes)",
        report.catalog.len(),
        published.bytes
    );
    Ok((report, published))
}

#[derive(Debug)]
pub enum PipelineError {
    Build(BuildError),
    Publish(PublishError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Build(err) => write!(f, "{}", err),
            PipelineError::Publish(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<BuildError> for PipelineError {
    fn from(err: BuildError) -> Self {
        PipelineError::Build(err)
    }
}

impl From<PublishError> for PipelineError {
    fn from(err: PublishError) -> Self {
        PipelineError::Publish(err)
    }
}
