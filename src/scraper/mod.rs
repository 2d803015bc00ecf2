pub mod aggregator;
pub mod fetcher;
pub mod file;
pub mod registry;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{SourceConfig, SourceKind};
use crate::model::SourceError;
use crate::parser::{HtmlListingSource, ListingParser};

pub use aggregator::{SourceAggregator, SourceStatus};
pub use fetcher::HttpJsonSource;
pub use file::JsonFileSource;
pub use registry::{SourceFactory, SourceRegistry};
pub use traits::OfferSource;

/// Registry holding one factory per configured source.
///
/// Construction is deferred to the aggregator, so a bad selector or client
/// setup shows up as an unavailable source instead of a start-up failure.
pub fn build_registry(sources: &[SourceConfig], timeout: Duration) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    for source in sources {
        let cfg = source.clone();
        info!("Registering source '{}'", cfg.name);
        registry.register(&source.name, move || -> Result<Arc<dyn OfferSource>, SourceError> {
            match &cfg.kind {
                SourceKind::Json {
                    url,
                    query_param,
                    items_pointer,
                } => Ok(Arc::new(HttpJsonSource::new(
                    &cfg.name,
                    url,
                    query_param,
                    items_pointer.clone(),
                    timeout,
                )?)),
                SourceKind::Html {
                    url,
                    query_param,
                    base_url,
                    selectors,
                } => {
                    let parser = ListingParser::new(&cfg.name, selectors, base_url.clone())?;
                    Ok(Arc::new(HtmlListingSource::new(
                        &cfg.name,
                        url,
                        query_param,
                        parser,
                        timeout,
                    )?))
                }
                SourceKind::File { path } => Ok(Arc::new(JsonFileSource::new(&cfg.name, path))),
            }
        });
    }
    registry
}
