use std::sync::Arc;

use crate::app::Result;
use crate::config::Config;
use crate::fetch::{FeedSource, HttpFeedSource};
use crate::images::{HttpImageFetcher, ImageFetcher};
use crate::store::SqliteStore;

/// Wires the store, feed source and image fetcher together. One context
/// is built at startup and shared by the scheduler, the API and the CLI.
pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub source: Arc<dyn FeedSource + Send + Sync>,
    pub images: Arc<dyn ImageFetcher + Send + Sync>,
    pub config: Config,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Arc::new(SqliteStore::new(&config.db_path)?);
        Ok(Self::with_store(store, config))
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        Ok(Self::with_store(Arc::new(SqliteStore::in_memory()?), config))
    }

    fn with_store(store: Arc<SqliteStore>, config: Config) -> Self {
        Self {
            store,
            source: Arc::new(HttpFeedSource::new()),
            images: Arc::new(HttpImageFetcher::new()),
            config,
        }
    }

    /// Assemble a context from explicit parts. Used by tests to swap in
    /// stub fetchers.
    pub fn with_parts(
        store: Arc<SqliteStore>,
        source: Arc<dyn FeedSource + Send + Sync>,
        images: Arc<dyn ImageFetcher + Send + Sync>,
        config: Config,
    ) -> Self {
        Self {
            store,
            source,
            images,
            config,
        }
    }
}
