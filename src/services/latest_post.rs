//! Cache-backed latest-post lookup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::scrapers::{ExtractOutcome, LinkSource};
use crate::store::{KeyValueStore, StoreResult};

/// Key prefix for cached post URLs.
const CACHE_PREFIX: &str = "bumo:latest_post:";

/// Default lifetime of a cached post URL.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Looks up the latest post of one page, scraping only on cache misses.
#[derive(Clone)]
pub struct LatestPostService {
    source: Arc<dyn LinkSource>,
    cache: Arc<dyn KeyValueStore>,
    page_id: String,
    cache_ttl: Duration,
}

impl LatestPostService {
    pub fn new(
        source: Arc<dyn LinkSource>,
        cache: Arc<dyn KeyValueStore>,
        page_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache,
            page_id: page_id.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    fn cache_key(&self) -> String {
        format!("{}{}", CACHE_PREFIX, self.page_id)
    }

    /// Latest post URL of the configured page.
    ///
    /// `force_refresh` drops the cached entry first. Extraction runs at
    /// most once per call; only a found URL is cached. Cache backend
    /// errors propagate.
    pub async fn fetch(&self, force_refresh: bool) -> StoreResult<ExtractOutcome> {
        let key = self.cache_key();

        if force_refresh {
            debug!("Invalidating cached post for {}", self.page_id);
            self.cache.delete(&key).await?;
        } else if let Some(url) = self.cache.get(&key).await? {
            debug!("Cache hit for {}: {}", self.page_id, url);
            return Ok(ExtractOutcome::Found(url));
        }

        let outcome = self.source.latest_post(&self.page_id).await;
        match &outcome {
            ExtractOutcome::Found(url) => {
                self.cache.set_ex(&key, url, self.cache_ttl).await?;
                info!("Cached latest post for {}: {}", self.page_id, url);
            }
            other => {
                error!(
                    "Failed to get the latest post from {} ({})",
                    self.page_id, other
                );
            }
        }

        Ok(outcome)
    }
}
