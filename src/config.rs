//! Runtime settings, read from CLI flags with environment fallbacks.
//!
//! A `.env` file in the working directory is loaded before parsing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use crate::scrapers::{BrowserEngineConfig, ChromiumLauncher, PostLinkExtractor, DEFAULT_HOST};
use crate::services::{parse_time_of_day, DailySchedule, LatestPostService, RetryPolicy};
use crate::store::{InMemoryStore, KeyValueStore, StateStore, STATE_KEY};

/// Backend type for the cache and bot state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackendType {
    /// In-memory (single process, not persisted)
    #[cfg_attr(not(feature = "redis-backend"), default)]
    Memory,
    /// Redis (persisted, requires redis-backend feature)
    #[cfg(feature = "redis-backend")]
    #[default]
    Redis,
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true, global = true)]
    pub bot_token: Option<String>,

    /// Redis connection URL
    #[arg(
        long,
        env = "REDIS_URL",
        default_value = "redis://127.0.0.1:6379",
        global = true
    )]
    pub redis_url: String,

    /// Storage backend for the post cache and bot state
    #[arg(long, env = "BUMO_STORE", value_enum, default_value_t, global = true)]
    pub store: StoreBackendType,

    /// Key holding the serialized bot state
    #[arg(long, env = "BUMO_STATE_KEY", default_value = STATE_KEY, global = true)]
    pub state_key: String,

    /// Page whose latest post is relayed
    #[arg(long, env = "BUMO_PAGE_ID", default_value = "thoitietHN", global = true)]
    pub page_id: String,

    /// Platform host serving the page
    #[arg(long, env = "BUMO_PAGE_HOST", default_value = DEFAULT_HOST, global = true)]
    pub page_host: String,

    /// Seconds a found post URL stays cached
    #[arg(long, env = "BUMO_CACHE_TTL", default_value = "3600", global = true)]
    pub cache_ttl: u64,

    /// Daily notification time (HH:MM)
    #[arg(long, env = "BUMO_DAILY_AT", default_value = "07:30", global = true)]
    pub daily_at: String,

    /// UTC offset of the daily notification time, in hours
    #[arg(
        long,
        env = "BUMO_UTC_OFFSET",
        default_value = "7",
        allow_hyphen_values = true,
        global = true
    )]
    pub utc_offset: i32,

    /// Retries of the daily fetch when no post is found
    #[arg(long, env = "BUMO_RETRIES", default_value = "10", global = true)]
    pub retries: u32,

    /// Seconds between daily fetch retries
    #[arg(long, env = "BUMO_RETRY_PAUSE", default_value = "120", global = true)]
    pub retry_pause: u64,

    /// Only write bot state every --flush-interval seconds
    #[arg(long, env = "BUMO_DEFERRED_FLUSH", global = true)]
    pub deferred_flush: bool,

    /// Seconds between state flushes in deferred mode
    #[arg(long, env = "BUMO_FLUSH_INTERVAL", default_value = "3600", global = true)]
    pub flush_interval: u64,

    /// Remote Chrome DevTools URL (e.g., ws://localhost:9222)
    #[arg(long, env = "CHROME_REMOTE_URL", global = true)]
    pub chrome_remote_url: Option<String>,

    /// Chrome executable (auto-detected when unset)
    #[arg(long, env = "CHROME_EXECUTABLE", global = true)]
    pub chrome_executable: Option<PathBuf>,

    /// Proxy for the browser (e.g., socks5://127.0.0.1:1080)
    #[arg(long, env = "BUMO_PROXY", global = true)]
    pub proxy: Option<String>,

    /// Seconds to wait for the page's main content
    #[arg(long, env = "BUMO_PAGE_TIMEOUT", default_value = "75", global = true)]
    pub page_timeout: u64,

    /// Seconds to pause before navigating
    #[arg(long, env = "BUMO_LOAD_DELAY", default_value = "5", global = true)]
    pub load_delay: u64,

    /// Maximum concurrent browser sessions
    #[arg(long, env = "BUMO_MAX_SESSIONS", default_value = "1", global = true)]
    pub max_sessions: usize,

    /// Show the browser window (debugging)
    #[arg(long, global = true)]
    pub headful: bool,
}

impl Settings {
    pub fn browser_config(&self) -> BrowserEngineConfig {
        BrowserEngineConfig {
            headless: !self.headful,
            proxy: self.proxy.clone(),
            chrome_executable: self.chrome_executable.clone(),
            timeout: self.page_timeout,
            load_delay: self.load_delay,
            max_sessions: self.max_sessions,
            remote_url: self.chrome_remote_url.clone(),
            ..Default::default()
        }
    }

    pub fn schedule(&self) -> anyhow::Result<DailySchedule> {
        DailySchedule::new(parse_time_of_day(&self.daily_at)?, self.utc_offset)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            pause: Duration::from_secs(self.retry_pause),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval.max(1))
    }

    pub fn require_bot_token(&self) -> anyhow::Result<&str> {
        self.bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("BOT_TOKEN is not set")
    }

    /// Open the configured key-value backend.
    pub async fn open_store(&self) -> anyhow::Result<Arc<dyn KeyValueStore>> {
        match self.store {
            StoreBackendType::Memory => {
                tracing::warn!("Using in-memory store: subscribers are lost on restart");
                Ok(Arc::new(InMemoryStore::new()))
            }
            #[cfg(feature = "redis-backend")]
            StoreBackendType::Redis => {
                let store = crate::store::RedisStore::new(&self.redis_url)
                    .await
                    .with_context(|| format!("Failed to connect to Redis at {}", self.redis_url))?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Wire extractor, cache and state store together.
    pub async fn build_services(&self) -> anyhow::Result<Services> {
        let store = self.open_store().await?;

        let launcher = Arc::new(ChromiumLauncher::new(self.browser_config()));
        let extractor = PostLinkExtractor::new(launcher, self.browser_config(), &self.page_host)
            .context("Invalid page host")?;

        let latest_post = LatestPostService::new(Arc::new(extractor), store.clone(), &self.page_id)
            .with_cache_ttl(Duration::from_secs(self.cache_ttl));
        let state = StateStore::new(store)
            .with_key(&self.state_key)
            .with_deferred_flush(self.deferred_flush);

        Ok(Services { latest_post, state })
    }
}

/// Shared services built from [`Settings`].
#[derive(Clone)]
pub struct Services {
    pub latest_post: LatestPostService,
    pub state: StateStore,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["bumo", "--store", "memory"]);
        let settings = cli.settings;

        assert_eq!(settings.page_id, "thoitietHN");
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
        assert_eq!(settings.browser_config().timeout, 75);
        assert_eq!(settings.schedule().unwrap().to_string(), "07:30 (UTC+07:00)");
    }

    #[test]
    fn test_negative_offset() {
        let cli = TestCli::parse_from(["bumo", "--utc-offset", "-5", "--daily-at", "06:00"]);
        assert_eq!(cli.settings.schedule().unwrap().offset.local_minus_utc(), -5 * 3600);
    }

    #[tokio::test]
    async fn test_memory_services() {
        let cli = TestCli::parse_from(["bumo", "--store", "memory"]);
        let services = cli.settings.build_services().await.unwrap();
        assert_eq!(services.latest_post.page_id(), "thoitietHN");
        assert!(!services.state.is_deferred());
    }
}
