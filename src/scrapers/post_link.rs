//! Latest-post link extraction.
//!
//! Loads a page in a fresh browser session, waits for the main content to
//! render, and returns the first anchor pointing at one of the page's posts.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::browser::{BrowserEngineConfig, BrowserSession, SessionLauncher};

/// Default platform host.
pub const DEFAULT_HOST: &str = "www.facebook.com";

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Normalized post URL.
    Found(String),
    /// The page loaded but carries no post link.
    NotFound,
    /// Launch, navigation or DOM access failed.
    Fault(String),
}

impl ExtractOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            ExtractOutcome::Found(url) => Some(url),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractOutcome::Found(url) => write!(f, "found {}", url),
            ExtractOutcome::NotFound => write!(f, "no post link"),
            ExtractOutcome::Fault(reason) => write!(f, "fault: {}", reason),
        }
    }
}

/// Anything that can report the latest post of a page.
#[async_trait]
pub trait LinkSource: Send + Sync {
    async fn latest_post(&self, page_id: &str) -> ExtractOutcome;
}

/// Strip the query string and fragment from a URL.
///
/// Cuts at whichever of `?` or `#` comes first.
pub fn clean_url(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(cutoff) => &url[..cutoff],
        None => url,
    }
}

/// Pattern for post links on `host`, anchored at the start of the href.
pub fn post_link_pattern(host: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"^https://{}/[^/?#]+/posts/[^/?#]+",
        regex::escape(host)
    ))
}

/// First href matching `pattern`, in the order given.
pub fn find_post_link<'a, I>(hrefs: I, pattern: &Regex) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    hrefs
        .into_iter()
        .map(String::as_str)
        .find(|href| pattern.is_match(href))
}

/// Extracts the latest post link with one browser session per call.
pub struct PostLinkExtractor {
    launcher: Arc<dyn SessionLauncher>,
    config: BrowserEngineConfig,
    host: String,
    pattern: Regex,
    sessions: Semaphore,
}

impl PostLinkExtractor {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        config: BrowserEngineConfig,
        host: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let host = host.into();
        let pattern = post_link_pattern(&host)?;
        let sessions = Semaphore::new(config.max_sessions.max(1));
        Ok(Self {
            launcher,
            config,
            host,
            pattern,
            sessions,
        })
    }

    pub fn page_url(&self, page_id: &str) -> String {
        format!("https://{}/{}", self.host, page_id)
    }

    /// Extract the latest post link of `page_id`.
    ///
    /// Never returns an error: faults are logged and reported as
    /// [`ExtractOutcome::Fault`]. The session is closed exactly once
    /// whatever the outcome. A cancelled call drops the session instead,
    /// leaving the release to the session's own `Drop`.
    pub async fn extract(&self, page_id: &str) -> ExtractOutcome {
        let _permit = match self.sessions.acquire().await {
            Ok(permit) => permit,
            Err(e) => return ExtractOutcome::Fault(format!("session limiter closed: {}", e)),
        };

        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to start browser session: {:#}", e);
                return ExtractOutcome::Fault(format!("{:#}", e));
            }
        };

        let page_url = self.page_url(page_id);
        let outcome = match self.scan(session.as_mut(), &page_url).await {
            Ok(Some(url)) => {
                info!("Found URL: {}", url);
                ExtractOutcome::Found(clean_url(&url).to_string())
            }
            Ok(None) => {
                error!("Post link not found on {}", page_url);
                ExtractOutcome::NotFound
            }
            Err(e) => {
                error!("Extraction from {} failed: {:#}", page_url, e);
                ExtractOutcome::Fault(format!("{:#}", e))
            }
        };

        session.close().await;
        outcome
    }

    async fn scan(
        &self,
        session: &mut dyn BrowserSession,
        page_url: &str,
    ) -> anyhow::Result<Option<String>> {
        let delay = self.config.pre_navigation_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        session.navigate(page_url).await?;
        session
            .wait_for_selector(&self.config.wait_for_selector, self.config.page_timeout())
            .await?;

        info!("Finding first post on page_url={}", page_url);
        let hrefs = session.link_hrefs().await?;
        if hrefs.is_empty() {
            warn!("Page {} rendered no links", page_url);
        }

        Ok(find_post_link(&hrefs, &self.pattern).map(str::to_string))
    }
}

#[async_trait]
impl LinkSource for PostLinkExtractor {
    async fn latest_post(&self, page_id: &str) -> ExtractOutcome {
        self.extract(page_id).await
    }
}
