//! Rendering session seam.
//!
//! A session is one browser (or one remote tab) owned by a single
//! extraction. The extractor closes it exactly once on every exit path.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// A live, exclusive rendering session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` in the session's page.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Block until `selector` matches an element, or fail after `timeout`.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// Resolved `href` of every rendered `<a>` element, in document order.
    async fn link_hrefs(&mut self) -> Result<Vec<String>>;

    /// Release the session and any process it owns.
    async fn close(&mut self);
}

/// Starts new rendering sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}
