//! Headless browser sessions for JavaScript-rendered pages.
//!
//! Uses chromiumoxide (CDP) when the `browser` feature is enabled.

#[cfg(feature = "browser")]
mod chromium;
mod config;
mod session;

#[cfg(feature = "browser")]
pub use chromium::ChromiumLauncher;
pub use config::{BrowserEngineConfig, DEFAULT_USER_AGENT};
pub use session::{BrowserSession, SessionLauncher};

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromiumLauncher {
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl ChromiumLauncher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        let _ = &self.config;
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }
}
