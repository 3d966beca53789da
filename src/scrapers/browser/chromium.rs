//! Chromium sessions over the DevTools protocol (chromiumoxide).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::{Handler, HandlerConfig};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::BrowserEngineConfig;
use super::session::{BrowserSession, SessionLauncher};

/// Collects the resolved href of every anchor, in document order.
const LINK_HREFS_SCRIPT: &str =
    "Array.from(document.querySelectorAll('a'), (a) => a.href || '')";

/// Poll interval while waiting for a selector to appear.
const SELECTOR_POLL: Duration = Duration::from_millis(500);

/// Launches a fresh Chromium (or opens a tab on a remote one) per session.
pub struct ChromiumLauncher {
    config: BrowserEngineConfig,
}

impl ChromiumLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }

    /// Find Chrome executable.
    fn find_chrome(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.chrome_executable {
            return Ok(path.clone());
        }

        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        // Check if in PATH via `which`
        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set CHROME_EXECUTABLE:\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Alpine: apk add chromium\n\
             - Or download from: https://www.google.com/chrome/"
        ))
    }

    async fn launch_local(&self) -> Result<(Browser, Handler)> {
        let chrome_path = self.find_chrome()?;
        info!("Launching browser (headless={})", self.config.headless);

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        // Restricted server environments: no sandbox, no GPU, small /dev/shm
        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(format!("--user-agent={}", self.config.user_agent));

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg.clone());
        }

        let config = builder
            .request_timeout(self.config.page_timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        Browser::launch(config)
            .await
            .context("Failed to launch browser")
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&self, url: &str) -> Result<(Browser, Handler)> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: self.config.page_timeout(),
            ..Default::default()
        };

        Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let remote = self.config.remote_url.clone();
        let (browser, mut handler) = match remote.as_deref() {
            Some(url) => self.connect_remote(url).await?,
            None => self.launch_local().await?,
        };

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromiumSession {
            browser: Some(browser),
            page: None,
            handler_task,
            owns_process: remote.is_none(),
        };

        // A half-built session still holds a browser process
        if let Err(e) = session.open_page(&self.config.user_agent).await {
            session.close().await;
            return Err(e);
        }

        Ok(Box::new(session))
    }
}

/// One browser plus the single page the extraction drives.
///
/// Dropping a session without `close` (a cancelled extraction) still
/// releases it: chromiumoxide kills a locally launched browser on drop, and
/// [`Drop`] closes a remote tab before stopping the CDP handler.
struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    owns_process: bool,
}

impl ChromiumSession {
    async fn open_page(&mut self, user_agent: &str) -> Result<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Browser session already closed"))?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .context("Failed to override user agent")?;

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Browser session has no open page"))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;

        self.page()?
            .execute(nav_params)
            .await
            .with_context(|| format!("Navigation to {} failed", url))?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        debug!("Waiting for selector: {}", selector);

        let poll = async {
            // find_element fails fast while the element is absent
            while page.find_element(selector).await.is_err() {
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.map_err(|_| {
            anyhow::anyhow!(
                "Timeout after {}s waiting for selector {}",
                timeout.as_secs(),
                selector
            )
        })
    }

    async fn link_hrefs(&mut self) -> Result<Vec<String>> {
        let hrefs: Vec<String> = self
            .page()?
            .evaluate(LINK_HREFS_SCRIPT.to_string())
            .await
            .context("Failed to collect link hrefs")?
            .into_value()
            .context("Failed to decode link hrefs")?;

        debug!("Collected {} links", hrefs.len());
        Ok(hrefs)
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close failed: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if self.owns_process {
                if let Err(e) = browser.close().await {
                    warn!("Browser close failed: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    warn!("Waiting for browser exit failed: {}", e);
                }
            }
        }

        self.handler_task.abort();
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        let abort = self.handler_task.abort_handle();
        let remote_page = self.page.take().filter(|_| !self.owns_process);

        match (remote_page, tokio::runtime::Handle::try_current()) {
            (Some(page), Ok(runtime)) => {
                debug!("Closing remote tab of a dropped session");
                // The handler must keep running until the close is acknowledged
                runtime.spawn(async move {
                    if let Err(e) = page.close().await {
                        debug!("Page close failed: {}", e);
                    }
                    abort.abort();
                });
            }
            _ => abort.abort(),
        }
    }
}
