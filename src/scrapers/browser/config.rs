//! Browser engine configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Desktop Chrome user agent presented to the scraped site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.75 Safari/537.36";

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false for debugging.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Explicit Chrome executable. Auto-detected when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// User agent for every page.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Wait for this CSS selector before scanning the page.
    #[serde(default = "default_wait_for_selector")]
    pub wait_for_selector: String,

    /// Seconds to pause before navigating.
    #[serde(default = "default_load_delay")]
    pub load_delay: u64,

    /// Upper bound on concurrently running browser sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            chrome_executable: None,
            user_agent: default_user_agent(),
            timeout: default_timeout(),
            wait_for_selector: default_wait_for_selector(),
            load_delay: default_load_delay(),
            max_sessions: default_max_sessions(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn pre_navigation_delay(&self) -> Duration {
        Duration::from_secs(self.load_delay)
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

pub fn default_timeout() -> u64 {
    75
}

pub fn default_wait_for_selector() -> String {
    "div[role='main']".to_string()
}

pub fn default_load_delay() -> u64 {
    5
}

pub fn default_max_sessions() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: BrowserEngineConfig = serde_json::from_str("{}").unwrap();
        assert!(config.headless);
        assert_eq!(config.page_timeout(), Duration::from_secs(75));
        assert_eq!(config.wait_for_selector, "div[role='main']");
        assert_eq!(config.max_sessions, 1);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }
}
