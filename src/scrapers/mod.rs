//! Page scraping for the latest post link.

pub mod browser;
pub mod post_link;

pub use browser::{BrowserEngineConfig, BrowserSession, ChromiumLauncher, SessionLauncher};
pub use post_link::{
    clean_url, find_post_link, post_link_pattern, ExtractOutcome, LinkSource, PostLinkExtractor,
    DEFAULT_HOST,
};
