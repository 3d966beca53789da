//! End-to-end flow over the public API with a scripted browser.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bumo::messages::{PostMessage, GO_TO_POST_LABEL};
use bumo::scrapers::{BrowserEngineConfig, BrowserSession, PostLinkExtractor, SessionLauncher};
use bumo::services::{run_daily_notification, LatestPostService, MessageSink, RetryPolicy};
use bumo::store::{InMemoryStore, KeyValueStore, StateStore};

/// Serves one scripted link list per launched session.
struct ScriptedLauncher {
    pages: Mutex<VecDeque<Vec<String>>>,
    launches: AtomicUsize,
}

impl ScriptedLauncher {
    fn new(pages: Vec<Vec<&str>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(
                pages
                    .into_iter()
                    .map(|links| links.into_iter().map(String::from).collect())
                    .collect(),
            ),
            launches: AtomicUsize::new(0),
        })
    }
}

struct ScriptedSession {
    links: Vec<String>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> anyhow::Result<()> {
        Ok(())
    }

    async fn link_hrefs(&mut self) -> anyhow::Result<Vec<String>> {
        Ok(self.links.clone())
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let links = self.pages.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedSession { links }))
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(i64, PostMessage)>>,
}

#[async_trait]
impl MessageSink for Outbox {
    async fn send(&self, chat_id: i64, message: &PostMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((chat_id, message.clone()));
        Ok(())
    }
}

fn config() -> BrowserEngineConfig {
    BrowserEngineConfig {
        load_delay: 0,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_daily_post_reaches_every_subscriber() {
    let launcher = ScriptedLauncher::new(vec![
        // First attempt: page rendered without any post link
        vec!["https://www.facebook.com/thoitietHN/photos/1"],
        vec![
            "https://www.facebook.com/thoitietHN",
            "https://www.facebook.com/thoitietHN/posts/pfbid02abc?__cft__[0]=x#footer",
        ],
    ]);
    let extractor = PostLinkExtractor::new(launcher.clone(), config(), "www.facebook.com").unwrap();

    let store = InMemoryStore::new();
    let service = LatestPostService::new(Arc::new(extractor), Arc::new(store.clone()), "thoitietHN");
    let state = StateStore::new(Arc::new(store.clone()));
    for chat_id in [42, 7, 42] {
        state.record_subscriber(chat_id).await.unwrap();
    }

    let outbox = Outbox::default();
    let report = run_daily_notification(&service, &state, &outbox, RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(report.delivered, vec![7, 42]);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);

    let sent = outbox.sent.lock().unwrap();
    let button = sent[0].1.button.as_ref().unwrap();
    assert_eq!(button.label, GO_TO_POST_LABEL);
    assert_eq!(button.url, "https://www.facebook.com/thoitietHN/posts/pfbid02abc");

    // The found link is cached for the interactive lookups
    assert_eq!(
        service.fetch(false).await.unwrap().url(),
        Some("https://www.facebook.com/thoitietHN/posts/pfbid02abc")
    );
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);

    // Subscribers survive a restart over the same backend
    let reloaded = StateStore::new(Arc::new(store.clone()));
    assert_eq!(
        reloaded.subscribers().await.unwrap().into_iter().collect::<Vec<_>>(),
        vec![7, 42]
    );
    assert!(store.get("bumo:bot_state").await.unwrap().is_some());
}
