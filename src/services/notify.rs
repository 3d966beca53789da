//! Scheduled notification flow: fetch with retries, then fan out.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::latest_post::LatestPostService;
use crate::messages::PostMessage;
use crate::scrapers::ExtractOutcome;
use crate::store::{StateStore, StoreResult};

/// Retry settings for the scheduled fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Fixed pause before each retry.
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 10,
            pause: Duration::from_secs(120),
        }
    }
}

/// Delivers a message to one chat.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, chat_id: i64, message: &PostMessage) -> anyhow::Result<()>;
}

/// Per-chat outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

/// Fetch the latest post for a broadcast.
///
/// The first attempt bypasses the cache. While nothing is found it retries
/// up to `policy.retries` times, pausing `policy.pause` before each, and
/// then gives up with the last outcome.
pub async fn fetch_with_retry(
    service: &LatestPostService,
    policy: RetryPolicy,
) -> StoreResult<ExtractOutcome> {
    let mut outcome = service.fetch(true).await?;

    for attempt in 1..=policy.retries {
        if matches!(outcome, ExtractOutcome::Found(_)) {
            break;
        }
        warn!(
            "Latest post unavailable, retry {}/{} in {}s",
            attempt,
            policy.retries,
            policy.pause.as_secs()
        );
        tokio::time::sleep(policy.pause).await;
        outcome = service.fetch(false).await?;
    }

    Ok(outcome)
}

/// Send `message` to every chat, one at a time. A failed send is recorded
/// and does not stop the rest.
pub async fn deliver<I>(sink: &dyn MessageSink, chats: I, message: &PostMessage) -> DeliveryReport
where
    I: IntoIterator<Item = i64>,
{
    let mut report = DeliveryReport::default();
    for chat_id in chats {
        match sink.send(chat_id, message).await {
            Ok(()) => report.delivered.push(chat_id),
            Err(e) => {
                warn!("Failed to deliver to chat {}: {:#}", chat_id, e);
                report.failed.push((chat_id, format!("{:#}", e)));
            }
        }
    }
    report
}

/// The daily job: fetch with retries and send the result to all subscribers.
pub async fn run_daily_notification(
    service: &LatestPostService,
    state: &StateStore,
    sink: &dyn MessageSink,
    policy: RetryPolicy,
) -> StoreResult<DeliveryReport> {
    let outcome = fetch_with_retry(service, policy).await?;
    let message = PostMessage::from_outcome(&outcome);
    let subscribers = state.subscribers().await?;

    info!(
        "Sending daily post to {} subscribers ({})",
        subscribers.len(),
        outcome
    );
    let report = deliver(sink, subscribers, &message).await;
    info!(
        "Daily post delivered to {}, failed for {}",
        report.delivered.len(),
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::LinkSource;
    use crate::store::{InMemoryStore, KeyValueStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fails `failures` times, then finds a post.
    struct FlakySource {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LinkSource for FlakySource {
        async fn latest_post(&self, _: &str) -> ExtractOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                ExtractOutcome::NotFound
            } else {
                ExtractOutcome::Found("https://www.facebook.com/p/posts/9".into())
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        fail_for: Option<i64>,
        sent: Mutex<Vec<(i64, PostMessage)>>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, chat_id: i64, message: &PostMessage) -> anyhow::Result<()> {
            if self.fail_for == Some(chat_id) {
                anyhow::bail!("Forbidden: bot was blocked by the user");
            }
            self.sent.lock().unwrap().push((chat_id, message.clone()));
            Ok(())
        }
    }

    fn service(source: Arc<FlakySource>) -> LatestPostService {
        LatestPostService::new(source, Arc::new(InMemoryStore::new()), "p")
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_ten_retries() {
        let source = FlakySource::new(usize::MAX);
        let start = tokio::time::Instant::now();

        let outcome = fetch_with_retry(&service(source.clone()), RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(outcome, ExtractOutcome::NotFound);
        assert_eq!(source.calls.load(Ordering::SeqCst), 11);
        assert!(start.elapsed() >= Duration::from_secs(10 * 120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_success() {
        let source = FlakySource::new(3);
        let outcome = fetch_with_retry(&service(source.clone()), RetryPolicy::default())
            .await
            .unwrap();

        assert!(matches!(outcome, ExtractOutcome::Found(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_first_attempt_bypasses_cache() {
        let source = FlakySource::new(0);
        let cache = InMemoryStore::new();
        cache
            .set("bumo:latest_post:p", "https://www.facebook.com/p/posts/stale")
            .await
            .unwrap();
        let service = LatestPostService::new(source.clone(), Arc::new(cache), "p");

        let outcome = fetch_with_retry(&service, RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExtractOutcome::Found("https://www.facebook.com/p/posts/9".into())
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delivery_survives_one_failing_chat() {
        let sink = RecordingSink {
            fail_for: Some(3),
            ..Default::default()
        };
        let message = PostMessage::failure();

        let report = deliver(&sink, [1, 2, 3, 4, 5], &message).await;

        assert_eq!(report.delivered, vec![1, 2, 4, 5]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 3);
        assert_eq!(sink.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_notification_sends_failure_after_retries() {
        let source = FlakySource::new(usize::MAX);
        let state = StateStore::new(Arc::new(InMemoryStore::new()));
        state.record_subscriber(10).await.unwrap();
        state.record_subscriber(20).await.unwrap();
        let sink = RecordingSink::default();

        let report = run_daily_notification(
            &service(source.clone()),
            &state,
            &sink,
            RetryPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.delivered, vec![10, 20]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 11);
        let sent = sink.sent.lock().unwrap();
        assert!(sent.iter().all(|(_, m)| *m == PostMessage::failure()));
    }
}
