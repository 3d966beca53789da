//! Durable bot-wide state.
//!
//! The whole state is one JSON blob under a single key. It is read in full
//! and written in full; there is no schema versioning.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::backend::{KeyValueStore, StoreError, StoreResult};

/// Key the state blob lives under.
pub const STATE_KEY: &str = "bumo:bot_state";

/// Bot-wide state persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    /// Chats that privately messaged the bot at least once.
    #[serde(default)]
    pub subscribers: BTreeSet<i64>,
}

/// Adapter owning the durable state blob.
///
/// Cheap to clone; clones share the same cached state.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    deferred_flush: bool,
    cached: Arc<Mutex<Option<BotState>>>,
}

impl StateStore {
    /// Create an adapter that saves after every mutation.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            key: STATE_KEY.to_string(),
            deferred_flush: false,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Only write to the backend when [`flush`](Self::flush) is called.
    pub fn with_deferred_flush(mut self, deferred: bool) -> Self {
        self.deferred_flush = deferred;
        self
    }

    /// Use a different backend key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred_flush
    }

    /// Current state, read from the backend on first use and served from
    /// memory afterwards. Later writes by other processes are not seen.
    ///
    /// A missing key yields an empty state. An undecodable blob is a
    /// [`StoreError::CorruptedState`].
    pub async fn load(&self) -> StoreResult<BotState> {
        let mut cached = self.cached.lock().await;
        if let Some(state) = cached.as_ref() {
            return Ok(state.clone());
        }

        let state = self.read_backend().await?;
        *cached = Some(state.clone());
        Ok(state)
    }

    /// Replace the whole state and write it unless flushing is deferred.
    pub async fn save(&self, state: &BotState) -> StoreResult<()> {
        let mut cached = self.cached.lock().await;
        *cached = Some(state.clone());
        if !self.deferred_flush {
            self.write_backend(state).await?;
        }
        Ok(())
    }

    /// Write the in-memory state to the backend.
    pub async fn flush(&self) -> StoreResult<()> {
        let cached = self.cached.lock().await;
        if let Some(state) = cached.as_ref() {
            self.write_backend(state).await?;
        }
        Ok(())
    }

    /// Add a chat to the subscriber set.
    ///
    /// Returns `true` if the chat was new. Known chats cause no write.
    pub async fn record_subscriber(&self, chat_id: i64) -> StoreResult<bool> {
        let mut cached = self.cached.lock().await;
        let mut state = match cached.take() {
            Some(state) => state,
            None => self.read_backend().await?,
        };

        let added = state.subscribers.insert(chat_id);
        if added && !self.deferred_flush {
            if let Err(e) = self.write_backend(&state).await {
                // Keep memory in step with the backend so the next message retries
                state.subscribers.remove(&chat_id);
                *cached = Some(state);
                return Err(e);
            }
        }
        *cached = Some(state);

        if added {
            info!("New subscriber: {}", chat_id);
        }
        Ok(added)
    }

    /// Current subscriber set.
    pub async fn subscribers(&self) -> StoreResult<BTreeSet<i64>> {
        Ok(self.load().await?.subscribers)
    }

    async fn read_backend(&self) -> StoreResult<BotState> {
        let Some(blob) = self.backend.get(&self.key).await? else {
            debug!("No stored bot state under {}, starting empty", self.key);
            return Ok(BotState::default());
        };

        serde_json::from_str(&blob).map_err(|source| StoreError::CorruptedState {
            key: self.key.clone(),
            source,
        })
    }

    async fn write_backend(&self, state: &BotState) -> StoreResult<()> {
        let blob =
            serde_json::to_string(state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.backend.set(&self.key, &blob).await
    }
}
