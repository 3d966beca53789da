//! Storage for the post cache and the durable bot state.
//!
//! Backends:
//! - In-memory (ephemeral, single process)
//! - Redis (persistent, requires the `redis-backend` feature)

mod backend;
mod memory;
mod state;

#[cfg(feature = "redis-backend")]
mod redis;

pub use backend::{KeyValueStore, StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use state::{BotState, StateStore, STATE_KEY};

#[cfg(feature = "redis-backend")]
pub use self::redis::RedisStore;
