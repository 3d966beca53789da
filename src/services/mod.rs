//! Service layer for the bot's business logic.
//!
//! Domain logic separated from the Telegram surface, so the CLI and the
//! bot share it.

pub mod latest_post;
pub mod notify;
pub mod schedule;

pub use latest_post::{LatestPostService, DEFAULT_CACHE_TTL};
pub use notify::{
    deliver, fetch_with_retry, run_daily_notification, DeliveryReport, MessageSink, RetryPolicy,
};
pub use schedule::{parse_time_of_day, DailySchedule};
