//! Bumo - Telegram bot relaying the newest post of a Facebook page.
//!
//! The latest post link is scraped with a headless browser, cached for an
//! hour and sent to every subscribed private chat once a day.

pub mod bot;
pub mod cli;
pub mod config;
pub mod messages;
pub mod scrapers;
pub mod services;
pub mod store;
