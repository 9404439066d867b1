#![warn(missing_docs)]
//! Varsel watches outlet storefronts for two locales, detects meaningful
//! product changes against the previously observed catalog, filters them
//! through each subscriber's preferences and delivers alerts over e-mail,
//! browser push and mobile push.

pub mod config;
pub mod differ;
pub mod matcher;
pub mod models;
pub mod notifier;
pub mod persistence;
pub mod scheduler;
pub mod scraper;
