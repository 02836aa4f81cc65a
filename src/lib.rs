//! Competitive repricing for marketplace resellers.
//!
//! [`normalizer`] turns scraped product payloads into ranked offers and
//! [`pricing`] turns a competitor's price into a proposed price with its margin.
//! Both are pure; the remaining modules scrape, persist and alert around them.

pub mod checkup;
pub mod config;
pub mod database;
pub mod discord;
pub mod models;
pub mod normalizer;
pub mod pricing;
pub mod scraper;
pub mod traits;
