//! Seam between the checkup and whatever fetches product payloads

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scrape provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no product payload found for item {0}")]
    MissingPayload(String),
}

/// Source of raw product payloads
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Display name used in logs
    fn name(&self) -> &str;

    /// Fetch the raw vendor payload for one item.
    ///
    /// # Arguments
    /// * `item_id` - The marketplace item id
    ///
    /// # Returns
    /// * `Result<Value, ScrapeError>` - The embedded product JSON, any shape
    async fn fetch_product(&self, item_id: &str) -> Result<Value, ScrapeError>;

    /// Public product page for an item
    fn product_url(&self, item_id: &str) -> String {
        format!("https://www.walmart.com/ip/{item_id}")
    }
}
