//! ScrapingBee-backed product source

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::normalizer::extract_embedded_payload;
use crate::traits::{ProductSource, ScrapeError};

const SCRAPINGBEE_ENDPOINT: &str = "https://app.scrapingbee.com/api/v1/";

pub struct ScrapingBeeSource {
    client: Client,
    config: ScrapeConfig,
}

impl ScrapingBeeSource {
    pub fn new(config: ScrapeConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self { client, config })
    }

    fn request_url(&self, item_id: &str) -> String {
        format!(
            "{SCRAPINGBEE_ENDPOINT}?api_key={}&url={}&render_js=false",
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(&self.product_url(item_id)),
        )
    }

    async fn fetch_once(&self, item_id: &str) -> Result<Value, ScrapeError> {
        let response = self.client.get(self.request_url(item_id)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let html = response.text().await?;
        extract_embedded_payload(&html).ok_or_else(|| ScrapeError::MissingPayload(item_id.to_string()))
    }
}

#[async_trait]
impl ProductSource for ScrapingBeeSource {
    fn name(&self) -> &str {
        "ScrapingBee"
    }

    async fn fetch_product(&self, item_id: &str) -> Result<Value, ScrapeError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(item_id, attempt, "Fetching product page");

            match self.fetch_once(item_id).await {
                Ok(payload) => {
                    info!(item_id, attempt, "Fetched product payload");
                    return Ok(payload);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(item_id, attempt, error = %e, "Scrape attempt failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(self.config.delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Clone for ScrapingBeeSource {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}
