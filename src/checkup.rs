use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::database::Database;
use crate::discord::DiscordNotifier;
use crate::models::{AvailabilityStatus, ProductSnapshot, TrackedProduct};
use crate::normalizer::payload::RawProduct;
use crate::normalizer::{
    AvailabilityFlags, classify_availability, is_own_offer, normalize_product,
};
use crate::pricing::PricingEngine;
use crate::scraper::ScrapingBeeSource;
use crate::traits::ProductSource;

/// Counts from one checkup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckupSummary {
    pub checked: usize,
    pub skipped: usize,
    /// Alerts Discord accepted during this pass
    pub alerts: usize,
}

/// Our storefront identity on the marketplace
#[derive(Debug, Clone, Default)]
pub struct OwnSeller {
    pub names: Vec<String>,
    pub seller_id: Option<String>,
}

#[derive(Clone)]
pub struct RepricingCheckup {
    source: Arc<dyn ProductSource>,
    database: Database,
    discord: DiscordNotifier,
    engine: PricingEngine,
    own: OwnSeller,
    delay: Duration,
}

impl RepricingCheckup {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let source = ScrapingBeeSource::new(config.scrape.clone())?;
        let database = Database::new(&config.database_url).await?;
        let discord = DiscordNotifier::new(config.discord_webhook_url.clone());

        Ok(Self::from_parts(
            Arc::new(source),
            database,
            discord,
            PricingEngine::new(config.pricing.clone()),
            OwnSeller {
                names: config.own_seller_names.clone(),
                seller_id: config.own_seller_id.clone(),
            },
            Duration::from_millis(config.scrape.delay_ms),
        ))
    }

    pub fn from_parts(
        source: Arc<dyn ProductSource>,
        database: Database,
        discord: DiscordNotifier,
        engine: PricingEngine,
        own: OwnSeller,
        delay: Duration,
    ) -> Self {
        Self {
            source,
            database,
            discord,
            engine,
            own,
            delay,
        }
    }

    /// Load tracked products from a JSON array file and upsert them.
    pub async fn seed_products(&self, path: &str) -> Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {path}"))?;
        let products: Vec<TrackedProduct> =
            serde_json::from_str(&raw).with_context(|| format!("invalid tracked products in {path}"))?;

        for product in &products {
            self.database.upsert_tracked_product(product).await?;
        }

        info!("Seeded {} tracked products from {}", products.len(), path);
        Ok(products.len())
    }

    /// Turn one fetched payload into a snapshot. An unrecognizable payload
    /// yields an empty offer set and no quote.
    pub fn snapshot_for(&self, product: &TrackedProduct, payload: &Value) -> ProductSnapshot {
        let raw = RawProduct::locate(payload);
        let hint = self.own.seller_id.as_deref();

        let (offers, availability, title) = match &raw {
            Some(raw) => (
                normalize_product(raw, &self.own.names, hint),
                classify_availability(AvailabilityFlags::from_product(raw)),
                raw.name.clone(),
            ),
            None => (
                Default::default(),
                classify_availability(AvailabilityFlags::default()),
                None,
            ),
        };

        let quote = offers
            .offers
            .iter()
            .find(|offer| offer.item_price.is_some() && !is_own_offer(offer, &self.own.names, hint))
            .and_then(|competitor| self.engine.quote_against(competitor, product));

        ProductSnapshot {
            sku: product.sku.clone(),
            item_id: product.item_id.clone(),
            title,
            availability,
            offers,
            quote,
            checked_at: Utc::now(),
        }
    }

    pub async fn run(&self) -> Result<CheckupSummary> {
        let products = self.database.tracked_products().await?;
        info!(
            "Checking {} tracked products via {}",
            products.len(),
            self.source.name()
        );

        let mut summary = CheckupSummary::default();

        for (index, product) in products.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let payload = match self.source.fetch_product(&product.item_id).await {
                Ok(payload) => payload,
                Err(e) => {
                    error!(sku = %product.sku, error = %e, "Skipping product");
                    summary.skipped += 1;
                    continue;
                }
            };

            let snapshot = self.snapshot_for(product, &payload);
            if snapshot.offers.is_empty() {
                warn!(sku = %product.sku, "No offers found - insufficient data");
            } else if snapshot.availability != AvailabilityStatus::InStock {
                info!(sku = %product.sku, status = snapshot.availability.as_str(), "Listing not in stock");
            }

            self.database.save_snapshot(&snapshot).await?;
            summary.checked += 1;

            if self.database.alert_pending(&product.sku).await? {
                let url = self.source.product_url(&product.item_id);
                match self.discord.send_alert(&snapshot, &url).await {
                    Ok(true) => {
                        self.database.clear_alert(&product.sku).await?;
                        summary.alerts += 1;
                    }
                    Ok(false) => debug!(sku = %product.sku, "Alert left pending"),
                    Err(e) => {
                        error!(sku = %product.sku, error = %e, "Alert not delivered, will retry next checkup");
                    }
                }
            }
        }

        info!(
            checked = summary.checked,
            skipped = summary.skipped,
            alerts = summary.alerts,
            "Checkup finished"
        );
        Ok(summary)
    }
}
