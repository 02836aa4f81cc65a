//! Environment-driven configuration
//!
//! Values are read once at startup, after `.env` has been loaded. Optional
//! integrations (Discord, seed file) degrade with a warning when unset.

use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use crate::pricing::FeeSchedule;

const DEFAULT_DATABASE_URL: &str = "sqlite:database/repricer.db";
const DEFAULT_CHECKUP_CRON: &str = "0 0 9 * * *";

/// Fee parameters handed to the pricing engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub fee_schedule: FeeSchedule,
    pub shipping_label_fee: Decimal,
    pub service_charge: Decimal,
    pub target_margin_percent: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fee_schedule: FeeSchedule::default(),
            shipping_label_fee: Decimal::ZERO,
            service_charge: Decimal::ZERO,
            target_margin_percent: dec!(15),
        }
    }
}

impl PricingConfig {
    /// Flat charges applied to every order
    pub fn fixed_fees(&self) -> Decimal {
        self.shipping_label_fee + self.service_charge
    }
}

/// How the scrape provider is called
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub api_key: String,
    pub max_attempts: u32,
    pub delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub discord_webhook_url: Option<String>,
    pub own_seller_names: Vec<String>,
    pub own_seller_id: Option<String>,
    pub checkup_cron: String,
    pub tracked_products_path: Option<String>,
    pub scrape: ScrapeConfig,
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup, so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("SCRAPINGBEE_API_KEY").context("SCRAPINGBEE_API_KEY must be set")?;

        let discord_webhook_url = get("DISCORD_WEBHOOK_URL");
        if discord_webhook_url.is_none() {
            warn!("DISCORD_WEBHOOK_URL not set - alerts will be disabled");
        }

        let own_seller_names: Vec<String> = get("OWN_SELLER_NAMES")
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if own_seller_names.is_empty() {
            warn!("OWN_SELLER_NAMES not set - our own listings will not be ranked");
        }

        let defaults = PricingConfig::default();
        let fee_schedule = FeeSchedule {
            standard_rate: parse_or(&get, "STANDARD_FEE_RATE", defaults.fee_schedule.standard_rate)?,
            ..defaults.fee_schedule
        };
        let pricing = PricingConfig {
            fee_schedule,
            shipping_label_fee: parse_or(&get, "SHIPPING_LABEL_FEE", defaults.shipping_label_fee)?,
            service_charge: parse_or(&get, "SERVICE_CHARGE", defaults.service_charge)?,
            target_margin_percent: parse_or(
                &get,
                "TARGET_MARGIN_PERCENT",
                defaults.target_margin_percent,
            )?,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            discord_webhook_url,
            own_seller_names,
            own_seller_id: get("OWN_SELLER_ID"),
            checkup_cron: get("CHECKUP_CRON").unwrap_or_else(|| DEFAULT_CHECKUP_CRON.to_string()),
            tracked_products_path: get("TRACKED_PRODUCTS_PATH"),
            scrape: ScrapeConfig {
                api_key,
                max_attempts: parse_or(&get, "SCRAPE_MAX_ATTEMPTS", 3)?,
                delay_ms: parse_or(&get, "SCRAPE_DELAY_MS", 1500)?,
            },
            pricing,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    get(key).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw}"))
    })
}
