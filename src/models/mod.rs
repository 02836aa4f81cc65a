//! Domain records for offers, pricing results and checkup snapshots, plus the
//! Discord webhook payloads used for alerts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Prices above this are not real listings and are read as absent
pub const MAX_LISTING_PRICE: Decimal = dec!(10000000);

/// Who is behind an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SellerKind {
    FirstParty,
    ThirdParty,
    Unknown,
}

/// One competing offer for a product.
///
/// The landed price is always derived from `item_price` and `shipping_price`
/// through [`SellerOffer::total_price`]; it is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerOffer {
    pub seller_name: String,
    pub seller_id: Option<String>,
    pub seller_kind: SellerKind,
    pub item_price: Option<Decimal>,
    /// `None` means the shipping cost is unknown, not free
    pub shipping_price: Option<Decimal>,
    pub is_buy_box_winner: bool,
    pub available: bool,
}

impl SellerOffer {
    /// Item price plus shipping, or `None` when the item price is unknown or
    /// the sum does not fit a `Decimal`
    pub fn total_price(&self) -> Option<Decimal> {
        self.item_price?
            .checked_add(self.shipping_price.unwrap_or(Decimal::ZERO))
    }
}

/// The normalized offers of one product, cheapest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSet {
    pub offers: Vec<SellerOffer>,
    /// 1-indexed position of our own offer in `offers`
    pub our_rank: Option<usize>,
    pub competitor_count: usize,
}

impl OfferSet {
    /// An empty set means the payload did not carry enough data to rank anything.
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn our_offer(&self) -> Option<&SellerOffer> {
        self.our_rank.and_then(|rank| self.offers.get(rank - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    OutOfStock,
    ThirdPartyOnly,
    NoFulfillmentOption,
    InStock,
}

impl AvailabilityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::ThirdPartyOnly => "THIRD_PARTY_ONLY",
            Self::NoFulfillmentOption => "NO_FULFILLMENT_OPTION",
            Self::InStock => "IN_STOCK",
        }
    }
}

/// Parameters for one margin computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingInput {
    pub competitor_item_price: Decimal,
    pub competitor_shipping_price: Decimal,
    /// Negative values price above the competitor
    pub undercut_percent: Decimal,
    pub product_cost: Decimal,
    pub platform_fee_rate: Decimal,
    /// Flat per-order charges (shipping label, service charge)
    pub fixed_fees: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Neutral,
    Good,
    Warning,
    Bad,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "NEUTRAL",
            Self::Good => "GOOD",
            Self::Warning => "WARNING",
            Self::Bad => "BAD",
        }
    }
}

/// Outcome of one margin computation, rounded to cents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub proposed_price: Decimal,
    pub platform_fee: Decimal,
    pub total_fees: Decimal,
    pub net_profit: Decimal,
    pub margin_percent: Decimal,
    pub verdict: Verdict,
}

/// Lowest price that still meets a target margin.
///
/// `NotComputable` is returned when fees and margin together reach 100% of the
/// price; callers must check for it before formatting a currency value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "price", rename_all = "snake_case")]
pub enum MinimumViablePrice {
    Price(Decimal),
    NotComputable,
}

impl MinimumViablePrice {
    pub fn price(self) -> Option<Decimal> {
        match self {
            Self::Price(price) => Some(price),
            Self::NotComputable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    Competitive,
    MinimumMargin,
}

impl PriceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Competitive => "COMPETITIVE",
            Self::MinimumMargin => "MINIMUM_MARGIN",
        }
    }
}

/// The price to show a user and where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPrice {
    /// `None` only when the minimum price was not computable
    pub price: Option<Decimal>,
    pub source: PriceSource,
}

/// End-to-end pricing answer for one product against one competitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub fee_rate: Decimal,
    pub result: PricingResult,
    pub minimum: MinimumViablePrice,
    /// Fee rate charged at the minimum price, which may sit in another tier
    pub floor_fee_rate: Decimal,
    pub display: DisplayPrice,
}

/// A product we sell and want to keep competitively priced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedProduct {
    pub sku: String,
    pub item_id: String,
    pub product_cost: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub undercut_percent: Decimal,
}

/// Result of checking one tracked product, persisted per SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub sku: String,
    pub item_id: String,
    pub title: Option<String>,
    pub availability: AvailabilityStatus,
    pub offers: OfferSet,
    pub quote: Option<Quote>,
    pub checked_at: DateTime<Utc>,
}

impl ProductSnapshot {
    /// Losing the top spot, pricing at a loss, or not being sellable warrants an alert.
    pub fn needs_alert(&self) -> bool {
        let losing_rank = matches!(self.offers.our_rank, Some(rank) if rank > 1);
        let at_loss = self
            .quote
            .as_ref()
            .is_some_and(|quote| quote.result.verdict == Verdict::Bad);

        losing_rank || at_loss || self.availability != AvailabilityStatus::InStock
    }
}

/// Discord embed structure for rich notifications
#[derive(Debug, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    pub url: String,
    pub color: u32,
    pub timestamp: String,
    pub fields: Vec<DiscordField>,
}

/// Key-value field for Discord embeds
#[derive(Debug, Serialize)]
pub struct DiscordField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Discord webhook message payload
#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    pub embeds: Vec<DiscordEmbed>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(item: Option<Decimal>, shipping: Option<Decimal>) -> SellerOffer {
        SellerOffer {
            seller_name: "Acme Goods".to_string(),
            seller_id: None,
            seller_kind: SellerKind::ThirdParty,
            item_price: item,
            shipping_price: shipping,
            is_buy_box_winner: false,
            available: true,
        }
    }

    #[test]
    fn test_total_price_adds_shipping() {
        assert_eq!(
            offer(Some(dec!(12.50)), Some(dec!(5.99))).total_price(),
            Some(dec!(18.49))
        );
    }

    #[test]
    fn test_total_price_treats_unknown_shipping_as_zero() {
        assert_eq!(offer(Some(dec!(12.50)), None).total_price(), Some(dec!(12.50)));
    }

    #[test]
    fn test_total_price_follows_component_changes() {
        let mut o = offer(Some(dec!(10)), Some(dec!(2)));
        o.shipping_price = Some(dec!(3));
        assert_eq!(o.total_price(), Some(dec!(13)));
        o.item_price = None;
        assert_eq!(o.total_price(), None);
    }

    #[test]
    fn test_total_price_overflow_reads_as_unpriced() {
        assert_eq!(offer(Some(Decimal::MAX), Some(dec!(1))).total_price(), None);
        assert_eq!(offer(Some(Decimal::MAX), None).total_price(), Some(Decimal::MAX));
    }

    #[test]
    fn test_needs_alert_when_not_first() {
        let snapshot = ProductSnapshot {
            sku: "SKU-1".to_string(),
            item_id: "123".to_string(),
            title: None,
            availability: AvailabilityStatus::InStock,
            offers: OfferSet {
                offers: vec![offer(Some(dec!(9)), None), offer(Some(dec!(10)), None)],
                our_rank: Some(2),
                competitor_count: 2,
            },
            quote: None,
            checked_at: Utc::now(),
        };
        assert!(snapshot.needs_alert());

        let leading = ProductSnapshot {
            offers: OfferSet {
                our_rank: Some(1),
                ..snapshot.offers.clone()
            },
            ..snapshot
        };
        assert!(!leading.needs_alert());
    }
}
