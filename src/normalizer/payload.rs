//! Best-effort view of a vendor product payload.
//!
//! Nothing here is trusted: every field is looked up through `Option` and a
//! value of the wrong shape reads as absent. The clean domain types live in
//! [`crate::models`].

use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::MAX_LISTING_PRICE;

/// Where the product object may sit, in lookup order
const PRODUCT_POINTERS: [&str; 3] = [
    "/props/pageProps/initialData/data/product",
    "/data/product",
    "/product",
];

/// Keys that mark the root itself as a product object
const PRODUCT_MARKERS: [&str; 3] = ["usItemId", "priceInfo", "offers"];

/// One entry of an explicit multi-offer list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOffer {
    pub seller_id: Option<String>,
    pub seller_name: Option<String>,
    pub seller_type: Option<String>,
    pub price: Option<Decimal>,
    pub shipping_price: Option<Decimal>,
    pub is_buy_box_winner: Option<bool>,
    pub availability_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProduct {
    pub item_id: Option<String>,
    pub name: Option<String>,
    pub seller_id: Option<String>,
    pub seller_name: Option<String>,
    pub seller_type: Option<String>,
    pub availability_status: Option<String>,
    pub current_price: Option<Decimal>,
    pub ship_price: Option<Decimal>,
    pub secondary_price: Option<Decimal>,
    pub offers: Vec<RawOffer>,
    pub third_party_seller: Option<bool>,
    pub shipping_available: Option<bool>,
    pub delivery_available: Option<bool>,
}

impl RawProduct {
    /// Find and read the product object, or `None` if the payload has none.
    pub fn locate(payload: &Value) -> Option<Self> {
        let product = PRODUCT_POINTERS
            .iter()
            .filter_map(|pointer| payload.pointer(pointer))
            .find(|value| value.is_object())
            .or_else(|| {
                let is_product = payload
                    .as_object()
                    .is_some_and(|map| PRODUCT_MARKERS.iter().any(|key| map.contains_key(*key)));
                is_product.then_some(payload)
            })?;

        Some(Self::read(product))
    }

    fn read(product: &Value) -> Self {
        // Every entry of an offers array is an offer, even one of the wrong
        // shape, which reads as an offer with nothing known about it.
        let offers = product
            .get("offers")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(RawOffer::read).collect())
            .unwrap_or_default();

        Self {
            item_id: text_at(product, "/usItemId"),
            name: text_at(product, "/name"),
            seller_id: text_at(product, "/sellerId"),
            seller_name: text_at(product, "/sellerName"),
            seller_type: text_at(product, "/sellerType"),
            availability_status: text_at(product, "/availabilityStatus"),
            current_price: price_at(product, "/priceInfo/currentPrice/price"),
            ship_price: price_at(product, "/priceInfo/shipPrice/price"),
            secondary_price: price_at(product, "/priceInfo/secondaryOfferPrice/currentPrice/price"),
            offers,
            third_party_seller: bool_at(product, "/thirdPartySeller"),
            shipping_available: bool_at(product, "/shippingOption/available"),
            delivery_available: bool_at(product, "/deliveryOption/available"),
        }
    }
}

impl RawOffer {
    fn read(entry: &Value) -> Self {
        Self {
            seller_id: text_at(entry, "/sellerId"),
            seller_name: text_at(entry, "/sellerName"),
            seller_type: text_at(entry, "/sellerType"),
            price: price_at(entry, "/price"),
            shipping_price: price_at(entry, "/shippingPrice"),
            is_buy_box_winner: bool_at(entry, "/isBuyBoxWinner"),
            availability_status: text_at(entry, "/availabilityStatus"),
        }
    }
}

/// Non-empty string, or a number rendered as text (item ids come both ways)
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_at(value: &Value, pointer: &str) -> Option<bool> {
    value.pointer(pointer)?.as_bool()
}

fn price_at(value: &Value, pointer: &str) -> Option<Decimal> {
    parse_price(value.pointer(pointer)?)
}

/// Accepts JSON numbers and strings like `"$1,299.99"`. Negative prices and
/// prices above [`MAX_LISTING_PRICE`] are treated as absent.
pub fn parse_price(value: &Value) -> Option<Decimal> {
    let price = match value {
        Value::Number(n) => n.to_string().parse::<Decimal>().ok().or_else(|| {
            n.as_f64().and_then(|f| Decimal::try_from(f).ok())
        })?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != '$' && *c != ',')
                .collect();
            cleaned.parse::<Decimal>().ok()?
        }
        _ => return None,
    };

    (Decimal::ZERO..=MAX_LISTING_PRICE)
        .contains(&price)
        .then_some(price)
}
