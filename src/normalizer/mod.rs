//! Seller/price normalization
//!
//! Turns a loosely structured vendor payload into a ranked [`OfferSet`]. The
//! functions here never fail: a payload without a recognizable product yields
//! an empty set, which callers treat as "insufficient data".

pub mod payload;

use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::{AvailabilityStatus, OfferSet, SellerKind, SellerOffer};
use payload::{RawOffer, RawProduct};

/// Seller names containing this token belong to the platform itself
const PLATFORM_BRAND_TOKEN: &str = "walmart";

/// Vendor seller-type flag for marketplace sellers
const EXTERNAL_SELLER_TYPE: &str = "EXTERNAL";

const OUT_OF_STOCK_STATUS: &str = "OUT_OF_STOCK";

const UNKNOWN_SELLER: &str = "Unknown";

/// Normalize the offers of a raw vendor payload.
///
/// # Arguments
/// * `payload` - Product JSON as returned by the scrape provider, any shape
/// * `own_seller_names` - Our storefront aliases, matched case-insensitively as substrings
/// * `own_offer_hint` - Our vendor seller id, when known
pub fn normalize_offers(
    payload: &Value,
    own_seller_names: &[String],
    own_offer_hint: Option<&str>,
) -> OfferSet {
    RawProduct::locate(payload)
        .map(|product| normalize_product(&product, own_seller_names, own_offer_hint))
        .unwrap_or_default()
}

/// Same as [`normalize_offers`] for a product that has already been located.
pub fn normalize_product(
    product: &RawProduct,
    own_seller_names: &[String],
    own_offer_hint: Option<&str>,
) -> OfferSet {
    let mut offers = if product.offers.is_empty() {
        synthesize_offers(product)
    } else {
        product.offers.iter().map(offer_from_entry).collect()
    };

    // Stable: equal totals keep vendor order, unpriced offers trail.
    offers.sort_by_key(|offer| {
        let total = offer.total_price();
        (total.is_none(), total)
    });

    let our_rank = offers
        .iter()
        .position(|offer| is_own_offer(offer, own_seller_names, own_offer_hint))
        .map(|index| index + 1);

    let competitor_count = offers
        .iter()
        .filter(|offer| offer.seller_kind == SellerKind::ThirdParty)
        .count();

    OfferSet {
        offers,
        our_rank,
        competitor_count,
    }
}

fn offer_from_entry(entry: &RawOffer) -> SellerOffer {
    SellerOffer {
        seller_name: entry
            .seller_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_SELLER.to_string()),
        seller_id: entry.seller_id.clone(),
        seller_kind: classify_seller(entry.seller_type.as_deref(), entry.seller_name.as_deref()),
        item_price: entry.price,
        shipping_price: entry.shipping_price,
        is_buy_box_winner: entry.is_buy_box_winner.unwrap_or(false),
        available: !is_out_of_stock(entry.availability_status.as_deref()),
    }
}

/// Build at most two offers from the single-price fields of a "light" payload.
fn synthesize_offers(product: &RawProduct) -> Vec<SellerOffer> {
    if product.current_price.is_none() && product.secondary_price.is_none() {
        return Vec::new();
    }

    let mut offers = vec![SellerOffer {
        seller_name: product
            .seller_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_SELLER.to_string()),
        seller_id: product.seller_id.clone(),
        seller_kind: classify_seller(
            product.seller_type.as_deref(),
            product.seller_name.as_deref(),
        ),
        item_price: product.current_price,
        shipping_price: product.ship_price,
        is_buy_box_winner: true,
        available: !is_out_of_stock(product.availability_status.as_deref()),
    }];

    // The payload never exposes the secondary seller's shipping, so it stays unknown.
    if let Some(secondary) = product.secondary_price {
        offers.push(SellerOffer {
            seller_name: UNKNOWN_SELLER.to_string(),
            seller_id: None,
            seller_kind: SellerKind::Unknown,
            item_price: Some(secondary),
            shipping_price: None,
            is_buy_box_winner: false,
            available: true,
        });
    }

    offers
}

/// Type flag wins; without one, fall back to the brand-name heuristic.
fn classify_seller(seller_type: Option<&str>, seller_name: Option<&str>) -> SellerKind {
    match (seller_type, seller_name) {
        (Some(kind), _) if kind.eq_ignore_ascii_case(EXTERNAL_SELLER_TYPE) => SellerKind::ThirdParty,
        (Some(_), _) => SellerKind::FirstParty,
        (None, Some(name)) if name.to_lowercase().contains(PLATFORM_BRAND_TOKEN) => {
            SellerKind::FirstParty
        }
        (None, Some(_)) => SellerKind::ThirdParty,
        (None, None) => SellerKind::Unknown,
    }
}

/// Our offer if the name contains one of our aliases or the seller id matches the hint.
pub fn is_own_offer(offer: &SellerOffer, own_seller_names: &[String], own_offer_hint: Option<&str>) -> bool {
    let name = offer.seller_name.to_lowercase();
    let name_matches = own_seller_names
        .iter()
        .map(|alias| alias.trim().to_lowercase())
        .filter(|alias| !alias.is_empty())
        .any(|alias| name.contains(&alias));

    let id_matches = matches!(
        (own_offer_hint, offer.seller_id.as_deref()),
        (Some(hint), Some(id)) if hint == id
    );

    name_matches || id_matches
}

fn is_out_of_stock(status: Option<&str>) -> bool {
    status.is_some_and(|s| s.eq_ignore_ascii_case(OUT_OF_STOCK_STATUS))
}

/// Stock and fulfillment signals of one product page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailabilityFlags {
    pub out_of_stock: bool,
    pub third_party_seller: bool,
    pub delivery_available: bool,
    pub shipping_available: bool,
}

impl AvailabilityFlags {
    /// Absent flags read as `false`.
    pub fn from_product(product: &RawProduct) -> Self {
        Self {
            out_of_stock: is_out_of_stock(product.availability_status.as_deref()),
            third_party_seller: product.third_party_seller.unwrap_or(false),
            delivery_available: product.delivery_available.unwrap_or(false),
            shipping_available: product.shipping_available.unwrap_or(false),
        }
    }
}

/// First match wins: out of stock, then third-party only, then no way to fulfill.
pub fn classify_availability(flags: AvailabilityFlags) -> AvailabilityStatus {
    if flags.out_of_stock {
        AvailabilityStatus::OutOfStock
    } else if flags.third_party_seller {
        AvailabilityStatus::ThirdPartyOnly
    } else if !flags.delivery_available && !flags.shipping_available {
        AvailabilityStatus::NoFulfillmentOption
    } else {
        AvailabilityStatus::InStock
    }
}

/// Pull the `__NEXT_DATA__` JSON blob out of a product page.
pub fn extract_embedded_payload(html: &str) -> Option<Value> {
    let selector = Selector::parse("script#__NEXT_DATA__").ok()?;
    let document = Html::parse_document(html);
    let script = document.select(&selector).next()?;
    let text = script.text().collect::<String>();

    serde_json::from_str(text.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn aliases() -> Vec<String> {
        vec!["Acme".to_string()]
    }

    fn multi_offer_payload() -> Value {
        json!({
            "product": {
                "usItemId": "987654",
                "offers": [
                    { "sellerName": "Walmart.com", "sellerType": "INTERNAL", "price": 21.00, "shippingPrice": 0, "isBuyBoxWinner": true },
                    { "sellerName": "ACME Outlet LLC", "sellerId": "S-77", "sellerType": "EXTERNAL", "price": 18.50, "shippingPrice": 3.00 },
                    { "sellerName": "Bargain Barn", "price": "$19.00", "shippingPrice": 2.50, "availabilityStatus": "OUT_OF_STOCK" },
                    { "sellerName": "Mystery Seller" },
                    { "sellerType": "EXTERNAL", "price": 25 }
                ]
            }
        })
    }

    #[test]
    fn test_empty_payload_yields_empty_set() {
        let set = normalize_offers(&json!({}), &aliases(), None);
        assert_eq!(set, OfferSet { offers: vec![], our_rank: None, competitor_count: 0 });
    }

    #[test]
    fn test_garbage_payloads_never_panic() {
        for payload in [json!(null), json!("html"), json!(17), json!({ "product": [] }), json!({ "data": { "product": 3 } })] {
            assert!(normalize_offers(&payload, &aliases(), None).is_empty());
        }
    }

    #[test]
    fn test_malformed_offer_list_does_not_fall_back_to_price_fields() {
        let payload = json!({
            "product": {
                "sellerName": "Walmart.com",
                "offers": [null, 3],
                "priceInfo": { "currentPrice": { "price": 9.99 } }
            }
        });

        let set = normalize_offers(&payload, &aliases(), None);
        assert_eq!(set.offers.len(), 2);
        for offer in &set.offers {
            assert_eq!(offer.seller_name, UNKNOWN_SELLER);
            assert_eq!(offer.seller_kind, SellerKind::Unknown);
            assert_eq!(offer.total_price(), None);
        }
        assert_eq!(set.our_rank, None);
        assert_eq!(set.competitor_count, 0);
    }

    #[test]
    fn test_absurd_prices_rank_as_unpriced() {
        let payload = json!({
            "product": {
                "offers": [
                    { "sellerName": "Overflow Co", "price": "79228162514264337593543950335", "shippingPrice": 1 },
                    { "sellerName": "Gadget Hub", "price": 5 }
                ]
            }
        });

        let set = normalize_offers(&payload, &[], None);
        assert_eq!(set.offers[0].seller_name, "Gadget Hub");
        assert_eq!(set.offers[1].item_price, None);
        assert_eq!(set.offers[1].total_price(), None);
    }

    #[test]
    fn test_multi_offer_list_ranked_by_landed_price() {
        let set = normalize_offers(&multi_offer_payload(), &aliases(), None);

        let names: Vec<&str> = set.offers.iter().map(|o| o.seller_name.as_str()).collect();
        // 21.00, 21.50, 21.50, 25, unpriced; the two 21.50 ties keep vendor order
        assert_eq!(
            names,
            vec!["Walmart.com", "ACME Outlet LLC", "Bargain Barn", "Unknown", "Mystery Seller"]
        );
        assert_eq!(set.offers[1].total_price(), Some(dec!(21.50)));
        assert_eq!(set.our_rank, Some(2));
        assert!(!set.offers[2].available);
        assert!(set.offers[0].is_buy_box_winner);
    }

    #[test]
    fn test_seller_kind_classification() {
        let set = normalize_offers(&multi_offer_payload(), &aliases(), None);
        let kind_of = |name: &str| {
            set.offers
                .iter()
                .find(|o| o.seller_name == name)
                .map(|o| o.seller_kind)
        };

        assert_eq!(kind_of("Walmart.com"), Some(SellerKind::FirstParty));
        assert_eq!(kind_of("ACME Outlet LLC"), Some(SellerKind::ThirdParty));
        assert_eq!(kind_of("Bargain Barn"), Some(SellerKind::ThirdParty));
        assert_eq!(kind_of("Unknown"), Some(SellerKind::ThirdParty));
        // four third-party offers, the first-party one is not a competitor
        assert_eq!(set.competitor_count, 4);
    }

    #[test]
    fn test_brand_heuristic_without_flag() {
        assert_eq!(classify_seller(None, Some("WALMART.COM")), SellerKind::FirstParty);
        assert_eq!(classify_seller(None, Some("Gadget Hub")), SellerKind::ThirdParty);
        assert_eq!(classify_seller(Some("external"), Some("Walmart")), SellerKind::ThirdParty);
        assert_eq!(classify_seller(Some("INTERNAL"), Some("Gadget Hub")), SellerKind::FirstParty);
        assert_eq!(classify_seller(None, None), SellerKind::Unknown);
    }

    #[test]
    fn test_fallback_synthesizes_primary_and_secondary() {
        let payload = json!({
            "product": {
                "sellerName": "Gadget Hub",
                "sellerType": "EXTERNAL",
                "priceInfo": {
                    "currentPrice": { "price": 30.00 },
                    "shipPrice": { "price": 4.99 },
                    "secondaryOfferPrice": { "currentPrice": { "price": 29.00 } }
                },
                "offers": []
            }
        });

        let set = normalize_offers(&payload, &["gadget hub".to_string()], None);
        assert_eq!(set.offers.len(), 2);

        let secondary = &set.offers[0];
        assert_eq!(secondary.item_price, Some(dec!(29.00)));
        assert_eq!(secondary.shipping_price, None);
        assert!(!secondary.is_buy_box_winner);

        let primary = &set.offers[1];
        assert_eq!(primary.total_price(), Some(dec!(34.99)));
        assert!(primary.is_buy_box_winner);
        assert_eq!(set.our_rank, Some(2));
    }

    #[test]
    fn test_fallback_without_secondary() {
        let payload = json!({ "priceInfo": { "currentPrice": { "price": 12 } } });
        let set = normalize_offers(&payload, &aliases(), None);

        assert_eq!(set.offers.len(), 1);
        assert_eq!(set.offers[0].seller_name, "Unknown");
        assert_eq!(set.offers[0].seller_kind, SellerKind::Unknown);
        assert_eq!(set.our_rank, None);
    }

    #[test]
    fn test_product_without_prices_has_no_offers() {
        let payload = json!({ "product": { "name": "Lamp", "priceInfo": {} } });
        assert!(normalize_offers(&payload, &aliases(), None).is_empty());
    }

    #[test]
    fn test_own_offer_by_seller_id_hint() {
        let set = normalize_offers(&multi_offer_payload(), &[], Some("S-77"));
        assert_eq!(set.our_rank, Some(2));

        let none = normalize_offers(&multi_offer_payload(), &["   ".to_string()], None);
        assert_eq!(none.our_rank, None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let payload = multi_offer_payload();
        assert_eq!(
            normalize_offers(&payload, &aliases(), None),
            normalize_offers(&payload, &aliases(), None)
        );
    }

    #[test]
    fn test_sorted_and_rank_points_at_first_match() {
        let set = normalize_offers(&multi_offer_payload(), &aliases(), None);

        for pair in set.offers.windows(2) {
            match (pair[0].total_price(), pair[1].total_price()) {
                (Some(a), Some(b)) => assert!(a <= b),
                (None, Some(_)) => panic!("unpriced offer ahead of a priced one"),
                _ => {}
            }
        }

        let rank = set.our_rank.unwrap();
        assert!(is_own_offer(&set.offers[rank - 1], &aliases(), None));
        assert!(!set.offers[..rank - 1].iter().any(|o| is_own_offer(o, &aliases(), None)));
    }

    #[test]
    fn test_availability_precedence() {
        let flags = AvailabilityFlags {
            out_of_stock: true,
            third_party_seller: true,
            delivery_available: true,
            shipping_available: true,
        };
        assert_eq!(classify_availability(flags), AvailabilityStatus::OutOfStock);

        let third_party = AvailabilityFlags { out_of_stock: false, ..flags };
        assert_eq!(classify_availability(third_party), AvailabilityStatus::ThirdPartyOnly);

        let unfulfillable = AvailabilityFlags::default();
        assert_eq!(classify_availability(unfulfillable), AvailabilityStatus::NoFulfillmentOption);

        let ships = AvailabilityFlags { shipping_available: true, ..Default::default() };
        assert_eq!(classify_availability(ships), AvailabilityStatus::InStock);
    }

    #[test]
    fn test_availability_flags_from_payload() {
        let payload = json!({
            "product": {
                "availabilityStatus": "IN_STOCK",
                "deliveryOption": { "available": true },
                "priceInfo": {}
            }
        });
        let product = RawProduct::locate(&payload).unwrap();
        let flags = AvailabilityFlags::from_product(&product);

        assert!(flags.delivery_available);
        assert!(!flags.shipping_available);
        assert_eq!(classify_availability(flags), AvailabilityStatus::InStock);
    }

    #[test]
    fn test_extract_embedded_payload() {
        let html = r#"<html><head></head><body>
            <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"initialData":{"data":{"product":{"usItemId":"1","priceInfo":{"currentPrice":{"price":9.99}}}}}}}}</script>
            </body></html>"#;

        let payload = extract_embedded_payload(html).unwrap();
        let set = normalize_offers(&payload, &aliases(), None);
        assert_eq!(set.offers[0].item_price, Some(dec!(9.99)));
    }

    #[test]
    fn test_extract_embedded_payload_missing_or_broken() {
        assert_eq!(extract_embedded_payload("<html><body>blocked</body></html>"), None);
        assert_eq!(
            extract_embedded_payload(r#"<script id="__NEXT_DATA__">{not json</script>"#),
            None
        );
    }
}
