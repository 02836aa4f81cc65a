//! Margin and pricing arithmetic
//!
//! Pure functions over [`Decimal`]. Results are rounded to cents when a
//! [`PricingResult`] is finalized, so the numbers callers format are exactly
//! the numbers that were checked.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::config::PricingConfig;
use crate::models::{
    DisplayPrice, MAX_LISTING_PRICE, MinimumViablePrice, PriceSource, PricingInput, PricingResult, Quote,
    SellerOffer, TrackedProduct, Verdict,
};

/// Profitable listings below this margin are flagged as thin
pub const THIN_MARGIN_PERCENT: Decimal = dec!(15);

const HUNDRED: Decimal = dec!(100);

/// A category whose commission drops below a price break
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFeeTier {
    pub category: String,
    pub low_rate: Decimal,
    pub threshold: Decimal,
}

/// Platform commission table keyed by category and price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub standard_rate: Decimal,
    pub reduced_categories: Vec<CategoryFeeTier>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            standard_rate: dec!(0.15),
            reduced_categories: vec![CategoryFeeTier {
                category: "apparel".to_string(),
                low_rate: dec!(0.05),
                threshold: dec!(15),
            }],
        }
    }
}

impl FeeSchedule {
    /// Commission rate for a sale at `proposed_price`.
    ///
    /// The tier is decided on the price the customer pays, so callers must pass
    /// the price being proposed rather than the competitor's.
    pub fn rate_for(&self, category: Option<&str>, proposed_price: Decimal) -> Decimal {
        let Some(category) = category else {
            return self.standard_rate;
        };

        self.reduced_categories
            .iter()
            .find(|tier| tier.category.eq_ignore_ascii_case(category.trim()))
            .filter(|tier| proposed_price > Decimal::ZERO && proposed_price < tier.threshold)
            .map_or(self.standard_rate, |tier| tier.low_rate)
    }

    /// Every rate `rate_for` can return for this category
    pub fn candidate_rates(&self, category: Option<&str>) -> Vec<Decimal> {
        let mut rates = vec![self.standard_rate];
        if let Some(category) = category {
            rates.extend(
                self.reduced_categories
                    .iter()
                    .filter(|tier| tier.category.eq_ignore_ascii_case(category.trim()))
                    .map(|tier| tier.low_rate),
            );
        }
        rates
    }
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Competitor landed price reduced by the undercut, rounded to cents.
///
/// Zero or negative results are kept; they surface as a `Neutral` verdict.
pub fn undercut_price(competitor_total: Decimal, undercut_percent: Decimal) -> Decimal {
    round_cents(competitor_total * (Decimal::ONE - undercut_percent / HUNDRED))
}

/// Price below the competitor by `undercut_percent` and evaluate the margin.
pub fn compute_proposed_price(input: &PricingInput) -> PricingResult {
    let competitor_total = input.competitor_item_price + input.competitor_shipping_price;
    let proposed_price = undercut_price(competitor_total, input.undercut_percent);

    let platform_fee = round_cents(proposed_price * input.platform_fee_rate);
    let total_fees = platform_fee + round_cents(input.fixed_fees);
    let net_profit = round_cents(proposed_price - input.product_cost - total_fees);
    let margin_percent = if proposed_price > Decimal::ZERO {
        round_cents(net_profit / proposed_price * HUNDRED)
    } else {
        Decimal::ZERO
    };

    PricingResult {
        proposed_price,
        platform_fee,
        total_fees,
        net_profit,
        margin_percent,
        verdict: verdict_for(proposed_price, input.product_cost, net_profit, margin_percent),
    }
}

/// A loss always outranks a thin margin.
fn verdict_for(
    proposed_price: Decimal,
    product_cost: Decimal,
    net_profit: Decimal,
    margin_percent: Decimal,
) -> Verdict {
    if proposed_price <= Decimal::ZERO || product_cost <= Decimal::ZERO {
        Verdict::Neutral
    } else if net_profit < Decimal::ZERO {
        Verdict::Bad
    } else if margin_percent < THIN_MARGIN_PERCENT {
        Verdict::Warning
    } else {
        Verdict::Good
    }
}

/// Lowest price that keeps `target_margin_percent` after fees.
///
/// Rounds up to the cent so the floor never undershoots the margin.
pub fn compute_minimum_viable_price(
    product_cost: Decimal,
    fixed_fees: Decimal,
    platform_fee_rate: Decimal,
    target_margin_percent: Decimal,
) -> MinimumViablePrice {
    let denominator = Decimal::ONE - platform_fee_rate - target_margin_percent / HUNDRED;
    if denominator <= Decimal::ZERO {
        return MinimumViablePrice::NotComputable;
    }

    (product_cost + fixed_fees)
        .checked_div(denominator)
        .map_or(MinimumViablePrice::NotComputable, |price| {
            MinimumViablePrice::Price(price.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity))
        })
}

/// Never propose a price below the minimum viable one.
pub fn select_display_price(
    competitive_price: Decimal,
    minimum_viable_price: MinimumViablePrice,
    product_cost: Decimal,
) -> DisplayPrice {
    match minimum_viable_price {
        MinimumViablePrice::Price(minimum)
            if product_cost > Decimal::ZERO && competitive_price >= minimum =>
        {
            DisplayPrice {
                price: Some(competitive_price),
                source: PriceSource::Competitive,
            }
        }
        _ => DisplayPrice {
            price: minimum_viable_price.price(),
            source: PriceSource::MinimumMargin,
        },
    }
}

/// Runs the full "what should I charge" flow with configured fees.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn quote(
        &self,
        competitor_item_price: Decimal,
        competitor_shipping_price: Decimal,
        undercut_percent: Decimal,
        product_cost: Decimal,
        category: Option<&str>,
    ) -> Quote {
        let proposed = undercut_price(
            competitor_item_price + competitor_shipping_price,
            undercut_percent,
        );
        let fee_rate = self.config.fee_schedule.rate_for(category, proposed);
        let fixed_fees = self.config.fixed_fees();

        let result = compute_proposed_price(&PricingInput {
            competitor_item_price,
            competitor_shipping_price,
            undercut_percent,
            product_cost,
            platform_fee_rate: fee_rate,
            fixed_fees,
        });
        let (minimum, floor_fee_rate) = self.floor_price(product_cost, fixed_fees, category);
        let display = select_display_price(result.proposed_price, minimum, product_cost);

        Quote {
            fee_rate,
            result,
            minimum,
            floor_fee_rate,
            display,
        }
    }

    /// Minimum viable price with the fee tier that applies at that price.
    ///
    /// A floor solved with one rate is only valid if the schedule charges no
    /// more than that rate at the resulting price; the lowest valid floor wins.
    fn floor_price(
        &self,
        product_cost: Decimal,
        fixed_fees: Decimal,
        category: Option<&str>,
    ) -> (MinimumViablePrice, Decimal) {
        let schedule = &self.config.fee_schedule;

        schedule
            .candidate_rates(category)
            .into_iter()
            .filter_map(|rate| {
                let price = compute_minimum_viable_price(
                    product_cost,
                    fixed_fees,
                    rate,
                    self.config.target_margin_percent,
                )
                .price()?;
                let charged = schedule.rate_for(category, price);
                (charged <= rate).then_some((price, charged))
            })
            .min_by_key(|(price, _)| *price)
            .map_or(
                (MinimumViablePrice::NotComputable, schedule.standard_rate),
                |(price, rate)| (MinimumViablePrice::Price(price), rate),
            )
    }

    /// Quote a tracked product against one competing offer. Unknown shipping
    /// counts as free; an offer without an item price, or priced beyond
    /// [`MAX_LISTING_PRICE`], cannot be quoted.
    pub fn quote_against(&self, competitor: &SellerOffer, product: &TrackedProduct) -> Option<Quote> {
        let item_price = competitor.item_price.filter(|p| *p <= MAX_LISTING_PRICE)?;
        if competitor.shipping_price.is_some_and(|p| p > MAX_LISTING_PRICE) {
            return None;
        }

        Some(self.quote(
            item_price,
            competitor.shipping_price.unwrap_or(Decimal::ZERO),
            product.undercut_percent,
            product.product_cost,
            product.category.as_deref(),
        ))
    }
}
