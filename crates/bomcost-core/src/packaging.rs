use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{round_price, round_unit_price};
use crate::tier::{PriceTier, PriceTierTable, PricingError};

/// How a distributor stocks a packaging variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingKind {
    /// Full reels, sold only in multiples of the standard package
    TapeAndReel,
    /// Cut strips, sold in any quantity
    CutTape,
    Other,
}

/// A distinct stocking unit of a product with its own price breaks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingVariant {
    pub kind: PackagingKind,
    pub name: String,
    pub tiers: PriceTierTable,
    pub available_quantity: i64,
    /// Unit the variant is sold in (e.g. reel size)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_package: Option<i64>,
}

/// How a line price was put together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceBreakdown {
    SingleTier {
        tier: PriceTier,
    },
    Split {
        bulk_quantity: i64,
        bulk_tier: PriceTier,
        remainder_quantity: i64,
        remainder_tier: PriceTier,
    },
}

/// Priced quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub total_price: Decimal,
    pub unit_price: Decimal,
    pub breakdown: PriceBreakdown,
}

impl Quote {
    /// Price the full quantity at the single tier it resolves to
    pub fn single(quantity: i64, table: &PriceTierTable) -> Result<Self, PricingError> {
        let tier = table.resolve(quantity)?;
        Self::at_tier(quantity, tier)
    }

    fn at_tier(quantity: i64, tier: PriceTier) -> Result<Self, PricingError> {
        Ok(Self {
            total_price: extended_price(tier, quantity.max(0))?,
            unit_price: tier.unit_price,
            breakdown: PriceBreakdown::SingleTier { tier },
        })
    }
}

/// `quantity` units at `tier`, rounded to cents
fn extended_price(tier: PriceTier, quantity: i64) -> Result<Decimal, PricingError> {
    tier.unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_price)
        .ok_or(PricingError::PriceOverflow)
}

/// Split `quantity` into a whole number of bulk units plus what is left over.
///
/// A non-positive `bulk_unit` means there is no bulk packaging, so everything
/// is remainder.
pub fn split_quantity(quantity: i64, bulk_unit: i64) -> (i64, i64) {
    if bulk_unit <= 0 {
        return (0, quantity);
    }
    let remainder = quantity.rem_euclid(bulk_unit);
    (quantity - remainder, remainder)
}

/// Price `quantity` across bulk packaging and a loose remainder.
///
/// The bulk tier is resolved for the full order quantity, since the whole order
/// can unlock a better reel rate even though only whole reels are billed at it.
/// The remainder is priced on its own. When a single bulk unit is larger than
/// the order, both tables are merged and priced as one.
pub fn price_split(
    quantity: i64,
    bulk_table: &PriceTierTable,
    bulk_unit: i64,
    remainder_table: &PriceTierTable,
) -> Result<Quote, PricingError> {
    if bulk_unit <= 0 || bulk_unit > quantity {
        let merged = PriceTierTable::merge(&[bulk_table, remainder_table]);
        return Quote::single(quantity, &merged);
    }

    let (bulk_quantity, remainder_quantity) = split_quantity(quantity, bulk_unit);
    let bulk_tier = bulk_table.resolve(quantity)?;

    if remainder_quantity == 0 {
        return Quote::at_tier(quantity, bulk_tier);
    }

    let remainder_tier = remainder_table.resolve(remainder_quantity)?;

    let bulk_total = extended_price(bulk_tier, bulk_quantity)?;
    let remainder_total = extended_price(remainder_tier, remainder_quantity)?;
    let total_price = bulk_total
        .checked_add(remainder_total)
        .map(round_price)
        .ok_or(PricingError::PriceOverflow)?;

    log::debug!(
        "Split {quantity}: {bulk_quantity} bulk @ {} + {remainder_quantity} loose @ {}",
        bulk_tier.unit_price,
        remainder_tier.unit_price
    );

    Ok(Quote {
        total_price,
        unit_price: round_unit_price(total_price / Decimal::from(quantity)),
        breakdown: PriceBreakdown::Split {
            bulk_quantity,
            bulk_tier,
            remainder_quantity,
            remainder_tier,
        },
    })
}
