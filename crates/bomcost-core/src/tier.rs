use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors raised while pricing against a tier table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("price table has no tiers")]
    MalformedPriceTable,
    #[error("price overflows the decimal range")]
    PriceOverflow,
}

/// Price break: buy at least `break_quantity`, pay `unit_price` each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceTier {
    pub break_quantity: i64,
    pub unit_price: Decimal,
}

impl PriceTier {
    /// Tier used for zero or negative quantities
    pub const NULL: PriceTier = PriceTier {
        break_quantity: 0,
        unit_price: Decimal::ZERO,
    };

    pub fn new(break_quantity: i64, unit_price: Decimal) -> Self {
        Self {
            break_quantity,
            unit_price,
        }
    }
}

/// Price breaks sorted ascending by break quantity.
///
/// Tables are built from one or more raw distributor tables (one per packaging
/// variant) and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTierTable {
    tiers: Vec<PriceTier>,
}

impl PriceTierTable {
    /// Flatten the given tables and sort them by break quantity.
    ///
    /// The sort is stable, so tiers sharing a break quantity keep their input order.
    pub fn build<I, T>(variant_tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = PriceTier>,
    {
        let mut tiers: Vec<PriceTier> = variant_tables.into_iter().flatten().collect();
        tiers.sort_by_key(|tier| tier.break_quantity);
        Self { tiers }
    }

    /// Merge already built tables into one
    pub fn merge(tables: &[&PriceTierTable]) -> Self {
        Self::build(tables.iter().map(|table| table.tiers.iter().copied()))
    }

    pub fn tiers(&self) -> &[PriceTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Smallest quantity the table has a break for
    pub fn lowest_break(&self) -> Option<i64> {
        self.tiers.first().map(|tier| tier.break_quantity)
    }

    /// True when some break is reachable at `quantity`
    pub fn covers(&self, quantity: i64) -> bool {
        self.lowest_break().is_some_and(|lowest| lowest <= quantity)
    }

    /// Find the tier that applies to `quantity`.
    ///
    /// Non-positive quantities are free and resolve to [`PriceTier::NULL`].
    /// Otherwise the highest break not exceeding `quantity` wins, so a quantity
    /// sitting exactly on a break gets that break's price. When every break is
    /// above `quantity` the lowest tier applies.
    pub fn resolve(&self, quantity: i64) -> Result<PriceTier, PricingError> {
        if quantity <= 0 {
            return Ok(PriceTier::NULL);
        }

        let lowest = self
            .tiers
            .first()
            .copied()
            .ok_or(PricingError::MalformedPriceTable)?;

        let applicable = self
            .tiers
            .partition_point(|tier| tier.break_quantity <= quantity);

        Ok(match applicable {
            0 => lowest,
            n => self.tiers[n - 1],
        })
    }

    /// True when break quantities are unique and unit prices never rise with quantity
    pub fn is_well_formed(&self) -> bool {
        self.tiers.windows(2).all(|pair| {
            pair[0].break_quantity < pair[1].break_quantity
                && pair[1].unit_price <= pair[0].unit_price
        })
    }
}

impl FromIterator<PriceTier> for PriceTierTable {
    fn from_iter<I: IntoIterator<Item = PriceTier>>(iter: I) -> Self {
        Self::build([iter.into_iter().collect::<Vec<_>>()])
    }
}
