use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::availability::Availability;
use crate::bom::LineRequirement;
use crate::packaging::{price_split, PackagingKind, PackagingVariant, PriceBreakdown, Quote};
use crate::report::PricingReport;
use crate::tier::{PriceTierTable, PricingError};

/// Why a distributor lookup did not produce product data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("stock code not found")]
    NotFound,
    #[error("{0}")]
    Failed(String),
}

/// Availability and pricing for one stock code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub available_quantity: i64,
    pub variants: Vec<PackagingVariant>,
}

impl ProductInfo {
    /// First variant of the given kind
    pub fn variant(&self, kind: PackagingKind) -> Option<&PackagingVariant> {
        self.variants.iter().find(|v| v.kind == kind)
    }

    /// Every variant's price breaks in one table
    pub fn merged_tiers(&self) -> PriceTierTable {
        let tables: Vec<&PriceTierTable> = self.variants.iter().map(|v| &v.tiers).collect();
        PriceTierTable::merge(&tables)
    }
}

/// Source of product availability and price breaks
pub trait ProductLookup {
    fn find(&self, stock_code: &str, required_quantity: i64) -> Result<ProductInfo, LookupError>;
}

/// How packaging variants feed into pricing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PackagingMode {
    /// Price against the product's primary price table
    #[default]
    Single,
    /// Bill whole reels at reel pricing and the rest as cut tape
    Split,
}

/// Why a line could not be priced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ErrorReason {
    #[error("Stock code not recognised")]
    UnknownStockCode,
    #[error("Out of stock")]
    OutOfStock,
    #[error("Quantity required not available")]
    InsufficientQuantity,
    #[error("Lookup failed: {0}")]
    LookupFailed(String),
    #[error("Distributor returned no price breaks")]
    MalformedPriceTable,
    #[error("Price too large to compute")]
    PriceOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedResult {
    pub stock_code: String,
    pub required_quantity: i64,
    pub available_quantity: i64,
    pub total_price: Decimal,
    pub unit_price: Decimal,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub stock_code: String,
    pub required_quantity: i64,
    pub available_quantity: i64,
    pub reason: ErrorReason,
}

/// Outcome of evaluating one BOM line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LineResult {
    Priced(PricedResult),
    Error(ErrorResult),
}

impl LineResult {
    fn error(line: &LineRequirement, available_quantity: i64, reason: ErrorReason) -> Self {
        LineResult::Error(ErrorResult {
            stock_code: line.stock_code.clone(),
            required_quantity: line.required_quantity,
            available_quantity,
            reason,
        })
    }

    pub fn stock_code(&self) -> &str {
        match self {
            LineResult::Priced(priced) => &priced.stock_code,
            LineResult::Error(error) => &error.stock_code,
        }
    }
}

/// Prices BOM lines against a [`ProductLookup`]
pub struct Evaluator<'a, L: ?Sized> {
    lookup: &'a L,
    packaging: PackagingMode,
}

impl<'a, L: ProductLookup + ?Sized> Evaluator<'a, L> {
    pub fn new(lookup: &'a L, packaging: PackagingMode) -> Self {
        Self { lookup, packaging }
    }

    /// Evaluate one line. Every failure becomes an [`ErrorResult`].
    pub fn evaluate(&self, line: &LineRequirement) -> LineResult {
        let product = match self.lookup.find(&line.stock_code, line.required_quantity) {
            Ok(product) => product,
            Err(LookupError::NotFound) => {
                log::info!("{}: unknown stock code", line.stock_code);
                return LineResult::error(line, 0, ErrorReason::UnknownStockCode);
            }
            Err(LookupError::Failed(message)) => {
                log::warn!("{}: lookup failed: {message}", line.stock_code);
                return LineResult::error(line, 0, ErrorReason::LookupFailed(message));
            }
        };

        let available = product.available_quantity;
        match Availability::check(line.required_quantity, available) {
            Availability::OutOfStock => {
                return LineResult::error(line, available, ErrorReason::OutOfStock);
            }
            Availability::Insufficient => {
                return LineResult::error(line, available, ErrorReason::InsufficientQuantity);
            }
            Availability::Fulfillable => {}
        }

        match self.quote(line.required_quantity, &product) {
            Ok(quote) => LineResult::Priced(PricedResult {
                stock_code: line.stock_code.clone(),
                required_quantity: line.required_quantity,
                available_quantity: available,
                total_price: quote.total_price,
                unit_price: quote.unit_price,
                breakdown: quote.breakdown,
            }),
            Err(PricingError::MalformedPriceTable) => {
                log::warn!(
                    "{}: distributor reported stock but no price breaks ({} packaging variants)",
                    line.stock_code,
                    product.variants.len()
                );
                LineResult::error(line, available, ErrorReason::MalformedPriceTable)
            }
            Err(PricingError::PriceOverflow) => {
                log::warn!(
                    "{}: price for {} units overflows",
                    line.stock_code,
                    line.required_quantity
                );
                LineResult::error(line, available, ErrorReason::PriceOverflow)
            }
        }
    }

    fn quote(&self, quantity: i64, product: &ProductInfo) -> Result<Quote, PricingError> {
        match self.packaging {
            PackagingMode::Single => {
                let primary = product
                    .variants
                    .first()
                    .ok_or(PricingError::MalformedPriceTable)?;
                if quantity <= 0 || primary.tiers.covers(quantity) {
                    return Quote::single(quantity, &primary.tiers);
                }
                // Below the primary packaging's minimum; price whatever packaging is sold at this quantity
                log::debug!(
                    "{quantity} is below the {} minimum, using all packaging variants",
                    primary.name
                );
                Quote::single(quantity, &product.merged_tiers())
            }
            PackagingMode::Split => {
                let reel = product
                    .variant(PackagingKind::TapeAndReel)
                    .and_then(|v| v.standard_package.map(|unit| (v, unit)));
                let cut = product.variant(PackagingKind::CutTape);

                match (reel, cut) {
                    (Some((reel, bulk_unit)), Some(cut)) => {
                        price_split(quantity, &reel.tiers, bulk_unit, &cut.tiers)
                    }
                    _ => Quote::single(quantity, &product.merged_tiers()),
                }
            }
        }
    }

    /// Evaluate lines one after another, in BOM order
    pub fn evaluate_all(&self, lines: &[LineRequirement]) -> PricingReport {
        self.evaluate_all_with(lines, |_| {})
    }

    /// Like [`Evaluator::evaluate_all`], calling `progress` after each line
    pub fn evaluate_all_with(
        &self,
        lines: &[LineRequirement],
        progress: impl Fn(&LineResult),
    ) -> PricingReport {
        lines
            .iter()
            .map(|line| {
                let result = self.evaluate(line);
                progress(&result);
                result
            })
            .collect()
    }
}

impl<L: ProductLookup + Sync + ?Sized> Evaluator<'_, L> {
    /// Evaluate lines on `jobs` threads. The report keeps BOM order.
    pub fn evaluate_all_parallel(
        &self,
        lines: &[LineRequirement],
        jobs: usize,
        progress: impl Fn(&LineResult) + Sync,
    ) -> Result<PricingReport, rayon::ThreadPoolBuildError> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        let results: Vec<LineResult> = pool.install(|| {
            lines
                .par_iter()
                .map(|line| {
                    let result = self.evaluate(line);
                    progress(&result);
                    result
                })
                .collect()
        });

        Ok(results.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::PriceTier;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeLookup {
        products: HashMap<String, Result<ProductInfo, LookupError>>,
    }

    impl FakeLookup {
        fn with(mut self, code: &str, result: Result<ProductInfo, LookupError>) -> Self {
            self.products.insert(code.to_string(), result);
            self
        }
    }

    impl ProductLookup for FakeLookup {
        fn find(&self, stock_code: &str, _: i64) -> Result<ProductInfo, LookupError> {
            self.products
                .get(stock_code)
                .cloned()
                .unwrap_or(Err(LookupError::NotFound))
        }
    }

    fn variant(
        kind: PackagingKind,
        tiers: &[(i64, Decimal)],
        standard_package: Option<i64>,
    ) -> PackagingVariant {
        PackagingVariant {
            kind,
            name: format!("{kind:?}"),
            tiers: tiers
                .iter()
                .map(|&(qty, price)| PriceTier::new(qty, price))
                .collect(),
            available_quantity: 10_000,
            standard_package,
        }
    }

    fn single_product(available: i64) -> ProductInfo {
        ProductInfo {
            available_quantity: available,
            variants: vec![variant(
                PackagingKind::CutTape,
                &[(0, dec!(1.00)), (10, dec!(0.90)), (100, dec!(0.75))],
                None,
            )],
        }
    }

    fn reeled_product() -> ProductInfo {
        ProductInfo {
            available_quantity: 10_000,
            variants: vec![
                variant(PackagingKind::CutTape, &[(1, dec!(0.80)), (50, dec!(0.70))], Some(1)),
                variant(PackagingKind::TapeAndReel, &[(100, dec!(0.50))], Some(100)),
            ],
        }
    }

    fn line(code: &str, qty: i64) -> LineRequirement {
        LineRequirement {
            stock_code: code.to_string(),
            required_quantity: qty,
        }
    }

    #[test]
    fn test_evaluate_priced() {
        let lookup = FakeLookup::default().with("R1", Ok(single_product(500)));
        let result = Evaluator::new(&lookup, PackagingMode::Single).evaluate(&line("R1", 10));

        let LineResult::Priced(priced) = result else {
            panic!("expected priced result");
        };
        assert_eq!(priced.unit_price, dec!(0.90));
        assert_eq!(priced.total_price, dec!(9.00));
        assert_eq!(priced.available_quantity, 500);
    }

    #[test]
    fn test_evaluate_insufficient() {
        let lookup = FakeLookup::default().with("R1", Ok(single_product(5)));
        let result = Evaluator::new(&lookup, PackagingMode::Single).evaluate(&line("R1", 10));

        assert_eq!(
            result,
            LineResult::Error(ErrorResult {
                stock_code: "R1".to_string(),
                required_quantity: 10,
                available_quantity: 5,
                reason: ErrorReason::InsufficientQuantity,
            })
        );
    }

    #[test]
    fn test_evaluate_out_of_stock() {
        let lookup = FakeLookup::default().with("R1", Ok(single_product(0)));
        let result = Evaluator::new(&lookup, PackagingMode::Single).evaluate(&line("R1", 1));

        let LineResult::Error(error) = result else {
            panic!("expected error");
        };
        assert_eq!(error.reason, ErrorReason::OutOfStock);
    }

    #[test]
    fn test_evaluate_unknown_and_failed_lookup() {
        let lookup = FakeLookup::default().with(
            "BAD",
            Err(LookupError::Failed("HTTP 503 Service Unavailable".to_string())),
        );
        let evaluator = Evaluator::new(&lookup, PackagingMode::Single);

        let LineResult::Error(unknown) = evaluator.evaluate(&line("NOPE", 3)) else {
            panic!("expected error");
        };
        assert_eq!(unknown.reason, ErrorReason::UnknownStockCode);
        assert_eq!(unknown.available_quantity, 0);

        let LineResult::Error(failed) = evaluator.evaluate(&line("BAD", 3)) else {
            panic!("expected error");
        };
        assert_eq!(
            failed.reason.to_string(),
            "Lookup failed: HTTP 503 Service Unavailable"
        );
    }

    #[test]
    fn test_evaluate_missing_price_table() {
        let product = ProductInfo {
            available_quantity: 100,
            variants: vec![variant(PackagingKind::CutTape, &[], None)],
        };
        let lookup = FakeLookup::default()
            .with("EMPTY", Ok(product))
            .with(
                "NOVARIANTS",
                Ok(ProductInfo {
                    available_quantity: 100,
                    variants: Vec::new(),
                }),
            );
        let evaluator = Evaluator::new(&lookup, PackagingMode::Single);

        for code in ["EMPTY", "NOVARIANTS"] {
            let LineResult::Error(error) = evaluator.evaluate(&line(code, 3)) else {
                panic!("expected error for {code}");
            };
            assert_eq!(error.reason, ErrorReason::MalformedPriceTable);
            assert_eq!(error.available_quantity, 100);
        }
    }

    #[test]
    fn test_evaluate_split_packaging() {
        let lookup = FakeLookup::default().with("C1", Ok(reeled_product()));

        let split = Evaluator::new(&lookup, PackagingMode::Split).evaluate(&line("C1", 250));
        let LineResult::Priced(priced) = split else {
            panic!("expected priced");
        };
        assert_eq!(priced.total_price, dec!(135.00));

        // Single mode only looks at the primary (first) variant
        let single = Evaluator::new(&lookup, PackagingMode::Single).evaluate(&line("C1", 250));
        let LineResult::Priced(priced) = single else {
            panic!("expected priced");
        };
        assert_eq!(priced.total_price, dec!(175.00));
    }

    #[test]
    fn test_evaluate_split_without_reel_merges_variants() {
        let product = ProductInfo {
            available_quantity: 1000,
            variants: vec![
                variant(PackagingKind::CutTape, &[(1, dec!(0.80))], None),
                variant(PackagingKind::Other, &[(100, dec!(0.60))], None),
            ],
        };
        let lookup = FakeLookup::default().with("C2", Ok(product));
        let LineResult::Priced(priced) =
            Evaluator::new(&lookup, PackagingMode::Split).evaluate(&line("C2", 100))
        else {
            panic!("expected priced");
        };
        assert_eq!(priced.total_price, dec!(60.00));
    }

    #[test]
    fn test_evaluate_single_below_reel_minimum_uses_cut_tape() {
        let product = ProductInfo {
            available_quantity: 12_000,
            variants: vec![
                variant(PackagingKind::TapeAndReel, &[(4000, dec!(0.0095))], Some(4000)),
                variant(PackagingKind::CutTape, &[(1, dec!(0.10)), (10, dec!(0.04))], Some(1)),
            ],
        };
        let lookup = FakeLookup::default().with("TR-ND", Ok(product));
        let evaluator = Evaluator::new(&lookup, PackagingMode::Single);

        let LineResult::Priced(small) = evaluator.evaluate(&line("TR-ND", 10)) else {
            panic!("expected priced");
        };
        assert_eq!(small.unit_price, dec!(0.04));
        assert_eq!(small.total_price, dec!(0.40));

        // A full reel stays on the reel table
        let LineResult::Priced(reel) = evaluator.evaluate(&line("TR-ND", 4000)) else {
            panic!("expected priced");
        };
        assert_eq!(reel.unit_price, dec!(0.0095));
        assert_eq!(reel.total_price, dec!(38.00));
    }

    #[test]
    fn test_evaluate_price_overflow_is_per_line() {
        let product = ProductInfo {
            available_quantity: 100,
            variants: vec![variant(PackagingKind::CutTape, &[(1, Decimal::MAX)], None)],
        };
        let lookup = FakeLookup::default()
            .with("HUGE", Ok(product))
            .with("OK", Ok(single_product(100)));
        let report = Evaluator::new(&lookup, PackagingMode::Single)
            .evaluate_all(&[line("HUGE", 5), line("OK", 5)]);

        assert_eq!(report.available.len(), 1);
        assert_eq!(report.unmatched[0].reason, ErrorReason::PriceOverflow);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let lookup = FakeLookup::default().with("C1", Ok(reeled_product()));
        let evaluator = Evaluator::new(&lookup, PackagingMode::Split);
        let requirement = line("C1", 1234);
        assert_eq!(evaluator.evaluate(&requirement), evaluator.evaluate(&requirement));
    }

    #[test]
    fn test_evaluate_all_keeps_every_line_once() {
        let lookup = FakeLookup::default()
            .with("A", Ok(single_product(500)))
            .with("B", Ok(single_product(1)))
            .with("C", Ok(single_product(500)));
        let lines = vec![line("A", 5), line("B", 5), line("X", 5), line("C", 50)];
        let evaluator = Evaluator::new(&lookup, PackagingMode::Single);

        let sequential = evaluator.evaluate_all(&lines);
        let seen = AtomicUsize::new(0);
        let parallel = evaluator
            .evaluate_all_parallel(&lines, 4, |_| {
                seen.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(seen.load(Ordering::Relaxed), lines.len());
        assert_eq!(sequential.line_count(), lines.len());
        let priced: Vec<&str> = sequential.available.iter().map(|p| p.stock_code.as_str()).collect();
        let errors: Vec<&str> = sequential.unmatched.iter().map(|e| e.stock_code.as_str()).collect();
        assert_eq!(priced, vec!["A", "C"]);
        assert_eq!(errors, vec!["B", "X"]);
    }
}
