//! Price-break resolution and BOM pricing.
//!
//! Each BOM line is checked against distributor stock, resolved against the
//! distributor's quantity price breaks (optionally split between reel and cut
//! tape packaging) and collected into a [`PricingReport`].

pub mod availability;
pub mod bom;
pub mod evaluate;
pub mod money;
pub mod packaging;
pub mod report;
#[cfg(feature = "table")]
mod report_table;
pub mod tier;

pub use availability::Availability;
pub use bom::{parse_bom_csv, read_bom_csv, BomColumns, BomError, LineRequirement};
pub use evaluate::{
    ErrorReason, ErrorResult, Evaluator, LineResult, LookupError, PackagingMode, PricedResult,
    ProductInfo, ProductLookup,
};
pub use money::{format_price, format_unit_price, round_price};
pub use packaging::{
    price_split, split_quantity, PackagingKind, PackagingVariant, PriceBreakdown, Quote,
};
pub use report::PricingReport;
pub use tier::{PriceTier, PriceTierTable, PricingError};
