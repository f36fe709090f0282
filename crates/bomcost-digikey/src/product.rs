use std::time::Duration;

use anyhow::Result;
use bomcost_core::{
    LookupError, PackagingKind, PackagingVariant, PriceTier, PriceTierTable, ProductInfo,
    ProductLookup,
};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::DigikeyConfig;
use crate::retry::{parse_retry_after, RetryPolicy};

/// Price break structure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PriceBreak {
    pub break_quantity: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageType {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

/// One packaging of a product (cut tape, tape & reel, Digi-Reel, ...)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductVariation {
    #[serde(default)]
    pub digi_key_product_number: Option<String>,
    #[serde(default)]
    pub package_type: Option<PackageType>,
    #[serde(default)]
    pub standard_pricing: Vec<PriceBreak>,
    #[serde(default)]
    pub standard_package: Option<i64>,
    #[serde(rename = "QuantityAvailableforPackageType", default)]
    pub quantity_available_for_package_type: Option<i64>,
    #[serde(default)]
    pub minimum_order_quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    #[serde(default)]
    pub manufacturer_product_number: Option<String>,
    #[serde(default)]
    pub quantity_available: i64,
    #[serde(default)]
    pub product_variations: Vec<ProductVariation>,
}

/// Response from the product details endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductDetailsResponse {
    pub product: Product,
}

/// Classify a Digi-Key package type name
pub fn packaging_kind(name: &str) -> PackagingKind {
    let lower = name.to_ascii_lowercase();
    if lower.contains("tape & reel") || lower.contains("(tr)") {
        PackagingKind::TapeAndReel
    } else if lower.contains("cut tape") || lower.contains("(ct)") {
        PackagingKind::CutTape
    } else {
        PackagingKind::Other
    }
}

impl ProductVariation {
    fn matches(&self, stock_code: &str) -> bool {
        self.digi_key_product_number
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(stock_code))
    }

    /// Smallest quantity this packaging is sold in; unpriced variations sort last
    fn lowest_break(&self) -> i64 {
        self.standard_pricing
            .iter()
            .map(|pb| pb.break_quantity)
            .min()
            .unwrap_or(i64::MAX)
    }

    fn to_variant(&self) -> PackagingVariant {
        let name = self
            .package_type
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        PackagingVariant {
            kind: packaging_kind(&name),
            name,
            tiers: self
                .standard_pricing
                .iter()
                .map(|pb| PriceTier::new(pb.break_quantity, pb.unit_price))
                .collect::<PriceTierTable>(),
            available_quantity: self.quantity_available_for_package_type.unwrap_or(0),
            standard_package: self.standard_package.filter(|&n| n > 0),
        }
    }
}

impl Product {
    /// Convert to the pricing model.
    ///
    /// The variation whose Digi-Key number matches `stock_code` is listed first,
    /// so single-table pricing uses the packaging that was actually requested.
    /// The rest (all of them when the BOM names a manufacturer part number)
    /// follow by smallest price break, putting cut tape ahead of full reels.
    pub fn to_product_info(&self, stock_code: &str) -> ProductInfo {
        let mut variations: Vec<&ProductVariation> = self.product_variations.iter().collect();
        variations.sort_by_key(|v| (!v.matches(stock_code), v.lowest_break()));

        ProductInfo {
            available_quantity: self.quantity_available,
            variants: variations.into_iter().map(ProductVariation::to_variant).collect(),
        }
    }
}

/// Blocking Digi-Key product information client
pub struct DigikeyClient {
    http: Client,
    config: DigikeyConfig,
    access_token: String,
    retry: RetryPolicy,
}

impl DigikeyClient {
    pub fn new(config: DigikeyConfig, access_token: String) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            config,
            access_token,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn product_details_url(&self, stock_code: &str) -> String {
        format!(
            "{}/products/v4/search/{}/productdetails",
            self.config.api_base_url,
            urlencoding::encode(stock_code)
        )
    }

    fn send(&self, url: &str) -> reqwest::Result<Response> {
        self.http
            .get(url)
            .bearer_auth(&self.access_token)
            .header("X-DIGIKEY-Client-Id", &self.config.client_id)
            .header("X-DIGIKEY-Locale-Currency", &self.config.locale_currency)
            .header("X-DIGIKEY-Locale-Site", &self.config.locale_site)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
    }

    /// Fetch product details, retrying throttled and server-side failures
    pub fn product_details(&self, stock_code: &str) -> Result<Product, LookupError> {
        let url = self.product_details_url(stock_code);
        let mut attempt = 0;

        loop {
            let (message, retry_after) = match self.send(&url) {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<ProductDetailsResponse>()
                            .map(|details| details.product)
                            .map_err(|e| {
                                LookupError::Failed(format!("Failed to parse product details: {e}"))
                            });
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(LookupError::NotFound);
                    }

                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after);
                    let body = response.text().unwrap_or_default();
                    let message = format!("Product request failed ({status}): {}", body.trim());

                    if !is_retryable(status) {
                        return Err(LookupError::Failed(message));
                    }
                    (message, retry_after)
                }
                Err(e) => (format!("Failed to send product request: {e}"), None),
            };

            if !self.retry.should_retry(attempt) {
                return Err(LookupError::Failed(message));
            }
            attempt += 1;

            let Some(delay) = self.retry.delay_with_retry_after(attempt, retry_after) else {
                return Err(LookupError::Failed(format!(
                    "{message} (Retry-After exceeds {:?})",
                    self.retry.max_delay
                )));
            };
            log::debug!("{stock_code}: {message}; retry {attempt} in {delay:?}");
            std::thread::sleep(delay);
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl ProductLookup for DigikeyClient {
    fn find(&self, stock_code: &str, required_quantity: i64) -> Result<ProductInfo, LookupError> {
        log::debug!("Looking up {stock_code} (qty {required_quantity})");
        let product = self.product_details(stock_code)?;
        Ok(product.to_product_info(stock_code))
    }
}
