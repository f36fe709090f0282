use rust_decimal::{Decimal, RoundingStrategy};

/// Round a currency amount to cents, halves away from zero
pub fn round_price(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round an effective unit price (used for blended split pricing)
pub fn round_unit_price(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Format a price value for display (always 2 decimal places)
pub fn format_price(price: Decimal) -> String {
    format!("${:.2}", round_price(price))
}

/// Format a unit price, keeping sub-cent precision when the distributor quotes it
pub fn format_unit_price(price: Decimal) -> String {
    let normalized = price.normalize();
    if normalized.scale() <= 2 {
        format_price(normalized)
    } else {
        format!("${normalized}")
    }
}
