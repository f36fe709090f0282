use serde::Serialize;

/// Stock classification for a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Fulfillable,
    OutOfStock,
    Insufficient,
}

impl Availability {
    /// Compare the required quantity against reported stock
    pub fn check(required: i64, available: i64) -> Self {
        if available <= 0 {
            Availability::OutOfStock
        } else if available < required {
            Availability::Insufficient
        } else {
            Availability::Fulfillable
        }
    }

    #[inline]
    pub fn is_fulfillable(self) -> bool {
        self == Availability::Fulfillable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        assert_eq!(Availability::check(10, 0), Availability::OutOfStock);
        assert_eq!(Availability::check(10, 5), Availability::Insufficient);
        assert_eq!(Availability::check(10, 10), Availability::Fulfillable);
        assert_eq!(Availability::check(10, 5000), Availability::Fulfillable);
    }

    #[test]
    fn test_negative_stock_is_out_of_stock() {
        assert_eq!(Availability::check(1, -3), Availability::OutOfStock);
    }
}
