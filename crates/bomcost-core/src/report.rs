use std::fmt;
use std::io::{self, Write as _};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::evaluate::{ErrorResult, LineResult, PricedResult};
use crate::money::{format_price, format_unit_price};

const RULE: &str = "-------------------------------------------------";
const LABEL_WIDTH: usize = 21;

/// Priced and unmatched BOM lines, each section in BOM order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PricingReport {
    pub available: Vec<PricedResult>,
    pub unmatched: Vec<ErrorResult>,
}

impl PricingReport {
    pub fn push(&mut self, result: LineResult) {
        match result {
            LineResult::Priced(priced) => self.available.push(priced),
            LineResult::Error(error) => self.unmatched.push(error),
        }
    }

    /// Number of BOM lines covered by the report
    pub fn line_count(&self) -> usize {
        self.available.len() + self.unmatched.len()
    }

    /// Sum of every priced line
    pub fn total_cost(&self) -> Decimal {
        self.available
            .iter()
            .fold(Decimal::ZERO, |total, p| total.saturating_add(p.total_price))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as fixed-width text blocks
    pub fn write_text<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "{self}")
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PricingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Available Components:")?;
        if self.available.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for priced in &self.available {
            write_priced_block(f, priced)?;
        }

        writeln!(f)?;
        writeln!(f, "Data That Does Not Match:")?;
        if self.unmatched.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for error in &self.unmatched {
            write_error_block(f, error)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Summary: {} priced, {} unmatched, total {}",
            self.available.len(),
            self.unmatched.len(),
            format_price(self.total_cost())
        )
    }
}

impl FromIterator<LineResult> for PricingReport {
    fn from_iter<I: IntoIterator<Item = LineResult>>(iter: I) -> Self {
        let mut report = PricingReport::default();
        for result in iter {
            report.push(result);
        }
        report
    }
}

fn field(f: &mut fmt::Formatter<'_>, label: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "{:<width$}{}", label, value, width = LABEL_WIDTH)
}

fn write_priced_block(writer: &mut fmt::Formatter<'_>, priced: &PricedResult) -> fmt::Result {
    writeln!(writer, "{RULE}")?;
    field(writer, "Stock Code:", &priced.stock_code)?;
    field(writer, "Quantity Required:", priced.required_quantity)?;
    field(writer, "Quantity Available:", priced.available_quantity)?;
    field(writer, "Unit Price:", format_unit_price(priced.unit_price))?;
    field(writer, "Price:", format_price(priced.total_price))?;
    writeln!(writer, "{RULE}")
}

fn write_error_block(writer: &mut fmt::Formatter<'_>, error: &ErrorResult) -> fmt::Result {
    writeln!(writer, "{RULE}")?;
    field(writer, "Stock Code:", &error.stock_code)?;
    field(writer, "Quantity Required:", error.required_quantity)?;
    field(writer, "Quantity Available:", error.available_quantity)?;
    field(writer, "Error:", &error.reason)?;
    writeln!(writer, "{RULE}")
}
