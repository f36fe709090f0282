use std::io::{self, Write};

use comfy_table::{Cell, CellAlignment, Color, Table};

use crate::money::{format_price, format_unit_price};
use crate::packaging::PriceBreakdown;
use crate::PricingReport;

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);
    table
}

fn number(n: i64) -> Cell {
    Cell::new(n).set_alignment(CellAlignment::Right)
}

impl PricingReport {
    /// Write both report sections as formatted tables
    pub fn write_table<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "Available Components:")?;
        let mut table = new_table();
        table.set_header(vec![
            "Stock Code",
            "Required",
            "Available",
            "Unit Price",
            "Price",
            "Packaging",
        ]);
        for priced in &self.available {
            let packaging = match &priced.breakdown {
                PriceBreakdown::SingleTier { tier } => format!("break {}", tier.break_quantity),
                PriceBreakdown::Split {
                    bulk_quantity,
                    remainder_quantity,
                    ..
                } => format!("{bulk_quantity} reel + {remainder_quantity} cut"),
            };
            table.add_row(vec![
                Cell::new(&priced.stock_code),
                number(priced.required_quantity),
                number(priced.available_quantity),
                Cell::new(format_unit_price(priced.unit_price)).set_alignment(CellAlignment::Right),
                Cell::new(format_price(priced.total_price)).set_alignment(CellAlignment::Right),
                Cell::new(packaging).fg(Color::DarkGrey),
            ]);
        }
        writeln!(writer, "{table}")?;

        writeln!(writer)?;
        writeln!(writer, "Data That Does Not Match:")?;
        let mut table = new_table();
        table.set_header(vec!["Stock Code", "Required", "Available", "Error"]);
        for error in &self.unmatched {
            table.add_row(vec![
                Cell::new(&error.stock_code),
                number(error.required_quantity),
                number(error.available_quantity),
                Cell::new(&error.reason).fg(Color::Red),
            ]);
        }
        writeln!(writer, "{table}")?;

        writeln!(
            writer,
            "Total: {} across {} priced lines",
            format_price(self.total_cost()),
            self.available.len()
        )
    }
}
