use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bomcost_core::{
    read_bom_csv, BomColumns, Evaluator, LineRequirement, LineResult, PackagingMode,
    PricingReport, ProductLookup,
};
use bomcost_digikey::DigikeyConfig;
use clap::{Args, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Table,
    Json,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Table => write!(f, "table"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum Packaging {
    /// Use the price breaks of the requested part number only
    #[default]
    Single,
    /// Buy whole reels where possible and the remainder as cut tape
    Split,
}

impl std::fmt::Display for Packaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Packaging::Single => write!(f, "single"),
            Packaging::Split => write!(f, "split"),
        }
    }
}

impl From<Packaging> for PackagingMode {
    fn from(packaging: Packaging) -> Self {
        match packaging {
            Packaging::Single => PackagingMode::Single,
            Packaging::Split => PackagingMode::Split,
        }
    }
}

#[derive(Args, Debug, Clone)]
#[command(about = "Price a BOM CSV against Digi-Key stock and price breaks")]
pub struct PriceArgs {
    /// BOM CSV file (the first row is a header)
    #[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Number of boards to build; every BOM quantity is multiplied by this
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
    pub boards: i64,

    /// Output format
    #[arg(short, long, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Report file, or "-" to only print to stdout
    #[arg(short, long, default_value = "pricing_report.txt")]
    pub output: PathBuf,

    /// How packaging variants are priced
    #[arg(long, default_value_t = Packaging::Single)]
    pub packaging: Packaging,

    /// Number of lookups to run in parallel
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Zero-based column holding the per-board quantity
    #[arg(long, default_value_t = 1)]
    pub quantity_column: usize,

    /// Zero-based column holding the Digi-Key stock code
    #[arg(long, default_value_t = 4)]
    pub stock_code_column: usize,
}

pub fn execute(args: PriceArgs) -> Result<()> {
    let columns = BomColumns {
        quantity: args.quantity_column,
        stock_code: args.stock_code_column,
    };
    let lines = read_bom_csv(&args.file, columns, args.boards)
        .with_context(|| format!("Failed to read BOM {}", args.file.display()))?;
    if lines.is_empty() {
        log::warn!("{} has no BOM lines", args.file.display());
    }

    let config = DigikeyConfig::load()?;
    log::debug!("Using Digi-Key API at {}", config.api_base_url);
    let client = bomcost_digikey::connect(config).context("Failed to connect to Digi-Key")?;

    let report = price_lines(&client, &lines, args.packaging.into(), args.jobs)?;
    let rendered = render(&report, args.format)?;

    if args.output != Path::new("-") {
        fs::write(&args.output, &rendered)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
    }

    let mut stdout = io::stdout().lock();
    write!(stdout, "{rendered}")?;
    stdout.flush()?;

    if args.output != Path::new("-") {
        eprintln!(
            "{} Report written to {}",
            "✓".green(),
            args.output.display()
        );
    }
    Ok(())
}

fn price_lines<L: ProductLookup + Sync>(
    lookup: &L,
    lines: &[LineRequirement],
    packaging: PackagingMode,
    jobs: usize,
) -> Result<PricingReport> {
    let bar = ProgressBar::new(lines.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} Pricing [{pos}/{len}] {msg}",
    )?);
    bar.enable_steady_tick(Duration::from_millis(100));

    let progress = |result: &LineResult| {
        bar.set_message(result.stock_code().to_string());
        bar.inc(1);
    };

    let evaluator = Evaluator::new(lookup, packaging);
    let report = if jobs > 1 {
        evaluator
            .evaluate_all_parallel(lines, jobs, progress)
            .context("Failed to start worker threads")?
    } else {
        evaluator.evaluate_all_with(lines, progress)
    };

    bar.finish_and_clear();
    Ok(report)
}

fn render(report: &PricingReport, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => report.to_text(),
        ReportFormat::Table => {
            let mut buf = Vec::new();
            report.write_table(&mut buf)?;
            String::from_utf8(buf)?
        }
        ReportFormat::Json => {
            let mut json = report.to_json()?;
            json.push('\n');
            json
        }
    })
}
