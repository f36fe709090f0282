use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod price;

#[derive(Parser)]
#[command(name = "bomcost")]
#[command(about = "Price a bill of materials against Digi-Key stock and price breaks", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price every line of a BOM
    #[command(alias = "p")]
    Price(price::PriceArgs),

    /// Manage Digi-Key authentication
    Auth(bomcost_digikey::AuthArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug, RUST_LOG still wins
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Price(args) => price::execute(args),
        Commands::Auth(args) => {
            let config = bomcost_digikey::DigikeyConfig::load()?;
            bomcost_digikey::execute_auth(args, &config)
        }
    }
}
