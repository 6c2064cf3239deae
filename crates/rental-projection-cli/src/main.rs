mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::financing::AmortizeArgs;
use commands::projection::ProjectArgs;
use commands::taxation::CapitalGainsArgs;

/// Leveraged furnished-rental investment projections
#[derive(Parser)]
#[command(
    name = "rpx",
    version,
    about = "Leveraged furnished-rental investment projections",
    long_about = "Projects the year-by-year outcome of a leveraged furnished-rental \
                  investment with decimal precision: loan amortization, depreciation, \
                  tax-loss carryforward, company treasury and dividends, simulated \
                  resale and internal rate of return."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full multi-year projection
    Project(ProjectArgs),
    /// Build a loan amortization schedule
    Amortize(AmortizeArgs),
    /// Compute the tax on a real-estate capital gain
    CapitalGains(CapitalGainsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Project(args) => commands::projection::run_project(args),
        Commands::Amortize(args) => commands::financing::run_amortize(args),
        Commands::CapitalGains(args) => commands::taxation::run_capital_gains(args),
        Commands::Version => {
            println!("rpx {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
