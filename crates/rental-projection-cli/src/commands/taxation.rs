use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use rental_projection_core::taxation::capital_gains::{self, CapitalGainsInput};

use crate::input;

/// Arguments for the capital-gains tax on a property sale
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct CapitalGainsArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Gross gain: sale price minus cost basis (may be negative)
    #[arg(long)]
    pub gain: Option<Decimal>,

    /// Whole years of ownership
    #[arg(long)]
    pub years: Option<u32>,
}

pub fn run_capital_gains(args: CapitalGainsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let gains_input: CapitalGainsInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        CapitalGainsInput {
            gross_gain: args.gain.ok_or("--gain is required (or provide --input)")?,
            holding_years: args.years.ok_or("--years is required (or provide --input)")?,
        }
    };

    let result = capital_gains::calculate_capital_gains_tax(&gains_input)?;
    Ok(serde_json::to_value(result)?)
}
