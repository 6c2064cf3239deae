use clap::{Args, ValueEnum};
use serde_json::Value;

use rental_projection_core::projection::{
    run_projection, CapitalGainBasis, CashFlowPolicy, ProjectionInput,
};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Property held directly by the investor
    Direct,
    /// Property held by a company with its own treasury
    Corporate,
}

impl From<PolicyArg> for CashFlowPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Direct => CashFlowPolicy::Direct,
            PolicyArg::Corporate => CashFlowPolicy::CorporateTreasury,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GainBasisArg {
    /// Price + renovation + notary fees
    Acquisition,
    /// Acquisition cost minus cumulative depreciation
    BookValue,
}

impl From<GainBasisArg> for CapitalGainBasis {
    fn from(arg: GainBasisArg) -> Self {
        match arg {
            GainBasisArg::Acquisition => CapitalGainBasis::AcquisitionCost,
            GainBasisArg::BookValue => CapitalGainBasis::NetBookValue,
        }
    }
}

/// Arguments for the full projection
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ProjectArgs {
    /// Path to a JSON or YAML projection document
    #[arg(long)]
    pub input: Option<String>,

    /// Override one parameter, e.g. --set monthly_rent=950 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Cash-flow policy (overrides the document)
    #[arg(long)]
    pub policy: Option<PolicyArg>,

    /// Capital-gain cost basis (overrides the document)
    #[arg(long)]
    pub gain_basis: Option<GainBasisArg>,
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut projection_input: ProjectionInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else if !args.overrides.is_empty() {
        ProjectionInput::default()
    } else {
        return Err("--input <file>, stdin or --set key=value required for a projection".into());
    };

    apply_overrides(&mut projection_input, &args.overrides)?;
    if let Some(policy) = args.policy {
        projection_input.config.cash_flow_policy = policy.into();
    }
    if let Some(basis) = args.gain_basis {
        projection_input.config.capital_gain_basis = basis.into();
    }

    let result = run_projection(&projection_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Apply `key=value` overrides. Values are kept as strings; the engine
/// parses and validates them like any other parameter.
fn apply_overrides(
    projection_input: &mut ProjectionInput,
    overrides: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    for raw in overrides {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("--set expects KEY=VALUE, got '{raw}'"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("--set expects KEY=VALUE, got '{raw}'").into());
        }
        projection_input
            .parameters
            .insert(key.to_string(), Value::String(value.trim().to_string()));
    }
    Ok(())
}
