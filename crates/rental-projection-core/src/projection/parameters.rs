use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cash_policy::CashFlowPolicy;
use crate::error::ProjectionError;
use crate::types::{rate_from_percent, Money, Rate, Years};
use crate::ProjectionResult;

/// Flat mapping of parameter name to a number or numeric string.
pub type ParameterMap = BTreeMap<String, Value>;

/// Largest monetary input accepted.
const MAX_AMOUNT: Money = dec!(1_000_000_000_000);
/// Longest loan or depreciation period accepted, in years.
pub const MAX_YEARS: u32 = 100;
/// Bound on inflation and appreciation, in percent per year.
const MAX_GROWTH_PCT: Decimal = dec!(50);

/// Recognised parameter keys.
pub mod keys {
    pub const PURCHASE_PRICE: &str = "purchase_price";
    pub const RENOVATION_COST: &str = "renovation_cost";
    pub const NOTARY_FEES: &str = "notary_fees";
    pub const FURNITURE_VALUE: &str = "furniture_value";
    pub const PERSONAL_CONTRIBUTION: &str = "personal_contribution";
    pub const BANK_FEES: &str = "bank_fees";
    pub const LOAN_TERM_YEARS: &str = "loan_term_years";
    pub const LOAN_INTEREST_RATE_PCT: &str = "loan_interest_rate_pct";
    pub const LOAN_INSURANCE_RATE_PCT: &str = "loan_insurance_rate_pct";
    pub const MONTHLY_RENT: &str = "monthly_rent";
    pub const MONTHLY_COOWNERSHIP_CHARGES: &str = "monthly_coownership_charges";
    pub const ANNUAL_PROPERTY_TAX: &str = "annual_property_tax";
    pub const MARGINAL_TAX_RATE_PCT: &str = "marginal_tax_rate_pct";
    pub const BUILDING_DEPRECIATION_YEARS: &str = "building_depreciation_years";
    pub const FURNITURE_DEPRECIATION_YEARS: &str = "furniture_depreciation_years";
    pub const DISTRIBUTION_RATE_PCT: &str = "distribution_rate_pct";
    pub const INFLATION_RATE_PCT: &str = "inflation_rate_pct";
    pub const PROPERTY_APPRECIATION_RATE_PCT: &str = "property_appreciation_rate_pct";
    pub const MANAGEMENT_FEE_RATE_PCT: &str = "management_fee_rate_pct";
    pub const UNPAID_RENT_INSURANCE_RATE_PCT: &str = "unpaid_rent_insurance_rate_pct";
    pub const PROPERTY_INSURANCE_ANNUAL: &str = "property_insurance_annual";
    pub const LOCAL_BUSINESS_TAX_ANNUAL: &str = "local_business_tax_annual";

    pub const ALL: [&str; 22] = [
        PURCHASE_PRICE,
        RENOVATION_COST,
        NOTARY_FEES,
        FURNITURE_VALUE,
        PERSONAL_CONTRIBUTION,
        BANK_FEES,
        LOAN_TERM_YEARS,
        LOAN_INTEREST_RATE_PCT,
        LOAN_INSURANCE_RATE_PCT,
        MONTHLY_RENT,
        MONTHLY_COOWNERSHIP_CHARGES,
        ANNUAL_PROPERTY_TAX,
        MARGINAL_TAX_RATE_PCT,
        BUILDING_DEPRECIATION_YEARS,
        FURNITURE_DEPRECIATION_YEARS,
        DISTRIBUTION_RATE_PCT,
        INFLATION_RATE_PCT,
        PROPERTY_APPRECIATION_RATE_PCT,
        MANAGEMENT_FEE_RATE_PCT,
        UNPAID_RENT_INSURANCE_RATE_PCT,
        PROPERTY_INSURANCE_ANNUAL,
        LOCAL_BUSINESS_TAX_ANNUAL,
    ];
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Cost basis used for the capital gain of a simulated sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapitalGainBasis {
    /// Gain = resale price - (price + renovation + notary fees)
    #[default]
    AcquisitionCost,
    /// Gain = resale price - (acquisition cost - cumulative depreciation)
    NetBookValue,
}

/// Non-numeric choices of a projection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub cash_flow_policy: CashFlowPolicy,
    #[serde(default)]
    pub capital_gain_basis: CapitalGainBasis,
}

/// Document accepted by [`super::run_projection`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub parameters: ParameterMap,
    #[serde(default)]
    pub config: ProjectionConfig,
}

/// Typed view of the parameter map. Percent keys are stored as rates,
/// except the loan rate which the amortization engine takes in percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentParameters {
    pub purchase_price: Money,
    pub renovation_cost: Money,
    pub notary_fees: Money,
    pub furniture_value: Money,
    pub personal_contribution: Money,
    pub bank_fees: Money,
    pub loan_term_years: u32,
    pub loan_interest_rate_pct: Decimal,
    pub loan_insurance_rate: Rate,
    pub monthly_rent: Money,
    pub monthly_coownership_charges: Money,
    pub annual_property_tax: Money,
    pub marginal_tax_rate: Rate,
    pub building_depreciation_years: Years,
    pub furniture_depreciation_years: Years,
    pub distribution_rate: Rate,
    pub inflation_rate: Rate,
    pub property_appreciation_rate: Rate,
    pub management_fee_rate: Rate,
    pub unpaid_rent_insurance_rate: Rate,
    pub property_insurance_annual: Money,
    pub local_business_tax_annual: Money,
}

impl InvestmentParameters {
    /// Parse and validate a flat parameter map.
    ///
    /// Every value must be numeric, including values of unrecognised keys,
    /// which are otherwise ignored with a warning. Missing keys default to
    /// zero, except `distribution_rate_pct` which defaults to 100.
    pub fn from_map(values: &ParameterMap, warnings: &mut Vec<String>) -> ProjectionResult<Self> {
        let mut numbers: BTreeMap<&str, Decimal> = BTreeMap::new();
        for (key, value) in values {
            numbers.insert(key.as_str(), parse_number(key, value)?);
        }

        for key in numbers.keys().filter(|k| !keys::ALL.contains(*k)) {
            tracing::warn!(key = *key, "ignoring unrecognised parameter");
            warnings.push(format!("Unrecognised parameter '{key}' ignored"));
        }

        let reader = Reader { numbers: &numbers };

        Ok(Self {
            purchase_price: reader.amount(keys::PURCHASE_PRICE)?,
            renovation_cost: reader.amount(keys::RENOVATION_COST)?,
            notary_fees: reader.amount(keys::NOTARY_FEES)?,
            furniture_value: reader.amount(keys::FURNITURE_VALUE)?,
            personal_contribution: reader.amount(keys::PERSONAL_CONTRIBUTION)?,
            bank_fees: reader.amount(keys::BANK_FEES)?,
            loan_term_years: reader.whole_years(keys::LOAN_TERM_YEARS)?,
            loan_interest_rate_pct: reader.percent(
                keys::LOAN_INTEREST_RATE_PCT,
                Decimal::ZERO,
                Decimal::ZERO,
                Decimal::ONE_HUNDRED,
            )?,
            loan_insurance_rate: reader.rate(keys::LOAN_INSURANCE_RATE_PCT)?,
            monthly_rent: reader.amount(keys::MONTHLY_RENT)?,
            monthly_coownership_charges: reader.amount(keys::MONTHLY_COOWNERSHIP_CHARGES)?,
            annual_property_tax: reader.amount(keys::ANNUAL_PROPERTY_TAX)?,
            marginal_tax_rate: reader.rate(keys::MARGINAL_TAX_RATE_PCT)?,
            building_depreciation_years: reader.period(keys::BUILDING_DEPRECIATION_YEARS)?,
            furniture_depreciation_years: reader.period(keys::FURNITURE_DEPRECIATION_YEARS)?,
            distribution_rate: rate_from_percent(reader.percent(
                keys::DISTRIBUTION_RATE_PCT,
                Decimal::ONE_HUNDRED,
                Decimal::ZERO,
                Decimal::ONE_HUNDRED,
            )?),
            inflation_rate: rate_from_percent(reader.percent(
                keys::INFLATION_RATE_PCT,
                Decimal::ZERO,
                Decimal::ZERO,
                MAX_GROWTH_PCT,
            )?),
            property_appreciation_rate: rate_from_percent(reader.percent(
                keys::PROPERTY_APPRECIATION_RATE_PCT,
                Decimal::ZERO,
                -MAX_GROWTH_PCT,
                MAX_GROWTH_PCT,
            )?),
            management_fee_rate: reader.rate(keys::MANAGEMENT_FEE_RATE_PCT)?,
            unpaid_rent_insurance_rate: reader.rate(keys::UNPAID_RENT_INSURANCE_RATE_PCT)?,
            property_insurance_annual: reader.amount(keys::PROPERTY_INSURANCE_ANNUAL)?,
            local_business_tax_annual: reader.amount(keys::LOCAL_BUSINESS_TAX_ANNUAL)?,
        })
    }

    /// Amount borrowed: everything not covered by the personal contribution.
    /// Zero or negative means an all-cash purchase.
    pub fn loan_amount(&self) -> Money {
        self.purchase_price + self.renovation_cost + self.notary_fees - self.personal_contribution
    }

    /// Value that appreciates and is realised on resale.
    pub fn resale_basis(&self) -> Money {
        self.purchase_price + self.renovation_cost
    }

    /// Cost basis of the property for capital-gains purposes.
    pub fn acquisition_cost(&self) -> Money {
        self.purchase_price + self.renovation_cost + self.notary_fees
    }

    /// Cash put in by the investor at year 0.
    pub fn initial_investment(&self) -> Money {
        self.personal_contribution + self.bank_fees
    }

    /// Yearly borrower insurance, charged on the initial loan amount.
    pub fn annual_loan_insurance(&self) -> Money {
        self.loan_amount().max(Decimal::ZERO) * self.loan_insurance_rate
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_number(field: &str, value: &Value) -> ProjectionResult<Decimal> {
    let parsed = match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ProjectionError::invalid(field, format!("expected a number, got {value}"))
    })
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

struct Reader<'a> {
    numbers: &'a BTreeMap<&'a str, Decimal>,
}

impl Reader<'_> {
    fn get(&self, key: &str) -> Option<Decimal> {
        self.numbers.get(key).copied()
    }

    fn amount(&self, key: &str) -> ProjectionResult<Money> {
        let value = self.get(key).unwrap_or(Decimal::ZERO);
        if value < Decimal::ZERO {
            return Err(ProjectionError::invalid(key, "must not be negative"));
        }
        if value > MAX_AMOUNT {
            return Err(ProjectionError::invalid(
                key,
                format!("must not exceed {MAX_AMOUNT}"),
            ));
        }
        Ok(value)
    }

    fn percent(
        &self,
        key: &str,
        default: Decimal,
        min: Decimal,
        max: Decimal,
    ) -> ProjectionResult<Decimal> {
        let value = self.get(key).unwrap_or(default);
        if value < min || value > max {
            return Err(ProjectionError::invalid(
                key,
                format!("must be between {min}% and {max}%"),
            ));
        }
        Ok(value)
    }

    /// Percentage in [0, 100] converted to a rate.
    fn rate(&self, key: &str) -> ProjectionResult<Rate> {
        self.percent(key, Decimal::ZERO, Decimal::ZERO, Decimal::ONE_HUNDRED)
            .map(rate_from_percent)
    }

    /// Period in years, fractional part kept.
    fn period(&self, key: &str) -> ProjectionResult<Years> {
        let value = self.get(key).unwrap_or(Decimal::ZERO);
        if value < Decimal::ZERO {
            return Err(ProjectionError::invalid(key, "must not be negative"));
        }
        if value > Decimal::from(MAX_YEARS) {
            return Err(ProjectionError::invalid(
                key,
                format!("must not exceed {MAX_YEARS} years"),
            ));
        }
        Ok(value)
    }

    /// Year count; the fractional part is dropped.
    fn whole_years(&self, key: &str) -> ProjectionResult<u32> {
        let value = self.get(key).unwrap_or(Decimal::ZERO);
        if value < Decimal::ZERO {
            return Err(ProjectionError::invalid(key, "must not be negative"));
        }
        value
            .trunc()
            .to_u32()
            .filter(|years| *years <= MAX_YEARS)
            .ok_or_else(|| {
                ProjectionError::invalid(key, format!("must not exceed {MAX_YEARS} years"))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn map(value: Value) -> ParameterMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_reference_parameters() {
        let values = map(json!({
            "purchase_price": 120000,
            "renovation_cost": 0,
            "notary_fees": 10000,
            "personal_contribution": 30000,
            "bank_fees": 500,
            "loan_term_years": 25,
            "loan_interest_rate_pct": 3.5,
            "loan_insurance_rate_pct": 0.34,
            "marginal_tax_rate_pct": "11",
            "inflation_rate_pct": "2.0",
            "property_appreciation_rate_pct": -1.5,
        }));
        let mut warnings = Vec::new();
        let params = InvestmentParameters::from_map(&values, &mut warnings).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(params.loan_term_years, 25);
        assert_eq!(params.loan_interest_rate_pct, dec!(3.5));
        assert_eq!(params.loan_insurance_rate, dec!(0.0034));
        assert_eq!(params.marginal_tax_rate, dec!(0.11));
        assert_eq!(params.inflation_rate, dec!(0.02));
        assert_eq!(params.property_appreciation_rate, dec!(-0.015));
        assert_eq!(params.distribution_rate, Decimal::ONE);
        assert_eq!(params.loan_amount(), dec!(100000));
        assert_eq!(params.acquisition_cost(), dec!(130000));
        assert_eq!(params.resale_basis(), dec!(120000));
        assert_eq!(params.initial_investment(), dec!(30500));
        assert_eq!(params.annual_loan_insurance(), dec!(340));
    }

    #[test]
    fn test_missing_keys_default_to_zero() {
        let params = InvestmentParameters::from_map(&ParameterMap::new(), &mut Vec::new()).unwrap();
        assert_eq!(params.purchase_price, Decimal::ZERO);
        assert_eq!(params.loan_term_years, 0);
        assert_eq!(params.building_depreciation_years, Decimal::ZERO);
        assert_eq!(params.distribution_rate, Decimal::ONE);
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let values = map(json!({ "purchase_price": 100000, "monthly_rent": "about 900" }));
        match InvestmentParameters::from_map(&values, &mut Vec::new()) {
            Err(ProjectionError::InvalidInput { field, .. }) => assert_eq!(field, "monthly_rent"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_non_scalar_values_are_rejected() {
        for bad in [json!(null), json!(true), json!([1]), json!({ "v": 1 }), json!("")] {
            let mut values = ParameterMap::new();
            values.insert("notary_fees".into(), bad);
            assert!(InvestmentParameters::from_map(&values, &mut Vec::new()).is_err());
        }
    }

    #[test]
    fn test_unknown_keys_warn_but_must_be_numeric() {
        let values = map(json!({ "purchase_price": 1000, "garage_count": 2 }));
        let mut warnings = Vec::new();
        InvestmentParameters::from_map(&values, &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("garage_count"));

        let values = map(json!({ "garage": "yes" }));
        assert!(InvestmentParameters::from_map(&values, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let values = map(json!({ "bank_fees": -10 }));
        assert!(InvestmentParameters::from_map(&values, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_out_of_range_rates_rejected() {
        for (key, value) in [
            ("distribution_rate_pct", json!(120)),
            ("inflation_rate_pct", json!(-1)),
            ("property_appreciation_rate_pct", json!(-60)),
            ("marginal_tax_rate_pct", json!(101)),
        ] {
            let mut values = ParameterMap::new();
            values.insert(key.into(), value);
            assert!(
                InvestmentParameters::from_map(&values, &mut Vec::new()).is_err(),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_year_counts_truncate_and_cap() {
        let values = map(json!({ "loan_term_years": 20.9, "furniture_depreciation_years": "7" }));
        let params = InvestmentParameters::from_map(&values, &mut Vec::new()).unwrap();
        assert_eq!(params.loan_term_years, 20);
        assert_eq!(params.furniture_depreciation_years, dec!(7));

        let values = map(json!({ "loan_term_years": 101 }));
        assert!(InvestmentParameters::from_map(&values, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_depreciation_periods_keep_fraction() {
        let values = map(json!({
            "building_depreciation_years": "27.5",
            "furniture_depreciation_years": 7.5,
        }));
        let params = InvestmentParameters::from_map(&values, &mut Vec::new()).unwrap();
        assert_eq!(params.building_depreciation_years, dec!(27.5));
        assert_eq!(params.furniture_depreciation_years, dec!(7.5));

        for bad in [json!(-1), json!(100.5)] {
            let values = map(json!({ "furniture_depreciation_years": bad }));
            assert!(InvestmentParameters::from_map(&values, &mut Vec::new()).is_err());
        }
    }

    #[test]
    fn test_scientific_notation_accepted() {
        let values = map(json!({ "purchase_price": "1.2e5" }));
        let params = InvestmentParameters::from_map(&values, &mut Vec::new()).unwrap();
        assert_eq!(params.purchase_price, dec!(120000));
    }

    #[test]
    fn test_config_defaults() {
        let input: ProjectionInput =
            serde_json::from_value(json!({ "parameters": { "purchase_price": 1 } })).unwrap();
        assert_eq!(input.config.cash_flow_policy, CashFlowPolicy::CorporateTreasury);
        assert_eq!(input.config.capital_gain_basis, CapitalGainBasis::AcquisitionCost);

        let input: ProjectionInput = serde_json::from_value(json!({
            "parameters": {},
            "config": { "cash_flow_policy": "Direct", "capital_gain_basis": "NetBookValue" }
        }))
        .unwrap();
        assert_eq!(input.config.cash_flow_policy, CashFlowPolicy::Direct);
        assert_eq!(input.config.capital_gain_basis, CapitalGainBasis::NetBookValue);
    }
}
