use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ProjectionError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::ProjectionResult;

// ---------------------------------------------------------------------------
// Schedule constants
// ---------------------------------------------------------------------------

/// Flat income-tax rate on real-estate capital gains.
pub const INCOME_TAX_RATE: Rate = dec!(0.19);
/// Social levies on capital gains.
pub const SOCIAL_LEVY_RATE: Rate = dec!(0.172);

/// Holding years with no allowance at all.
const ALLOWANCE_START_YEAR: u32 = 5;
/// Last year of the uniform yearly allowance (6th to 21st year).
const UNIFORM_ALLOWANCE_END_YEAR: u32 = 21;
/// Year of the final income-tax step and of the irregular social-levy step.
const STEP_YEAR: u32 = 22;
/// Social-levy exemption is complete after this many years.
const SOCIAL_LEVY_END_YEAR: u32 = 30;

const INCOME_TAX_YEARLY_ALLOWANCE: Rate = dec!(0.06);
const INCOME_TAX_FINAL_STEP: Rate = dec!(0.04);
const SOCIAL_LEVY_YEARLY_ALLOWANCE: Rate = dec!(0.0165);
// 22nd year of holding: 1.60%, not 1.65%.
const SOCIAL_LEVY_STEP_YEAR_ALLOWANCE: Rate = dec!(0.0160);
const SOCIAL_LEVY_LATE_ALLOWANCE: Rate = dec!(0.09);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Breakdown of the tax due on a property sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalGainsTax {
    /// Income tax plus social levies
    pub tax_due: Money,
    /// Gain left after the income-tax allowance
    pub income_tax_base: Money,
    /// Gain left after the social-levy allowance
    pub social_levy_base: Money,
    pub income_tax_allowance: Rate,
    pub social_levy_allowance: Rate,
    pub income_tax: Money,
    pub social_levy: Money,
}

impl CapitalGainsTax {
    fn none() -> Self {
        Self {
            tax_due: Decimal::ZERO,
            income_tax_base: Decimal::ZERO,
            social_levy_base: Decimal::ZERO,
            income_tax_allowance: Decimal::ZERO,
            social_levy_allowance: Decimal::ZERO,
            income_tax: Decimal::ZERO,
            social_levy: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalGainsInput {
    /// Sale price minus the retained cost basis
    pub gross_gain: Money,
    /// Whole years between acquisition and sale
    pub holding_years: u32,
}

// ---------------------------------------------------------------------------
// Allowance schedules
// ---------------------------------------------------------------------------

/// Fraction of the gain exempt from income tax after `holding_years`.
///
/// 6% per year from the 6th to the 21st year, then 4% for the 22nd year:
/// fully exempt from 22 years.
pub fn income_tax_allowance(holding_years: u32) -> Rate {
    if holding_years <= ALLOWANCE_START_YEAR {
        return Decimal::ZERO;
    }
    let uniform_years = holding_years.min(UNIFORM_ALLOWANCE_END_YEAR) - ALLOWANCE_START_YEAR;
    let mut allowance = INCOME_TAX_YEARLY_ALLOWANCE * Decimal::from(uniform_years);
    if holding_years >= STEP_YEAR {
        allowance += INCOME_TAX_FINAL_STEP;
    }
    allowance.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Fraction of the gain exempt from social levies after `holding_years`.
///
/// 1.65% per year from the 6th to the 21st year, 1.60% for the 22nd, then 9%
/// per year up to the 30th: fully exempt from 30 years.
pub fn social_levy_allowance(holding_years: u32) -> Rate {
    if holding_years <= ALLOWANCE_START_YEAR {
        return Decimal::ZERO;
    }
    let uniform_years = holding_years.min(UNIFORM_ALLOWANCE_END_YEAR) - ALLOWANCE_START_YEAR;
    let mut allowance = SOCIAL_LEVY_YEARLY_ALLOWANCE * Decimal::from(uniform_years);
    if holding_years >= STEP_YEAR {
        allowance += SOCIAL_LEVY_STEP_YEAR_ALLOWANCE;
    }
    if holding_years > STEP_YEAR {
        let late_years = holding_years.min(SOCIAL_LEVY_END_YEAR) - STEP_YEAR;
        allowance += SOCIAL_LEVY_LATE_ALLOWANCE * Decimal::from(late_years);
    }
    allowance.clamp(Decimal::ZERO, Decimal::ONE)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Tax due on a gain realised after `holding_years` of ownership.
pub fn compute_capital_gains_tax(gross_gain: Money, holding_years: u32) -> CapitalGainsTax {
    if gross_gain <= Decimal::ZERO {
        return CapitalGainsTax::none();
    }

    let income_tax_allowance = income_tax_allowance(holding_years);
    let social_levy_allowance = social_levy_allowance(holding_years);

    let income_tax_base = gross_gain * (Decimal::ONE - income_tax_allowance);
    let social_levy_base = gross_gain * (Decimal::ONE - social_levy_allowance);

    let income_tax = income_tax_base * INCOME_TAX_RATE;
    let social_levy = social_levy_base * SOCIAL_LEVY_RATE;

    CapitalGainsTax {
        tax_due: income_tax.max(Decimal::ZERO) + social_levy.max(Decimal::ZERO),
        income_tax_base,
        social_levy_base,
        income_tax_allowance,
        social_levy_allowance,
        income_tax,
        social_levy,
    }
}

/// Envelope variant of [`compute_capital_gains_tax`].
pub fn calculate_capital_gains_tax(
    input: &CapitalGainsInput,
) -> ProjectionResult<ComputationOutput<CapitalGainsTax>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.holding_years > 100 {
        return Err(ProjectionError::invalid(
            "holding_years",
            "Holding period must not exceed 100 years",
        ));
    }

    if input.gross_gain <= Decimal::ZERO {
        warnings.push("No positive gain: no capital-gains tax is due".into());
    } else if input.holding_years <= ALLOWANCE_START_YEAR {
        warnings.push(format!(
            "Holding period of {} years is within the first {ALLOWANCE_START_YEAR} years: no allowance applies",
            input.holding_years
        ));
    }

    let output = compute_capital_gains_tax(input.gross_gain, input.holding_years);
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Real-estate capital gains: 19% income tax + 17.2% social levies with holding-period allowances",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_no_allowance_in_first_five_years() {
        for years in 0..=5 {
            assert_eq!(income_tax_allowance(years), Decimal::ZERO);
            assert_eq!(social_levy_allowance(years), Decimal::ZERO);
        }
    }

    #[test]
    fn test_allowances_sixth_year() {
        assert_eq!(income_tax_allowance(6), dec!(0.06));
        assert_eq!(social_levy_allowance(6), dec!(0.0165));
    }

    #[test]
    fn test_allowances_twenty_first_year() {
        assert_eq!(income_tax_allowance(21), dec!(0.96));
        assert_eq!(social_levy_allowance(21), dec!(0.264));
    }

    #[test]
    fn test_income_tax_exempt_from_22_years() {
        for years in 22..=40 {
            assert_eq!(income_tax_allowance(years), Decimal::ONE);
        }
    }

    #[test]
    fn test_social_levy_irregular_22nd_year() {
        // 16 x 1.65% + 1.60% = 28%
        assert_eq!(social_levy_allowance(22), dec!(0.28));
        // + 9% for the 23rd year
        assert_eq!(social_levy_allowance(23), dec!(0.37));
    }

    #[test]
    fn test_social_levy_exempt_from_30_years() {
        assert!(social_levy_allowance(29) < Decimal::ONE);
        for years in 30..=45 {
            assert_eq!(social_levy_allowance(years), Decimal::ONE);
        }
    }

    #[test]
    fn test_reference_sale_after_22_years() {
        let tax = compute_capital_gains_tax(dec!(50000), 22);
        assert_eq!(tax.income_tax_base, Decimal::ZERO);
        assert_eq!(tax.income_tax, Decimal::ZERO);
        // 50000 x (1 - 0.28) x 17.2%
        assert_eq!(tax.social_levy_base, dec!(36000));
        assert_eq!(tax.social_levy, dec!(6192));
        assert_eq!(tax.tax_due, dec!(6192));
    }

    #[test]
    fn test_short_holding_full_base() {
        let tax = compute_capital_gains_tax(dec!(10000), 3);
        assert_eq!(tax.income_tax_base, dec!(10000));
        assert_eq!(tax.social_levy_base, dec!(10000));
        // 1900 + 1720
        assert_eq!(tax.tax_due, dec!(3620));
    }

    #[test]
    fn test_no_tax_on_loss_or_zero_gain() {
        for years in [0, 5, 12, 22, 30] {
            assert_eq!(compute_capital_gains_tax(dec!(-25000), years).tax_due, Decimal::ZERO);
            assert_eq!(compute_capital_gains_tax(Decimal::ZERO, years).tax_due, Decimal::ZERO);
        }
    }

    #[test]
    fn test_tax_declines_with_holding_period() {
        let taxes: Vec<Money> = (0..=31)
            .map(|y| compute_capital_gains_tax(dec!(80000), y).tax_due)
            .collect();
        assert!(taxes.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(taxes[30], Decimal::ZERO);
    }

    #[test]
    fn test_envelope_warns_without_gain() {
        let input = CapitalGainsInput {
            gross_gain: dec!(-100),
            holding_years: 8,
        };
        let out = calculate_capital_gains_tax(&input).unwrap();
        assert_eq!(out.result.tax_due, Decimal::ZERO);
        assert_eq!(out.warnings.len(), 1);
    }
}
