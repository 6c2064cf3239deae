//! Property-based tests for the engine invariants:
//! - an amortization schedule repays exactly its principal
//! - capital-gains allowances stay in [0, 1] and are monotone
//! - loss carryforward conserves losses
//! - the corporate treasury never goes negative

use proptest::{prelude::*, test_runner::TestCaseError};
use rental_projection_core::financing::amortization::generate_schedule;
use rental_projection_core::projection::parameters::{InvestmentParameters, ParameterMap};
use rental_projection_core::projection::{simulate, CashFlowPolicy, ProjectionConfig};
use rental_projection_core::taxation::capital_gains::{
    compute_capital_gains_tax, income_tax_allowance, social_levy_allowance,
};
use rental_projection_core::taxation::loss_carryforward::offset_loss;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

/// Whole-euro amounts in [-1 000 000, 1 000 000].
fn signed_amount() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..=1_000_000i64).prop_map(Decimal::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn schedule_repays_principal(
        principal in 1_000u32..=1_000_000u32,
        rate_bp in 10u32..=1_500u32,
        years in 1u32..=30u32,
    ) {
        let rate = Decimal::new(i64::from(rate_bp), 2);
        let schedule = generate_schedule(Decimal::from(principal), rate, Decimal::from(years));

        prop_assert_eq!(schedule.len(), years as usize);
        let repaid = schedule.total_principal();
        prop_assert!((repaid - Decimal::from(principal)).abs() < dec!(0.01));
        prop_assert_eq!(schedule.entry(years).ending_balance, Decimal::ZERO);
    }

    #[test]
    fn allowances_are_bounded_and_monotone(years in 0u32..=60u32) {
        let schedules: [fn(u32) -> Decimal; 2] = [income_tax_allowance, social_levy_allowance];
        for allowance in schedules {
            let now = allowance(years);
            prop_assert!(now >= Decimal::ZERO && now <= Decimal::ONE);
            prop_assert!(allowance(years + 1) >= now);
        }
    }

    #[test]
    fn gains_tax_never_negative(gain in signed_amount(), years in 0u32..=40u32) {
        let tax = compute_capital_gains_tax(gain, years);
        prop_assert!(tax.tax_due >= Decimal::ZERO);
        if gain <= Decimal::ZERO {
            prop_assert_eq!(tax.tax_due, Decimal::ZERO);
        }
    }

    #[test]
    fn loss_offset_conserves(carried in 0i64..=500_000i64, result in signed_amount()) {
        let carried = Decimal::from(carried);
        let offset = offset_loss(carried, result);

        prop_assert_eq!(
            offset.carried_after,
            offset.carried_before - offset.consumed + offset.generated
        );
        prop_assert!(offset.consumed <= offset.carried_before);
        prop_assert!(offset.consumed <= result.max(Decimal::ZERO));
        prop_assert!(offset.taxable_income >= Decimal::ZERO);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn treasury_never_negative(
        price in 50_000u32..=400_000u32,
        contribution_pct in 0u32..=100u32,
        rent in 0u32..=3_000u32,
        term in 1u32..=30u32,
        rate_bp in 0u32..=600u32,
        distribution in 0u32..=100u32,
        appreciation in -5i32..=5i32,
    ) {
        let contribution = u64::from(price) * u64::from(contribution_pct) / 100;
        let map: ParameterMap = serde_json::from_value(json!({
            "purchase_price": price,
            "notary_fees": price / 12,
            "personal_contribution": contribution,
            "loan_term_years": term,
            "loan_interest_rate_pct": Decimal::new(i64::from(rate_bp), 2).to_string(),
            "loan_insurance_rate_pct": 0.3,
            "monthly_rent": rent,
            "monthly_coownership_charges": 80,
            "annual_property_tax": 700,
            "marginal_tax_rate_pct": 30,
            "building_depreciation_years": 25,
            "furniture_depreciation_years": 5,
            "furniture_value": 5000,
            "distribution_rate_pct": distribution,
            "inflation_rate_pct": 1.5,
            "property_appreciation_rate_pct": appreciation,
        }))
        .map_err(fail)?;

        let params = InvestmentParameters::from_map(&map, &mut Vec::new()).map_err(fail)?;
        let config = ProjectionConfig {
            cash_flow_policy: CashFlowPolicy::CorporateTreasury,
            ..ProjectionConfig::default()
        };
        let out = simulate(&params, &config, &mut Vec::new()).map_err(fail)?;

        prop_assert_eq!(out.years.len(), term as usize);
        for record in out.years.iter().chain(out.post_loan_term.iter()) {
            let treasury = record.corporate_treasury.ok_or_else(|| fail("missing treasury"))?;
            prop_assert!(treasury >= Decimal::ZERO);
            prop_assert!(record.shortfall_contribution.unwrap_or_default() >= Decimal::ZERO);
        }
        for record in &out.years {
            prop_assert!(record.exit.is_some());
        }
    }
}
