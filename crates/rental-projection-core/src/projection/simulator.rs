use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::cash_policy::{CashFlowPolicy, YearFlows};
use super::depreciation::DepreciationPlan;
use super::parameters::{CapitalGainBasis, InvestmentParameters, ProjectionConfig, ProjectionInput};
use crate::error::ProjectionError;
use crate::financing::amortization::{generate_schedule, AmortizationEntry, AmortizationSchedule};
use crate::taxation::capital_gains::compute_capital_gains_tax;
use crate::taxation::loss_carryforward::offset_loss;
use crate::time_value::{self, checked_scale, checked_sum};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::ProjectionResult;

/// Social levies on rental income, added to the marginal income-tax rate.
pub const RENTAL_SOCIAL_LEVY_RATE: Rate = dec!(0.172);

const IRR_GUESS: Rate = dec!(0.10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of selling the property at the end of a given year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSimulation {
    pub resale_price: Money,
    /// Loan balance still due after the year
    pub outstanding_balance: Money,
    pub gross_capital_gain: Money,
    pub taxable_gain_income_tax: Money,
    pub taxable_gain_social_levy: Money,
    pub capital_gains_tax: Money,
    /// Resale price - outstanding balance - capital-gains tax
    pub net_sale_proceeds: Money,
    /// Net proceeds plus the remaining treasury, if any
    pub exit_cash: Money,
    /// Investor's cumulative gain if sold this year
    pub net_benefit: Money,
    /// Annualized rate of return of an exit this year (0 when undefined)
    pub irr: Rate,
}

/// One simulated year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRecord {
    pub year: u32,
    pub annual_rent: Money,
    pub cash_charges: Money,
    pub loan_interest: Money,
    pub loan_principal: Money,
    pub loan_insurance: Money,
    pub depreciation: Money,
    /// Before loss offset; negative in a loss year
    pub taxable_result: Money,
    /// After loss offset
    pub taxable_income: Money,
    /// Loss carried into the next year
    pub carried_loss: Money,
    pub tax_due: Money,
    pub dividends_available: Option<Money>,
    pub dividends_paid: Option<Money>,
    pub shortfall_contribution: Option<Money>,
    pub corporate_treasury: Option<Money>,
    pub net_cash_flow: Money,
    pub cumulative_cash_flow: Money,
    /// `None` only for the post-loan-term record
    pub exit: Option<ExitSimulation>,
}

/// A year whose rate of return could not be computed and was reported as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrFailure {
    pub year: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub loan_amount: Money,
    pub monthly_payment: Money,
    pub annual_loan_insurance: Money,
    pub initial_investment: Money,
    pub cash_flow_policy: CashFlowPolicy,
    pub capital_gain_basis: CapitalGainBasis,
    pub years: Vec<YearRecord>,
    pub post_loan_term: Option<YearRecord>,
    /// Investor contributions made to cover treasury shortfalls over the term
    pub total_shortfall_contributions: Money,
    pub irr_failures: Vec<IrrFailure>,
}

#[derive(Serialize)]
struct Assumptions<'a> {
    parameters: &'a InvestmentParameters,
    config: &'a ProjectionConfig,
}

/// Running state carried from one year to the next.
#[derive(Debug, Clone)]
struct SimulationState {
    cumulative_depreciation: Money,
    carried_loss: Money,
    treasury: Money,
    cumulative_contributions: Money,
    cumulative_cash_flow: Money,
    /// [-initial investment, cf1, cf2, ...]
    cash_flows: Vec<Money>,
}

impl SimulationState {
    fn opening(initial_investment: Money) -> Self {
        Self {
            cumulative_depreciation: Decimal::ZERO,
            carried_loss: Decimal::ZERO,
            treasury: Decimal::ZERO,
            cumulative_contributions: Decimal::ZERO,
            cumulative_cash_flow: Decimal::ZERO,
            cash_flows: vec![-initial_investment],
        }
    }
}

/// Operating figures of one year, shared by loan years and the post-loan
/// record.
struct OperatingYear {
    record: YearRecord,
    state: SimulationState,
}

struct Simulator<'a> {
    params: &'a InvestmentParameters,
    config: &'a ProjectionConfig,
    schedule: AmortizationSchedule,
    plan: DepreciationPlan,
    annual_insurance: Money,
    income_tax_rate: Rate,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

impl<'a> Simulator<'a> {
    fn new(
        params: &'a InvestmentParameters,
        config: &'a ProjectionConfig,
        warnings: &mut Vec<String>,
    ) -> Self {
        let loan_amount = params.loan_amount();
        let schedule = generate_schedule(
            loan_amount,
            params.loan_interest_rate_pct,
            Decimal::from(params.loan_term_years),
        );
        if schedule.is_empty() && params.loan_term_years > 0 {
            tracing::warn!(
                %loan_amount,
                "no amortization schedule, projecting as an all-cash purchase"
            );
            warnings.push(
                "Loan terms are degenerate (zero principal, rate or term); projected as an all-cash purchase"
                    .into(),
            );
        }

        Self {
            params,
            config,
            schedule,
            plan: DepreciationPlan::from_parameters(params),
            annual_insurance: params.annual_loan_insurance(),
            income_tax_rate: params.marginal_tax_rate + RENTAL_SOCIAL_LEVY_RATE,
        }
    }

    /// Operate the property for `year`. `loan` is the year's amortization
    /// entry; `None` once the loan is repaid, which also drops the insurance.
    fn operating_year(
        &self,
        year: u32,
        loan: Option<AmortizationEntry>,
        state: &SimulationState,
    ) -> ProjectionResult<OperatingYear> {
        let p = self.params;
        let inflation = |amount: Money| time_value::compound(amount, p.inflation_rate, year - 1);

        let annual_rent = inflation(p.monthly_rent * dec!(12))?;
        let coownership = inflation(p.monthly_coownership_charges * dec!(12))?;
        let property_tax = inflation(p.annual_property_tax)?;
        let local_business_tax = inflation(p.local_business_tax_annual)?;
        let management_fee = checked_scale("management fee", annual_rent, p.management_fee_rate)?;
        let unpaid_rent_insurance = checked_scale(
            "unpaid-rent insurance",
            checked_sum("unpaid-rent insurance base", &[annual_rent, coownership])?,
            p.unpaid_rent_insurance_rate,
        )?;

        let bank_fees = if year == 1 { p.bank_fees } else { Decimal::ZERO };
        let cash_charges = checked_sum(
            "cash charges",
            &[
                coownership,
                property_tax,
                p.property_insurance_annual,
                management_fee,
                unpaid_rent_insurance,
                local_business_tax,
                bank_fees,
            ],
        )?;

        let (loan_entry, loan_insurance) = match loan {
            Some(entry) => (entry, self.annual_insurance),
            None => (AmortizationEntry::zero(year), Decimal::ZERO),
        };

        let depreciation = self.plan.charge_for_year(year).total;
        let taxable_result = checked_sum(
            "taxable result",
            &[
                annual_rent,
                -cash_charges,
                -loan_entry.interest,
                -loan_insurance,
                -depreciation,
            ],
        )?;

        // carried_after never exceeds carried_loss + |taxable_result|
        checked_sum("carried loss", &[state.carried_loss, taxable_result.abs()])?;
        let offset = offset_loss(state.carried_loss, taxable_result);
        let tax_due = checked_scale("income tax", offset.taxable_income, self.income_tax_rate)?;

        let flows = YearFlows {
            rent: annual_rent,
            cash_charges,
            installment: checked_sum("installment", &[loan_entry.debt_service(), loan_insurance])?,
            taxable_result,
            tax_due,
        };
        let policy = self.config.cash_flow_policy;
        let settlement = policy.settle(&flows, state.treasury, p.distribution_rate)?;

        let mut cash_flows = state.cash_flows.clone();
        cash_flows.push(settlement.net_cash_flow);
        let next = SimulationState {
            cumulative_depreciation: checked_sum(
                "cumulative depreciation",
                &[state.cumulative_depreciation, depreciation],
            )?,
            carried_loss: offset.carried_after,
            treasury: settlement.treasury.unwrap_or(Decimal::ZERO),
            cumulative_contributions: checked_sum(
                "cumulative contributions",
                &[
                    state.cumulative_contributions,
                    settlement.shortfall_contribution.unwrap_or(Decimal::ZERO),
                ],
            )?,
            cumulative_cash_flow: checked_sum(
                "cumulative cash flow",
                &[state.cumulative_cash_flow, settlement.net_cash_flow],
            )?,
            cash_flows,
        };

        tracing::debug!(
            year,
            %taxable_result,
            %tax_due,
            net_cash_flow = %settlement.net_cash_flow,
            carried_loss = %next.carried_loss,
            "simulated year"
        );

        let record = YearRecord {
            year,
            annual_rent,
            cash_charges,
            loan_interest: loan_entry.interest,
            loan_principal: loan_entry.principal,
            loan_insurance,
            depreciation,
            taxable_result,
            taxable_income: offset.taxable_income,
            carried_loss: offset.carried_after,
            tax_due,
            dividends_available: settlement.dividends_available,
            dividends_paid: settlement.dividends_paid,
            shortfall_contribution: settlement.shortfall_contribution,
            corporate_treasury: settlement.treasury,
            net_cash_flow: settlement.net_cash_flow,
            cumulative_cash_flow: next.cumulative_cash_flow,
            exit: None,
        };

        Ok(OperatingYear { record, state: next })
    }

    /// One loan-term year, including the simulated sale at its end.
    fn step(
        &self,
        year: u32,
        state: &SimulationState,
    ) -> ProjectionResult<(YearRecord, SimulationState, Option<IrrFailure>)> {
        let OperatingYear { mut record, state } =
            self.operating_year(year, Some(self.schedule.entry(year)), state)?;
        let (exit, failure) = self.simulate_exit(year, &state)?;
        record.exit = Some(exit);
        Ok((record, state, failure))
    }

    fn simulate_exit(
        &self,
        year: u32,
        state: &SimulationState,
    ) -> ProjectionResult<(ExitSimulation, Option<IrrFailure>)> {
        let p = self.params;
        let resale_price =
            time_value::compound(p.resale_basis(), p.property_appreciation_rate, year)?;

        let cost_basis = match self.config.capital_gain_basis {
            CapitalGainBasis::AcquisitionCost => p.acquisition_cost(),
            CapitalGainBasis::NetBookValue => p.acquisition_cost() - state.cumulative_depreciation,
        };
        let gross_capital_gain = checked_sum("capital gain", &[resale_price, -cost_basis])?;
        let gains_tax = compute_capital_gains_tax(gross_capital_gain, year);

        let outstanding_balance = self.schedule.entry(year).ending_balance;
        let net_sale_proceeds = checked_sum(
            "net sale proceeds",
            &[resale_price, -outstanding_balance, -gains_tax.tax_due],
        )?;
        let exit_cash = self
            .config
            .cash_flow_policy
            .exit_cash(net_sale_proceeds, state.treasury)?;

        let mut flows = state.cash_flows.clone();
        if let Some(last) = flows.last_mut() {
            *last = checked_sum("exit year cash flow", &[*last, exit_cash])?;
        }
        let net_benefit = checked_sum("net benefit", &flows)?;

        let (irr, failure) = match time_value::irr(&flows, IRR_GUESS) {
            Ok(rate) => (rate, None),
            Err(e) => {
                tracing::debug!(year, error = %e, "rate of return undefined, reporting 0");
                let failure = IrrFailure {
                    year,
                    reason: e.to_string(),
                };
                (Decimal::ZERO, Some(failure))
            }
        };

        Ok((
            ExitSimulation {
                resale_price,
                outstanding_balance,
                gross_capital_gain,
                taxable_gain_income_tax: gains_tax.income_tax_base,
                taxable_gain_social_levy: gains_tax.social_levy_base,
                capital_gains_tax: gains_tax.tax_due,
                net_sale_proceeds,
                exit_cash,
                net_benefit,
                irr,
            },
            failure,
        ))
    }

    /// Steady-state year after the loan is repaid. Does not feed back into
    /// the loan-term years.
    fn post_loan_record(&self, state: &SimulationState) -> ProjectionResult<YearRecord> {
        let year = self.params.loan_term_years + 1;
        self.operating_year(year, None, state).map(|op| op.record)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate every loan-term year, then the first year after the loan.
///
/// Years whose rate of return is undefined report 0 and are listed in
/// `irr_failures`; a matching warning is pushed to `warnings`.
pub fn simulate(
    params: &InvestmentParameters,
    config: &ProjectionConfig,
    warnings: &mut Vec<String>,
) -> ProjectionResult<ProjectionOutput> {
    let simulator = Simulator::new(params, config, warnings);
    let horizon = params.loan_term_years;

    tracing::info!(
        horizon,
        policy = ?config.cash_flow_policy,
        basis = ?config.capital_gain_basis,
        "running projection"
    );

    let opening = SimulationState::opening(params.initial_investment());
    let (final_state, years, irr_failures) = (1..=horizon).try_fold(
        (opening, Vec::with_capacity(horizon as usize), Vec::new()),
        |(state, mut years, mut failures), year| {
            let (record, next, failure) = simulator.step(year, &state)?;
            years.push(record);
            failures.extend(failure);
            Ok::<_, ProjectionError>((next, years, failures))
        },
    )?;

    for failure in &irr_failures {
        warnings.push(format!(
            "Year {}: rate of return undefined ({}), reported as 0",
            failure.year, failure.reason
        ));
    }

    let post_loan_term = if horizon > 0 && !years.is_empty() {
        Some(simulator.post_loan_record(&final_state)?)
    } else {
        None
    };

    if horizon == 0 {
        warnings.push("Loan term is zero: no years to project".into());
    }

    Ok(ProjectionOutput {
        loan_amount: params.loan_amount(),
        monthly_payment: simulator.schedule.monthly_payment,
        annual_loan_insurance: simulator.annual_insurance,
        initial_investment: params.initial_investment(),
        cash_flow_policy: config.cash_flow_policy,
        capital_gain_basis: config.capital_gain_basis,
        years,
        post_loan_term,
        total_shortfall_contributions: final_state.cumulative_contributions,
        irr_failures,
    })
}

/// Parse the parameter map, run the projection and wrap it in the standard
/// output envelope.
pub fn run_projection(
    input: &ProjectionInput,
) -> ProjectionResult<ComputationOutput<ProjectionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let params = InvestmentParameters::from_map(&input.parameters, &mut warnings)?;
    let output = simulate(&params, &input.config, &mut warnings)?;

    let methodology = match input.config.cash_flow_policy {
        CashFlowPolicy::Direct => {
            "Furnished-rental projection, direct holding: yearly cash flow, loss carryforward, simulated exit and IRR"
        }
        CashFlowPolicy::CorporateTreasury => {
            "Furnished-rental projection through a pass-through company: treasury, dividends, loss carryforward, simulated exit and IRR"
        }
    };

    let assumptions = Assumptions {
        parameters: &params,
        config: &input.config,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(methodology, &assumptions, warnings, elapsed, output))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
