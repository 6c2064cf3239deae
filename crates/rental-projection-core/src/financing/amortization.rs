use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;
use crate::time_value;
use crate::types::{rate_from_percent, with_metadata, ComputationOutput, Money, Years};
use crate::ProjectionResult;

/// Balances below one cent are treated as fully repaid.
const BALANCE_EPSILON: Money = dec!(0.01);

/// Longest loan accepted by the envelope API, in years.
pub const MAX_TERM_YEARS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fixed-rate, fixed-term loan repaid in equal monthly installments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Amount borrowed
    pub principal: Money,
    /// Nominal annual rate in percent (3.5 = 3.5%)
    pub annual_rate_pct: Decimal,
    /// Term in years; months = trunc(term * 12)
    pub term_years: Years,
}

/// Interest and principal paid during one loan year, and the balance left
/// after its last month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationEntry {
    pub year: u32,
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
}

impl AmortizationEntry {
    /// Entry for a year with no loan activity.
    pub fn zero(year: u32) -> Self {
        Self {
            year,
            interest: Decimal::ZERO,
            principal: Decimal::ZERO,
            ending_balance: Decimal::ZERO,
        }
    }

    /// Interest plus principal paid in the year.
    pub fn debt_service(&self) -> Money {
        self.interest + self.principal
    }
}

/// Year-indexed amortization schedule. Empty when the loan is degenerate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub monthly_payment: Money,
    pub months: u32,
    entries: BTreeMap<u32, AmortizationEntry>,
}

impl AmortizationSchedule {
    /// Entry for `year`, or a zero entry outside the schedule.
    pub fn entry(&self, year: u32) -> AmortizationEntry {
        self.entries
            .get(&year)
            .copied()
            .unwrap_or_else(|| AmortizationEntry::zero(year))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of loan years with activity.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AmortizationEntry> {
        self.entries.values()
    }

    pub fn total_interest(&self) -> Money {
        self.iter().map(|e| e.interest).sum()
    }

    pub fn total_principal(&self) -> Money {
        self.iter().map(|e| e.principal).sum()
    }
}

/// Envelope output for the standalone schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationScheduleOutput {
    pub monthly_payment: Money,
    pub months: u32,
    pub entries: Vec<AmortizationEntry>,
    pub total_interest: Money,
    pub total_principal: Money,
    pub total_paid: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the yearly amortization schedule of a fixed-rate loan.
///
/// Non-positive principal, rate or term, and any term whose payment cannot be
/// computed, produce an empty schedule: the investment is then modelled as an
/// all-cash purchase.
pub fn generate_schedule(
    principal: Money,
    annual_rate_pct: Decimal,
    term_years: Years,
) -> AmortizationSchedule {
    if principal <= Decimal::ZERO || annual_rate_pct <= Decimal::ZERO || term_years <= Decimal::ZERO
    {
        tracing::debug!(
            %principal,
            %annual_rate_pct,
            %term_years,
            "degenerate loan terms, no schedule"
        );
        return AmortizationSchedule::default();
    }

    let monthly_rate = rate_from_percent(annual_rate_pct) / dec!(12);
    let months = match (term_years * dec!(12)).trunc().to_u32() {
        Some(m) if m > 0 => m,
        _ => return AmortizationSchedule::default(),
    };

    let monthly_payment = match time_value::pmt(monthly_rate, months, -principal, Decimal::ZERO) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "loan payment undefined, no schedule");
            return AmortizationSchedule::default();
        }
    };

    let mut entries: BTreeMap<u32, AmortizationEntry> = BTreeMap::new();
    let mut balance = principal;

    for month in 1..=months {
        let year = (month - 1) / 12 + 1;
        let interest = balance * monthly_rate;
        let principal_paid = monthly_payment - interest;
        balance -= principal_paid;

        let entry = entries
            .entry(year)
            .or_insert_with(|| AmortizationEntry::zero(year));
        entry.interest += interest;
        entry.principal += principal_paid;
        entry.ending_balance = if balance > BALANCE_EPSILON {
            balance
        } else {
            Decimal::ZERO
        };
    }

    AmortizationSchedule {
        monthly_payment,
        months,
        entries,
    }
}

/// Validate loan terms and wrap the schedule in the standard output envelope.
pub fn build_amortization_schedule(
    input: &LoanTerms,
) -> ProjectionResult<ComputationOutput<AmortizationScheduleOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_loan_terms(input)?;

    let schedule = generate_schedule(input.principal, input.annual_rate_pct, input.term_years);
    if schedule.is_empty() {
        warnings.push(
            "Loan terms are degenerate (zero principal, rate or term): no amortization schedule"
                .into(),
        );
    }

    let total_interest = schedule.total_interest();
    let total_principal = schedule.total_principal();
    let output = AmortizationScheduleOutput {
        monthly_payment: schedule.monthly_payment,
        months: schedule.months,
        entries: schedule.iter().copied().collect(),
        total_interest,
        total_principal,
        total_paid: total_interest + total_principal,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Fixed-rate annuity loan amortization (monthly installments, yearly buckets)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate_loan_terms(input: &LoanTerms) -> ProjectionResult<()> {
    if input.principal < Decimal::ZERO {
        return Err(ProjectionError::invalid(
            "principal",
            "Loan principal cannot be negative",
        ));
    }
    if input.annual_rate_pct < Decimal::ZERO {
        return Err(ProjectionError::invalid(
            "annual_rate_pct",
            "Interest rate cannot be negative",
        ));
    }
    if input.term_years < Decimal::ZERO || input.term_years > Decimal::from(MAX_TERM_YEARS) {
        return Err(ProjectionError::invalid(
            "term_years",
            format!("Loan term must be between 0 and {MAX_TERM_YEARS} years"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
