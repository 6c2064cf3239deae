use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::time_value::{checked_scale, checked_sum};
use crate::types::{Money, Rate};
use crate::ProjectionResult;

/// How operating cash reaches the investor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashFlowPolicy {
    /// Property held directly: every surplus or deficit is the investor's.
    Direct,
    /// Property held by a company that keeps a treasury, pays dividends out
    /// of it and calls for investor contributions when it runs dry.
    #[default]
    CorporateTreasury,
}

/// Cash movements of one year, before the policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearFlows {
    pub rent: Money,
    pub cash_charges: Money,
    /// Interest + principal + loan insurance
    pub installment: Money,
    /// Tax result before loss offset; caps the dividends
    pub taxable_result: Money,
    pub tax_due: Money,
}

impl YearFlows {
    /// Operating cash after charges and loan installment.
    pub fn operating_cash_flow(&self) -> ProjectionResult<Money> {
        checked_sum(
            "operating cash flow",
            &[self.rent, -self.cash_charges, -self.installment],
        )
    }
}

/// Result of applying a policy to one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Investor's net cash flow for the year
    pub net_cash_flow: Money,
    pub treasury: Option<Money>,
    pub shortfall_contribution: Option<Money>,
    pub dividends_available: Option<Money>,
    pub dividends_paid: Option<Money>,
}

impl CashFlowPolicy {
    /// Settle one year's flows against the company `treasury` carried in.
    /// The treasury is ignored under [`CashFlowPolicy::Direct`].
    ///
    /// Under the corporate policy the returned treasury is never negative.
    pub fn settle(
        &self,
        flows: &YearFlows,
        treasury: Money,
        distribution_rate: Rate,
    ) -> ProjectionResult<Settlement> {
        let operating = flows.operating_cash_flow()?;
        match self {
            CashFlowPolicy::Direct => Ok(Settlement {
                net_cash_flow: checked_sum("net cash flow", &[operating, -flows.tax_due])?,
                treasury: None,
                shortfall_contribution: None,
                dividends_available: None,
                dividends_paid: None,
            }),
            CashFlowPolicy::CorporateTreasury => {
                let before_distribution = checked_sum("treasury", &[treasury, operating])?;
                let (mut treasury, contribution) = if before_distribution < Decimal::ZERO {
                    (Decimal::ZERO, -before_distribution)
                } else {
                    (before_distribution, Decimal::ZERO)
                };

                let available = flows.taxable_result.max(Decimal::ZERO);
                let paid = checked_scale("dividends", available.min(treasury), distribution_rate)?;
                treasury -= paid;

                Ok(Settlement {
                    net_cash_flow: checked_sum(
                        "net cash flow",
                        &[paid, -flows.tax_due, -contribution],
                    )?,
                    treasury: Some(treasury),
                    shortfall_contribution: Some(contribution),
                    dividends_available: Some(available),
                    dividends_paid: Some(paid),
                })
            }
        }
    }

    /// Cash the investor walks away with on a sale: net proceeds, plus the
    /// remaining treasury when a company holds the property.
    pub fn exit_cash(&self, net_sale_proceeds: Money, treasury: Money) -> ProjectionResult<Money> {
        match self {
            CashFlowPolicy::Direct => Ok(net_sale_proceeds),
            CashFlowPolicy::CorporateTreasury => {
                checked_sum("exit cash", &[net_sale_proceeds, treasury])
            }
        }
    }
}
