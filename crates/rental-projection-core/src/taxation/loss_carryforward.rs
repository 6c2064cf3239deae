use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Outcome of offsetting one year's taxable result against the losses
/// carried from earlier years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossOffset {
    /// Income actually subject to tax this year
    pub taxable_income: Money,
    /// Loss carried in from previous years
    pub carried_before: Money,
    /// Part of the carried loss used against this year's profit
    pub consumed: Money,
    /// New loss created by this year's negative result
    pub generated: Money,
    /// Loss carried into the next year
    pub carried_after: Money,
}

/// Offset `taxable_result` against `carried_loss`.
///
/// Invariants: `carried_after == carried_before - consumed + generated`,
/// `consumed <= carried_before` and `consumed <= max(0, taxable_result)`.
pub fn offset_loss(carried_loss: Money, taxable_result: Money) -> LossOffset {
    let carried_before = carried_loss.max(Decimal::ZERO);
    let profit = taxable_result.max(Decimal::ZERO);

    let consumed = carried_before.min(profit);
    let generated = (-taxable_result).max(Decimal::ZERO);

    LossOffset {
        taxable_income: profit - consumed,
        carried_before,
        consumed,
        generated,
        carried_after: carried_before - consumed + generated,
    }
}
