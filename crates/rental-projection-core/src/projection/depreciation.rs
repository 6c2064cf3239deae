use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::parameters::InvestmentParameters;
use crate::types::{Money, Rate, Years};

/// Share of (price + notary fees) attributed to the building; the land part
/// is not depreciable.
pub const BUILDING_SHARE: Rate = dec!(0.85);
/// Renovation works are always written off over ten years.
pub const RENOVATION_DEPRECIATION_YEARS: Years = dec!(10);

/// One straight-line depreciable component.
///
/// The period may be fractional: a 7.5-year asset is charged basis / 7.5 in
/// each of years 1 to 7 and nothing afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepreciableAsset {
    pub basis: Money,
    pub years: Years,
}

impl DepreciableAsset {
    pub fn new(basis: Money, years: Years) -> Self {
        Self { basis, years }
    }

    /// Charge for `year` (1-based). Zero once the period is over, and zero
    /// throughout when the period is zero.
    pub fn annual_charge(&self, year: u32) -> Money {
        if self.years <= Decimal::ZERO || year == 0 || Decimal::from(year) > self.years {
            return Decimal::ZERO;
        }
        self.basis / self.years
    }
}

/// Depreciation of one year, split by component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepreciationCharge {
    pub building: Money,
    pub renovation: Money,
    pub furniture: Money,
    pub total: Money,
}

/// Building, renovation and furniture schedules of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepreciationPlan {
    pub building: DepreciableAsset,
    pub renovation: DepreciableAsset,
    pub furniture: DepreciableAsset,
}

impl DepreciationPlan {
    pub fn from_parameters(params: &InvestmentParameters) -> Self {
        Self {
            building: DepreciableAsset::new(
                (params.purchase_price + params.notary_fees) * BUILDING_SHARE,
                params.building_depreciation_years,
            ),
            renovation: DepreciableAsset::new(
                params.renovation_cost,
                RENOVATION_DEPRECIATION_YEARS,
            ),
            furniture: DepreciableAsset::new(
                params.furniture_value,
                params.furniture_depreciation_years,
            ),
        }
    }

    pub fn charge_for_year(&self, year: u32) -> DepreciationCharge {
        let building = self.building.annual_charge(year);
        let renovation = self.renovation.annual_charge(year);
        let furniture = self.furniture.annual_charge(year);
        DepreciationCharge {
            building,
            renovation,
            furniture,
            total: building + renovation + furniture,
        }
    }
}
