pub mod capital_gains;
pub mod loss_carryforward;
