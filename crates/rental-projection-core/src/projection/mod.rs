pub mod cash_policy;
pub mod depreciation;
pub mod parameters;
pub mod simulator;

pub use cash_policy::CashFlowPolicy;
pub use parameters::{CapitalGainBasis, InvestmentParameters, ProjectionConfig, ProjectionInput};
pub use simulator::{run_projection, simulate, ExitSimulation, ProjectionOutput, YearRecord};
