pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "financing")]
pub mod financing;

#[cfg(feature = "taxation")]
pub mod taxation;

#[cfg(feature = "projection")]
pub mod projection;

pub use error::ProjectionError;
pub use types::*;

/// Standard result type for all rental-projection operations
pub type ProjectionResult<T> = Result<T, ProjectionError>;
