pub mod analysis;
pub mod debt_service;
pub mod error;
pub mod income;
pub mod market;
pub mod metrics;
pub mod normalize;
pub mod scenarios;
pub mod types;

#[cfg(feature = "workspace")]
pub mod workspace;

pub use error::UnderwritingError;
pub use types::*;

/// Standard result type for all underwriting operations
pub type UnderwritingResult<T> = Result<T, UnderwritingError>;
