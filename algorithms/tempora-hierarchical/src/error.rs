//! Error definitions
//!

use thiserror::Error;

/// Simplified `Result` using [`HierarchicalError`](crate::HierarchicalError) as error type
pub type Result<T> = std::result::Result<T, HierarchicalError>;

/// Error variants of aggregation and reconciliation
#[derive(Error, Debug)]
pub enum HierarchicalError {
    /// The index does not describe a hierarchy of series
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),
    /// Base forecasts of the nodes do not line up
    #[error("base forecasts do not align: {0}")]
    Misaligned(String),
    /// Not enough in-sample residuals to estimate the error covariance
    #[error("{method} needs at least {needed} complete residual rows, got {got}")]
    NotEnoughResiduals {
        method: &'static str,
        needed: usize,
        got: usize,
    },
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    #[error(transparent)]
    BaseCrate(#[from] tempora::Error),
}

impl From<HierarchicalError> for tempora::Error {
    fn from(err: HierarchicalError) -> Self {
        match err {
            HierarchicalError::BaseCrate(err) => err,
            err => tempora::Error::Algorithm {
                estimator: "ReconcilerForecaster".into(),
                message: err.to_string(),
            },
        }
    }
}
