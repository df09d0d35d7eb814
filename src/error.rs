//! Error types in tempora
//!

use thiserror::Error;

use ndarray::ShapeError;

use crate::dataset::{MType, Scitype};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("invalid parameter {0}")]
    Parameters(String),
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("this {0} instance is not fitted yet, call `fit` before using it")]
    NotFitted(String),
    #[error("unknown tag `{0}`")]
    UnknownTag(String),
    #[error("invalid value for tag `{tag}`, expected {expected}")]
    InvalidTagValue { tag: String, expected: String },
    #[error("cannot convert {from} to {to} as {scitype}: {reason}")]
    Conversion {
        from: MType,
        to: MType,
        scitype: Scitype,
        reason: String,
    },
    #[error("data seen by {estimator} has {capability}, but {estimator} cannot handle it")]
    Capability {
        estimator: String,
        capability: String,
    },
    #[error("{estimator} does not accept {scitype} input")]
    UnsupportedScitype { estimator: String, scitype: Scitype },
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("{estimator} does not implement {method}")]
    NotImplemented { estimator: String, method: String },
    #[error("cannot compose {left} with {right}")]
    NotComposable { left: String, right: String },
    #[error("{estimator} failed: {message}")]
    Algorithm { estimator: String, message: String },
    #[error("invalid ndarray shape {0}")]
    NdShape(#[from] ShapeError),
}
