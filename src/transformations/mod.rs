//! Reference transformers
//!
//! Series-to-series transformers (`CosineTransformer`, `LogTransformer`, `Padder`, `Imputer`)
//! return data in the representation they received it in. Series-to-primitives transformers
//! (`SummaryTransformer`, `TimeBinner`) return one table row per instance.
mod binning;
mod cosine;
mod imputer;
mod log;
mod padder;
mod summary;

pub use binning::{Closed, TimeBinner, TimeBinnerParams, TimeBinnerValidParams, TimeBins};
pub use cosine::CosineTransformer;
pub use imputer::{ImputeMethod, Imputer, ImputerParams, ImputerValidParams};
pub use log::{LogTransformer, LogTransformerParams, LogTransformerValidParams};
pub use padder::{Padder, PadderParams, PadderValidParams};
pub use summary::{
    Statistic, SummaryTransformer, SummaryTransformerParams, SummaryTransformerValidParams,
};
