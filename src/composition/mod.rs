//! Composition of estimators
//!
//! Composites hold their components as [`NamedSteps`], delegate the lifecycle calls to fitted
//! clones of them and derive their own tags from the tags of the components with the rules in
//! [`merge`]. Every composite is itself an estimator, so composites nest.
//!
//! | composite | components | category |
//! |---|---|---|
//! | [`TransformerPipeline`] | transformers | transformer |
//! | [`RegressorPipeline`] | transformers, regressor | regressor |
//! | [`TabularRegressorPipeline`] | transformers, table regressor | regressor |
//! | [`ClassifierPipeline`] | transformers, classifier | classifier |
//! | [`TransformedTargetForecaster`] | invertible transformers, forecaster | forecaster |
//! | [`MultiplexForecaster`] | forecasters, one selected | forecaster |
//! | [`FitInTransform`] | transformer | transformer |
//!
//! [`compose`] builds the right composite for two estimators, flattening nested pipelines.
mod classifier_pipeline;
mod compose;
mod delegate;
mod fit_in_transform;
mod forecasting_pipeline;
mod heterogeneous;
pub mod merge;
mod multiplexer;
mod regressor_pipeline;
mod tabular_pipeline;
mod transformer_pipeline;

pub use classifier_pipeline::ClassifierPipeline;
pub use compose::{compose, Composable, Composition};
pub use delegate::Delegate;
pub use fit_in_transform::FitInTransform;
pub use forecasting_pipeline::TransformedTargetForecaster;
pub use heterogeneous::{make_strings_unique, NamedSteps, Step, StepEstimator};
pub use multiplexer::MultiplexForecaster;
pub use regressor_pipeline::RegressorPipeline;
pub use tabular_pipeline::TabularRegressorPipeline;
pub use transformer_pipeline::TransformerPipeline;
