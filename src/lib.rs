//! `tempora` provides composable estimators for time series machine learning.
//!
//! Every estimator, whether it forecasts, classifies, regresses or transforms, follows the
//! same protocol: it is built from checked hyperparameters, declares what data it can handle
//! through [tags](tags), is fitted with `fit` and then used with `predict` or `transform`.
//!
//! ## Data
//!
//! Time series are passed around as [`TsData`](dataset::TsData), an enum over the registered
//! representations (mtypes) of series, panels, hierarchies and tables. Estimators declare the
//! mtypes their core logic works on, and the [converters](convert) move the data there and
//! back at the boundary.
//!
//! ## Composition
//!
//! Estimators are chained into pipelines with the types in [`composition`]. A pipeline is an
//! estimator again, so pipelines nest, and its tags are merged from the tags of its steps.
//!
//! ```
//! use tempora::prelude::*;
//! use tempora::composition::{compose, Composable};
//! use tempora::forecasting::NaiveForecaster;
//! use tempora::transformations::LogTransformer;
//! use ndarray::array;
//!
//! let log = Composable::Transformer(Box::new(LogTransformer::<f64>::default()));
//! let naive = Composable::Forecaster(Box::new(NaiveForecaster::default()));
//! let mut forecaster = compose(log, naive)?.into_forecaster()?;
//!
//! let y = TsData::SeriesArray(array![[1.], [2.], [3.]]);
//! forecaster.fit(&y, None, Some(ForecastingHorizon::up_to(2)?))?;
//! let pred = forecaster.predict(None, None)?;
//! assert_eq!(pred.metadata().n_timepoints, Some(2));
//! # Ok::<(), tempora::Error>(())
//! ```

pub mod base;
pub mod classification;
pub mod composition;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod forecasting;
pub mod neighbors;
pub mod param_guard;
pub mod prelude;
pub mod regression;
pub mod tags;
pub mod traits;
pub mod transformations;

pub use dataset::{Float, TsData};
pub use error::{Error, Result};
pub use param_guard::ParamGuard;
