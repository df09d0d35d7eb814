//! # Hierarchical forecasting
//!
//! `tempora-hierarchical` forecasts collections of series which are organised in a hierarchy,
//! like sales per store nested in regions. Forecasting every node of such a hierarchy
//! independently gives incoherent forecasts: the forecast of a region differs from the sum of
//! the forecasts of its stores. This crate provides
//!
//! * the [`Aggregator`] transformer, which adds the aggregate nodes of a hierarchy,
//! * the [summation matrix](summation_matrix) of a hierarchy,
//! * the [`ReconcilerForecaster`], which forecasts every node with a clone of a base
//!   forecaster and reconciles the base forecasts into coherent ones.
//!
//! ## Data layout
//!
//! Hierarchies are `HierarchicalFrame`s: every row is keyed by one index level per hierarchy
//! level followed by the time point. Aggregate nodes carry the key [`TOTAL`] on the levels they
//! sum over, so `("__total", "__total", t)` is the grand total and `("a0", "__total", t)` the
//! total of region `a0`.
//!
//! ```
//! use tempora::prelude::*;
//! use tempora::forecasting::NaiveForecaster;
//! use tempora_hierarchical::{ReconcileMethod, ReconcilerForecaster};
//!
//! let y = tempora_datasets::trend_hierarchy(&[2, 2], 10, true);
//! let mut reconciler =
//!     ReconcilerForecaster::new(Box::new(NaiveForecaster::default()), ReconcileMethod::Ols);
//! reconciler.fit(&y, None, Some(ForecastingHorizon::up_to(2)?))?;
//!
//! // 4 bottom nodes, 2 regions and the grand total, 2 steps each
//! let pred = reconciler.predict(None, None)?;
//! assert_eq!(pred.as_frame()?.nrows(), 14);
//! # Ok::<(), tempora::Error>(())
//! ```

mod aggregate;
mod error;
mod matrices;
mod reconciler;

use tempora::dataset::IndexKey;

pub use aggregate::{
    aggregate, drop_aggregates, has_aggregates, Aggregator, AggregatorParams,
    AggregatorValidParams,
};
pub use error::{HierarchicalError, Result};
pub use matrices::{summation_matrix, LabeledMatrix};
pub use reconciler::{ReconcileMethod, ReconcilerForecaster};

/// Key of an aggregate node on the levels it sums over
pub const TOTAL: &str = "__total";

/// Keys of a node on the hierarchy levels, without the time point
pub type Node = Vec<IndexKey>;

/// Whether a node sums over at least one level
pub fn is_aggregate(node: &[IndexKey]) -> bool {
    node.iter().any(|k| k.as_str() == Some(TOTAL))
}

/// Whether `node` contains the bottom node `bottom`
fn covers(node: &[IndexKey], bottom: &[IndexKey]) -> bool {
    node.len() == bottom.len()
        && node
            .iter()
            .zip(bottom)
            .all(|(n, b)| n.as_str() == Some(TOTAL) || n == b)
}
