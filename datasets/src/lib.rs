//! `tempora-datasets` provides synthetic time series used in the tests and benchmarks of
//! `tempora`.
//!
//! Deterministic fixtures are always available. Randomly generated series, panels and
//! hierarchies live in [`generate`] behind the `generate` feature:
//! ```ignore
//! tempora-datasets = { version = "0.1.0", features = ["generate"] }
//! ```
//! Every generator takes the random number generator as an argument, so seeded generators
//! give reproducible data.

use ndarray::{Array2, Array3};
use tempora::dataset::{IndexKey, IndexedFrame, MultiIndex, TsData};

#[cfg(feature = "generate")]
pub mod generate;

/// Univariate series `base + slope * t` with `n_timepoints` observations
pub fn trend(n_timepoints: usize, base: f64, slope: f64) -> TsData<f64> {
    TsData::SeriesArray(Array2::from_shape_fn((n_timepoints, 1), |(t, _)| {
        base + slope * t as f64
    }))
}

/// Panel of `n_instances` linear trends, instance `i` channel `c` is `i + c + t / n_timepoints`
pub fn ramp_panel(n_instances: usize, n_channels: usize, n_timepoints: usize) -> TsData<f64> {
    TsData::Panel3D(Array3::from_shape_fn(
        (n_instances, n_channels, n_timepoints),
        |(i, c, t)| (i + c) as f64 + t as f64 / n_timepoints as f64,
    ))
}

/// Row keys of a balanced hierarchy
///
/// `branching[l]` is the number of children of every node on level `l`, so `[2, 3]` describes
/// two regions with three stores each. Nodes are named by level letter and position, e.g.
/// `"a1"` and `"b2"`, and every bottom node gets the time points `0..n_timepoints`.
pub fn hierarchy_index(branching: &[usize], n_timepoints: usize, named: bool) -> MultiIndex {
    let mut paths: Vec<Vec<IndexKey>> = vec![vec![]];
    for (level, &n) in branching.iter().enumerate() {
        let letter = (b'a' + level as u8) as char;
        paths = paths
            .into_iter()
            .flat_map(|path| {
                (0..n).map(move |i| {
                    let mut path = path.clone();
                    path.push(IndexKey::from(format!("{}{}", letter, i)));
                    path
                })
            })
            .collect();
    }

    let keys = paths
        .into_iter()
        .flat_map(|path| {
            (0..n_timepoints).map(move |t| {
                let mut key = path.clone();
                key.push(IndexKey::from(t));
                key
            })
        })
        .collect();
    let names = if named {
        (0..branching.len())
            .map(|l| Some(format!("level_{}", l)))
            .chain(std::iter::once(Some("time".to_string())))
            .collect()
    } else {
        vec![None; branching.len() + 1]
    };

    // generated keys are unique and all of the same length
    MultiIndex::new(names, keys).unwrap_or_else(|_| MultiIndex::range(0))
}

/// Hierarchical frame over [`hierarchy_index`] where every bottom series is a linear trend
///
/// The bottom node at position `j` has the values `1 + j + t`.
pub fn trend_hierarchy(branching: &[usize], n_timepoints: usize, named: bool) -> TsData<f64> {
    let index = hierarchy_index(branching, n_timepoints, named);
    let values = Array2::from_shape_fn((index.len(), 1), |(row, _)| {
        let (node, t) = (row / n_timepoints.max(1), row % n_timepoints.max(1));
        1. + node as f64 + t as f64
    });

    TsData::HierarchicalFrame(IndexedFrame::new(index, vec!["y".to_string()], values).unwrap_or_else(
        |_| IndexedFrame::from_array(Array2::zeros((0, 1))),
    ))
}
