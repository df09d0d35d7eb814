//! Nearest neighbour search shared by the neighbour based estimators
//!
//! Instances are compared by the Euclidean distance of their values, channel by channel, so
//! only equal length panels and tables can be searched.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, Axis, Zip};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::dataset::{Float, TsData};
use crate::error::{Error, Result};

/// Weighting of the neighbours of a query
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weights {
    /// Every neighbour counts the same
    Uniform,
    /// Neighbours count with their inverse distance, exact matches win outright
    Distance,
}

impl Weights {
    pub fn name(&self) -> &'static str {
        match self {
            Weights::Uniform => "uniform",
            Weights::Distance => "distance",
        }
    }

    /// Weights of neighbours at the given distances, summing to one
    pub(crate) fn of<F: Float>(&self, distances: &[F]) -> Vec<F> {
        let raw: Vec<F> = match self {
            Weights::Uniform => vec![F::one(); distances.len()],
            Weights::Distance if distances.iter().any(|d| *d == F::zero()) => distances
                .iter()
                .map(|d| if *d == F::zero() { F::one() } else { F::zero() })
                .collect(),
            Weights::Distance => distances.iter().map(|d| F::one() / *d).collect(),
        };
        let total = raw.iter().copied().sum::<F>();
        raw.into_iter().map(|w| w / total).collect()
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weights {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(Weights::Uniform),
            "distance" => Ok(Weights::Distance),
            _ => Err(Error::Parameters(format!("unknown weighting `{}`", s))),
        }
    }
}

/// One row of features per instance
///
/// Panels are flattened channel by channel, tables are used as they are.
pub(crate) fn feature_rows<F: Float>(x: &TsData<F>) -> Result<Array2<F>> {
    match x {
        TsData::Panel3D(panel) => {
            let (n, c, t) = panel.dim();
            Ok(panel.to_owned().into_shape((n, c * t))?)
        }
        TsData::TableArray(table) => Ok(table.clone()),
        other => Err(Error::InvalidData(format!(
            "neighbour search needs a 3d panel or a table, got {}",
            other.mtype()
        ))),
    }
}

/// Indices and distances of the `k` training rows closest to `query`
///
/// Ties are broken by the position in the training data.
pub(crate) fn nearest<F: Float>(
    train: &Array2<F>,
    query: ArrayView1<F>,
    k: usize,
) -> Result<Vec<(usize, F)>> {
    if query.len() != train.ncols() {
        return Err(Error::InvalidData(format!(
            "instances with {} values cannot be compared to {} values seen in fit",
            query.len(),
            train.ncols()
        )));
    }
    let mut distances: Vec<(usize, F)> = train
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(i, row)| {
            let squared = Zip::from(&row)
                .and(&query)
                .fold(F::zero(), |acc, a, b| acc + (*a - *b) * (*a - *b));
            (i, squared.sqrt())
        })
        .collect();
    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    distances.truncate(k);

    Ok(distances)
}

pub(crate) fn check_n_neighbors(n_neighbors: usize, n_train: usize) -> Result<()> {
    if n_neighbors > n_train {
        return Err(Error::InvalidData(format!(
            "{} neighbours requested, but only {} instances seen in fit",
            n_neighbors, n_train
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    #[test]
    fn panels_are_flattened_by_channel() {
        let x = TsData::Panel3D(Array3::from_shape_fn((2, 2, 2), |(i, c, t)| (100 * i + 10 * c + t) as f64));

        assert_eq!(
            feature_rows(&x).unwrap(),
            array![[0., 1., 10., 11.], [100., 101., 110., 111.]]
        );
    }

    #[test]
    fn nearest_breaks_ties_by_position() {
        let train = array![[0., 0.], [2., 0.], [0., 2.], [5., 5.]];
        let found = nearest(&train, array![1., 1.].view(), 3).unwrap();

        assert_eq!(found.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_abs_diff_eq!(found[0].1, 2f64.sqrt());
    }

    #[test]
    fn exact_matches_take_all_weight() {
        assert_eq!(Weights::Distance.of(&[0., 1., 0.]), vec![0.5, 0., 0.5]);
        assert_eq!(Weights::Distance.of(&[1., 3.]), vec![0.75, 0.25]);
        assert_eq!(Weights::Uniform.of(&[1., 3.]), vec![0.5, 0.5]);
    }
}
