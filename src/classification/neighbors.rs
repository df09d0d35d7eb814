use std::collections::BTreeSet;

use ndarray::{Array1, Array2, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::neighbors::{check_n_neighbors, feature_rows, nearest, Weights};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet};
use crate::traits::Classifier;

const N_NEIGHBORS: &str = "n_neighbors";
const WEIGHTS: &str = "weights";

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KNeighborsClassifierValidParams {
    n_neighbors: usize,
    weights: Weights,
}

impl KNeighborsClassifierValidParams {
    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KNeighborsClassifierParams(KNeighborsClassifierValidParams);

impl Default for KNeighborsClassifierParams {
    fn default() -> Self {
        Self::new()
    }
}

impl KNeighborsClassifierParams {
    pub fn new() -> Self {
        KNeighborsClassifierParams(KNeighborsClassifierValidParams {
            n_neighbors: 1,
            weights: Weights::Uniform,
        })
    }

    pub fn n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.0.n_neighbors = n_neighbors;
        self
    }

    pub fn weights(mut self, weights: Weights) -> Self {
        self.0.weights = weights;
        self
    }

    pub fn build<F: Float>(self) -> Result<KNeighborsClassifier<F>> {
        Ok(KNeighborsClassifier::new(self.check()?))
    }
}

impl ParamGuard for KNeighborsClassifierParams {
    type Checked = KNeighborsClassifierValidParams;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.n_neighbors == 0 {
            Err(Error::Parameters("n_neighbors must be positive".into()))
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[derive(Debug, Clone)]
struct Training<F> {
    rows: Array2<F>,
    /// Position of every training label in `classes`
    codes: Vec<usize>,
    classes: Vec<usize>,
}

/// K nearest neighbours classification on equal length series
///
/// Each neighbour votes for its label with its weight. The vote shares are the class
/// probabilities, the prediction is the class with the largest share and the smallest label
/// among tied classes.
#[derive(Debug)]
pub struct KNeighborsClassifier<F> {
    params: KNeighborsClassifierValidParams,
    train_: Option<Training<F>>,
    state: EstimatorState,
}

impl<F: Float> KNeighborsClassifier<F> {
    pub fn new(params: KNeighborsClassifierValidParams) -> Self {
        KNeighborsClassifier {
            params,
            train_: None,
            state: EstimatorState::default(),
        }
    }

    /// Labels seen in fit, ascending
    pub fn classes(&self) -> Option<&[usize]> {
        self.train_.as_ref().map(|t| t.classes.as_slice())
    }

    fn votes(&self, x: &TsData<F>) -> Result<Array2<F>> {
        let train = self
            .train_
            .as_ref()
            .ok_or_else(|| Error::NotFitted(self.type_name().into()))?;
        let rows = feature_rows(x)?;

        let mut votes = Array2::zeros((rows.nrows(), train.classes.len()));
        for (query, mut row) in rows.axis_iter(Axis(0)).zip(votes.axis_iter_mut(Axis(0))) {
            let found = nearest(&train.rows, query, self.params.n_neighbors)?;
            let distances: Vec<F> = found.iter().map(|(_, d)| *d).collect();
            for ((i, _), w) in found.iter().zip(self.params.weights.of(&distances)) {
                row[train.codes[*i]] += w;
            }
        }
        Ok(votes)
    }
}

impl<F: Float> Default for KNeighborsClassifier<F> {
    fn default() -> Self {
        KNeighborsClassifier::new(KNeighborsClassifierParams::new().0)
    }
}

impl<F: Float> Clone for KNeighborsClassifier<F> {
    fn clone(&self) -> Self {
        KNeighborsClassifier {
            params: self.params.clone(),
            train_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for KNeighborsClassifier<F> {
    fn type_name(&self) -> &'static str {
        "KNeighborsClassifier"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::collection_defaults()
            .with(Tag::XInnerType, vec![MType::Panel3D, MType::TableArray])
            .with(Tag::Multivariate, true)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new()
            .with(N_NEIGHBORS, self.params.n_neighbors)
            .with(WEIGHTS, self.params.weights.name())
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[N_NEIGHBORS, WEIGHTS])?;
        let mut builder = KNeighborsClassifierParams(self.params.clone());
        if let Some(k) = params.get(N_NEIGHBORS) {
            builder = builder.n_neighbors(k.as_usize(&ParamPath::from(N_NEIGHBORS))?);
        }
        if let Some(weights) = params.get(WEIGHTS) {
            builder = builder.weights(weights.as_str(&ParamPath::from(WEIGHTS))?.parse()?);
        }

        self.params = builder.check()?;
        self.train_ = None;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Classifier<F> for KNeighborsClassifier<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<usize>) -> Result<()> {
        let rows = feature_rows(x)?;
        check_n_neighbors(self.params.n_neighbors, rows.nrows())?;
        let classes: Vec<usize> = y.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let codes = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        self.train_ = Some(Training { rows, codes, classes });
        Ok(())
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<usize>> {
        let votes = self.votes(x)?;
        let classes = self.classes().unwrap_or_default();

        Ok(votes
            .axis_iter(Axis(0))
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, v)| if *v > row[best] { i } else { best });
                classes[best]
            })
            .collect())
    }

    fn predict_proba_core(&self, x: &TsData<F>) -> Result<Array2<F>> {
        self.votes(x)
    }

    fn fitted_params_core(&self) -> Params<F> {
        match self.classes() {
            Some(classes) => Params::new().with(
                "classes",
                ParamValue::List(classes.iter().map(|c| ParamValue::from(*c)).collect()),
            ),
            None => Params::new(),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Classifier<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for KNeighborsClassifier<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new().with(N_NEIGHBORS, 3usize).with(WEIGHTS, "distance"),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut classifier = KNeighborsClassifier::default();
        classifier.set_params(params)?;
        Ok(classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    fn data() -> (TsData<f64>, Array1<usize>) {
        let x = TsData::TableArray(array![[0.], [1.], [2.], [10.], [11.]]);
        (x, array![4, 4, 9, 9, 9])
    }

    #[test]
    fn majority_vote_of_the_neighbours() {
        let (x, y) = data();
        let mut knn = KNeighborsClassifierParams::new().n_neighbors(3).build().unwrap();
        knn.fit(&x, &y).unwrap();

        let query = TsData::TableArray(array![[0.5], [10.5]]);
        assert_eq!(knn.predict(&query).unwrap(), array![4, 9]);
        assert_abs_diff_eq!(
            knn.predict_proba(&query).unwrap(),
            array![[2. / 3., 1. / 3.], [0., 1.]],
            epsilon = 1e-12
        );
        assert_eq!(knn.classes(), Some(&[4, 9][..]));
    }

    #[test]
    fn ties_go_to_the_smallest_label() {
        let (x, y) = data();
        let mut knn = KNeighborsClassifierParams::new().n_neighbors(2).build().unwrap();
        knn.fit(&x, &y).unwrap();

        // neighbours of 1.5 are 1. (label 4) and 2. (label 9)
        assert_eq!(knn.predict(&TsData::TableArray(array![[1.5]])).unwrap(), array![4]);
    }

    #[test]
    fn panels_are_flattened() {
        let x = TsData::Panel3D(Array3::from_shape_fn((4, 2, 3), |(i, c, t)| (i * 10 + c + t) as f64));
        let y = array![0, 0, 1, 1];
        let mut knn = KNeighborsClassifier::default();

        assert_eq!(knn.fit_predict(&x, &y).unwrap(), y);
        assert_eq!(knn.predict_proba(&x).unwrap().ncols(), 2);
    }
}
