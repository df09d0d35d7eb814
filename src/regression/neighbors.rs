use ndarray::{Array1, Array2, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::neighbors::{check_n_neighbors, feature_rows, nearest, Weights};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet};
use crate::traits::Regressor;

const N_NEIGHBORS: &str = "n_neighbors";
const WEIGHTS: &str = "weights";

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KNeighborsRegressorValidParams {
    n_neighbors: usize,
    weights: Weights,
}

impl KNeighborsRegressorValidParams {
    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KNeighborsRegressorParams(KNeighborsRegressorValidParams);

impl Default for KNeighborsRegressorParams {
    fn default() -> Self {
        Self::new()
    }
}

impl KNeighborsRegressorParams {
    pub fn new() -> Self {
        KNeighborsRegressorParams(KNeighborsRegressorValidParams {
            n_neighbors: 1,
            weights: Weights::Uniform,
        })
    }

    /// Number of neighbours averaged per prediction, defaults to `1`
    pub fn n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.0.n_neighbors = n_neighbors;
        self
    }

    pub fn weights(mut self, weights: Weights) -> Self {
        self.0.weights = weights;
        self
    }

    pub fn build<F: Float>(self) -> Result<KNeighborsRegressor<F>> {
        Ok(KNeighborsRegressor::new(self.check()?))
    }
}

impl ParamGuard for KNeighborsRegressorParams {
    type Checked = KNeighborsRegressorValidParams;
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

/// K nearest neighbours regression on equal length series
///
/// Predicts the (weighted) mean target of the closest training instances under the Euclidean
/// distance of the whole series.
#[derive(Debug)]
pub struct KNeighborsRegressor<F> {
    params: KNeighborsRegressorValidParams,
    train_: Option<(Array2<F>, Array1<F>)>,
    state: EstimatorState,
}

impl<F: Float> KNeighborsRegressor<F> {
    pub fn new(params: KNeighborsRegressorValidParams) -> Self {
        KNeighborsRegressor {
            params,
            train_: None,
            state: EstimatorState::default(),
        }
    }
}

impl<F: Float> Default for KNeighborsRegressor<F> {
    fn default() -> Self {
        KNeighborsRegressor::new(KNeighborsRegressorParams::new().0)
    }
}

impl<F: Float> Clone for KNeighborsRegressor<F> {
    fn clone(&self) -> Self {
        KNeighborsRegressor {
            params: self.params.clone(),
            train_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for KNeighborsRegressor<F> {
    fn type_name(&self) -> &'static str {
        "KNeighborsRegressor"
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
        let mut builder = KNeighborsRegressorParams(self.params.clone());
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

impl<F: Float> Regressor<F> for KNeighborsRegressor<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<F>) -> Result<()> {
        let rows = feature_rows(x)?;
        check_n_neighbors(self.params.n_neighbors, rows.nrows())?;
        self.train_ = Some((rows, y.clone()));
        Ok(())
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<F>> {
        let (train, targets) = self
            .train_
            .as_ref()
            .ok_or_else(|| Error::NotFitted(self.type_name().into()))?;
        let rows = feature_rows(x)?;

        rows.axis_iter(Axis(0))
            .map(|query| {
                let found = nearest(train, query, self.params.n_neighbors)?;
                let distances: Vec<F> = found.iter().map(|(_, d)| *d).collect();
                let weights = self.params.weights.of(&distances);
                Ok(found
                    .iter()
                    .zip(weights)
                    .fold(F::zero(), |acc, ((i, _), w)| acc + w * targets[*i]))
            })
            .collect::<Result<Vec<F>>>()
            .map(Array1::from)
    }

    fn boxed_clone(&self) -> Box<dyn Regressor<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for KNeighborsRegressor<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new().with(N_NEIGHBORS, 2usize).with(WEIGHTS, "distance"),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut regressor = KNeighborsRegressor::default();
        regressor.set_params(params)?;
        Ok(regressor)
    }
}
