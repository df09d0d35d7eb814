use std::fmt;
use std::str::FromStr;

use ndarray::Array1;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet};
use crate::traits::Regressor;
use crate::transformations::Statistic;

const STRATEGY: &str = "strategy";
const CONSTANT: &str = "constant";

/// Value a [`DummyRegressor`] predicts for every instance
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyStrategy {
    Mean,
    Median,
    /// The value given as `constant`
    Constant,
}

impl DummyStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DummyStrategy::Mean => "mean",
            DummyStrategy::Median => "median",
            DummyStrategy::Constant => "constant",
        }
    }
}

impl fmt::Display for DummyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DummyStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(DummyStrategy::Mean),
            "median" => Ok(DummyStrategy::Median),
            "constant" => Ok(DummyStrategy::Constant),
            _ => Err(Error::Parameters(format!("unknown dummy strategy `{}`", s))),
        }
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct DummyRegressorValidParams<F> {
    strategy: DummyStrategy,
    constant: Option<F>,
}

impl<F: Float> DummyRegressorValidParams<F> {
    pub fn strategy(&self) -> DummyStrategy {
        self.strategy
    }

    pub fn constant(&self) -> Option<F> {
        self.constant
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DummyRegressorParams<F>(DummyRegressorValidParams<F>);

impl<F: Float> Default for DummyRegressorParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> DummyRegressorParams<F> {
    pub fn new() -> Self {
        DummyRegressorParams(DummyRegressorValidParams {
            strategy: DummyStrategy::Mean,
            constant: None,
        })
    }

    pub fn strategy(mut self, strategy: DummyStrategy) -> Self {
        self.0.strategy = strategy;
        self
    }

    /// Prediction of the `constant` strategy
    pub fn constant(mut self, constant: Option<F>) -> Self {
        self.0.constant = constant;
        self
    }

    pub fn build(self) -> Result<DummyRegressor<F>> {
        Ok(DummyRegressor::new(self.check()?))
    }
}

impl<F: Float> ParamGuard for DummyRegressorParams<F> {
    type Checked = DummyRegressorValidParams<F>;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        match (self.0.strategy, self.0.constant) {
            (DummyStrategy::Constant, None) => Err(Error::Parameters(
                "the constant strategy needs a constant".into(),
            )),
            (_, Some(c)) if !c.is_finite() => Err(Error::Parameters(format!(
                "constant must be finite, got {}",
                c
            ))),
            _ => Ok(&self.0),
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Predicts a single value learned from the targets, ignoring the instances
///
/// Useful as a baseline and as a stand-in inside composites, as it accepts every
/// representation.
#[derive(Debug)]
pub struct DummyRegressor<F> {
    params: DummyRegressorValidParams<F>,
    value_: Option<F>,
    state: EstimatorState,
}

impl<F: Float> DummyRegressor<F> {
    pub fn new(params: DummyRegressorValidParams<F>) -> Self {
        DummyRegressor {
            params,
            value_: None,
            state: EstimatorState::default(),
        }
    }

    pub fn params() -> DummyRegressorParams<F> {
        DummyRegressorParams::new()
    }
}

impl<F: Float> Default for DummyRegressor<F> {
    fn default() -> Self {
        DummyRegressor::new(DummyRegressorParams::new().0)
    }
}

impl<F: Float> Clone for DummyRegressor<F> {
    fn clone(&self) -> Self {
        DummyRegressor {
            params: self.params.clone(),
            value_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for DummyRegressor<F> {
    fn type_name(&self) -> &'static str {
        "DummyRegressor"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::collection_defaults()
            .with(Tag::XInnerType, MType::ALL.to_vec())
            .with(Tag::Multivariate, true)
            .with(Tag::MissingValues, true)
            .with(Tag::UnequalLength, true)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new()
            .with(STRATEGY, self.params.strategy.name())
            .with(CONSTANT, self.params.constant.map(ParamValue::Float))
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[STRATEGY, CONSTANT])?;
        let mut builder = DummyRegressorParams(self.params.clone());
        if let Some(strategy) = params.get(STRATEGY) {
            builder = builder.strategy(strategy.as_str(&ParamPath::from(STRATEGY))?.parse()?);
        }
        if let Some(constant) = params.get(CONSTANT) {
            let constant = match constant {
                ParamValue::None => None,
                other => Some(other.as_float(&ParamPath::from(CONSTANT))?),
            };
            builder = builder.constant(constant);
        }

        self.params = builder.check()?;
        self.value_ = None;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Regressor<F> for DummyRegressor<F> {
    fn fit_core(&mut self, _x: &TsData<F>, y: &Array1<F>) -> Result<()> {
        if y.is_empty() {
            return Err(Error::InvalidData("no targets to learn from".into()));
        }
        let value = match self.params.strategy {
            DummyStrategy::Mean => Statistic::Mean.apply(y.view()),
            DummyStrategy::Median => Statistic::Median.apply(y.view()),
            DummyStrategy::Constant => self.params.constant.unwrap_or_else(F::nan),
        };
        self.value_ = Some(value);
        Ok(())
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<F>> {
        let value = self
            .value_
            .ok_or_else(|| Error::NotFitted(self.type_name().into()))?;
        let n = x.metadata().n_instances;
        Ok(Array1::from_elem(n, value))
    }

    fn fitted_params_core(&self) -> Params<F> {
        Params::new().with("value", self.value_.map(ParamValue::Float))
    }

    fn boxed_clone(&self) -> Box<dyn Regressor<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for DummyRegressor<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new()
                .with(STRATEGY, "constant")
                .with_float(CONSTANT, F::cast(0.5)),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut regressor = DummyRegressor::default();
        regressor.set_params(params)?;
        Ok(regressor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn predicts_the_learned_value() {
        let x = TsData::Panel3D(Array3::zeros((4, 2, 3)));
        let y = array![1., 2., 3., 10.];

        let mut mean = DummyRegressor::default();
        assert_eq!(mean.fit_predict(&x, &y).unwrap(), array![4., 4., 4., 4.]);

        let mut median = DummyRegressor::params().strategy(DummyStrategy::Median).build().unwrap();
        assert_eq!(median.fit_predict(&x, &y).unwrap(), array![2.5, 2.5, 2.5, 2.5]);

        let mut constant = DummyRegressor::params()
            .strategy(DummyStrategy::Constant)
            .constant(Some(-1.))
            .build()
            .unwrap();
        constant.fit(&x, &y).unwrap();
        assert_eq!(
            constant.predict(&TsData::TableArray(array![[0.], [1.]])).unwrap(),
            array![-1., -1.]
        );
    }

    #[test]
    fn constant_strategy_needs_a_value() {
        assert!(DummyRegressorParams::<f64>::new()
            .strategy(DummyStrategy::Constant)
            .build()
            .is_err());

        let mut dummy = DummyRegressor::<f64>::default();
        assert!(dummy.set_params(Params::new().with(STRATEGY, "constant")).is_err());
        assert_eq!(dummy.get_params(false).get(STRATEGY), Some(&ParamValue::from("mean")));
    }

    #[test]
    fn accepts_unequal_panels_with_missing_values() {
        let x = TsData::PanelList(vec![array![[1., f64::NAN]], array![[1., 2., 3.]]]);
        let mut dummy = DummyRegressor::default();

        assert_eq!(dummy.fit_predict(&x, &array![0., 2.]).unwrap(), array![1., 1.]);
    }
}
