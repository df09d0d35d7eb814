use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::tags::{Tag, TagSet};
use crate::traits::Classifier;

const STRATEGY: &str = "strategy";

/// Prediction rule of a [`DummyClassifier`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyClassifierStrategy {
    /// Predicts the most frequent label, probabilities are one-hot
    MostFrequent,
    /// Predicts the most frequent label, probabilities are the class frequencies
    Prior,
}

impl DummyClassifierStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DummyClassifierStrategy::MostFrequent => "most_frequent",
            DummyClassifierStrategy::Prior => "prior",
        }
    }
}

impl fmt::Display for DummyClassifierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DummyClassifierStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "most_frequent" => Ok(DummyClassifierStrategy::MostFrequent),
            "prior" => Ok(DummyClassifierStrategy::Prior),
            _ => Err(Error::Parameters(format!("unknown dummy strategy `{}`", s))),
        }
    }
}

/// Class labels seen in fit with their relative frequencies, in ascending label order
#[derive(Debug, Clone, PartialEq)]
struct ClassPrior<F> {
    classes: Vec<usize>,
    frequencies: Vec<F>,
}

impl<F: Float> ClassPrior<F> {
    fn fit(y: &Array1<usize>) -> Result<Self> {
        if y.is_empty() {
            return Err(Error::InvalidData("no labels to learn from".into()));
        }
        let mut counts = BTreeMap::new();
        for label in y {
            *counts.entry(*label).or_insert(0usize) += 1;
        }
        let total = F::cast(y.len());

        Ok(ClassPrior {
            classes: counts.keys().copied().collect(),
            frequencies: counts.values().map(|c| F::cast(*c) / total).collect(),
        })
    }

    /// Position of the most frequent class, the smallest label on ties
    fn mode(&self) -> usize {
        self.frequencies
            .iter()
            .enumerate()
            .fold(0, |best, (i, f)| if *f > self.frequencies[best] { i } else { best })
    }
}

/// Baseline classifier ignoring the instances
#[derive(Debug)]
pub struct DummyClassifier<F> {
    strategy: DummyClassifierStrategy,
    prior_: Option<ClassPrior<F>>,
    state: EstimatorState,
}

impl<F: Float> DummyClassifier<F> {
    pub fn new(strategy: DummyClassifierStrategy) -> Self {
        DummyClassifier {
            strategy,
            prior_: None,
            state: EstimatorState::default(),
        }
    }

    pub fn strategy(&self) -> DummyClassifierStrategy {
        self.strategy
    }

    /// Labels seen in fit, ascending
    pub fn classes(&self) -> Option<&[usize]> {
        self.prior_.as_ref().map(|p| p.classes.as_slice())
    }

    fn prior(&self) -> Result<&ClassPrior<F>> {
        self.prior_
            .as_ref()
            .ok_or_else(|| Error::NotFitted(self.type_name().into()))
    }
}

impl<F: Float> Default for DummyClassifier<F> {
    fn default() -> Self {
        DummyClassifier::new(DummyClassifierStrategy::Prior)
    }
}

impl<F: Float> Clone for DummyClassifier<F> {
    fn clone(&self) -> Self {
        DummyClassifier {
            strategy: self.strategy,
            prior_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for DummyClassifier<F> {
    fn type_name(&self) -> &'static str {
        "DummyClassifier"
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
        Params::new().with(STRATEGY, self.strategy.name())
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[STRATEGY])?;
        if let Some(strategy) = params.get(STRATEGY) {
            self.strategy = strategy.as_str(&ParamPath::from(STRATEGY))?.parse()?;
        }
        self.prior_ = None;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Classifier<F> for DummyClassifier<F> {
    fn fit_core(&mut self, _x: &TsData<F>, y: &Array1<usize>) -> Result<()> {
        self.prior_ = Some(ClassPrior::fit(y)?);
        Ok(())
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<usize>> {
        let prior = self.prior()?;
        Ok(Array1::from_elem(
            x.metadata().n_instances,
            prior.classes[prior.mode()],
        ))
    }

    fn predict_proba_core(&self, x: &TsData<F>) -> Result<Array2<F>> {
        let prior = self.prior()?;
        let row: Vec<F> = match self.strategy {
            DummyClassifierStrategy::Prior => prior.frequencies.clone(),
            DummyClassifierStrategy::MostFrequent => {
                let mode = prior.mode();
                (0..prior.classes.len())
                    .map(|i| if i == mode { F::one() } else { F::zero() })
                    .collect()
            }
        };
        let n = x.metadata().n_instances;
        Ok(Array2::from_shape_fn((n, row.len()), |(_, j)| row[j]))
    }

    fn fitted_params_core(&self) -> Params<F> {
        match &self.prior_ {
            Some(prior) => Params::new().with(
                "classes",
                ParamValue::List(prior.classes.iter().map(|c| ParamValue::from(*c)).collect()),
            ),
            None => Params::new(),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Classifier<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for DummyClassifier<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new().with(STRATEGY, "most_frequent"),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut classifier = DummyClassifier::default();
        classifier.set_params(params)?;
        Ok(classifier)
    }
}
