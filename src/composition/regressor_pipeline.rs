use ndarray::Array1;
use tracing::info;

use super::delegate::Delegate;
use super::heterogeneous::{split_component_params, NamedSteps, Step};
use super::merge::merge_collection_terminal;
use super::transformer_pipeline::{
    chain_fitted_params, chain_tags, fit_chain, fitted_chain, transform_chain, TransformerSteps,
};
use crate::base::{
    AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams,
};
use crate::dataset::{Float, MType, TsData};
use crate::error::Result;
use crate::regression::{DummyRegressor, KNeighborsRegressor};
use crate::tags::{Tag, TagSet};
use crate::traits::{Regressor, Transformer};
use crate::transformations::{Padder, SummaryTransformer};

const REGRESSOR: &str = "regressor";
const TRANSFORMERS: &str = "transformers";
const RESERVED: [&str; 2] = [REGRESSOR, TRANSFORMERS];

/// Transformer steps parsed from the `transformers` parameter
pub(crate) fn steps_param<F: Float>(
    params: &mut Params<F>,
    current: &TransformerSteps<F>,
    reserved: &[&str],
) -> Result<TransformerSteps<F>> {
    match params.remove(TRANSFORMERS) {
        Some(value) => NamedSteps::new(
            NamedSteps::steps_from_param(value, &ParamPath::from(TRANSFORMERS))?,
            reserved,
        ),
        None => Ok(current.clone()),
    }
}

/// A chain of transformers followed by a time series regressor
///
/// `fit` fits clones of the transformers with `fit_transform` and then a clone of the
/// regressor on the transformed data. `predict` only transforms, transformers are never
/// refitted at inference time.
pub struct RegressorPipeline<F: Float> {
    transformers: TransformerSteps<F>,
    regressor: Box<dyn Regressor<F>>,
    tags: TagSet,
    transformers_: Option<Vec<Box<dyn Transformer<F>>>>,
    regressor_: Delegate<Box<dyn Regressor<F>>>,
    state: EstimatorState,
}

impl<F: Float> RegressorPipeline<F> {
    pub fn new(
        transformers: Vec<Step<Box<dyn Transformer<F>>>>,
        regressor: Box<dyn Regressor<F>>,
    ) -> Result<Self> {
        Ok(Self::from_parts(
            NamedSteps::new(transformers, &RESERVED)?,
            regressor,
        ))
    }

    fn from_parts(
        transformers: TransformerSteps<F>,
        regressor: Box<dyn Regressor<F>>,
    ) -> Self {
        let tags = TagSet::collection_defaults()
            .with(Tag::XInnerType, vec![MType::Panel3D, MType::PanelList])
            .merged(&merge_collection_terminal(
                &chain_tags(&transformers),
                &regressor.get_tags(),
            ));

        RegressorPipeline {
            transformers,
            regressor,
            tags,
            transformers_: None,
            regressor_: Delegate::new("RegressorPipeline"),
            state: EstimatorState::default(),
        }
    }

    pub fn transformers(&self) -> &TransformerSteps<F> {
        &self.transformers
    }

    pub fn regressor(&self) -> &dyn Regressor<F> {
        &*self.regressor
    }

    /// Fitted clone of the regressor
    pub fn fitted_regressor(&self) -> Result<&dyn Regressor<F>> {
        Ok(&**self.regressor_.get()?)
    }

    /// New pipeline with `transformer` in front of the existing transformers
    pub fn prepend(&self, transformer: Box<dyn Transformer<F>>) -> Result<Self> {
        self.prepend_steps(&NamedSteps::new(vec![Step::Unnamed(transformer)], &RESERVED)?)
    }

    pub(crate) fn prepend_steps(&self, front: &TransformerSteps<F>) -> Result<Self> {
        Ok(Self::from_parts(
            NamedSteps::new(front.joined(&self.transformers), &RESERVED)?,
            self.regressor.clone(),
        ))
    }
}

impl<F: Float> Clone for RegressorPipeline<F> {
    fn clone(&self) -> Self {
        let mut pipeline = Self::from_parts(self.transformers.clone(), self.regressor.clone());
        pipeline.state = self.state.unfitted();
        pipeline
    }
}

impl<F: Float> BaseObject<F> for RegressorPipeline<F> {
    fn type_name(&self) -> &'static str {
        "RegressorPipeline"
    }

    fn class_tags(&self) -> TagSet {
        self.tags.clone()
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, deep: bool) -> Params<F> {
        let mut params = Params::new()
            .with(
                REGRESSOR,
                ParamValue::Estimator(AnyEstimator::Regressor(self.regressor.clone())),
            )
            .with(TRANSFORMERS, self.transformers.to_param());
        if deep {
            params.extend(self.transformers.get_params(true));
            params.extend(self.regressor.get_params(true).prefixed(REGRESSOR));
        }
        params
    }

    fn set_params(&mut self, mut params: Params<F>) -> Result<()> {
        let mut regressor = match params.remove(REGRESSOR) {
            Some(value) => value.into_estimator(&ParamPath::from(REGRESSOR))?.into_regressor()?,
            None => self.regressor.clone(),
        };
        let mut transformers = steps_param(&mut params, &self.transformers, &RESERVED)?;

        let (regressor_params, rest) = split_component_params(params, REGRESSOR, &regressor);
        if !regressor_params.is_empty() {
            regressor.set_params(regressor_params)?;
        }
        transformers.set_params(rest)?.check_leaves(&[])?;

        let state = self.state.unfitted();
        *self = Self::from_parts(transformers, regressor);
        self.state = state;
        Ok(())
    }
}

impl<F: Float> Regressor<F> for RegressorPipeline<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<F>) -> Result<()> {
        let targets = TsData::from_targets(y);
        let (fitted, xt) = fit_chain(&self.transformers, x, Some(&targets))?;
        self.regressor_.fit(&*self.regressor, &xt, y)?;
        self.transformers_ = Some(fitted);
        info!(
            estimator = "RegressorPipeline",
            n_steps = self.transformers.len() + 1,
            "fitted composite"
        );
        Ok(())
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<F>> {
        let xt = transform_chain(fitted_chain(&self.transformers_, self.type_name())?, x, None)?;
        self.regressor_.predict(&xt)
    }

    fn fitted_params_core(&self) -> Params<F> {
        let mut params = match &self.transformers_ {
            Some(fitted) => chain_fitted_params(&self.transformers, fitted),
            None => Params::new(),
        };
        if let Ok(p) = self.regressor_.fitted_params() {
            params.extend(p.prefixed(REGRESSOR));
        }
        params
    }

    fn boxed_clone(&self) -> Box<dyn Regressor<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for RegressorPipeline<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        let transformer = |t: Box<dyn Transformer<F>>| {
            ParamValue::List(vec![ParamValue::Estimator(AnyEstimator::Transformer(t))])
        };
        vec![
            Params::new()
                .with(TRANSFORMERS, transformer(Box::new(Padder::default())))
                .with(
                    REGRESSOR,
                    ParamValue::Estimator(AnyEstimator::Regressor(Box::new(
                        KNeighborsRegressor::default(),
                    ))),
                ),
            Params::new()
                .with(
                    TRANSFORMERS,
                    transformer(Box::new(SummaryTransformer::default())),
                )
                .with(
                    REGRESSOR,
                    ParamValue::Estimator(AnyEstimator::Regressor(Box::new(
                        DummyRegressor::default(),
                    ))),
                ),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut pipeline = Self::new(vec![], Box::new(DummyRegressor::default()))?;
        pipeline.set_params(params)?;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::regression::KNeighborsRegressorParams;
    use crate::transformations::{CosineTransformer, Imputer};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    fn knn(k: usize) -> Box<dyn Regressor<f64>> {
        Box::new(KNeighborsRegressorParams::new().n_neighbors(k).build().unwrap())
    }

    fn data() -> (TsData<f64>, Array1<f64>) {
        let x = Array3::from_shape_fn((6, 1, 5), |(i, _, t)| (i * t) as f64 / 10.);
        (TsData::Panel3D(x), array![0., 1., 2., 3., 4., 5.])
    }

    #[test]
    fn predictions_match_manual_chain() {
        let (x, y) = data();
        let mut pipe = RegressorPipeline::new(
            vec![Step::Unnamed(Box::new(CosineTransformer::default()) as Box<dyn Transformer<f64>>)],
            knn(2),
        )
        .unwrap();
        let pred = pipe.fit_predict(&x, &y).unwrap();

        let mut cosine = CosineTransformer::default();
        let xt = cosine.fit_transform(&x, None).unwrap();
        let mut reg = KNeighborsRegressorParams::new().n_neighbors(2).build().unwrap();
        let expected = reg.fit_predict(&xt, &y).unwrap();

        assert_abs_diff_eq!(pred, expected, epsilon = 1e-12);
    }

    #[test]
    fn nested_parameters_are_routed() {
        let mut pipe = RegressorPipeline::new(
            vec![Step::named("impute", Box::new(Imputer::default()) as Box<dyn Transformer<f64>>)],
            knn(1),
        )
        .unwrap();
        let before = pipe.get_params(true);

        pipe.set_params(Params::new().with(ParamPath::new(vec!["regressor", "n_neighbors"]), 5usize))
            .unwrap();
        let after = pipe.get_params(true);

        assert_eq!(
            after.get(ParamPath::new(vec!["regressor", "n_neighbors"])),
            Some(&ParamValue::Int(5))
        );
        for (path, value) in before.iter().filter(|(p, _)| p.head() == "impute") {
            assert_eq!(after.get(path.clone()), Some(value));
        }
    }

    #[test]
    fn wrong_terminal_type_is_a_configuration_error() {
        let mut pipe = RegressorPipeline::new(vec![], knn(1)).unwrap();
        let res = pipe.set_params(Params::new().with(
            REGRESSOR,
            ParamValue::Estimator(AnyEstimator::Transformer(Box::new(Imputer::default()))),
        ));

        assert!(matches!(res, Err(Error::Parameters(_))));
        assert_eq!(pipe.regressor().type_name(), "KNeighborsRegressor");
    }

    #[test]
    fn removing_transformer_relaxes_capabilities() {
        let pipe = RegressorPipeline::new(vec![], knn(1)).unwrap();
        assert!(!pipe.get_flag(Tag::MissingValues));

        let pipe = RegressorPipeline::new(
            vec![Step::Unnamed(Box::new(Imputer::default()) as Box<dyn Transformer<f64>>)],
            knn(1),
        )
        .unwrap();
        assert!(pipe.get_flag(Tag::MissingValues));
        assert!(!pipe.get_flag(Tag::Multithreading));
    }

    #[test]
    fn predict_before_fit_fails() {
        let (x, _) = data();
        let pipe = RegressorPipeline::new(vec![], knn(1)).unwrap();

        assert!(matches!(pipe.predict(&x), Err(Error::NotFitted(_))));
    }
}
