use tracing::info;

use super::delegate::Delegate;
use super::heterogeneous::{split_component_params, NamedSteps, Step};
use super::merge::merge_forecasting_terminal;
use super::regressor_pipeline::steps_param;
use super::transformer_pipeline::{
    chain_fitted_params, chain_tags, fit_chain, fitted_chain, inverse_chain, transform_chain,
    TransformerSteps,
};
use crate::base::{
    AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams,
};
use crate::dataset::{Float, ForecastingHorizon, MType, Scitype, TsData};
use crate::error::{Error, Result};
use crate::forecasting::NaiveForecaster;
use crate::tags::{Tag, TagSet};
use crate::traits::{Forecaster, Transformer};
use crate::transformations::LogTransformer;

const FORECASTER: &str = "forecaster";
const TRANSFORMERS: &str = "transformers";
const RESERVED: [&str; 2] = [FORECASTER, TRANSFORMERS];

/// Forecaster of a transformed target
///
/// `fit` passes `y` through the transformers and fits a clone of the forecaster on the
/// result. Predictions are mapped back through the inverse transformations in reverse order.
/// Every transformer must therefore be invertible or tagged `skip-inverse-transform`.
pub struct TransformedTargetForecaster<F: Float> {
    transformers: TransformerSteps<F>,
    forecaster: Box<dyn Forecaster<F>>,
    tags: TagSet,
    transformers_: Option<Vec<Box<dyn Transformer<F>>>>,
    forecaster_: Delegate<Box<dyn Forecaster<F>>>,
    state: EstimatorState,
}

impl<F: Float> TransformedTargetForecaster<F> {
    pub fn new(
        transformers: Vec<Step<Box<dyn Transformer<F>>>>,
        forecaster: Box<dyn Forecaster<F>>,
    ) -> Result<Self> {
        Self::from_parts(NamedSteps::new(transformers, &RESERVED)?, forecaster)
    }

    fn from_parts(
        transformers: TransformerSteps<F>,
        forecaster: Box<dyn Forecaster<F>>,
    ) -> Result<Self> {
        for (name, step) in transformers.iter() {
            if !step.get_flag(Tag::InverseTransform) && !step.get_flag(Tag::SkipInverseTransform) {
                return Err(Error::Parameters(format!(
                    "transformer `{}` of a transformed target forecaster must be invertible or skip the inverse",
                    name
                )));
            }
        }
        let series = MType::of_scitype(Scitype::Series);
        let tags = TagSet::forecaster_defaults()
            .with(Tag::YInnerType, series.clone())
            .with(Tag::XInnerType, series)
            .merged(&merge_forecasting_terminal(
                &chain_tags(&transformers),
                &forecaster.get_tags(),
            ));

        Ok(TransformedTargetForecaster {
            transformers,
            forecaster,
            tags,
            transformers_: None,
            forecaster_: Delegate::new("TransformedTargetForecaster"),
            state: EstimatorState::default(),
        })
    }

    pub fn transformers(&self) -> &TransformerSteps<F> {
        &self.transformers
    }

    pub fn forecaster(&self) -> &dyn Forecaster<F> {
        &*self.forecaster
    }

    pub fn prepend(&self, transformer: Box<dyn Transformer<F>>) -> Result<Self> {
        self.prepend_steps(&NamedSteps::new(vec![Step::Unnamed(transformer)], &RESERVED)?)
    }

    pub(crate) fn prepend_steps(&self, front: &TransformerSteps<F>) -> Result<Self> {
        Self::from_parts(
            NamedSteps::new(front.joined(&self.transformers), &RESERVED)?,
            self.forecaster.clone(),
        )
    }

    fn fitted_transformers(&self) -> Result<&[Box<dyn Transformer<F>>]> {
        fitted_chain(&self.transformers_, self.type_name())
    }
}

impl<F: Float> Clone for TransformedTargetForecaster<F> {
    fn clone(&self) -> Self {
        TransformedTargetForecaster {
            transformers: self.transformers.clone(),
            forecaster: self.forecaster.clone(),
            tags: self.tags.clone(),
            transformers_: None,
            forecaster_: Delegate::new("TransformedTargetForecaster"),
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for TransformedTargetForecaster<F> {
    fn type_name(&self) -> &'static str {
        "TransformedTargetForecaster"
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
                FORECASTER,
                ParamValue::Estimator(AnyEstimator::Forecaster(self.forecaster.clone())),
            )
            .with(TRANSFORMERS, self.transformers.to_param());
        if deep {
            params.extend(self.transformers.get_params(true));
            params.extend(self.forecaster.get_params(true).prefixed(FORECASTER));
        }
        params
    }

    fn set_params(&mut self, mut params: Params<F>) -> Result<()> {
        let mut forecaster = match params.remove(FORECASTER) {
            Some(value) => value
                .into_estimator(&ParamPath::from(FORECASTER))?
                .into_forecaster()?,
            None => self.forecaster.clone(),
        };
        let mut transformers = steps_param(&mut params, &self.transformers, &RESERVED)?;

        let (forecaster_params, rest) = split_component_params(params, FORECASTER, &forecaster);
        if !forecaster_params.is_empty() {
            forecaster.set_params(forecaster_params)?;
        }
        transformers.set_params(rest)?.check_leaves(&[])?;

        let state = self.state.unfitted();
        *self = Self::from_parts(transformers, forecaster)?;
        self.state = state;
        Ok(())
    }
}

impl<F: Float> Forecaster<F> for TransformedTargetForecaster<F> {
    fn fit_core(
        &mut self,
        y: &TsData<F>,
        x: Option<&TsData<F>>,
        fh: Option<&ForecastingHorizon>,
    ) -> Result<()> {
        let (fitted, yt) = fit_chain(&self.transformers, y, x)?;
        self.forecaster_.fit(&*self.forecaster, &yt, x, fh)?;
        self.transformers_ = Some(fitted);
        info!(
            estimator = "TransformedTargetForecaster",
            n_steps = self.transformers.len() + 1,
            "fitted composite"
        );
        Ok(())
    }

    fn predict_core(&self, fh: &ForecastingHorizon, x: Option<&TsData<F>>) -> Result<TsData<F>> {
        let pred = self.forecaster_.predict(fh, x)?;
        inverse_chain(self.fitted_transformers()?, &pred, x)
    }

    fn update_core(&mut self, y: &TsData<F>, x: Option<&TsData<F>>) -> Result<()> {
        let yt = transform_chain(self.fitted_transformers()?, y, x)?;
        self.forecaster_.update(&yt, x)
    }

    fn fitted_params_core(&self) -> Params<F> {
        let mut params = match &self.transformers_ {
            Some(fitted) => chain_fitted_params(&self.transformers, fitted),
            None => Params::new(),
        };
        if let Ok(p) = self.forecaster_.fitted_params() {
            params.extend(p.prefixed(FORECASTER));
        }
        params
    }

    fn boxed_clone(&self) -> Box<dyn Forecaster<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for TransformedTargetForecaster<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![Params::new()
            .with(
                TRANSFORMERS,
                ParamValue::List(vec![ParamValue::Estimator(AnyEstimator::Transformer(
                    Box::new(LogTransformer::default()),
                ))]),
            )
            .with(
                FORECASTER,
                ParamValue::Estimator(AnyEstimator::Forecaster(Box::new(
                    NaiveForecaster::default(),
                ))),
            )]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut pipeline = Self::new(vec![], Box::new(NaiveForecaster::default()))?;
        pipeline.set_params(params)?;
        Ok(pipeline)
    }
}
