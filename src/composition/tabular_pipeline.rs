use ndarray::Array1;
use tracing::{debug, info};

use super::delegate::Delegate;
use super::heterogeneous::{split_component_params, NamedSteps, Step};
use super::merge::merge_tabular_terminal;
use super::regressor_pipeline::steps_param;
use super::transformer_pipeline::{
    chain_fitted_params, chain_tags, fit_chain, fitted_chain, transform_chain, TransformerSteps,
};
use crate::base::{
    AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams,
};
use crate::convert::convert;
use crate::dataset::{Float, MType, Scitype, TsData};
use crate::error::{Error, Result};
use crate::regression::{DummyRegressor, KNeighborsRegressor};
use crate::tags::{Tag, TagSet};
use crate::traits::{Regressor, Transformer};
use crate::transformations::{SummaryTransformer, TimeBinner};

const REGRESSOR: &str = "regressor";
const TRANSFORMERS: &str = "transformers";
const RESERVED: [&str; 2] = [REGRESSOR, TRANSFORMERS];

/// Output of the transformer chain as a plain feature table
///
/// Tables pass through, panels are flattened channel by channel into one row per instance.
fn to_table<F: Float>(xt: TsData<F>) -> Result<TsData<F>> {
    match xt.scitype() {
        Scitype::Table => Ok(xt),
        Scitype::Panel => {
            debug!(mtype = %xt.mtype(), "flattening panel for tabular regressor");
            match convert(&xt, MType::PanelFlat, Scitype::Panel)? {
                TsData::PanelFlat(flat) => Ok(TsData::TableArray(flat)),
                other => Err(Error::InvalidData(format!(
                    "expected flat panel, got {}",
                    other.mtype()
                ))),
            }
        }
        scitype => Err(Error::UnsupportedScitype {
            estimator: "TabularRegressorPipeline".into(),
            scitype,
        }),
    }
}

/// A chain of transformers followed by a regressor for plain feature tables
///
/// The chain output is turned into one fixed width row per instance before it reaches the
/// regressor, so unequal length collections are only supported if the chain removes them.
pub struct TabularRegressorPipeline<F: Float> {
    transformers: TransformerSteps<F>,
    regressor: Box<dyn Regressor<F>>,
    tags: TagSet,
    transformers_: Option<Vec<Box<dyn Transformer<F>>>>,
    regressor_: Delegate<Box<dyn Regressor<F>>>,
    state: EstimatorState,
}

impl<F: Float> TabularRegressorPipeline<F> {
    pub fn new(
        transformers: Vec<Step<Box<dyn Transformer<F>>>>,
        regressor: Box<dyn Regressor<F>>,
    ) -> Result<Self> {
        Self::from_parts(NamedSteps::new(transformers, &RESERVED)?, regressor)
    }

    fn from_parts(
        transformers: TransformerSteps<F>,
        regressor: Box<dyn Regressor<F>>,
    ) -> Result<Self> {
        let regressor_tags = regressor.get_tags();
        if !regressor_tags.scitypes(Tag::XInnerType).contains(&Scitype::Table) {
            return Err(Error::Parameters(format!(
                "the regressor of a tabular pipeline must accept tables, {} does not",
                regressor.type_name()
            )));
        }
        let tags = TagSet::collection_defaults()
            .with(Tag::XInnerType, vec![MType::Panel3D, MType::PanelList])
            .merged(&merge_tabular_terminal(
                &chain_tags(&transformers),
                &regressor_tags,
            ));

        Ok(TabularRegressorPipeline {
            transformers,
            regressor,
            tags,
            transformers_: None,
            regressor_: Delegate::new("TabularRegressorPipeline"),
            state: EstimatorState::default(),
        })
    }

    pub fn transformers(&self) -> &TransformerSteps<F> {
        &self.transformers
    }

    pub fn regressor(&self) -> &dyn Regressor<F> {
        &*self.regressor
    }
}

impl<F: Float> Clone for TabularRegressorPipeline<F> {
    fn clone(&self) -> Self {
        TabularRegressorPipeline {
            transformers: self.transformers.clone(),
            regressor: self.regressor.clone(),
            tags: self.tags.clone(),
            transformers_: None,
            regressor_: Delegate::new("TabularRegressorPipeline"),
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for TabularRegressorPipeline<F> {
    fn type_name(&self) -> &'static str {
        "TabularRegressorPipeline"
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
        *self = Self::from_parts(transformers, regressor)?;
        self.state = state;
        Ok(())
    }
}

impl<F: Float> Regressor<F> for TabularRegressorPipeline<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<F>) -> Result<()> {
        let targets = TsData::from_targets(y);
        let (fitted, xt) = fit_chain(&self.transformers, x, Some(&targets))?;
        self.regressor_.fit(&*self.regressor, &to_table(xt)?, y)?;
        self.transformers_ = Some(fitted);
        info!(
            estimator = "TabularRegressorPipeline",
            n_steps = self.transformers.len() + 1,
            "fitted composite"
        );
        Ok(())
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<F>> {
        let xt = transform_chain(fitted_chain(&self.transformers_, self.type_name())?, x, None)?;
        self.regressor_.predict(&to_table(xt)?)
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

impl<F: Float> TestParams<F> for TabularRegressorPipeline<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        let transformer = |t: Box<dyn Transformer<F>>| {
            ParamValue::List(vec![ParamValue::Estimator(AnyEstimator::Transformer(t))])
        };
        let regressor = |r: Box<dyn Regressor<F>>| ParamValue::Estimator(AnyEstimator::Regressor(r));
        vec![
            Params::new()
                .with(TRANSFORMERS, transformer(Box::new(SummaryTransformer::default())))
                .with(REGRESSOR, regressor(Box::new(KNeighborsRegressor::default()))),
            Params::new()
                .with(TRANSFORMERS, transformer(Box::new(TimeBinner::default())))
                .with(REGRESSOR, regressor(Box::new(DummyRegressor::default()))),
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
    use crate::transformations::{LogTransformer, Padder};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn series_output_is_flattened() {
        let x = Array3::from_shape_fn((4, 2, 3), |(i, c, t)| (i + 2 * c + t) as f64);
        let y = array![1., 2., 3., 4.];
        let mut pipe = TabularRegressorPipeline::new(
            vec![Step::Unnamed(Box::new(LogTransformer::default()) as Box<dyn Transformer<f64>>)],
            Box::new(KNeighborsRegressor::default()),
        )
        .unwrap();
        let pred = pipe.fit_predict(&TsData::Panel3D(x.clone()), &y).unwrap();

        let flat = Array2::from_shape_fn((4, 6), |(i, j)| x[(i, j / 3, j % 3)].ln_1p());
        let expected = KNeighborsRegressor::default()
            .fit_predict(&TsData::TableArray(flat), &y)
            .unwrap();
        assert_abs_diff_eq!(pred, expected, epsilon = 1e-12);
    }

    #[test]
    fn unequal_length_needs_a_removing_chain() {
        let pipe = TabularRegressorPipeline::<f64>::new(vec![], Box::new(DummyRegressor::default()))
            .unwrap();
        assert!(!pipe.get_flag(Tag::UnequalLength));

        let pipe = TabularRegressorPipeline::new(
            vec![Step::Unnamed(Box::new(Padder::default()) as Box<dyn Transformer<f64>>)],
            Box::new(DummyRegressor::default()),
        )
        .unwrap();
        assert!(pipe.get_flag(Tag::UnequalLength));

        let x = TsData::PanelList(vec![array![[1., 2., 3.]], array![[1., 2.]]]);
        let mut pipe = pipe;
        assert!(pipe.fit(&x, &array![1., 2.]).is_ok());
    }
}
