use tracing::{debug, info};

use super::heterogeneous::{NamedSteps, Step};
use super::merge::merge_transformer_chain;
use crate::base::{AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, TsData};
use crate::error::{Error, Result};
use crate::tags::{Tag, TagSet};
use crate::traits::Transformer;
use crate::transformations::{CosineTransformer, LogTransformer};

pub(crate) type TransformerSteps<F> = NamedSteps<Box<dyn Transformer<F>>>;

/// Merged tags of a chain of transformer blueprints
pub(crate) fn chain_tags<F: Float>(steps: &TransformerSteps<F>) -> TagSet {
    let tags: Vec<TagSet> = steps.estimators().map(|s| s.get_tags()).collect();
    merge_transformer_chain(&tags)
}

/// Fit clones of the steps one after the other, each on the output of the previous one
///
/// Returns the fitted clones and the output of the last step.
pub(crate) fn fit_chain<F: Float>(
    steps: &TransformerSteps<F>,
    x: &TsData<F>,
    y: Option<&TsData<F>>,
) -> Result<(Vec<Box<dyn Transformer<F>>>, TsData<F>)> {
    let mut fitted = Vec::with_capacity(steps.len());
    let mut xt = x.clone();
    for (name, blueprint) in steps.iter() {
        debug!(step = name, mtype = %xt.mtype(), "fitting pipeline step");
        let mut step = blueprint.boxed_clone();
        xt = step.fit_transform(&xt, y)?;
        fitted.push(step);
    }
    Ok((fitted, xt))
}

pub(crate) fn transform_chain<F: Float>(
    fitted: &[Box<dyn Transformer<F>>],
    x: &TsData<F>,
    y: Option<&TsData<F>>,
) -> Result<TsData<F>> {
    fitted.iter().try_fold(x.clone(), |xt, step| step.transform(&xt, y))
}

/// Apply the inverse of every step in reverse order, skipping steps tagged
/// `skip-inverse-transform`
pub(crate) fn inverse_chain<F: Float>(
    fitted: &[Box<dyn Transformer<F>>],
    x: &TsData<F>,
    y: Option<&TsData<F>>,
) -> Result<TsData<F>> {
    fitted.iter().rev().try_fold(x.clone(), |xt, step| {
        if step.get_flag(Tag::SkipInverseTransform) {
            Ok(xt)
        } else {
            step.inverse_transform(&xt, y)
        }
    })
}

pub(crate) fn fitted_chain<'a, F: Float>(
    fitted: &'a Option<Vec<Box<dyn Transformer<F>>>>,
    owner: &str,
) -> Result<&'a [Box<dyn Transformer<F>>]> {
    fitted
        .as_deref()
        .ok_or_else(|| Error::NotFitted(owner.to_string()))
}

/// Fitted parameters of every fitted step under its name
pub(crate) fn chain_fitted_params<F: Float>(
    steps: &TransformerSteps<F>,
    fitted: &[Box<dyn Transformer<F>>],
) -> Params<F> {
    let mut params = Params::new();
    for (name, step) in steps.names().into_iter().zip(fitted) {
        if let Ok(p) = step.get_fitted_params() {
            params.extend(p.prefixed(name));
        }
    }
    params
}

const STEPS: &str = "steps";

/// A chain of transformers, itself a transformer
///
/// Fitting fits clones of the steps in order, each on the output of the previous one. The
/// blueprints passed to the constructor are never fitted. Capability tags are merged from the
/// steps when the pipeline is built.
pub struct TransformerPipeline<F: Float> {
    steps: TransformerSteps<F>,
    tags: TagSet,
    steps_: Option<Vec<Box<dyn Transformer<F>>>>,
    state: EstimatorState,
}

impl<F: Float> TransformerPipeline<F> {
    pub fn new(steps: Vec<Step<Box<dyn Transformer<F>>>>) -> Result<Self> {
        Self::from_steps(NamedSteps::new(steps, &[STEPS])?)
    }

    /// Pipeline of unnamed steps
    pub fn from_transformers(steps: Vec<Box<dyn Transformer<F>>>) -> Result<Self> {
        Self::new(steps.into_iter().map(Step::Unnamed).collect())
    }

    fn from_steps(steps: TransformerSteps<F>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::Parameters(
                "a transformer pipeline needs at least one step".into(),
            ));
        }
        Ok(TransformerPipeline {
            tags: Self::merged_tags(&steps),
            steps,
            steps_: None,
            state: EstimatorState::default(),
        })
    }

    fn merged_tags(steps: &TransformerSteps<F>) -> TagSet {
        TagSet::transformer_defaults().merged(&chain_tags(steps))
    }

    pub fn steps(&self) -> &TransformerSteps<F> {
        &self.steps
    }

    /// Fitted clones of the steps
    pub fn fitted_steps(&self) -> Result<&[Box<dyn Transformer<F>>]> {
        fitted_chain(&self.steps_, self.type_name())
    }

    /// New pipeline with `other`'s steps after the steps of this one
    pub fn concat(&self, other: &TransformerPipeline<F>) -> Result<Self> {
        Self::new(self.steps.joined(&other.steps))
    }

    /// New pipeline with `transformer` appended
    pub fn append(&self, transformer: Box<dyn Transformer<F>>) -> Result<Self> {
        self.concat(&Self::from_transformers(vec![transformer])?)
    }

    /// New pipeline with `transformer` prepended
    pub fn prepend(&self, transformer: Box<dyn Transformer<F>>) -> Result<Self> {
        Self::from_transformers(vec![transformer])?.concat(self)
    }

    pub(crate) fn into_steps(self) -> TransformerSteps<F> {
        self.steps
    }
}

impl<F: Float> Clone for TransformerPipeline<F> {
    fn clone(&self) -> Self {
        TransformerPipeline {
            steps: self.steps.clone(),
            tags: self.tags.clone(),
            steps_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for TransformerPipeline<F> {
    fn type_name(&self) -> &'static str {
        "TransformerPipeline"
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
        let mut params = Params::new().with(STEPS, self.steps.to_param());
        if deep {
            params.extend(self.steps.get_params(true));
        }
        params
    }

    fn set_params(&mut self, mut params: Params<F>) -> Result<()> {
        let mut steps = match params.remove(STEPS) {
            Some(value) => NamedSteps::new(
                NamedSteps::steps_from_param(value, &ParamPath::from(STEPS))?,
                &[STEPS],
            )?,
            None => self.steps.clone(),
        };
        steps.set_params(params)?.check_leaves(&[])?;

        let state = self.state.unfitted();
        *self = Self::from_steps(steps)?;
        self.state = state;
        Ok(())
    }
}

impl<F: Float> Transformer<F> for TransformerPipeline<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<()> {
        let (fitted, _) = fit_chain(&self.steps, x, y)?;
        self.steps_ = Some(fitted);
        info!(
            estimator = "TransformerPipeline",
            n_steps = self.steps.len(),
            "fitted composite"
        );
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        transform_chain(self.fitted_steps()?, x, y)
    }

    fn inverse_transform_core(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        inverse_chain(self.fitted_steps()?, x, y)
    }

    fn fitted_params_core(&self) -> Params<F> {
        match &self.steps_ {
            Some(fitted) => chain_fitted_params(&self.steps, fitted),
            None => Params::new(),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for TransformerPipeline<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        let steps = |a: Box<dyn Transformer<F>>, b: Box<dyn Transformer<F>>| {
            ParamValue::List(vec![
                ParamValue::Estimator(AnyEstimator::Transformer(a)),
                ParamValue::Estimator(AnyEstimator::Transformer(b)),
            ])
        };
        vec![
            Params::new().with(
                STEPS,
                steps(
                    Box::new(LogTransformer::default()),
                    Box::new(LogTransformer::default()),
                ),
            ),
            Params::new().with(
                STEPS,
                steps(
                    Box::new(CosineTransformer::default()),
                    Box::new(LogTransformer::default()),
                ),
            ),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut pipeline = Self::from_transformers(vec![Box::new(LogTransformer::default())])?;
        pipeline.set_params(params)?;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformations::{Imputer, LogTransformerParams, Padder};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    fn log(offset: f64) -> Box<dyn Transformer<f64>> {
        Box::new(
            LogTransformerParams::new()
                .offset(offset)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn unnamed_duplicates_are_disambiguated() {
        let pipe = TransformerPipeline::from_transformers(vec![log(1.), log(2.)]).unwrap();

        assert_eq!(pipe.steps().names(), vec!["LogTransformer_1", "LogTransformer_2"]);
    }

    #[test]
    fn transform_matches_manual_chain() {
        let x = TsData::Panel3D(Array3::from_shape_fn((2, 1, 4), |(i, _, t)| (i + t) as f64));
        let mut pipe = TransformerPipeline::from_transformers(vec![log(1.), log(1.)]).unwrap();
        let out = pipe.fit_transform(&x, None).unwrap();

        let expected = x.map_values(|v| (v + 1.).ln()).map_values(|v| (v + 1.).ln());
        assert_abs_diff_eq!(
            out.as_panel_3d().unwrap(),
            expected.as_panel_3d().unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn inverse_runs_in_reverse() {
        let x = TsData::SeriesArray(array![[1.], [2.], [3.]]);
        let mut pipe = TransformerPipeline::from_transformers(vec![log(1.), log(2.)]).unwrap();
        let xt = pipe.fit_transform(&x, None).unwrap();
        let back = pipe.inverse_transform(&xt, None).unwrap();

        assert_abs_diff_eq!(
            back.as_series_array().unwrap(),
            x.as_series_array().unwrap(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn tags_are_merged_on_construction() {
        let pipe = TransformerPipeline::from_transformers(vec![
            Box::new(Padder::default()) as Box<dyn Transformer<f64>>,
            log(1.),
        ])
        .unwrap();
        assert!(pipe.get_flag(Tag::UnequalLength));
        assert!(pipe.get_flag(Tag::RemovesUnequalLength));
        assert!(!pipe.get_flag(Tag::MissingValues));

        let pipe = TransformerPipeline::from_transformers(vec![
            log(1.),
            Box::new(Imputer::default()) as Box<dyn Transformer<f64>>,
        ])
        .unwrap();
        assert!(!pipe.get_flag(Tag::RemovesMissingValues));
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        assert!(matches!(
            TransformerPipeline::<f64>::from_transformers(vec![]),
            Err(Error::Parameters(_))
        ));
    }

    #[test]
    fn set_params_reaches_steps() {
        let mut pipe = TransformerPipeline::from_transformers(vec![log(1.), log(1.)]).unwrap();
        pipe.set_params(Params::new().with_float(
            ParamPath::new(vec!["LogTransformer_2", "offset"]),
            3.,
        ))
        .unwrap();
        let params = pipe.get_params(true);

        assert_eq!(
            params.get(ParamPath::new(vec!["LogTransformer_1", "offset"])),
            Some(&ParamValue::Float(1.))
        );
        assert_eq!(
            params.get(ParamPath::new(vec!["LogTransformer_2", "offset"])),
            Some(&ParamValue::Float(3.))
        );
        assert!(pipe
            .set_params(Params::new().with("unknown", true))
            .is_err());
    }

    #[test]
    fn transform_before_fit_fails() {
        let pipe = TransformerPipeline::from_transformers(vec![log(1.)]).unwrap();
        let x = TsData::SeriesArray(array![[1.]]);

        assert!(matches!(pipe.transform(&x, None), Err(Error::NotFitted(_))));
    }
}
