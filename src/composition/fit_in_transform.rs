use crate::base::{AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, TsData};
use crate::error::Result;
use crate::tags::{Tag, TagSet};
use crate::traits::Transformer;
use crate::transformations::{Imputer, LogTransformer};

use super::heterogeneous::split_component_params;

const TRANSFORMER: &str = "transformer";
const SKIP_INVERSE: &str = "skip_inverse_transform";

/// Transformer which is fitted on the data it transforms
///
/// `fit` does nothing. Every call to `transform` fits a fresh clone of the wrapped transformer
/// on its input and returns the transformed input. Useful for instancewise transformers in a
/// forecasting pipeline, where the data seen in `predict` differs from the data seen in `fit`.
pub struct FitInTransform<F: Float> {
    transformer: Box<dyn Transformer<F>>,
    skip_inverse_transform: bool,
    tags: TagSet,
    state: EstimatorState,
}

impl<F: Float> FitInTransform<F> {
    pub fn new(transformer: Box<dyn Transformer<F>>, skip_inverse_transform: bool) -> Self {
        let tags = TagSet::transformer_defaults()
            .merged(&transformer.get_tags())
            .with(Tag::FitIsEmpty, true)
            .with(Tag::SkipInverseTransform, skip_inverse_transform);

        FitInTransform {
            transformer,
            skip_inverse_transform,
            tags,
            state: EstimatorState::default(),
        }
    }

    pub fn transformer(&self) -> &dyn Transformer<F> {
        &*self.transformer
    }
}

impl<F: Float> Clone for FitInTransform<F> {
    fn clone(&self) -> Self {
        FitInTransform {
            transformer: self.transformer.clone(),
            skip_inverse_transform: self.skip_inverse_transform,
            tags: self.tags.clone(),
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for FitInTransform<F> {
    fn type_name(&self) -> &'static str {
        "FitInTransform"
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
                TRANSFORMER,
                ParamValue::Estimator(AnyEstimator::Transformer(self.transformer.clone())),
            )
            .with(SKIP_INVERSE, self.skip_inverse_transform);
        if deep {
            params.extend(self.transformer.get_params(true).prefixed(TRANSFORMER));
        }
        params
    }

    fn set_params(&mut self, mut params: Params<F>) -> Result<()> {
        let mut transformer = match params.remove(TRANSFORMER) {
            Some(value) => value
                .into_estimator(&ParamPath::from(TRANSFORMER))?
                .into_transformer()?,
            None => self.transformer.clone(),
        };
        let skip = match params.remove(SKIP_INVERSE) {
            Some(value) => value.as_bool(&ParamPath::from(SKIP_INVERSE))?,
            None => self.skip_inverse_transform,
        };
        let (nested, rest) = split_component_params(params, TRANSFORMER, &transformer);
        rest.check_leaves(&[])?;
        if !nested.is_empty() {
            transformer.set_params(nested)?;
        }

        let state = self.state.unfitted();
        *self = Self::new(transformer, skip);
        self.state = state;
        Ok(())
    }
}

impl<F: Float> Transformer<F> for FitInTransform<F> {
    fn fit_core(&mut self, _x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<()> {
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        self.transformer.boxed_clone().fit_transform(x, y)
    }

    fn inverse_transform_core(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        let mut transformer = self.transformer.boxed_clone();
        transformer.fit(x, y)?;
        transformer.inverse_transform(x, y)
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for FitInTransform<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        let transformer =
            |t: Box<dyn Transformer<F>>| ParamValue::Estimator(AnyEstimator::Transformer(t));
        vec![
            Params::new().with(TRANSFORMER, transformer(Box::new(LogTransformer::default()))),
            Params::new()
                .with(TRANSFORMER, transformer(Box::new(Imputer::default())))
                .with(SKIP_INVERSE, true),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut estimator = Self::new(Box::new(LogTransformer::default()), false);
        estimator.set_params(params)?;
        Ok(estimator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformations::Imputer;
    use ndarray::array;

    #[test]
    fn transform_fits_on_its_input() {
        let mut wrapped = FitInTransform::new(Box::new(Imputer::<f64>::default()), true);
        wrapped
            .fit(&TsData::SeriesArray(array![[100.], [200.]]), None)
            .unwrap();

        let x = TsData::SeriesArray(array![[1.], [f64::NAN], [3.]]);
        let out = wrapped.transform(&x, None).unwrap();

        assert_eq!(out, TsData::SeriesArray(array![[1.], [2.], [3.]]));
        assert!(!wrapped.transformer().is_fitted());
    }

    #[test]
    fn tags_come_from_the_wrapped_transformer() {
        let wrapped = FitInTransform::new(Box::new(Imputer::<f64>::default()), true);

        assert!(wrapped.get_flag(Tag::FitIsEmpty));
        assert!(wrapped.get_flag(Tag::RemovesMissingValues));
        assert!(wrapped.get_flag(Tag::SkipInverseTransform));
    }
}
