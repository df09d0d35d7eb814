use std::marker::PhantomData;

use crate::base::{BaseObject, EstimatorState, Params, TestParams};
use crate::dataset::{Float, TsData};
use crate::error::Result;
use crate::tags::{Tag, TagSet};
use crate::traits::Transformer;

/// Elementwise cosine of the values
///
/// Stateless and not invertible, the cosine is periodic.
#[derive(Debug)]
pub struct CosineTransformer<F> {
    state: EstimatorState,
    phantom: PhantomData<F>,
}

impl<F: Float> Default for CosineTransformer<F> {
    fn default() -> Self {
        CosineTransformer {
            state: EstimatorState::default(),
            phantom: PhantomData,
        }
    }
}

impl<F: Float> Clone for CosineTransformer<F> {
    fn clone(&self) -> Self {
        CosineTransformer {
            state: self.state.unfitted(),
            phantom: PhantomData,
        }
    }
}

impl<F: Float> BaseObject<F> for CosineTransformer<F> {
    fn type_name(&self) -> &'static str {
        "CosineTransformer"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::transformer_defaults()
            .with(Tag::Multivariate, true)
            .with(Tag::UnequalLength, true)
            .with(Tag::MissingValues, true)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new()
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[])?;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Transformer<F> for CosineTransformer<F> {
    fn fit_core(&mut self, _x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<()> {
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        Ok(x.map_values(|v| v.cos()))
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for CosineTransformer<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![Params::new()]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut transformer = CosineTransformer::default();
        transformer.set_params(params)?;
        Ok(transformer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn transform_applies_cosine() {
        let x = TsData::SeriesArray(array![[0.], [std::f64::consts::PI]]);
        let out = CosineTransformer::default().fit_transform(&x, None).unwrap();

        assert_abs_diff_eq!(out.as_series_array().unwrap(), &array![[1.], [-1.]], epsilon = 1e-12);
    }

    #[test]
    fn cannot_be_inverted() {
        let x = TsData::SeriesArray(array![[0.5]]);
        let mut cosine = CosineTransformer::<f64>::default();
        cosine.fit(&x, None).unwrap();

        assert!(!cosine.get_flag(Tag::InverseTransform));
        assert!(matches!(
            cosine.inverse_transform(&x, None),
            Err(Error::NotImplemented { .. })
        ));
    }
}
