#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, Params, TestParams};
use crate::dataset::{Float, TsData};
use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet};
use crate::traits::Transformer;

const OFFSET: &str = "offset";
const SCALE: &str = "scale";

/// Checked parameters of a [`LogTransformer`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct LogTransformerValidParams<F> {
    offset: F,
    scale: F,
}

impl<F: Float> LogTransformerValidParams<F> {
    pub fn offset(&self) -> F {
        self.offset
    }

    pub fn scale(&self) -> F {
        self.scale
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogTransformerParams<F>(LogTransformerValidParams<F>);

impl<F: Float> Default for LogTransformerParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> LogTransformerParams<F> {
    pub fn new() -> Self {
        LogTransformerParams(LogTransformerValidParams {
            offset: F::one(),
            scale: F::one(),
        })
    }

    /// Added to every value before taking the logarithm, defaults to `1`
    pub fn offset(mut self, offset: F) -> Self {
        self.0.offset = offset;
        self
    }

    /// Multiplies the logarithm, defaults to `1`
    pub fn scale(mut self, scale: F) -> Self {
        self.0.scale = scale;
        self
    }

    pub fn build(self) -> Result<LogTransformer<F>> {
        Ok(LogTransformer::new(self.check()?))
    }
}

impl<F: Float> ParamGuard for LogTransformerParams<F> {
    type Checked = LogTransformerValidParams<F>;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !self.0.offset.is_finite() {
            Err(Error::Parameters(format!("offset must be finite, got {}", self.0.offset)))
        } else if !self.0.scale.is_finite() || self.0.scale == F::zero() {
            Err(Error::Parameters(format!(
                "scale must be finite and non-zero, got {}",
                self.0.scale
            )))
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Scaled natural logarithm of the shifted values, `scale * ln(x + offset)`
///
/// The inverse is `exp(x / scale) - offset`. Values at or below `-offset` are rejected.
#[derive(Debug)]
pub struct LogTransformer<F> {
    params: LogTransformerValidParams<F>,
    state: EstimatorState,
}

impl<F: Float> LogTransformer<F> {
    pub fn new(params: LogTransformerValidParams<F>) -> Self {
        LogTransformer {
            params,
            state: EstimatorState::default(),
        }
    }

    pub fn params() -> LogTransformerParams<F> {
        LogTransformerParams::new()
    }
}

impl<F: Float> Default for LogTransformer<F> {
    fn default() -> Self {
        LogTransformer::new(LogTransformerParams::new().0)
    }
}

impl<F: Float> Clone for LogTransformer<F> {
    fn clone(&self) -> Self {
        LogTransformer {
            params: self.params.clone(),
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for LogTransformer<F> {
    fn type_name(&self) -> &'static str {
        "LogTransformer"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::transformer_defaults()
            .with(Tag::Multivariate, true)
            .with(Tag::UnequalLength, true)
            .with(Tag::InverseTransform, true)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new()
            .with_float(OFFSET, self.params.offset)
            .with_float(SCALE, self.params.scale)
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[OFFSET, SCALE])?;
        let mut builder = LogTransformerParams(self.params.clone());
        if let Some(offset) = params.get(OFFSET) {
            builder = builder.offset(offset.as_float(&ParamPath::from(OFFSET))?);
        }
        if let Some(scale) = params.get(SCALE) {
            builder = builder.scale(scale.as_float(&ParamPath::from(SCALE))?);
        }

        self.params = builder.check()?;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Transformer<F> for LogTransformer<F> {
    fn fit_core(&mut self, _x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<()> {
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        let LogTransformerValidParams { offset, scale } = self.params;
        if let Some(v) = x.values().find(|v| *v + offset <= F::zero()) {
            return Err(Error::InvalidData(format!(
                "logarithm is undefined for {} with offset {}",
                v, offset
            )));
        }
        Ok(x.map_values(|v| scale * (v + offset).ln()))
    }

    fn inverse_transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        let LogTransformerValidParams { offset, scale } = self.params;
        Ok(x.map_values(|v| (v / scale).exp() - offset))
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for LogTransformer<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new()
                .with_float(OFFSET, F::cast(2.))
                .with_float(SCALE, F::cast(0.5)),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut transformer = LogTransformer::default();
        transformer.set_params(params)?;
        Ok(transformer)
    }
}
