use ndarray::{s, Array2};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet};
use crate::traits::Transformer;

const PAD_LENGTH: &str = "pad_length";
const FILL_VALUE: &str = "fill_value";

/// Checked parameters of a [`Padder`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct PadderValidParams<F> {
    pad_length: Option<usize>,
    fill_value: F,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PadderParams<F>(PadderValidParams<F>);

impl<F: Float> Default for PadderParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> PadderParams<F> {
    pub fn new() -> Self {
        PadderParams(PadderValidParams {
            pad_length: None,
            fill_value: F::zero(),
        })
    }

    /// Length every instance is padded to
    ///
    /// If unset, the length of the longest instance seen in `fit` is used.
    pub fn pad_length(mut self, pad_length: Option<usize>) -> Self {
        self.0.pad_length = pad_length;
        self
    }

    pub fn fill_value(mut self, fill_value: F) -> Self {
        self.0.fill_value = fill_value;
        self
    }

    pub fn build(self) -> Result<Padder<F>> {
        Ok(Padder::new(self.check()?))
    }
}

impl<F: Float> ParamGuard for PadderParams<F> {
    type Checked = PadderValidParams<F>;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.pad_length == Some(0) {
            Err(Error::Parameters("pad_length must be positive".into()))
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Pads every instance of a panel at the end to a common length
///
/// Removes unequal lengths, so estimators downstream only ever see equal length panels.
#[derive(Debug)]
pub struct Padder<F> {
    params: PadderValidParams<F>,
    pad_length_: Option<usize>,
    state: EstimatorState,
}

impl<F: Float> Padder<F> {
    pub fn new(params: PadderValidParams<F>) -> Self {
        Padder {
            params,
            pad_length_: None,
            state: EstimatorState::default(),
        }
    }

    pub fn params() -> PadderParams<F> {
        PadderParams::new()
    }
}

impl<F: Float> Default for Padder<F> {
    fn default() -> Self {
        Padder::new(PadderParams::new().0)
    }
}

impl<F: Float> Clone for Padder<F> {
    fn clone(&self) -> Self {
        Padder {
            params: self.params.clone(),
            pad_length_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for Padder<F> {
    fn type_name(&self) -> &'static str {
        "Padder"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::transformer_defaults()
            .with(Tag::XInnerType, vec![MType::PanelList])
            .with(Tag::Multivariate, true)
            .with(Tag::UnequalLength, true)
            .with(Tag::RemovesUnequalLength, true)
            .with(Tag::FitIsEmpty, false)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new()
            .with(PAD_LENGTH, self.params.pad_length)
            .with_float(FILL_VALUE, self.params.fill_value)
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[PAD_LENGTH, FILL_VALUE])?;
        let mut builder = PadderParams(self.params.clone());
        if let Some(length) = params.get(PAD_LENGTH) {
            builder = builder.pad_length(length.as_optional_usize(&ParamPath::from(PAD_LENGTH))?);
        }
        if let Some(fill) = params.get(FILL_VALUE) {
            builder = builder.fill_value(fill.as_float(&ParamPath::from(FILL_VALUE))?);
        }

        self.params = builder.check()?;
        self.pad_length_ = None;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Transformer<F> for Padder<F> {
    fn fit_core(&mut self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<()> {
        let longest = x.as_panel_list()?.iter().map(|i| i.ncols()).max().unwrap_or(0);
        self.pad_length_ = Some(self.params.pad_length.unwrap_or(longest));
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        let length = self
            .pad_length_
            .ok_or_else(|| Error::NotFitted(self.type_name().to_string()))?;

        let padded = x
            .as_panel_list()?
            .iter()
            .map(|instance| {
                if instance.ncols() > length {
                    return Err(Error::InvalidData(format!(
                        "instance of length {} exceeds the pad length {}",
                        instance.ncols(),
                        length
                    )));
                }
                let mut out = Array2::from_elem((instance.nrows(), length), self.params.fill_value);
                out.slice_mut(s![.., ..instance.ncols()]).assign(instance);
                Ok(out)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TsData::PanelList(padded))
    }

    fn fitted_params_core(&self) -> Params<F> {
        Params::new().with(PAD_LENGTH, self.pad_length_)
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for Padder<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new()
                .with(PAD_LENGTH, 20usize)
                .with(FILL_VALUE, ParamValue::Float(F::one())),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut padder = Padder::default();
        padder.set_params(params)?;
        Ok(padder)
    }
}
