use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayViewMut1, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::summary::{instances, Statistic};
use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet};
use crate::traits::Transformer;

const METHOD: &str = "method";
const VALUE: &str = "value";

/// How missing values are filled
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeMethod {
    /// Per channel mean of the data seen in `fit`
    Mean,
    /// Per channel median of the data seen in `fit`
    Median,
    /// The configured `value`
    Constant,
    /// Last observed value, leading gaps take the first observed value
    Ffill,
    /// Next observed value, trailing gaps take the last observed value
    Bfill,
}

impl ImputeMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ImputeMethod::Mean => "mean",
            ImputeMethod::Median => "median",
            ImputeMethod::Constant => "constant",
            ImputeMethod::Ffill => "ffill",
            ImputeMethod::Bfill => "bfill",
        }
    }
}

impl fmt::Display for ImputeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImputeMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(ImputeMethod::Mean),
            "median" => Ok(ImputeMethod::Median),
            "constant" => Ok(ImputeMethod::Constant),
            "ffill" => Ok(ImputeMethod::Ffill),
            "bfill" => Ok(ImputeMethod::Bfill),
            _ => Err(Error::Parameters(format!("unknown imputation method `{}`", s))),
        }
    }
}

/// Checked parameters of an [`Imputer`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ImputerValidParams<F> {
    method: ImputeMethod,
    value: Option<F>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImputerParams<F>(ImputerValidParams<F>);

impl<F: Float> Default for ImputerParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> ImputerParams<F> {
    pub fn new() -> Self {
        ImputerParams(ImputerValidParams {
            method: ImputeMethod::Mean,
            value: None,
        })
    }

    pub fn method(mut self, method: ImputeMethod) -> Self {
        self.0.method = method;
        self
    }

    /// Fill value of the `Constant` method
    pub fn value(mut self, value: Option<F>) -> Self {
        self.0.value = value;
        self
    }

    pub fn build(self) -> Result<Imputer<F>> {
        Ok(Imputer::new(self.check()?))
    }
}

impl<F: Float> ParamGuard for ImputerParams<F> {
    type Checked = ImputerValidParams<F>;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        match (self.0.method, self.0.value) {
            (ImputeMethod::Constant, None) => Err(Error::Parameters(
                "the constant method needs a fill value".into(),
            )),
            (_, Some(v)) if v.is_nan() => {
                Err(Error::Parameters("the fill value must not be NaN".into()))
            }
            _ => Ok(&self.0),
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

fn forward_fill<F: Float>(mut channel: ArrayViewMut1<F>) {
    let mut last = None;
    for v in channel.iter_mut() {
        if v.is_nan() {
            if let Some(l) = last {
                *v = l;
            }
        } else {
            last = Some(*v);
        }
    }
}

fn backward_fill<F: Float>(mut channel: ArrayViewMut1<F>) {
    let mut next = None;
    for v in channel.iter_mut().rev() {
        if v.is_nan() {
            if let Some(n) = next {
                *v = n;
            }
        } else {
            next = Some(*v);
        }
    }
}

/// Fills missing values, marked as `NaN`
///
/// The mean and median methods learn one fill value per channel in `fit`, the other methods
/// only look at the data being transformed.
#[derive(Debug)]
pub struct Imputer<F> {
    params: ImputerValidParams<F>,
    fill_: Option<Array1<F>>,
    state: EstimatorState,
}

impl<F: Float> Imputer<F> {
    pub fn new(params: ImputerValidParams<F>) -> Self {
        Imputer {
            params,
            fill_: None,
            state: EstimatorState::default(),
        }
    }

    pub fn params() -> ImputerParams<F> {
        ImputerParams::new()
    }

    fn fill_instance(&self, mut instance: Array2<F>) -> Result<Array2<F>> {
        for (c, mut channel) in instance.axis_iter_mut(Axis(0)).enumerate() {
            match self.params.method {
                ImputeMethod::Ffill => {
                    forward_fill(channel.view_mut());
                    backward_fill(channel);
                }
                ImputeMethod::Bfill => {
                    backward_fill(channel.view_mut());
                    forward_fill(channel);
                }
                ImputeMethod::Constant => {
                    let value = self.params.value.unwrap_or_else(F::zero);
                    channel.mapv_inplace(|v| if v.is_nan() { value } else { v });
                }
                ImputeMethod::Mean | ImputeMethod::Median => {
                    let fill = self
                        .fill_
                        .as_ref()
                        .ok_or_else(|| Error::NotFitted(self.type_name().to_string()))?;
                    let value = *fill.get(c).ok_or_else(|| {
                        Error::InvalidData(format!(
                            "{} channels seen in fit, got channel {}",
                            fill.len(),
                            c
                        ))
                    })?;
                    channel.mapv_inplace(|v| if v.is_nan() { value } else { v });
                }
            }
        }
        Ok(instance)
    }
}

impl<F: Float> Default for Imputer<F> {
    fn default() -> Self {
        Imputer::new(ImputerParams::new().0)
    }
}

impl<F: Float> Clone for Imputer<F> {
    fn clone(&self) -> Self {
        Imputer {
            params: self.params.clone(),
            fill_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for Imputer<F> {
    fn type_name(&self) -> &'static str {
        "Imputer"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::transformer_defaults()
            .with(Tag::XInnerType, vec![MType::SeriesArray, MType::PanelList])
            .with(Tag::Multivariate, true)
            .with(Tag::UnequalLength, true)
            .with(Tag::MissingValues, true)
            .with(Tag::RemovesMissingValues, true)
            .with(Tag::FitIsEmpty, false)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        let mut params = Params::new().with(METHOD, self.params.method.name());
        match self.params.value {
            Some(v) => params.insert(VALUE, ParamValue::Float(v)),
            None => params.insert(VALUE, ParamValue::None),
        }
        params
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[METHOD, VALUE])?;
        let mut builder = ImputerParams(self.params.clone());
        if let Some(method) = params.get(METHOD) {
            builder = builder.method(method.as_str(&ParamPath::from(METHOD))?.parse()?);
        }
        if let Some(value) = params.get(VALUE) {
            let value = match value {
                ParamValue::None => None,
                v => Some(v.as_float(&ParamPath::from(VALUE))?),
            };
            builder = builder.value(value);
        }

        self.params = builder.check()?;
        self.fill_ = None;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Transformer<F> for Imputer<F> {
    fn fit_core(&mut self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<()> {
        let statistic = match self.params.method {
            ImputeMethod::Mean => Statistic::Mean,
            ImputeMethod::Median => Statistic::Median,
            _ => return Ok(()),
        };

        let instances = instances(x)?;
        let n_channels = instances.first().map(|i| i.nrows()).unwrap_or(0);
        let fill = (0..n_channels)
            .map(|c| {
                let observed: Array1<F> = instances
                    .iter()
                    .flat_map(|i| i.row(c).to_vec())
                    .filter(|v| !v.is_nan())
                    .collect();
                if observed.is_empty() {
                    return Err(Error::InvalidData(format!(
                        "channel {} has no observed values to impute from",
                        c
                    )));
                }
                Ok(statistic.apply(observed.view()))
            })
            .collect::<Result<Array1<F>>>()?;

        self.fill_ = Some(fill);
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        let filled = instances(x)?
            .into_iter()
            .map(|i| self.fill_instance(i))
            .collect::<Result<Vec<_>>>()?;

        match x {
            TsData::SeriesArray(_) => {
                let series = filled.into_iter().next().unwrap_or_else(|| Array2::zeros((0, 0)));
                Ok(TsData::SeriesArray(series.reversed_axes()))
            }
            _ => Ok(TsData::PanelList(filled)),
        }
    }

    fn fitted_params_core(&self) -> Params<F> {
        match &self.fill_ {
            Some(fill) => Params::new().with(
                "fill_values",
                fill.iter().map(|v| ParamValue::Float(*v)).collect::<Vec<_>>(),
            ),
            None => Params::new(),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for Imputer<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new().with(METHOD, "ffill"),
            Params::new()
                .with(METHOD, "constant")
                .with_float(VALUE, F::zero()),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut imputer = Imputer::default();
        imputer.set_params(params)?;
        Ok(imputer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const NAN: f64 = f64::NAN;

    #[test]
    fn mean_is_learned_in_fit() {
        let mut imputer = Imputer::default();
        imputer
            .fit(&TsData::SeriesArray(array![[1., 10.], [3., NAN]]), None)
            .unwrap();
        let out = imputer
            .transform(&TsData::SeriesArray(array![[NAN, NAN], [5., 1.]]), None)
            .unwrap();

        assert_eq!(out, TsData::SeriesArray(array![[2., 10.], [5., 1.]]));
    }

    #[test]
    fn fills_follow_the_series_direction() {
        let x = TsData::PanelList(vec![array![[NAN, 1., NAN, 3., NAN]]]);

        let mut ffill = Imputer::params().method(ImputeMethod::Ffill).build().unwrap();
        assert_eq!(
            ffill.fit_transform(&x, None).unwrap(),
            TsData::PanelList(vec![array![[1., 1., 1., 3., 3.]]])
        );

        let mut bfill = Imputer::params().method(ImputeMethod::Bfill).build().unwrap();
        assert_eq!(
            bfill.fit_transform(&x, None).unwrap(),
            TsData::PanelList(vec![array![[1., 1., 3., 3., 3.]]])
        );
    }

    #[test]
    fn constant_needs_a_value() {
        assert!(ImputerParams::<f64>::new().method(ImputeMethod::Constant).build().is_err());

        let mut imputer = Imputer::<f64>::default();
        imputer
            .set_params(Params::new().with(METHOD, "constant").with_float(VALUE, -1.))
            .unwrap();
        let out = imputer.fit_transform(&TsData::SeriesArray(array![[NAN]]), None).unwrap();
        assert_eq!(out, TsData::SeriesArray(array![[-1.]]));
    }

    #[test]
    fn all_missing_channel_cannot_be_fitted() {
        let mut imputer = Imputer::default();

        assert!(matches!(
            imputer.fit(&TsData::SeriesArray(array![[NAN], [NAN]]), None),
            Err(Error::InvalidData(_))
        ));
    }
}
