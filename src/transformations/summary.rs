use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet, OUTPUT_PRIMITIVES};
use crate::traits::Transformer;

const SUMMARY_FUNCTION: &str = "summary_function";

/// Reduction of a sequence of values to a single number
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    Median,
    /// Sample standard deviation
    Std,
    Min,
    Max,
    Sum,
}

impl Statistic {
    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Std => "std",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Sum => "sum",
        }
    }

    /// Value of the statistic, `NaN` if it is undefined for the values
    pub fn apply<F: Float>(&self, values: ArrayView1<F>) -> F {
        let n = values.len();
        if n == 0 {
            return F::nan();
        }
        match self {
            Statistic::Mean => values.sum() / F::cast(n),
            Statistic::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                if n % 2 == 1 {
                    sorted[n / 2]
                } else {
                    (sorted[n / 2 - 1] + sorted[n / 2]) / F::cast(2)
                }
            }
            Statistic::Std if n < 2 => F::nan(),
            Statistic::Std => values.std(F::one()),
            Statistic::Min => values.fold(F::infinity(), |acc, v| acc.min(*v)),
            Statistic::Max => values.fold(F::neg_infinity(), |acc, v| acc.max(*v)),
            Statistic::Sum => values.sum(),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Statistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Statistic::Mean,
            Statistic::Median,
            Statistic::Std,
            Statistic::Min,
            Statistic::Max,
            Statistic::Sum,
        ]
        .iter()
        .copied()
        .find(|stat| stat.name() == s)
        .ok_or_else(|| Error::Parameters(format!("unknown statistic `{}`", s)))
    }
}

/// Instances of a series or panel as (channels, timepoints) arrays
pub(crate) fn instances<F: Float>(x: &TsData<F>) -> Result<Vec<Array2<F>>> {
    match x {
        TsData::SeriesArray(series) => Ok(vec![series.t().to_owned()]),
        TsData::PanelList(list) => Ok(list.clone()),
        other => Err(Error::InvalidData(format!(
            "expected a series array or panel list, got {}",
            other.mtype()
        ))),
    }
}

/// Parse a list of statistic names
pub(crate) fn statistics_param<F: Float>(
    value: &ParamValue<F>,
    path: &ParamPath,
) -> Result<Vec<Statistic>> {
    match value {
        ParamValue::Str(name) => Ok(vec![name.parse()?]),
        ParamValue::List(names) => names.iter().map(|n| n.as_str(path)?.parse()).collect(),
        other => Err(Error::Parameters(format!(
            "`{}` expects a statistic or a list of statistics, got {:?}",
            path, other
        ))),
    }
}

pub(crate) fn statistics_value<F: Float>(stats: &[Statistic]) -> ParamValue<F> {
    ParamValue::List(stats.iter().map(|s| ParamValue::from(s.name())).collect())
}

/// Checked parameters of a [`SummaryTransformer`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTransformerValidParams {
    summary_function: Vec<Statistic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTransformerParams(SummaryTransformerValidParams);

impl Default for SummaryTransformerParams {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryTransformerParams {
    pub fn new() -> Self {
        SummaryTransformerParams(SummaryTransformerValidParams {
            summary_function: vec![Statistic::Mean, Statistic::Std, Statistic::Min, Statistic::Max],
        })
    }

    pub fn summary_function(mut self, summary_function: Vec<Statistic>) -> Self {
        self.0.summary_function = summary_function;
        self
    }

    pub fn build<F: Float>(self) -> Result<SummaryTransformer<F>> {
        Ok(SummaryTransformer::new(self.check()?))
    }
}

impl ParamGuard for SummaryTransformerParams {
    type Checked = SummaryTransformerValidParams;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.summary_function.is_empty() {
            Err(Error::Parameters("at least one summary function is needed".into()))
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Summary statistics of every channel of every instance
///
/// Turns a panel into a table with one row per instance. Columns are grouped by channel, with
/// one column per summary function inside each group.
#[derive(Debug)]
pub struct SummaryTransformer<F> {
    params: SummaryTransformerValidParams,
    state: EstimatorState,
    phantom: std::marker::PhantomData<F>,
}

impl<F: Float> SummaryTransformer<F> {
    pub fn new(params: SummaryTransformerValidParams) -> Self {
        SummaryTransformer {
            params,
            state: EstimatorState::default(),
            phantom: std::marker::PhantomData,
        }
    }
}

impl<F: Float> Default for SummaryTransformer<F> {
    fn default() -> Self {
        SummaryTransformer::new(SummaryTransformerParams::new().0)
    }
}

impl<F: Float> Clone for SummaryTransformer<F> {
    fn clone(&self) -> Self {
        SummaryTransformer {
            params: self.params.clone(),
            state: self.state.unfitted(),
            phantom: std::marker::PhantomData,
        }
    }
}

impl<F: Float> BaseObject<F> for SummaryTransformer<F> {
    fn type_name(&self) -> &'static str {
        "SummaryTransformer"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::transformer_defaults()
            .with(Tag::XInnerType, vec![MType::PanelList, MType::SeriesArray])
            .with(Tag::OutputDataType, OUTPUT_PRIMITIVES)
            .with(Tag::Multivariate, true)
            .with(Tag::UnequalLength, true)
            .with(Tag::RemovesUnequalLength, true)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new().with(SUMMARY_FUNCTION, statistics_value(&self.params.summary_function))
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[SUMMARY_FUNCTION])?;
        if let Some(value) = params.get(SUMMARY_FUNCTION) {
            let stats = statistics_param(value, &ParamPath::from(SUMMARY_FUNCTION))?;
            self.params = SummaryTransformerParams::new().summary_function(stats).check()?;
        }
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Transformer<F> for SummaryTransformer<F> {
    fn fit_core(&mut self, _x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<()> {
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        let instances = instances(x)?;
        let stats = &self.params.summary_function;
        let n_channels = instances.first().map(|i| i.nrows()).unwrap_or(0);

        let mut table = Array2::zeros((instances.len(), n_channels * stats.len()));
        for (mut row, instance) in table.axis_iter_mut(Axis(0)).zip(instances.iter()) {
            for (c, channel) in instance.axis_iter(Axis(0)).enumerate() {
                for (k, stat) in stats.iter().enumerate() {
                    row[c * stats.len() + k] = stat.apply(channel);
                }
            }
        }

        Ok(TsData::TableArray(table))
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for SummaryTransformer<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new().with(SUMMARY_FUNCTION, "median"),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut transformer = SummaryTransformer::default();
        transformer.set_params(params)?;
        Ok(transformer)
    }
}
