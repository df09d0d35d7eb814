use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::summary::{instances, Statistic};
use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, MType, TsData};
use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet, OUTPUT_PRIMITIVES};
use crate::traits::Transformer;

const BINS: &str = "bins";
const CLOSED: &str = "closed";
const AGGFUNC: &str = "aggfunc";

/// Time intervals the series are cut into
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum TimeBins<F> {
    /// Split every series into this many contiguous bins of (almost) equal size
    Count(usize),
    /// Interval edges on the time axis, the time of the `t`-th observation is `t`
    Edges(Vec<F>),
}

/// Which end of an interval belongs to it
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Left,
    Right,
}

impl Closed {
    pub fn name(&self) -> &'static str {
        match self {
            Closed::Left => "left",
            Closed::Right => "right",
        }
    }
}

impl FromStr for Closed {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Closed::Left),
            "right" => Ok(Closed::Right),
            _ => Err(Error::Parameters(format!(
                "closed must be `left` or `right`, got `{}`",
                s
            ))),
        }
    }
}

/// Checked parameters of a [`TimeBinner`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBinnerValidParams<F> {
    bins: TimeBins<F>,
    closed: Closed,
    aggfunc: Statistic,
}

impl<F: Float> TimeBinnerValidParams<F> {
    pub fn n_bins(&self) -> usize {
        match &self.bins {
            TimeBins::Count(n) => *n,
            TimeBins::Edges(edges) => edges.len() - 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBinnerParams<F>(TimeBinnerValidParams<F>);

impl<F: Float> Default for TimeBinnerParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> TimeBinnerParams<F> {
    pub fn new() -> Self {
        TimeBinnerParams(TimeBinnerValidParams {
            bins: TimeBins::Count(2),
            closed: Closed::Left,
            aggfunc: Statistic::Mean,
        })
    }

    pub fn bins(mut self, bins: TimeBins<F>) -> Self {
        self.0.bins = bins;
        self
    }

    /// Closed end of explicit edges, ignored for counted bins
    pub fn closed(mut self, closed: Closed) -> Self {
        self.0.closed = closed;
        self
    }

    pub fn aggfunc(mut self, aggfunc: Statistic) -> Self {
        self.0.aggfunc = aggfunc;
        self
    }

    pub fn build(self) -> Result<TimeBinner<F>> {
        Ok(TimeBinner::new(self.check()?))
    }
}

impl<F: Float> ParamGuard for TimeBinnerParams<F> {
    type Checked = TimeBinnerValidParams<F>;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        match &self.0.bins {
            TimeBins::Count(0) => Err(Error::Parameters("at least one bin is needed".into())),
            TimeBins::Edges(edges) if edges.len() < 2 => Err(Error::Parameters(
                "at least two bin edges are needed".into(),
            )),
            TimeBins::Edges(edges)
                if edges.iter().any(|e| !e.is_finite())
                    || edges.windows(2).any(|w| w[0] >= w[1]) =>
            {
                Err(Error::Parameters(
                    "bin edges must be finite and strictly increasing".into(),
                ))
            }
            _ => Ok(&self.0),
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Aggregates every series over intervals of time
///
/// Turns a panel into a table with one row per instance and one column per channel and bin,
/// grouped by channel. Bins without observations are `NaN`.
#[derive(Debug)]
pub struct TimeBinner<F> {
    params: TimeBinnerValidParams<F>,
    state: EstimatorState,
}

impl<F: Float> TimeBinner<F> {
    pub fn new(params: TimeBinnerValidParams<F>) -> Self {
        TimeBinner {
            params,
            state: EstimatorState::default(),
        }
    }

    pub fn params() -> TimeBinnerParams<F> {
        TimeBinnerParams::new()
    }

    /// Bin index of every time point of a series of length `n`
    fn assign(&self, n: usize) -> Vec<Option<usize>> {
        match &self.params.bins {
            TimeBins::Count(k) => {
                let (size, rest) = (n / k, n % k);
                let mut out = Vec::with_capacity(n);
                for bin in 0..*k {
                    let len = size + (bin < rest) as usize;
                    out.extend(std::iter::repeat(Some(bin)).take(len));
                }
                out
            }
            TimeBins::Edges(edges) => (0..n)
                .map(|t| {
                    let t = F::cast(t);
                    edges.windows(2).position(|w| match self.params.closed {
                        Closed::Left => w[0] <= t && t < w[1],
                        Closed::Right => w[0] < t && t <= w[1],
                    })
                })
                .collect(),
        }
    }

    fn bin_channel(&self, channel: ArrayView1<F>, out: &mut [F]) {
        let assignment = self.assign(channel.len());
        for (bin, value) in out.iter_mut().enumerate() {
            let members: Array1<F> = channel
                .iter()
                .zip(assignment.iter())
                .filter(|(_, b)| **b == Some(bin))
                .map(|(v, _)| *v)
                .collect();
            *value = self.params.aggfunc.apply(members.view());
        }
    }
}

impl<F: Float> Default for TimeBinner<F> {
    fn default() -> Self {
        TimeBinner::new(TimeBinnerParams::new().0)
    }
}

impl<F: Float> Clone for TimeBinner<F> {
    fn clone(&self) -> Self {
        TimeBinner {
            params: self.params.clone(),
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for TimeBinner<F> {
    fn type_name(&self) -> &'static str {
        "TimeBinner"
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
        let bins = match &self.params.bins {
            TimeBins::Count(n) => ParamValue::from(*n),
            TimeBins::Edges(edges) => {
                ParamValue::List(edges.iter().map(|e| ParamValue::Float(*e)).collect())
            }
        };
        Params::new()
            .with(BINS, bins)
            .with(CLOSED, self.params.closed.name())
            .with(AGGFUNC, self.params.aggfunc.name())
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[BINS, CLOSED, AGGFUNC])?;
        let mut builder = TimeBinnerParams(self.params.clone());
        if let Some(bins) = params.get(BINS) {
            let path = ParamPath::from(BINS);
            let bins = match bins {
                ParamValue::List(edges) => TimeBins::Edges(
                    edges
                        .iter()
                        .map(|e| e.as_float(&path))
                        .collect::<Result<_>>()?,
                ),
                other => TimeBins::Count(other.as_usize(&path)?),
            };
            builder = builder.bins(bins);
        }
        if let Some(closed) = params.get(CLOSED) {
            builder = builder.closed(closed.as_str(&ParamPath::from(CLOSED))?.parse()?);
        }
        if let Some(aggfunc) = params.get(AGGFUNC) {
            builder = builder.aggfunc(aggfunc.as_str(&ParamPath::from(AGGFUNC))?.parse()?);
        }

        self.params = builder.check()?;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Transformer<F> for TimeBinner<F> {
    fn fit_core(&mut self, _x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<()> {
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        let instances = instances(x)?;
        let n_bins = self.params.n_bins();
        let n_channels = instances.first().map(|i| i.nrows()).unwrap_or(0);

        let mut table = Array2::zeros((instances.len(), n_channels * n_bins));
        for (mut row, instance) in table.axis_iter_mut(Axis(0)).zip(instances.iter()) {
            let row = row
                .as_slice_mut()
                .ok_or_else(|| Error::InvalidData("table rows must be contiguous".into()))?;
            for (c, channel) in instance.axis_iter(Axis(0)).enumerate() {
                self.bin_channel(channel, &mut row[c * n_bins..(c + 1) * n_bins]);
            }
        }

        Ok(TsData::TableArray(table))
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for TimeBinner<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new()
                .with(
                    BINS,
                    ParamValue::List(vec![
                        ParamValue::Float(F::zero()),
                        ParamValue::Float(F::cast(3)),
                        ParamValue::Float(F::cast(6)),
                    ]),
                )
                .with(CLOSED, "right")
                .with(AGGFUNC, "max"),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut binner = TimeBinner::default();
        binner.set_params(params)?;
        Ok(binner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};

    fn series() -> Array2<f64> {
        array![[1., 2., 3., 4., 5., 6., 7.]]
    }

    fn manual(values: &Array2<f64>, keep: impl Fn(f64) -> bool) -> f64 {
        let kept: Vec<f64> = values
            .row(0)
            .iter()
            .enumerate()
            .filter(|(t, _)| keep(*t as f64))
            .map(|(_, v)| *v)
            .collect();
        kept.iter().sum::<f64>() / kept.len() as f64
    }

    #[test]
    fn left_closed_bins_match_manual_aggregation() {
        let x = series();
        let mut binner = TimeBinner::params()
            .bins(TimeBins::Edges(vec![0., 2., 5.]))
            .build()
            .unwrap();
        let out = binner
            .fit_transform(&TsData::PanelList(vec![x.clone()]), None)
            .unwrap();

        assert_eq!(
            out,
            TsData::TableArray(array![[
                manual(&x, |t| 0. <= t && t < 2.),
                manual(&x, |t| 2. <= t && t < 5.)
            ]])
        );
    }

    #[test]
    fn right_closed_bins_match_manual_aggregation() {
        let x = series();
        let mut binner = TimeBinner::params()
            .bins(TimeBins::Edges(vec![0., 2., 5.]))
            .closed(Closed::Right)
            .build()
            .unwrap();
        let out = binner
            .fit_transform(&TsData::PanelList(vec![x.clone()]), None)
            .unwrap();

        assert_eq!(
            out,
            TsData::TableArray(array![[
                manual(&x, |t| 0. < t && t <= 2.),
                manual(&x, |t| 2. < t && t <= 5.)
            ]])
        );
    }

    #[test]
    fn counted_bins_split_evenly() {
        let x = TsData::PanelList(vec![series(), series().slice(s![.., ..4]).to_owned()]);
        let mut binner = TimeBinner::params()
            .bins(TimeBins::Count(2))
            .aggfunc(Statistic::Sum)
            .build()
            .unwrap();
        let out = binner.fit_transform(&x, None).unwrap();

        assert_eq!(out, TsData::TableArray(array![[10., 18.], [3., 7.]]));
    }

    #[test]
    fn edges_must_increase() {
        assert!(TimeBinnerParams::<f64>::new()
            .bins(TimeBins::Edges(vec![0., 0.]))
            .build()
            .is_err());

        let mut binner = TimeBinner::<f64>::default();
        assert!(binner.set_params(Params::new().with(BINS, 0usize)).is_err());
    }
}
