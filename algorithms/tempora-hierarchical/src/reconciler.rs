use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array1, Array2, Axis};
use tempora::base::{
    AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams,
};
use tempora::dataset::{ForecastingHorizon, IndexKey, IndexedFrame, MType, MultiIndex};
use tempora::forecasting::NaiveForecaster;
use tempora::tags::{Tag, TagSet};
use tempora::traits::Forecaster;
use tempora::{Float, TsData};
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::aggregate::{aggregate, drop_aggregates, has_aggregates};
use crate::error::{HierarchicalError, Result};
use crate::matrices::{
    bottom_up, least_squares, regularized, residual_covariance, shrunk_covariance, summation_matrix,
    top_down, ErrorWeights, LabeledMatrix,
};
use crate::{Node, TOTAL};

const FORECASTER: &str = "forecaster";
const METHOD: &str = "method";
const RETURN_TOTALS: &str = "return_totals";

/// How base forecasts are mapped onto the bottom level
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMethod {
    /// Bottom up, aggregates are ignored
    Bu,
    /// Ordinary least squares projection
    Ols,
    /// Weighted least squares with the number of bottom nodes below each node as variance
    WlsStr,
    /// Weighted least squares with the in-sample residual variances
    WlsVar,
    /// Minimum trace with the sample covariance of the in-sample residuals
    MintCov,
    /// Minimum trace with the residual covariance shrunk towards its diagonal
    MintShrink,
    /// Top down, the total is split by the average historical proportions
    TdProp,
}

impl ReconcileMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ReconcileMethod::Bu => "bu",
            ReconcileMethod::Ols => "ols",
            ReconcileMethod::WlsStr => "wls_str",
            ReconcileMethod::WlsVar => "wls_var",
            ReconcileMethod::MintCov => "mint_cov",
            ReconcileMethod::MintShrink => "mint_shrink",
            ReconcileMethod::TdProp => "td_prop",
        }
    }

    pub const ALL: [ReconcileMethod; 7] = [
        ReconcileMethod::Bu,
        ReconcileMethod::Ols,
        ReconcileMethod::WlsStr,
        ReconcileMethod::WlsVar,
        ReconcileMethod::MintCov,
        ReconcileMethod::MintShrink,
        ReconcileMethod::TdProp,
    ];

    /// Whether the reconciliation matrix is estimated from the in-sample residuals
    pub fn uses_residuals(&self) -> bool {
        matches!(
            self,
            ReconcileMethod::WlsVar | ReconcileMethod::MintCov | ReconcileMethod::MintShrink
        )
    }
}

impl fmt::Display for ReconcileMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReconcileMethod {
    type Err = tempora::Error;

    fn from_str(s: &str) -> tempora::Result<Self> {
        ReconcileMethod::ALL
            .iter()
            .find(|m| m.name() == s)
            .copied()
            .ok_or_else(|| {
                tempora::Error::Parameters(format!(
                    "unknown reconciliation method `{}`, expected one of {}",
                    s,
                    ReconcileMethod::ALL
                        .iter()
                        .map(|m| m.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Series of one node, aligned on the time level
struct NodeSeries<F> {
    node: Node,
    times: Vec<i64>,
    values: Array2<F>,
}

/// Split a hierarchical frame into one series per node, sorted by node
fn split_nodes<F: Float>(frame: &IndexedFrame<F>) -> Result<Vec<NodeSeries<F>>> {
    let depth = frame.nlevels() - 1;
    let mut nodes = frame
        .groups()
        .into_iter()
        .map(|(node, rows)| {
            let times = rows
                .iter()
                .map(|row| {
                    frame.index().key(*row)[depth].as_int().ok_or_else(|| {
                        HierarchicalError::InvalidHierarchy(format!(
                            "time points must be integers, got `{}`",
                            frame.index().key(*row)[depth]
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(NodeSeries {
                node,
                times,
                values: frame.values().select(Axis(0), &rows),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    nodes.sort_by(|a, b| a.node.cmp(&b.node));

    Ok(nodes)
}

/// Last time point shared by every node
fn common_cutoff<F>(nodes: &[NodeSeries<F>]) -> Result<i64> {
    let cutoffs: Vec<i64> = nodes
        .iter()
        .map(|n| n.times.iter().copied().max().unwrap_or(i64::MIN))
        .collect();
    match cutoffs.first() {
        Some(first) if cutoffs.iter().all(|c| c == first) => Ok(*first),
        Some(_) => Err(HierarchicalError::Misaligned(
            "every node must end at the same time point".into(),
        )),
        None => Err(HierarchicalError::InvalidHierarchy("no nodes".into())),
    }
}

/// Rows of column `column` of every node, aligned from the end
///
/// Only time points where every node has a finite value are kept.
fn aligned_column<F: Float>(series: &[Array2<F>], column: usize) -> Array2<F> {
    let len = series.iter().map(|s| s.nrows()).min().unwrap_or(0);
    let aligned = Array2::from_shape_fn((len, series.len()), |(t, i)| {
        let s = &series[i];
        s[(s.nrows() - len + t, column)]
    });
    let complete: Vec<usize> = aligned
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
        .map(|(t, _)| t)
        .collect();

    aligned.select(Axis(0), &complete)
}

/// Reconciliation matrix of one column of the hierarchy
fn reconciliation<F: Float>(
    method: ReconcileMethod,
    summation: &LabeledMatrix<F>,
    forecasters: &[Box<dyn Forecaster<F>>],
    history: &[Array2<F>],
    column: usize,
) -> Result<LabeledMatrix<F>> {
    let residuals = if method.uses_residuals() {
        let residuals = forecasters
            .iter()
            .map(|f| f.predict_residuals(None, None)?.into_series_array())
            .collect::<tempora::Result<Vec<_>>>()?;
        let residuals = aligned_column(&residuals, column);
        if residuals.nrows() < 2 {
            return Err(HierarchicalError::NotEnoughResiduals {
                method: method.name(),
                needed: 2,
                got: residuals.nrows(),
            });
        }
        residuals
    } else {
        Array2::zeros((0, forecasters.len()))
    };

    let g = match method {
        ReconcileMethod::Bu => bottom_up(summation)?,
        ReconcileMethod::Ols => least_squares(summation, &ErrorWeights::Identity)?,
        ReconcileMethod::WlsStr => least_squares(
            summation,
            &ErrorWeights::Diagonal(summation.values().sum_axis(Axis(1))),
        )?,
        ReconcileMethod::WlsVar => {
            let variances = residual_covariance(&residuals).diag().to_owned();
            let variances = regularized(Array2::from_diag(&variances)).diag().to_owned();
            least_squares(summation, &ErrorWeights::Diagonal(variances))?
        }
        ReconcileMethod::MintCov => least_squares(
            summation,
            &ErrorWeights::Full(regularized(residual_covariance(&residuals))),
        )?,
        ReconcileMethod::MintShrink => {
            let (shrunk, lambda) = shrunk_covariance(&residuals);
            debug!(lambda = %lambda, "shrinkage intensity");
            least_squares(summation, &ErrorWeights::Full(regularized(shrunk)))?
        }
        ReconcileMethod::TdProp => {
            top_down(summation, &proportions(summation, history, column)?)?
        }
    };
    debug!(
        method = method.name(),
        column,
        n_nodes = summation.rows().len(),
        n_bottom = summation.columns().len(),
        "built reconciliation matrix"
    );

    Ok(g)
}

/// Average share of every bottom node in the total over the history
fn proportions<F: Float>(
    summation: &LabeledMatrix<F>,
    history: &[Array2<F>],
    column: usize,
) -> Result<Array1<F>> {
    let total = summation
        .rows()
        .iter()
        .position(|n| n.iter().all(|k| k.as_str() == Some(TOTAL)))
        .ok_or_else(|| {
            HierarchicalError::InvalidHierarchy("top down needs the total node".into())
        })?;
    let observed = aligned_column(history, column);
    let rows: Vec<usize> = (0..observed.nrows())
        .filter(|t| observed[(*t, total)] != F::zero())
        .collect();
    if rows.is_empty() {
        return Err(HierarchicalError::InvalidHierarchy(
            "top down proportions need a non-zero total".into(),
        ));
    }

    let bottom: Vec<usize> = summation
        .columns()
        .iter()
        .map(|b| summation.rows().iter().position(|n| n == b).unwrap_or(total))
        .collect();
    let n = F::cast(rows.len());
    Ok(Array1::from_shape_fn(bottom.len(), |j| {
        rows.iter()
            .map(|t| observed[(*t, bottom[j])] / observed[(*t, total)])
            .sum::<F>()
            / n
    }))
}

struct Fitted<F: Float> {
    names: Vec<Option<String>>,
    columns: Vec<String>,
    nodes: Vec<Node>,
    forecasters: Vec<Box<dyn Forecaster<F>>>,
    history: Vec<Array2<F>>,
    cutoff: i64,
    summation: LabeledMatrix<F>,
    reconciliation: Vec<LabeledMatrix<F>>,
}

/// Forecaster of hierarchical series with coherent forecasts
///
/// `fit` adds the aggregate nodes if `y` carries none, then fits a clone of the base
/// forecaster on the series of every node. From the hierarchy it builds the summation matrix
/// `S` and, per column of `y`, the reconciliation matrix `G` of the chosen
/// [`ReconcileMethod`]. The base forecasts `ŷ` of all nodes are reconciled into `S G ŷ`, so
/// every aggregate forecast is the sum of the bottom forecasts below it.
///
/// Time points must be integers and every node must end at the same time point.
pub struct ReconcilerForecaster<F: Float> {
    forecaster: Box<dyn Forecaster<F>>,
    method: ReconcileMethod,
    return_totals: bool,
    tags: TagSet,
    fitted_: Option<Fitted<F>>,
    state: EstimatorState,
}

impl<F: Float> ReconcilerForecaster<F> {
    pub fn new(forecaster: Box<dyn Forecaster<F>>, method: ReconcileMethod) -> Self {
        ReconcilerForecaster {
            tags: Self::merged_tags(&*forecaster),
            forecaster,
            method,
            return_totals: true,
            fitted_: None,
            state: EstimatorState::default(),
        }
    }

    /// Keep the aggregate nodes in the predictions, defaults to `true`
    pub fn return_totals(mut self, return_totals: bool) -> Self {
        self.return_totals = return_totals;
        self
    }

    /// Forecaster defaults with the capabilities of the base forecaster
    fn merged_tags(forecaster: &dyn Forecaster<F>) -> TagSet {
        TagSet::forecaster_defaults()
            .with(Tag::YInnerType, vec![MType::HierarchicalFrame])
            .with(Tag::XInnerType, vec![MType::HierarchicalFrame])
            .with(Tag::IgnoresExogeneousX, true)
            .with(Tag::Multivariate, forecaster.get_flag(Tag::Multivariate))
            .with(Tag::MissingValues, forecaster.get_flag(Tag::MissingValues))
            .with(Tag::RequiresFhInFit, forecaster.get_flag(Tag::RequiresFhInFit))
    }

    pub fn method(&self) -> ReconcileMethod {
        self.method
    }

    pub fn forecaster(&self) -> &dyn Forecaster<F> {
        &*self.forecaster
    }

    fn fitted(&self) -> tempora::Result<&Fitted<F>> {
        self.fitted_
            .as_ref()
            .ok_or_else(|| tempora::Error::NotFitted(self.type_name().to_string()))
    }

    /// Summation matrix of the fitted hierarchy
    pub fn summation_matrix(&self) -> tempora::Result<&LabeledMatrix<F>> {
        Ok(&self.fitted()?.summation)
    }

    /// Reconciliation matrices of the fitted hierarchy, one per column of `y`
    pub fn reconciliation_matrices(&self) -> tempora::Result<&[LabeledMatrix<F>]> {
        Ok(&self.fitted()?.reconciliation)
    }

    fn with_aggregates(frame: &IndexedFrame<F>) -> Result<IndexedFrame<F>> {
        if has_aggregates(frame) {
            Ok(frame.sort_index())
        } else {
            aggregate(frame, true)
        }
    }

    /// Update the node forecasters and swap in the extended history and matrices
    fn advance(
        method: ReconcileMethod,
        fitted: &mut Fitted<F>,
        series: Vec<NodeSeries<F>>,
        history: Vec<Array2<F>>,
        cutoff: i64,
    ) -> tempora::Result<()> {
        for (forecaster, new) in fitted.forecasters.iter_mut().zip(series) {
            forecaster.update(&TsData::SeriesArray(new.values), None)?;
        }

        let reconciliation = if method.uses_residuals() || method == ReconcileMethod::TdProp {
            (0..fitted.columns.len())
                .map(|c| {
                    reconciliation(method, &fitted.summation, &fitted.forecasters, &history, c)
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            fitted.reconciliation.clone()
        };

        fitted.history = history;
        fitted.reconciliation = reconciliation;
        fitted.cutoff = cutoff;
        Ok(())
    }

    fn base_forecasts(
        fitted: &Fitted<F>,
        fh: &ForecastingHorizon,
    ) -> tempora::Result<Vec<Array2<F>>> {
        fitted
            .forecasters
            .iter()
            .zip(&fitted.nodes)
            .map(|(f, node)| {
                let pred = f.predict(Some(fh), None)?.into_series_array()?;
                if pred.dim() != (fh.len(), fitted.columns.len()) {
                    return Err(HierarchicalError::Misaligned(format!(
                        "forecast of shape {:?} for node {:?}",
                        pred.dim(),
                        node
                    ))
                    .into());
                }
                Ok(pred)
            })
            .collect()
    }
}

impl<F: Float> Clone for ReconcilerForecaster<F> {
    fn clone(&self) -> Self {
        ReconcilerForecaster {
            forecaster: self.forecaster.clone(),
            method: self.method,
            return_totals: self.return_totals,
            tags: self.tags.clone(),
            fitted_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for ReconcilerForecaster<F> {
    fn type_name(&self) -> &'static str {
        "ReconcilerForecaster"
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
            .with(METHOD, self.method.name())
            .with(RETURN_TOTALS, self.return_totals);
        if deep {
            params.extend(self.forecaster.get_params(true).prefixed(FORECASTER));
        }
        params
    }

    fn set_params(&mut self, mut params: Params<F>) -> tempora::Result<()> {
        params.check_leaves(&[FORECASTER, METHOD, RETURN_TOTALS])?;
        let mut forecaster = match params.remove(FORECASTER) {
            Some(value) => value
                .into_estimator(&ParamPath::from(FORECASTER))?
                .into_forecaster()?,
            None => self.forecaster.clone(),
        };
        let method = match params.remove(METHOD) {
            Some(value) => value.as_str(&ParamPath::from(METHOD))?.parse()?,
            None => self.method,
        };
        let return_totals = match params.remove(RETURN_TOTALS) {
            Some(value) => value.as_bool(&ParamPath::from(RETURN_TOTALS))?,
            None => self.return_totals,
        };

        let mut nested = Params::new();
        for (path, value) in params {
            match path.strip_prefix(FORECASTER) {
                Some(tail) => nested.insert(tail, value),
                None => return Err(tempora::Error::UnknownParameter(path.to_string())),
            }
        }
        if !nested.is_empty() {
            forecaster.set_params(nested)?;
        }

        let state = self.state.unfitted();
        *self = ReconcilerForecaster::new(forecaster, method).return_totals(return_totals);
        self.state = state;
        Ok(())
    }
}

impl<F: Float> Forecaster<F> for ReconcilerForecaster<F> {
    fn fit_core(
        &mut self,
        y: &TsData<F>,
        _x: Option<&TsData<F>>,
        fh: Option<&ForecastingHorizon>,
    ) -> tempora::Result<()> {
        let frame = Self::with_aggregates(y.as_frame()?)?;
        let series = split_nodes(&frame)?;
        let cutoff = common_cutoff(&series)?;

        let mut nodes = Vec::with_capacity(series.len());
        let mut forecasters = Vec::with_capacity(series.len());
        let mut history = Vec::with_capacity(series.len());
        for NodeSeries { node, values, .. } in series {
            let mut forecaster = self.forecaster.boxed_clone();
            forecaster.fit(&TsData::SeriesArray(values.clone()), None, fh.cloned())?;
            nodes.push(node);
            forecasters.push(forecaster);
            history.push(values);
        }

        let summation = summation_matrix(&nodes)?;
        let reconciliation = (0..frame.columns().len())
            .map(|c| reconciliation(self.method, &summation, &forecasters, &history, c))
            .collect::<Result<Vec<_>>>()?;
        info!(
            estimator = "ReconcilerForecaster",
            method = self.method.name(),
            n_nodes = nodes.len(),
            n_bottom = summation.columns().len(),
            "fitted composite"
        );

        let (index, columns, _) = frame.into_parts();
        self.fitted_ = Some(Fitted {
            names: index.names().to_vec(),
            columns,
            nodes,
            forecasters,
            history,
            cutoff,
            summation,
            reconciliation,
        });
        Ok(())
    }

    fn predict_core(
        &self,
        fh: &ForecastingHorizon,
        _x: Option<&TsData<F>>,
    ) -> tempora::Result<TsData<F>> {
        let fitted = self.fitted()?;
        let base = Self::base_forecasts(fitted, fh)?;
        let (n_nodes, n_steps) = (fitted.nodes.len(), fh.len());

        let mut values = Array2::zeros((n_nodes * n_steps, fitted.columns.len()));
        for (c, g) in fitted.reconciliation.iter().enumerate() {
            let yhat = Array2::from_shape_fn((n_nodes, n_steps), |(i, k)| base[i][(k, c)]);
            let coherent = fitted.summation.values().dot(&g.values().dot(&yhat));
            for i in 0..n_nodes {
                values
                    .slice_mut(s![i * n_steps..(i + 1) * n_steps, c])
                    .assign(&coherent.row(i));
            }
        }

        let times = fh.to_absolute(fitted.cutoff);
        let keys = fitted
            .nodes
            .iter()
            .flat_map(|node| {
                times.iter().map(move |t| {
                    let mut key = node.clone();
                    key.push(IndexKey::from(*t));
                    key
                })
            })
            .collect();
        let index = MultiIndex::new(fitted.names.clone(), keys)?;
        let frame = IndexedFrame::new(index, fitted.columns.clone(), values)?;

        if self.return_totals {
            Ok(TsData::HierarchicalFrame(frame))
        } else {
            Ok(TsData::HierarchicalFrame(drop_aggregates(&frame)))
        }
    }

    fn update_core(&mut self, y: &TsData<F>, _x: Option<&TsData<F>>) -> tempora::Result<()> {
        let frame = Self::with_aggregates(y.as_frame()?)?;
        let series = split_nodes(&frame)?;
        let cutoff = common_cutoff(&series)?;

        let fitted = self.fitted()?;
        let nodes: Vec<&Node> = series.iter().map(|s| &s.node).collect();
        if nodes != fitted.nodes.iter().collect::<Vec<_>>() || cutoff <= fitted.cutoff {
            return Err(HierarchicalError::Misaligned(
                "update needs later observations of the fitted nodes".into(),
            )
            .into());
        }
        let history = fitted
            .history
            .iter()
            .zip(series.iter())
            .map(|(history, new)| {
                ndarray::concatenate(Axis(0), &[history.view(), new.values.view()])
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // a failure from here on leaves the reconciler unfitted, never partially updated
        let mut fitted = self
            .fitted_
            .take()
            .ok_or_else(|| tempora::Error::NotFitted(self.type_name().to_string()))?;
        match Self::advance(self.method, &mut fitted, series, history, cutoff) {
            Ok(()) => {
                self.fitted_ = Some(fitted);
                debug!(cutoff, "updated reconciler");
                Ok(())
            }
            Err(err) => {
                self.state = self.state.unfitted();
                Err(err)
            }
        }
    }

    fn fitted_params_core(&self) -> Params<F> {
        match &self.fitted_ {
            Some(fitted) => Params::new()
                .with("n_nodes", fitted.nodes.len())
                .with("n_bottom_nodes", fitted.summation.columns().len())
                .with("cutoff", fitted.cutoff),
            None => Params::new(),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Forecaster<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for ReconcilerForecaster<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        ["bu", "ols", "mint_shrink"]
            .iter()
            .map(|m| Params::new().with(METHOD, *m))
            .collect()
    }

    fn from_params(params: Params<F>) -> tempora::Result<Self> {
        let mut reconciler =
            ReconcilerForecaster::new(Box::new(NaiveForecaster::default()), ReconcileMethod::Bu);
        reconciler.set_params(params)?;
        Ok(reconciler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempora::forecasting::{NaiveForecasterParams, NaiveStrategy};
    use tempora_datasets::trend_hierarchy;

    fn naive() -> Box<dyn Forecaster<f64>> {
        Box::new(NaiveForecaster::default())
    }

    #[test]
    fn methods_parse_by_name() {
        for method in ReconcileMethod::ALL.iter() {
            assert_eq!(method.name().parse::<ReconcileMethod>().unwrap(), *method);
        }
        assert!("mint".parse::<ReconcileMethod>().is_err());
    }

    #[test]
    fn tags_follow_the_base_forecaster() {
        let mut base = naive();
        base.set_tags(TagSet::new().with(Tag::MissingValues, true)).unwrap();
        let mut reconciler = ReconcilerForecaster::new(base, ReconcileMethod::Ols);
        assert!(reconciler.get_flag(Tag::MissingValues));
        assert!(reconciler.get_flag(Tag::IgnoresExogeneousX));

        reconciler
            .set_params(Params::new().with(METHOD, "wls_str"))
            .unwrap();
        assert!(reconciler.get_flag(Tag::MissingValues));

        reconciler
            .set_params(Params::new().with(
                FORECASTER,
                ParamValue::Estimator(AnyEstimator::Forecaster(naive())),
            ))
            .unwrap();
        assert!(!reconciler.get_flag(Tag::MissingValues));
        assert_eq!(reconciler.get_tags(), reconciler.clone().get_tags());
    }

    #[test]
    fn bottom_up_sums_the_bottom_forecasts() {
        let y = trend_hierarchy(&[2, 2], 5, true);
        let mut reconciler = ReconcilerForecaster::new(naive(), ReconcileMethod::Bu);
        let pred = reconciler
            .fit_predict(&y, None, ForecastingHorizon::up_to(1).unwrap())
            .unwrap();
        let frame = pred.as_frame().unwrap();

        let total = frame
            .index()
            .position(&[TOTAL.into(), TOTAL.into(), IndexKey::from(5usize)])
            .unwrap();
        // last values of the bottom nodes are 1 + j + 4
        assert_eq!(frame.values()[(total, 0)], 5. + 6. + 7. + 8.);
    }

    #[test]
    fn coherent_base_forecasts_are_kept() {
        let y = trend_hierarchy(&[2, 3], 8, false);
        let fh = ForecastingHorizon::up_to(3).unwrap();
        let drift = || -> Box<dyn Forecaster<f64>> {
            Box::new(
                NaiveForecasterParams::new()
                    .strategy(NaiveStrategy::Drift)
                    .build()
                    .unwrap(),
            )
        };
        let mut bu = ReconcilerForecaster::new(drift(), ReconcileMethod::Bu);
        let expected = bu.fit_predict(&y, None, fh.clone()).unwrap();

        // drift is linear, so the base forecasts are coherent already
        for method in [ReconcileMethod::Ols, ReconcileMethod::WlsStr].iter() {
            let mut reconciler = ReconcilerForecaster::new(drift(), *method);
            let pred = reconciler.fit_predict(&y, None, fh.clone()).unwrap();
            assert_abs_diff_eq!(
                pred.as_frame().unwrap().values(),
                expected.as_frame().unwrap().values(),
                epsilon = 1e-8
            );
        }
    }

    #[test]
    fn top_down_uses_historical_proportions() {
        let y = trend_hierarchy(&[2, 1], 2, true);
        let mut reconciler = ReconcilerForecaster::new(naive(), ReconcileMethod::TdProp);
        reconciler
            .fit(&y, None, Some(ForecastingHorizon::up_to(1).unwrap()))
            .unwrap();
        let g = &reconciler.reconciliation_matrices().unwrap()[0];

        // single child regions are flattened, bottom nodes are [1, 2] and [2, 3]
        assert_eq!(g.columns().len(), 3);
        let total: Node = vec![TOTAL.into(), TOTAL.into()];
        assert_abs_diff_eq!(
            g.get(&[IndexKey::from("a0"), IndexKey::from("b0")], &total).unwrap(),
            (1. / 3. + 2. / 5.) / 2.,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            g.get(&[IndexKey::from("a1"), IndexKey::from("b0")], &total).unwrap(),
            (2. / 3. + 3. / 5.) / 2.,
            epsilon = 1e-12
        );
    }

    #[test]
    fn totals_can_be_dropped() {
        let y = trend_hierarchy(&[2, 2], 4, true);
        let mut reconciler =
            ReconcilerForecaster::new(naive(), ReconcileMethod::Ols).return_totals(false);
        let pred = reconciler
            .fit_predict(&y, None, ForecastingHorizon::up_to(2).unwrap())
            .unwrap();

        assert_eq!(pred.as_frame().unwrap().nrows(), 8);
        assert!(!has_aggregates(pred.as_frame().unwrap()));
    }

    #[test]
    fn update_moves_the_cutoff() {
        let y = trend_hierarchy(&[2, 2], 6, true);
        let frame = y.as_frame().unwrap();
        let first: Vec<usize> = (0..frame.nrows()).filter(|r| r % 6 < 4).collect();
        let last: Vec<usize> = (0..frame.nrows()).filter(|r| r % 6 >= 4).collect();

        let mut reconciler = ReconcilerForecaster::new(naive(), ReconcileMethod::WlsStr);
        reconciler
            .fit(
                &TsData::HierarchicalFrame(frame.select_rows(&first)),
                None,
                Some(ForecastingHorizon::up_to(1).unwrap()),
            )
            .unwrap();
        reconciler
            .update(&TsData::HierarchicalFrame(frame.select_rows(&last)), None)
            .unwrap();

        let mut full = ReconcilerForecaster::new(naive(), ReconcileMethod::WlsStr);
        let expected = full
            .fit_predict(&y, None, ForecastingHorizon::up_to(1).unwrap())
            .unwrap();
        assert_eq!(reconciler.predict(None, None).unwrap(), expected);

        // the same observations again are not later than the cutoff
        assert!(reconciler
            .update(&TsData::HierarchicalFrame(frame.select_rows(&last)), None)
            .is_err());
    }

    #[test]
    fn failed_update_keeps_the_fitted_state() {
        let y = trend_hierarchy(&[2, 2], 6, true);
        let frame = y.as_frame().unwrap();
        let first: Vec<usize> = (0..frame.nrows()).filter(|r| r % 6 < 4).collect();
        let last: Vec<usize> = (0..frame.nrows()).filter(|r| r % 6 >= 4).collect();
        let tail = frame.select_rows(&last);
        let widened = IndexedFrame::new(
            tail.index().clone(),
            vec!["y".to_string(), "z".to_string()],
            ndarray::concatenate(Axis(1), &[tail.values().view(), tail.values().view()]).unwrap(),
        )
        .unwrap();

        let mut reconciler = ReconcilerForecaster::new(naive(), ReconcileMethod::MintCov);
        reconciler
            .fit(
                &TsData::HierarchicalFrame(frame.select_rows(&first)),
                None,
                Some(ForecastingHorizon::up_to(1).unwrap()),
            )
            .unwrap();
        let before = reconciler.predict(None, None).unwrap();

        assert!(reconciler
            .update(&TsData::HierarchicalFrame(widened), None)
            .is_err());
        assert!(reconciler.is_fitted());
        assert_eq!(reconciler.predict(None, None).unwrap(), before);
        assert_eq!(
            reconciler.get_fitted_params().unwrap().get("cutoff"),
            Some(&ParamValue::Int(3))
        );
    }

    #[test]
    fn nested_parameters_reach_the_base_forecaster() {
        let mut reconciler = ReconcilerForecaster::new(naive(), ReconcileMethod::Bu);
        reconciler
            .set_params(
                Params::new()
                    .with(METHOD, "mint_cov")
                    .with(ParamPath::new(vec![FORECASTER, "strategy"]), "mean"),
            )
            .unwrap();

        let params = reconciler.get_params(true);
        assert_eq!(reconciler.method(), ReconcileMethod::MintCov);
        assert_eq!(
            params.get(ParamPath::new(vec![FORECASTER, "strategy"])),
            Some(&ParamValue::Str("mean".into()))
        );
        assert!(reconciler
            .set_params(Params::new().with(ParamPath::new(vec![METHOD, "x"]), 1usize))
            .is_err());
    }

    #[test]
    fn string_time_points_are_rejected() {
        let keys = vec![
            vec!["a0".into(), "x".into(), "t0".into()],
            vec!["a1".into(), "x".into(), "t0".into()],
        ];
        let index = MultiIndex::new(vec![None; 3], keys).unwrap();
        let frame = IndexedFrame::new(index, vec!["y".into()], Array2::ones((2, 1))).unwrap();
        let mut reconciler = ReconcilerForecaster::new(naive(), ReconcileMethod::Bu);

        assert!(reconciler
            .fit(
                &TsData::HierarchicalFrame(frame),
                None,
                Some(ForecastingHorizon::up_to(1).unwrap())
            )
            .is_err());
    }
}
