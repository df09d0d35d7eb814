use std::fmt;
use std::str::FromStr;

use ndarray::{concatenate, s, Array2, ArrayView1, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::base::{BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams};
use crate::dataset::{Float, ForecastingHorizon, MType, TsData};
use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::tags::{Tag, TagSet};
use crate::traits::Forecaster;

const STRATEGY: &str = "strategy";
const SP: &str = "sp";
const WINDOW_LENGTH: &str = "window_length";

/// How a [`NaiveForecaster`] extrapolates the observed values
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaiveStrategy {
    /// Repeat the last observed season
    Last,
    /// Mean of the observations at the same position in the season
    Mean,
    /// Extend the line through the first and last observation of the window
    Drift,
}

impl NaiveStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            NaiveStrategy::Last => "last",
            NaiveStrategy::Mean => "mean",
            NaiveStrategy::Drift => "drift",
        }
    }
}

impl fmt::Display for NaiveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NaiveStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "last" => Ok(NaiveStrategy::Last),
            "mean" => Ok(NaiveStrategy::Mean),
            "drift" => Ok(NaiveStrategy::Drift),
            _ => Err(Error::Parameters(format!("unknown naive strategy `{}`", s))),
        }
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaiveForecasterValidParams {
    strategy: NaiveStrategy,
    sp: usize,
    window_length: Option<usize>,
}

impl NaiveForecasterValidParams {
    pub fn strategy(&self) -> NaiveStrategy {
        self.strategy
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn window_length(&self) -> Option<usize> {
        self.window_length
    }

    /// Observations needed before the first forecast can be made
    fn min_observations(&self) -> usize {
        match self.strategy {
            NaiveStrategy::Drift => 2,
            _ => self.sp,
        }
    }

    /// Forecasts `steps` ahead of the end of `history`, `NaN` if the history is too short
    fn forecast<F: Float>(&self, history: ArrayView1<F>, steps: &[usize]) -> Vec<F> {
        let n = history.len();
        let w = self.window_length.map_or(n, |w| w.min(n));
        if w < self.min_observations() {
            return vec![F::nan(); steps.len()];
        }
        let window = history.slice(s![n - w..]);
        let sp = self.sp;

        steps
            .iter()
            .map(|&step| match self.strategy {
                NaiveStrategy::Last => window[w - sp + (step - 1) % sp],
                NaiveStrategy::Mean => {
                    // positions in the window sharing the season of the target
                    let target = (w - 1 + step) % sp;
                    let (sum, count) = (target..w)
                        .step_by(sp)
                        .fold((F::zero(), 0usize), |(sum, count), j| (sum + window[j], count + 1));
                    sum / F::cast(count)
                }
                NaiveStrategy::Drift => {
                    let slope = (window[w - 1] - window[0]) / F::cast(w - 1);
                    window[w - 1] + slope * F::cast(step)
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaiveForecasterParams(NaiveForecasterValidParams);

impl Default for NaiveForecasterParams {
    fn default() -> Self {
        Self::new()
    }
}

impl NaiveForecasterParams {
    pub fn new() -> Self {
        NaiveForecasterParams(NaiveForecasterValidParams {
            strategy: NaiveStrategy::Last,
            sp: 1,
            window_length: None,
        })
    }

    pub fn strategy(mut self, strategy: NaiveStrategy) -> Self {
        self.0.strategy = strategy;
        self
    }

    /// Seasonal period, defaults to `1`
    pub fn sp(mut self, sp: usize) -> Self {
        self.0.sp = sp;
        self
    }

    /// Number of most recent observations used, all of them if `None`
    pub fn window_length(mut self, window_length: Option<usize>) -> Self {
        self.0.window_length = window_length;
        self
    }

    pub fn build<F: Float>(self) -> Result<NaiveForecaster<F>> {
        Ok(NaiveForecaster::from_valid(self.check()?))
    }
}

impl ParamGuard for NaiveForecasterParams {
    type Checked = NaiveForecasterValidParams;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let NaiveForecasterValidParams {
            strategy,
            sp,
            window_length,
        } = self.0;
        if sp == 0 {
            return Err(Error::Parameters("sp must be positive".into()));
        }
        if strategy == NaiveStrategy::Drift && sp != 1 {
            return Err(Error::Parameters(
                "the drift strategy is not seasonal, sp must be 1".into(),
            ));
        }
        match window_length {
            Some(w) if w < self.0.min_observations() => Err(Error::Parameters(format!(
                "window_length {} is too short for the {} strategy with sp {}",
                w, strategy, sp
            ))),
            _ => Ok(&self.0),
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Baseline forecaster extrapolating the observed values with a simple rule
///
/// Every column of the series is forecast independently. Exogeneous data is ignored.
#[derive(Debug)]
pub struct NaiveForecaster<F> {
    params: NaiveForecasterValidParams,
    y_: Option<Array2<F>>,
    state: EstimatorState,
}

impl<F: Float> NaiveForecaster<F> {
    pub fn new(strategy: NaiveStrategy) -> Self {
        NaiveForecaster::from_valid(NaiveForecasterValidParams {
            strategy,
            sp: 1,
            window_length: None,
        })
    }

    pub fn from_valid(params: NaiveForecasterValidParams) -> Self {
        NaiveForecaster {
            params,
            y_: None,
            state: EstimatorState::default(),
        }
    }

    pub fn strategy(&self) -> NaiveStrategy {
        self.params.strategy
    }

    fn history(&self) -> Result<&Array2<F>> {
        self.y_
            .as_ref()
            .ok_or_else(|| Error::NotFitted(self.type_name().into()))
    }

    fn check_length(&self, n: usize) -> Result<()> {
        let needed = self.params.min_observations();
        if n < needed {
            return Err(Error::InvalidData(format!(
                "the {} strategy needs at least {} observations, got {}",
                self.params.strategy, needed, n
            )));
        }
        Ok(())
    }
}

impl<F: Float> Default for NaiveForecaster<F> {
    fn default() -> Self {
        NaiveForecaster::new(NaiveStrategy::Last)
    }
}

impl<F: Float> Clone for NaiveForecaster<F> {
    fn clone(&self) -> Self {
        NaiveForecaster {
            params: self.params.clone(),
            y_: None,
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for NaiveForecaster<F> {
    fn type_name(&self) -> &'static str {
        "NaiveForecaster"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::forecaster_defaults()
            .with(Tag::YInnerType, vec![MType::SeriesArray])
            .with(Tag::XInnerType, vec![MType::SeriesArray])
            .with(Tag::IgnoresExogeneousX, true)
            .with(Tag::Multivariate, true)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new()
            .with(STRATEGY, self.params.strategy.name())
            .with(SP, self.params.sp)
            .with(WINDOW_LENGTH, self.params.window_length)
    }

    fn set_params(&mut self, params: Params<F>) -> Result<()> {
        params.check_leaves(&[STRATEGY, SP, WINDOW_LENGTH])?;
        let mut builder = NaiveForecasterParams(self.params.clone());
        if let Some(strategy) = params.get(STRATEGY) {
            builder = builder.strategy(strategy.as_str(&ParamPath::from(STRATEGY))?.parse()?);
        }
        if let Some(sp) = params.get(SP) {
            builder = builder.sp(sp.as_usize(&ParamPath::from(SP))?);
        }
        if let Some(window_length) = params.get(WINDOW_LENGTH) {
            builder = builder
                .window_length(window_length.as_optional_usize(&ParamPath::from(WINDOW_LENGTH))?);
        }

        self.params = builder.check()?;
        self.y_ = None;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Forecaster<F> for NaiveForecaster<F> {
    fn fit_core(
        &mut self,
        y: &TsData<F>,
        _x: Option<&TsData<F>>,
        _fh: Option<&ForecastingHorizon>,
    ) -> Result<()> {
        let y = y.as_series_array()?;
        self.check_length(y.nrows())?;
        self.y_ = Some(y.clone());
        Ok(())
    }

    fn predict_core(&self, fh: &ForecastingHorizon, _x: Option<&TsData<F>>) -> Result<TsData<F>> {
        let history = self.history()?;
        let mut pred = Array2::zeros((fh.len(), history.ncols()));
        for (column, mut out) in history.axis_iter(Axis(1)).zip(pred.axis_iter_mut(Axis(1))) {
            for (o, v) in out.iter_mut().zip(self.params.forecast(column, fh.steps())) {
                *o = v;
            }
        }
        Ok(TsData::SeriesArray(pred))
    }

    fn update_core(&mut self, y: &TsData<F>, _x: Option<&TsData<F>>) -> Result<()> {
        let new = y.as_series_array()?;
        let history = self.history()?;
        if new.ncols() != history.ncols() {
            return Err(Error::InvalidData(format!(
                "update with {} columns for a series of {} columns",
                new.ncols(),
                history.ncols()
            )));
        }
        let updated = concatenate(Axis(0), &[history.view(), new.view()])?;
        self.y_ = Some(updated);
        Ok(())
    }

    fn in_sample_residuals_core(&self) -> Result<TsData<F>> {
        let history = self.history()?;
        let mut residuals = Array2::from_elem(history.dim(), F::nan());
        for (column, mut out) in history.axis_iter(Axis(1)).zip(residuals.axis_iter_mut(Axis(1))) {
            for t in 1..column.len() {
                let pred = self.params.forecast(column.slice(s![..t]), &[1])[0];
                out[t] = column[t] - pred;
            }
        }
        Ok(TsData::SeriesArray(residuals))
    }

    fn fitted_params_core(&self) -> Params<F> {
        Params::new().with(
            "n_observations",
            self.y_.as_ref().map(|y| ParamValue::from(y.nrows())),
        )
    }

    fn boxed_clone(&self) -> Box<dyn Forecaster<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for NaiveForecaster<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new().with(STRATEGY, "mean").with(SP, 2usize),
            Params::new()
                .with(STRATEGY, "drift")
                .with(WINDOW_LENGTH, Some(5usize)),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut forecaster = NaiveForecaster::default();
        forecaster.set_params(params)?;
        Ok(forecaster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn y() -> TsData<f64> {
        TsData::SeriesArray(array![[1., 10.], [2., 20.], [4., 30.], [3., 40.]])
    }

    fn forecast(params: NaiveForecasterParams, steps: usize) -> Array2<f64> {
        let mut f = params.build().unwrap();
        f.fit_predict(&y(), None, ForecastingHorizon::up_to(steps).unwrap())
            .unwrap()
            .into_series_array()
            .unwrap()
    }

    #[test]
    fn last_value_and_last_season() {
        assert_eq!(
            forecast(NaiveForecasterParams::new(), 2),
            array![[3., 40.], [3., 40.]]
        );
        assert_eq!(
            forecast(NaiveForecasterParams::new().sp(2), 3),
            array![[4., 30.], [3., 40.], [4., 30.]]
        );
    }

    #[test]
    fn seasonal_and_windowed_means() {
        let mean = NaiveForecasterParams::new().strategy(NaiveStrategy::Mean);

        assert_eq!(forecast(mean.clone(), 1), array![[2.5, 25.]]);
        assert_eq!(forecast(mean.clone().window_length(Some(2)), 1), array![[3.5, 35.]]);
        // seasons {1., 4.} and {2., 3.}
        assert_eq!(forecast(mean.sp(2), 2), array![[2.5, 20.], [2.5, 30.]]);
    }

    #[test]
    fn drift_extends_the_line() {
        let pred = forecast(NaiveForecasterParams::new().strategy(NaiveStrategy::Drift), 2);

        assert_abs_diff_eq!(pred, array![[3. + 2. / 3., 50.], [3. + 4. / 3., 60.]], epsilon = 1e-12);
        assert!(NaiveForecasterParams::new()
            .strategy(NaiveStrategy::Drift)
            .sp(3)
            .build::<f64>()
            .is_err());
    }

    #[test]
    fn update_moves_the_cutoff() {
        let mut f = NaiveForecaster::default();
        f.fit(&y(), None, None).unwrap();
        f.update(&TsData::SeriesArray(array![[7., 70.]]), None).unwrap();
        let fh = ForecastingHorizon::up_to(1).unwrap();

        assert_eq!(
            f.predict(Some(&fh), None).unwrap(),
            TsData::SeriesArray(array![[7., 70.]])
        );
        assert!(f.update(&TsData::SeriesArray(array![[1.]]), None).is_err());
    }

    #[test]
    fn in_sample_residuals_are_one_step_ahead() {
        let mut f = NaiveForecaster::default();
        f.fit(&y(), None, None).unwrap();
        let res = f.predict_residuals(None, None).unwrap().into_series_array().unwrap();

        assert!(res[(0, 0)].is_nan());
        assert_eq!(res.slice(s![1.., 0]).to_owned(), array![1., 2., -1.]);
        assert_eq!(res.slice(s![1.., 1]).to_owned(), array![10., 10., 10.]);
    }

    #[test]
    fn short_series_are_rejected() {
        let mut f = NaiveForecasterParams::new().sp(3).build().unwrap();
        let y = TsData::SeriesArray(array![[1.], [2.]]);

        assert!(matches!(f.fit(&y, None, None), Err(Error::InvalidData(_))));
    }
}
