use tracing::debug;

use super::delegate::Delegate;
use super::heterogeneous::{NamedSteps, Step};
use crate::base::{
    AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams,
};
use crate::dataset::{Float, ForecastingHorizon, TsData};
use crate::error::{Error, Result};
use crate::forecasting::{NaiveForecaster, NaiveStrategy};
use crate::tags::{Tag, TagSet};
use crate::traits::Forecaster;

const FORECASTERS: &str = "forecasters";
const SELECTED: &str = "selected_forecaster";
const RESERVED: [&str; 2] = [FORECASTERS, SELECTED];

/// Tags adopted from the selected forecaster
const CLONED_TAGS: [Tag; 6] = [
    Tag::Multivariate,
    Tag::MissingValues,
    Tag::IgnoresExogeneousX,
    Tag::RequiresFhInFit,
    Tag::YInnerType,
    Tag::XInnerType,
];

/// Switch between named forecasters through a parameter
///
/// Behaves exactly like the forecaster named by `selected_forecaster`, the first one if it
/// is unset. Useful to treat the choice of forecaster as a hyperparameter.
pub struct MultiplexForecaster<F: Float> {
    forecasters: NamedSteps<Box<dyn Forecaster<F>>>,
    selected_forecaster: Option<String>,
    active: (String, Box<dyn Forecaster<F>>),
    forecaster_: Delegate<Box<dyn Forecaster<F>>>,
    state: EstimatorState,
}

impl<F: Float> MultiplexForecaster<F> {
    pub fn new(
        forecasters: Vec<Step<Box<dyn Forecaster<F>>>>,
        selected_forecaster: Option<String>,
    ) -> Result<Self> {
        Self::from_parts(
            NamedSteps::new(forecasters, &RESERVED)?,
            selected_forecaster,
            EstimatorState::default(),
        )
    }

    fn from_parts(
        forecasters: NamedSteps<Box<dyn Forecaster<F>>>,
        selected_forecaster: Option<String>,
        state: EstimatorState,
    ) -> Result<Self> {
        let active = match &selected_forecaster {
            Some(name) => forecasters
                .iter()
                .find(|(n, _)| *n == name.as_str())
                .ok_or_else(|| {
                    Error::Parameters(format!(
                        "selected forecaster `{}` is not one of {:?}",
                        name,
                        forecasters.names()
                    ))
                })?,
            None => forecasters.iter().next().ok_or_else(|| {
                Error::Parameters("a multiplexer needs at least one forecaster".into())
            })?,
        };
        let active = (active.0.to_string(), active.1.clone());

        let mut multiplexer = MultiplexForecaster {
            forecasters,
            selected_forecaster,
            active,
            forecaster_: Delegate::new("MultiplexForecaster"),
            state,
        };
        let selected = multiplexer.active.1.clone();
        multiplexer.clone_tags(&selected, Some(&CLONED_TAGS));
        Ok(multiplexer)
    }

    pub fn forecasters(&self) -> &NamedSteps<Box<dyn Forecaster<F>>> {
        &self.forecasters
    }

    /// Name of the forecaster in use
    pub fn selected_name(&self) -> &str {
        &self.active.0
    }
}

impl<F: Float> Clone for MultiplexForecaster<F> {
    fn clone(&self) -> Self {
        MultiplexForecaster {
            forecasters: self.forecasters.clone(),
            selected_forecaster: self.selected_forecaster.clone(),
            active: self.active.clone(),
            forecaster_: Delegate::new("MultiplexForecaster"),
            state: self.state.unfitted(),
        }
    }
}

impl<F: Float> BaseObject<F> for MultiplexForecaster<F> {
    fn type_name(&self) -> &'static str {
        "MultiplexForecaster"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::forecaster_defaults()
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, deep: bool) -> Params<F> {
        let mut params = Params::new()
            .with(FORECASTERS, self.forecasters.to_param())
            .with(SELECTED, self.selected_forecaster.clone());
        if deep {
            params.extend(self.forecasters.get_params(true));
        }
        params
    }

    fn set_params(&mut self, mut params: Params<F>) -> Result<()> {
        let mut forecasters = match params.remove(FORECASTERS) {
            Some(value) => NamedSteps::new(
                NamedSteps::steps_from_param(value, &ParamPath::from(FORECASTERS))?,
                &RESERVED,
            )?,
            None => self.forecasters.clone(),
        };
        let selected = match params.remove(SELECTED) {
            Some(value) => value
                .as_optional_str(&ParamPath::from(SELECTED))?
                .map(str::to_string),
            None => self.selected_forecaster.clone(),
        };
        forecasters.set_params(params)?.check_leaves(&[])?;

        *self = Self::from_parts(forecasters, selected, self.state.unfitted())?;
        Ok(())
    }
}

impl<F: Float> Forecaster<F> for MultiplexForecaster<F> {
    fn fit_core(
        &mut self,
        y: &TsData<F>,
        x: Option<&TsData<F>>,
        fh: Option<&ForecastingHorizon>,
    ) -> Result<()> {
        debug!(selected = self.selected_name(), "fitting multiplexed forecaster");
        self.forecaster_.fit(&*self.active.1, y, x, fh)
    }

    fn predict_core(&self, fh: &ForecastingHorizon, x: Option<&TsData<F>>) -> Result<TsData<F>> {
        self.forecaster_.predict(fh, x)
    }

    fn update_core(&mut self, y: &TsData<F>, x: Option<&TsData<F>>) -> Result<()> {
        self.forecaster_.update(y, x)
    }

    fn in_sample_residuals_core(&self) -> Result<TsData<F>> {
        self.forecaster_.residuals()
    }

    fn fitted_params_core(&self) -> Params<F> {
        self.forecaster_
            .fitted_params()
            .map(|p| p.prefixed("forecaster"))
            .unwrap_or_default()
    }

    fn boxed_clone(&self) -> Box<dyn Forecaster<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for MultiplexForecaster<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        let naive = |name: &str, strategy: NaiveStrategy| {
            ParamValue::List(vec![
                ParamValue::Str(name.to_string()),
                ParamValue::Estimator(AnyEstimator::Forecaster(Box::new(NaiveForecaster::new(
                    strategy,
                )))),
            ])
        };
        vec![Params::new()
            .with(
                FORECASTERS,
                ParamValue::List(vec![
                    naive("last", NaiveStrategy::Last),
                    naive("mean", NaiveStrategy::Mean),
                ]),
            )
            .with(SELECTED, "mean")]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let naive: Box<dyn Forecaster<F>> = Box::new(NaiveForecaster::default());
        let mut multiplexer = Self::new(vec![Step::Unnamed(naive)], None)?;
        multiplexer.set_params(params)?;
        Ok(multiplexer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn naive(strategy: NaiveStrategy) -> Box<dyn Forecaster<f64>> {
        Box::new(NaiveForecaster::new(strategy))
    }

    fn multiplexer(selected: &str) -> MultiplexForecaster<f64> {
        MultiplexForecaster::new(
            vec![
                Step::named("last", naive(NaiveStrategy::Last)),
                Step::named("mean", naive(NaiveStrategy::Mean)),
            ],
            Some(selected.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn predictions_follow_the_selection() {
        let y = TsData::SeriesArray(array![[1.], [2.], [6.]]);
        let fh = ForecastingHorizon::up_to(2).unwrap();

        let mut mux = multiplexer("last");
        let pred = mux.fit_predict(&y, None, fh.clone()).unwrap();
        let expected = naive(NaiveStrategy::Last).fit_predict(&y, None, fh.clone()).unwrap();
        assert_eq!(pred, expected);

        mux.set_params(Params::new().with(SELECTED, "mean")).unwrap();
        assert!(!mux.is_fitted());
        let pred = mux.fit_predict(&y, None, fh.clone()).unwrap();
        let expected = naive(NaiveStrategy::Mean).fit_predict(&y, None, fh).unwrap();
        assert_eq!(pred, expected);
    }

    #[test]
    fn unknown_selection_is_rejected() {
        let mut mux = multiplexer("last");

        assert!(mux.set_params(Params::new().with(SELECTED, "theta")).is_err());
        assert_eq!(mux.selected_name(), "last");
    }

    #[test]
    fn tags_follow_the_selection() {
        let mut requires_fh = NaiveForecaster::<f64>::default();
        requires_fh
            .set_tags(TagSet::new().with(Tag::RequiresFhInFit, true))
            .unwrap();
        let mux = MultiplexForecaster::new(
            vec![
                Step::named("plain", naive(NaiveStrategy::Last)),
                Step::named("strict", Box::new(requires_fh) as Box<dyn Forecaster<f64>>),
            ],
            Some("strict".into()),
        )
        .unwrap();

        assert!(mux.get_flag(Tag::RequiresFhInFit));
    }
}
