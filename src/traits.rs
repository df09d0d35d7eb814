//! Estimator categories and their lifecycles
//!
//! An estimator implements [`BaseObject`] and exactly one of the category traits defined here.
//! Implementors only provide the `*_core` hooks, which receive data already converted to one
//! of the representations listed in their inner type tags. The provided lifecycle methods
//! validate the input against the capability tags, negotiate the representation, call the
//! hook and track the fitted state. They should not be overridden.
//!
//! Every category is object safe. `Box<dyn Category<F>>` implements the category itself by
//! forwarding to the boxed estimator, so composites can hold and fit boxed components like
//! any other estimator.
use ndarray::{Array1, Array2, Zip};
use tracing::debug;

use crate::base::{BaseObject, EstimatorState, Params};
use crate::convert::{convert, convert_to, select_mtype};
use crate::dataset::{Float, ForecastingHorizon, MType, TsData};
use crate::error::{Error, Result};
use crate::tags::{Tag, TagSet};

/// Validate `x` against the tags of `estimator` and convert it to an accepted mtype
///
/// Scitype support is checked first, then the capabilities, and only then is data converted.
pub fn check_and_convert<F, E>(estimator: &E, x: &TsData<F>, inner: Tag) -> Result<TsData<F>>
where
    F: Float,
    E: BaseObject<F> + ?Sized,
{
    x.check()?;
    let tags = estimator.get_tags();
    let name = estimator.type_name();
    let accepted = tags.mtypes(inner);
    let meta = x.metadata();

    select_mtype(meta.mtype, &accepted, name)?;

    let capability = |capability: &str| Error::Capability {
        estimator: name.to_string(),
        capability: capability.to_string(),
    };
    if !meta.is_univariate() && !tags.flag(Tag::Multivariate) {
        return Err(capability("multivariate series"));
    }
    if meta.has_missing && !tags.flag(Tag::MissingValues) {
        return Err(capability("missing values"));
    }
    if !meta.is_equal_length && !tags.flag(Tag::UnequalLength) {
        return Err(capability("unequal length series"));
    }

    convert_to(x, &accepted, name)
}

/// Convert an output back to the representation of the input if both share the scitype
fn restore_mtype<F: Float>(out: TsData<F>, mtype: Option<MType>) -> Result<TsData<F>> {
    match mtype {
        Some(m) if m != out.mtype() && m.scitype() == out.scitype() => {
            convert(&out, m, m.scitype())
        }
        _ => Ok(out),
    }
}

fn check_n_targets<F: Float>(x: &TsData<F>, n_targets: usize) -> Result<()> {
    let n_instances = x.metadata().n_instances;
    if n_instances != n_targets {
        return Err(Error::InvalidData(format!(
            "{} instances but {} targets",
            n_instances, n_targets
        )));
    }
    Ok(())
}

/// Transformers map data to data
///
/// Series-to-series transformers return their output in the representation of the input.
/// Transformers with `output_data_type` set to `Primitives` return a table.
pub trait Transformer<F: Float>: BaseObject<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<()>;

    fn transform_core(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>>;

    fn inverse_transform_core(&self, _x: &TsData<F>, _y: Option<&TsData<F>>) -> Result<TsData<F>> {
        Err(Error::NotImplemented {
            estimator: self.type_name().to_string(),
            method: "inverse_transform".into(),
        })
    }

    fn fitted_params_core(&self) -> Params<F> {
        Params::new()
    }

    /// Unfitted copy with the same parameters and tag overrides
    fn boxed_clone(&self) -> Box<dyn Transformer<F>>;

    fn fit(&mut self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<&mut Self>
    where
        Self: Sized,
    {
        let xi = check_and_convert(&*self, x, Tag::XInnerType)?;
        debug!(estimator = self.type_name(), mtype = %xi.mtype(), "fitting transformer");

        self.state_mut().reset();
        self.fit_core(&xi, y)?;
        self.state_mut().set_input_mtype(x.mtype());
        self.state_mut().set_fitted(true);

        Ok(self)
    }

    fn transform(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        self.check_is_fitted()?;
        let xi = check_and_convert(self, x, Tag::XInnerType)?;
        let out = self.transform_core(&xi, y)?;

        restore_mtype(out, Some(x.mtype()))
    }

    fn fit_transform(&mut self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>>
    where
        Self: Sized,
    {
        self.fit(x, y)?;
        self.transform(x, y)
    }

    fn inverse_transform(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        self.check_is_fitted()?;
        if !self.get_flag(Tag::InverseTransform) {
            return Err(Error::NotImplemented {
                estimator: self.type_name().to_string(),
                method: "inverse_transform".into(),
            });
        }
        let xi = check_and_convert(self, x, Tag::XInnerType)?;
        let out = self.inverse_transform_core(&xi, y)?;

        restore_mtype(out, Some(x.mtype()))
    }

    fn get_fitted_params(&self) -> Result<Params<F>> {
        self.check_is_fitted()?;
        Ok(self.fitted_params_core())
    }
}

/// Regressors map collections of series (or tables) to one float target per instance
pub trait Regressor<F: Float>: BaseObject<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<F>) -> Result<()>;

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<F>>;

    fn fitted_params_core(&self) -> Params<F> {
        Params::new()
    }

    /// Unfitted copy with the same parameters and tag overrides
    fn boxed_clone(&self) -> Box<dyn Regressor<F>>;

    fn fit(&mut self, x: &TsData<F>, y: &Array1<F>) -> Result<&mut Self>
    where
        Self: Sized,
    {
        let xi = check_and_convert(&*self, x, Tag::XInnerType)?;
        check_n_targets(x, y.len())?;
        debug!(estimator = self.type_name(), mtype = %xi.mtype(), "fitting regressor");

        self.state_mut().reset();
        self.fit_core(&xi, y)?;
        self.state_mut().set_input_mtype(x.mtype());
        self.state_mut().set_fitted(true);

        Ok(self)
    }

    fn predict(&self, x: &TsData<F>) -> Result<Array1<F>> {
        self.check_is_fitted()?;
        let xi = check_and_convert(self, x, Tag::XInnerType)?;
        self.predict_core(&xi)
    }

    fn fit_predict(&mut self, x: &TsData<F>, y: &Array1<F>) -> Result<Array1<F>>
    where
        Self: Sized,
    {
        self.fit(x, y)?;
        self.predict(x)
    }

    /// Coefficient of determination of the predictions for `x`
    fn score(&self, x: &TsData<F>, y: &Array1<F>) -> Result<F> {
        let pred = self.predict(x)?;
        check_n_targets(x, y.len())?;
        let mean = y.mean().unwrap_or_else(F::zero);
        let ss_res = Zip::from(y).and(&pred).fold(F::zero(), |acc, a, b| acc + (*a - *b) * (*a - *b));
        let ss_tot = y.iter().fold(F::zero(), |acc, a| acc + (*a - mean) * (*a - mean));

        Ok(F::one() - ss_res / ss_tot)
    }

    fn get_fitted_params(&self) -> Result<Params<F>> {
        self.check_is_fitted()?;
        Ok(self.fitted_params_core())
    }
}

/// Classifiers map collections of series (or tables) to one class label per instance
pub trait Classifier<F: Float>: BaseObject<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<usize>) -> Result<()>;

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<usize>>;

    /// Class probabilities, one column per class seen in fit, in ascending label order
    fn predict_proba_core(&self, _x: &TsData<F>) -> Result<Array2<F>> {
        Err(Error::NotImplemented {
            estimator: self.type_name().to_string(),
            method: "predict_proba".into(),
        })
    }

    fn fitted_params_core(&self) -> Params<F> {
        Params::new()
    }

    /// Unfitted copy with the same parameters and tag overrides
    fn boxed_clone(&self) -> Box<dyn Classifier<F>>;

    fn fit(&mut self, x: &TsData<F>, y: &Array1<usize>) -> Result<&mut Self>
    where
        Self: Sized,
    {
        let xi = check_and_convert(&*self, x, Tag::XInnerType)?;
        check_n_targets(x, y.len())?;
        debug!(estimator = self.type_name(), mtype = %xi.mtype(), "fitting classifier");

        self.state_mut().reset();
        self.fit_core(&xi, y)?;
        self.state_mut().set_input_mtype(x.mtype());
        self.state_mut().set_fitted(true);

        Ok(self)
    }

    fn predict(&self, x: &TsData<F>) -> Result<Array1<usize>> {
        self.check_is_fitted()?;
        let xi = check_and_convert(self, x, Tag::XInnerType)?;
        self.predict_core(&xi)
    }

    fn predict_proba(&self, x: &TsData<F>) -> Result<Array2<F>> {
        self.check_is_fitted()?;
        let xi = check_and_convert(self, x, Tag::XInnerType)?;
        self.predict_proba_core(&xi)
    }

    fn fit_predict(&mut self, x: &TsData<F>, y: &Array1<usize>) -> Result<Array1<usize>>
    where
        Self: Sized,
    {
        self.fit(x, y)?;
        self.predict(x)
    }

    /// Accuracy of the predictions for `x`
    fn score(&self, x: &TsData<F>, y: &Array1<usize>) -> Result<F> {
        let pred = self.predict(x)?;
        check_n_targets(x, y.len())?;
        let correct = Zip::from(y).and(&pred).fold(0usize, |acc, a, b| acc + (a == b) as usize);

        Ok(F::cast(correct) / F::cast(y.len().max(1)))
    }

    fn get_fitted_params(&self) -> Result<Params<F>> {
        self.check_is_fitted()?;
        Ok(self.fitted_params_core())
    }
}

/// Forecasters predict the future of the series they were fitted on
///
/// Predictions are returned in the representation of the `y` seen in `fit`.
pub trait Forecaster<F: Float>: BaseObject<F> {
    fn fit_core(
        &mut self,
        y: &TsData<F>,
        x: Option<&TsData<F>>,
        fh: Option<&ForecastingHorizon>,
    ) -> Result<()>;

    fn predict_core(&self, fh: &ForecastingHorizon, x: Option<&TsData<F>>) -> Result<TsData<F>>;

    /// Incorporate new observations following the ones already seen
    fn update_core(&mut self, _y: &TsData<F>, _x: Option<&TsData<F>>) -> Result<()> {
        Err(Error::NotImplemented {
            estimator: self.type_name().to_string(),
            method: "update".into(),
        })
    }

    /// One step ahead residuals on the data seen in `fit`
    fn in_sample_residuals_core(&self) -> Result<TsData<F>> {
        Err(Error::NotImplemented {
            estimator: self.type_name().to_string(),
            method: "predict_residuals".into(),
        })
    }

    fn fitted_params_core(&self) -> Params<F> {
        Params::new()
    }

    /// Unfitted copy with the same parameters and tag overrides
    fn boxed_clone(&self) -> Box<dyn Forecaster<F>>;

    fn fit(
        &mut self,
        y: &TsData<F>,
        x: Option<&TsData<F>>,
        fh: Option<ForecastingHorizon>,
    ) -> Result<&mut Self>
    where
        Self: Sized,
    {
        if fh.is_none() && self.get_flag(Tag::RequiresFhInFit) {
            return Err(Error::Parameters(format!(
                "{} requires the forecasting horizon in fit",
                self.type_name()
            )));
        }
        let yi = check_and_convert(&*self, y, Tag::YInnerType)?;
        let xi = self.exogeneous(x)?;
        debug!(estimator = self.type_name(), mtype = %yi.mtype(), "fitting forecaster");

        self.state_mut().reset();
        self.fit_core(&yi, xi.as_ref(), fh.as_ref())?;
        self.state_mut().set_horizon(fh);
        self.state_mut().set_input_mtype(y.mtype());
        self.state_mut().set_fitted(true);

        Ok(self)
    }

    fn predict(
        &self,
        fh: Option<&ForecastingHorizon>,
        x: Option<&TsData<F>>,
    ) -> Result<TsData<F>> {
        self.check_is_fitted()?;
        let fh = fh.or_else(|| self.state().horizon()).ok_or_else(|| {
            Error::Parameters(format!(
                "{} needs a forecasting horizon, none was passed to fit or predict",
                self.type_name()
            ))
        })?;
        let xi = self.exogeneous(x)?;
        let out = self.predict_core(fh, xi.as_ref())?;

        restore_mtype(out, self.state().input_mtype())
    }

    fn fit_predict(
        &mut self,
        y: &TsData<F>,
        x: Option<&TsData<F>>,
        fh: ForecastingHorizon,
    ) -> Result<TsData<F>>
    where
        Self: Sized,
    {
        self.fit(y, x, Some(fh))?;
        self.predict(None, x)
    }

    fn update(&mut self, y: &TsData<F>, x: Option<&TsData<F>>) -> Result<&mut Self>
    where
        Self: Sized,
    {
        self.check_is_fitted()?;
        let yi = check_and_convert(&*self, y, Tag::YInnerType)?;
        let xi = self.exogeneous(x)?;
        debug!(estimator = self.type_name(), "updating forecaster");
        self.update_core(&yi, xi.as_ref())?;

        Ok(self)
    }

    /// Residuals of the forecasts
    ///
    /// Without `y` these are the in-sample residuals on the data seen in `fit`. With `y`, the
    /// observations directly following the cutoff, they are `y` minus the forecasts for the
    /// steps `1..=len(y)`.
    fn predict_residuals(&self, y: Option<&TsData<F>>, x: Option<&TsData<F>>) -> Result<TsData<F>> {
        self.check_is_fitted()?;
        let y = match y {
            Some(y) => y,
            None => {
                let out = self.in_sample_residuals_core()?;
                return restore_mtype(out, self.state().input_mtype());
            }
        };

        let n = y.metadata().n_timepoints.unwrap_or(0);
        if y.scitype() != crate::dataset::Scitype::Series || n == 0 {
            return Err(Error::InvalidData(
                "residuals need a non-empty series of observations".into(),
            ));
        }
        let pred = self.predict(Some(&ForecastingHorizon::up_to(n)?), x)?;
        let pred =
            convert_to(&pred, &[MType::SeriesArray], self.type_name())?.into_series_array()?;
        let observed = convert_to(y, &[MType::SeriesArray], self.type_name())?.into_series_array()?;
        if observed.dim() != pred.dim() {
            return Err(Error::InvalidData(format!(
                "observations of shape {:?} for forecasts of shape {:?}",
                observed.dim(),
                pred.dim()
            )));
        }
        let residuals = observed - pred;

        match y {
            TsData::SeriesFrame(frame) => {
                let mut frame = frame.clone();
                *frame.values_mut() = residuals;
                Ok(TsData::SeriesFrame(frame))
            }
            _ => Ok(TsData::SeriesArray(residuals)),
        }
    }

    fn get_fitted_params(&self) -> Result<Params<F>> {
        self.check_is_fitted()?;
        Ok(self.fitted_params_core())
    }

    /// Exogeneous data converted for the core hooks, dropped if the forecaster ignores it
    fn exogeneous(&self, x: Option<&TsData<F>>) -> Result<Option<TsData<F>>> {
        match x {
            Some(x) if !self.get_flag(Tag::IgnoresExogeneousX) => {
                check_and_convert(self, x, Tag::XInnerType).map(Some)
            }
            _ => Ok(None),
        }
    }
}

macro_rules! forward_base_object {
    ($category:ident) => {
        impl<F: Float> BaseObject<F> for Box<dyn $category<F>> {
            fn type_name(&self) -> &'static str {
                (**self).type_name()
            }

            fn class_tags(&self) -> TagSet {
                (**self).class_tags()
            }

            fn state(&self) -> &EstimatorState {
                (**self).state()
            }

            fn state_mut(&mut self) -> &mut EstimatorState {
                (**self).state_mut()
            }

            fn get_params(&self, deep: bool) -> Params<F> {
                (**self).get_params(deep)
            }

            fn set_params(&mut self, params: Params<F>) -> Result<()> {
                (**self).set_params(params)
            }
        }

        impl<F: Float> Clone for Box<dyn $category<F>> {
            fn clone(&self) -> Self {
                (**self).boxed_clone()
            }
        }
    };
}

forward_base_object!(Transformer);
forward_base_object!(Regressor);
forward_base_object!(Classifier);
forward_base_object!(Forecaster);

impl<F: Float> Transformer<F> for Box<dyn Transformer<F>> {
    fn fit_core(&mut self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<()> {
        (**self).fit_core(x, y)
    }

    fn transform_core(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        (**self).transform_core(x, y)
    }

    fn inverse_transform_core(&self, x: &TsData<F>, y: Option<&TsData<F>>) -> Result<TsData<F>> {
        (**self).inverse_transform_core(x, y)
    }

    fn fitted_params_core(&self) -> Params<F> {
        (**self).fitted_params_core()
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        (**self).boxed_clone()
    }
}

impl<F: Float> Regressor<F> for Box<dyn Regressor<F>> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<F>) -> Result<()> {
        (**self).fit_core(x, y)
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<F>> {
        (**self).predict_core(x)
    }

    fn fitted_params_core(&self) -> Params<F> {
        (**self).fitted_params_core()
    }

    fn boxed_clone(&self) -> Box<dyn Regressor<F>> {
        (**self).boxed_clone()
    }
}

impl<F: Float> Classifier<F> for Box<dyn Classifier<F>> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<usize>) -> Result<()> {
        (**self).fit_core(x, y)
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<usize>> {
        (**self).predict_core(x)
    }

    fn predict_proba_core(&self, x: &TsData<F>) -> Result<Array2<F>> {
        (**self).predict_proba_core(x)
    }

    fn fitted_params_core(&self) -> Params<F> {
        (**self).fitted_params_core()
    }

    fn boxed_clone(&self) -> Box<dyn Classifier<F>> {
        (**self).boxed_clone()
    }
}

impl<F: Float> Forecaster<F> for Box<dyn Forecaster<F>> {
    fn fit_core(
        &mut self,
        y: &TsData<F>,
        x: Option<&TsData<F>>,
        fh: Option<&ForecastingHorizon>,
    ) -> Result<()> {
        (**self).fit_core(y, x, fh)
    }

    fn predict_core(&self, fh: &ForecastingHorizon, x: Option<&TsData<F>>) -> Result<TsData<F>> {
        (**self).predict_core(fh, x)
    }

    fn update_core(&mut self, y: &TsData<F>, x: Option<&TsData<F>>) -> Result<()> {
        (**self).update_core(y, x)
    }

    fn in_sample_residuals_core(&self) -> Result<TsData<F>> {
        (**self).in_sample_residuals_core()
    }

    fn fitted_params_core(&self) -> Params<F> {
        (**self).fitted_params_core()
    }

    fn boxed_clone(&self) -> Box<dyn Forecaster<F>> {
        (**self).boxed_clone()
    }
}
