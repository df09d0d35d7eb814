//! Fitted-clone slot of wrapping estimators
//!
//! A wrapper keeps its own parameters and tags and holds the blueprint of the wrapped
//! estimator as a parameter. Fitting clones the blueprint into a [`Delegate`], and every
//! call after fit is forwarded to that clone. The blueprint itself is never fitted.
use ndarray::{Array1, Array2};

use crate::base::Params;
use crate::dataset::{Float, ForecastingHorizon, TsData};
use crate::error::{Error, Result};
use crate::traits::{Classifier, Forecaster, Regressor};

/// Slot holding the fitted clone of a wrapped estimator
pub struct Delegate<E> {
    owner: &'static str,
    estimator_: Option<E>,
}

impl<E> Delegate<E> {
    /// Empty slot of the wrapper named `owner`
    pub fn new(owner: &'static str) -> Self {
        Delegate {
            owner,
            estimator_: None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.estimator_.is_some()
    }

    pub fn clear(&mut self) {
        self.estimator_ = None;
    }

    /// The fitted clone, or [`Error::NotFitted`] for the owner
    pub fn get(&self) -> Result<&E> {
        self.estimator_
            .as_ref()
            .ok_or_else(|| Error::NotFitted(self.owner.to_string()))
    }

    pub fn get_mut(&mut self) -> Result<&mut E> {
        let owner = self.owner;
        self.estimator_
            .as_mut()
            .ok_or_else(|| Error::NotFitted(owner.to_string()))
    }
}

impl<F: Float> Delegate<Box<dyn Regressor<F>>> {
    /// Fit a fresh clone of `blueprint` and keep it
    pub fn fit(&mut self, blueprint: &dyn Regressor<F>, x: &TsData<F>, y: &Array1<F>) -> Result<()> {
        self.estimator_ = None;
        let mut estimator = blueprint.boxed_clone();
        estimator.fit(x, y)?;
        self.estimator_ = Some(estimator);
        Ok(())
    }

    pub fn predict(&self, x: &TsData<F>) -> Result<Array1<F>> {
        self.get()?.predict(x)
    }

    pub fn fitted_params(&self) -> Result<Params<F>> {
        self.get()?.get_fitted_params()
    }
}

impl<F: Float> Delegate<Box<dyn Classifier<F>>> {
    /// Fit a fresh clone of `blueprint` and keep it
    pub fn fit(
        &mut self,
        blueprint: &dyn Classifier<F>,
        x: &TsData<F>,
        y: &Array1<usize>,
    ) -> Result<()> {
        self.estimator_ = None;
        let mut estimator = blueprint.boxed_clone();
        estimator.fit(x, y)?;
        self.estimator_ = Some(estimator);
        Ok(())
    }

    pub fn predict(&self, x: &TsData<F>) -> Result<Array1<usize>> {
        self.get()?.predict(x)
    }

    pub fn predict_proba(&self, x: &TsData<F>) -> Result<Array2<F>> {
        self.get()?.predict_proba(x)
    }

    pub fn fitted_params(&self) -> Result<Params<F>> {
        self.get()?.get_fitted_params()
    }
}

impl<F: Float> Delegate<Box<dyn Forecaster<F>>> {
    /// Fit a fresh clone of `blueprint` and keep it
    pub fn fit(
        &mut self,
        blueprint: &dyn Forecaster<F>,
        y: &TsData<F>,
        x: Option<&TsData<F>>,
        fh: Option<&ForecastingHorizon>,
    ) -> Result<()> {
        self.estimator_ = None;
        let mut estimator = blueprint.boxed_clone();
        estimator.fit(y, x, fh.cloned())?;
        self.estimator_ = Some(estimator);
        Ok(())
    }

    pub fn predict(&self, fh: &ForecastingHorizon, x: Option<&TsData<F>>) -> Result<TsData<F>> {
        self.get()?.predict(Some(fh), x)
    }

    pub fn update(&mut self, y: &TsData<F>, x: Option<&TsData<F>>) -> Result<()> {
        self.get_mut()?.update(y, x)?;
        Ok(())
    }

    /// In-sample residuals of the fitted clone
    pub fn residuals(&self) -> Result<TsData<F>> {
        self.get()?.predict_residuals(None, None)
    }

    pub fn fitted_params(&self) -> Result<Params<F>> {
        self.get()?.get_fitted_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseObject;
    use crate::regression::DummyRegressor;
    use ndarray::{array, Array3};

    #[test]
    fn empty_slot_is_not_fitted() {
        let slot: Delegate<Box<dyn Regressor<f64>>> = Delegate::new("Wrapper");
        let x = TsData::Panel3D(Array3::zeros((2, 1, 3)));

        assert!(!slot.is_set());
        match slot.predict(&x) {
            Err(Error::NotFitted(owner)) => assert_eq!(owner, "Wrapper"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn blueprint_stays_unfitted() {
        let blueprint = DummyRegressor::<f64>::default();
        let mut slot: Delegate<Box<dyn Regressor<f64>>> = Delegate::new("Wrapper");
        let x = TsData::Panel3D(Array3::zeros((3, 1, 4)));

        slot.fit(&blueprint, &x, &array![1., 2., 3.]).unwrap();

        assert!(slot.get().unwrap().is_fitted());
        assert!(!blueprint.is_fitted());
        assert_eq!(slot.predict(&x).unwrap(), array![2., 2., 2.]);
    }
}
