//! Every estimator builds from its test parameter sets and runs through its lifecycle on
//! generated data.

use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use tempora::classification::{DummyClassifier, KNeighborsClassifier};
use tempora::composition::{
    ClassifierPipeline, FitInTransform, MultiplexForecaster, RegressorPipeline,
    TabularRegressorPipeline, TransformedTargetForecaster, TransformerPipeline,
};
use tempora::forecasting::NaiveForecaster;
use tempora::prelude::*;
use tempora::regression::{DummyRegressor, KNeighborsRegressor};
use tempora::transformations::{
    CosineTransformer, Imputer, LogTransformer, Padder, SummaryTransformer, TimeBinner,
};
use tempora_datasets::generate;

fn rng() -> Xoshiro256Plus {
    Xoshiro256Plus::seed_from_u64(42)
}

fn check_transformer<T>()
where
    T: Transformer<f64> + TestParams<f64>,
{
    let equal = generate::panel(6, 2, 12, 0.5, 5., &mut rng());
    let unequal = generate::unequal_panel(6, 2, 8, 12, &mut rng());

    for mut transformer in T::create_test_instances("default").unwrap() {
        assert!(!transformer.is_fitted());
        let name = transformer.type_name();
        let x = if transformer.get_flag(Tag::UnequalLength) {
            &unequal
        } else {
            &equal
        };

        let out = transformer
            .fit_transform(x, None)
            .unwrap_or_else(|e| panic!("{} failed: {}", name, e));
        assert!(transformer.is_fitted(), "{}", name);
        assert!(out.check().is_ok(), "{}", name);
    }
}

fn check_regressor<R>()
where
    R: Regressor<f64> + TestParams<f64>,
{
    let (x, y) = generate::regression_panel(12, 2, 10, 0.1, &mut rng());

    for mut regressor in R::create_test_instances("default").unwrap() {
        let name = regressor.type_name();
        regressor
            .fit(&x, &y)
            .unwrap_or_else(|e| panic!("{} failed: {}", name, e));
        let pred = regressor.predict(&x).unwrap();

        assert_eq!(pred.len(), 12, "{}", name);
        assert!(pred.iter().all(|v| v.is_finite()), "{}", name);
    }
}

fn check_classifier<C>()
where
    C: Classifier<f64> + TestParams<f64>,
{
    let (x, y) = generate::classification_panel(4, 3, 2, 10, &mut rng());

    for mut classifier in C::create_test_instances("default").unwrap() {
        let name = classifier.type_name();
        classifier
            .fit(&x, &y)
            .unwrap_or_else(|e| panic!("{} failed: {}", name, e));
        let proba = classifier.predict_proba(&x).unwrap();

        assert_eq!(classifier.predict(&x).unwrap().len(), 12, "{}", name);
        assert_eq!(proba.dim(), (12, 3), "{}", name);
        for row in proba.rows() {
            assert!((row.sum() - 1.).abs() < 1e-9, "{}", name);
        }
    }
}

fn check_forecaster<T>()
where
    T: Forecaster<f64> + TestParams<f64>,
{
    let y = generate::seasonal_series(36, 1, 10., 12, &mut rng());
    let fh = ForecastingHorizon::up_to(3).unwrap();

    for mut forecaster in T::create_test_instances("default").unwrap() {
        let name = forecaster.type_name();
        let pred = forecaster
            .fit_predict(&y, None, fh.clone())
            .unwrap_or_else(|e| panic!("{} failed: {}", name, e));

        assert_eq!(pred.mtype(), y.mtype(), "{}", name);
        assert_eq!(pred.metadata().n_timepoints, Some(3), "{}", name);
        assert!(pred.values().all(|v| v.is_finite()), "{}", name);
    }
}

#[test]
fn transformers() {
    check_transformer::<CosineTransformer<f64>>();
    check_transformer::<LogTransformer<f64>>();
    check_transformer::<Padder<f64>>();
    check_transformer::<Imputer<f64>>();
    check_transformer::<SummaryTransformer<f64>>();
    check_transformer::<TimeBinner<f64>>();
    check_transformer::<TransformerPipeline<f64>>();
    check_transformer::<FitInTransform<f64>>();
}

#[test]
fn regressors() {
    check_regressor::<DummyRegressor<f64>>();
    check_regressor::<KNeighborsRegressor<f64>>();
    check_regressor::<RegressorPipeline<f64>>();
    check_regressor::<TabularRegressorPipeline<f64>>();
}

#[test]
fn classifiers() {
    check_classifier::<DummyClassifier<f64>>();
    check_classifier::<KNeighborsClassifier<f64>>();
    check_classifier::<ClassifierPipeline<f64>>();
}

#[test]
fn forecasters() {
    check_forecaster::<NaiveForecaster<f64>>();
    check_forecaster::<TransformedTargetForecaster<f64>>();
    check_forecaster::<MultiplexForecaster<f64>>();
}
