use approx::assert_abs_diff_eq;
use ndarray::Array1;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use tempora::classification::KNeighborsClassifierParams;
use tempora::composition::{
    ClassifierPipeline, MultiplexForecaster, RegressorPipeline, TransformedTargetForecaster,
    TransformerPipeline,
};
use tempora::forecasting::{NaiveForecaster, NaiveForecasterParams, NaiveStrategy};
use tempora::prelude::*;
use tempora::regression::{DummyRegressor, KNeighborsRegressorParams};
use tempora::transformations::{
    CosineTransformer, LogTransformer, Padder, SummaryTransformer, SummaryTransformerParams,
};
use tempora_datasets::generate;

fn transformer(t: impl Transformer<f64> + 'static) -> Box<dyn Transformer<f64>> {
    Box::new(t)
}

fn naive(strategy: NaiveStrategy) -> Box<dyn Forecaster<f64>> {
    Box::new(NaiveForecaster::new(strategy))
}

#[test]
fn padding_makes_unequal_panels_usable() {
    let mut rng = Xoshiro256Plus::seed_from_u64(1);
    let x = generate::unequal_panel(8, 1, 4, 9, &mut rng);
    let y = Array1::linspace(0., 7., 8);
    let knn = || {
        Box::new(
            KNeighborsRegressorParams::new()
                .n_neighbors(1)
                .build()
                .unwrap(),
        )
    };

    let mut plain = knn();
    assert!(matches!(plain.fit(&x, &y), Err(Error::Capability { .. })));

    let mut pipeline =
        RegressorPipeline::new(vec![Step::Unnamed(transformer(Padder::default()))], knn())
            .unwrap();
    assert!(pipeline.get_flag(Tag::UnequalLength));
    let pred = pipeline.fit_predict(&x, &y).unwrap();
    assert_abs_diff_eq!(pred, y, epsilon = 1e-12);
}

#[test]
fn classifier_pipeline_separates_generated_classes() {
    let mut rng = Xoshiro256Plus::seed_from_u64(2);
    let (x, y) = generate::classification_panel(5, 3, 2, 12, &mut rng);
    let summary: SummaryTransformer<f64> = SummaryTransformerParams::new().build().unwrap();

    let mut pipeline = ClassifierPipeline::new(
        vec![Step::named("summary", transformer(summary))],
        Box::new(KNeighborsClassifierParams::new().n_neighbors(3).build().unwrap()),
    )
    .unwrap();
    pipeline.fit(&x, &y).unwrap();

    assert_eq!(pipeline.predict(&x).unwrap(), y);
    assert_eq!(pipeline.score(&x, &y).unwrap(), 1.);
}

#[test]
fn composed_pipeline_equals_constructed_pipeline() {
    let mut rng = Xoshiro256Plus::seed_from_u64(3);
    let (x, y) = generate::regression_panel(10, 1, 6, 0.5, &mut rng);

    let inner = compose(
        Composable::Transformer(transformer(LogTransformer::default())),
        Composable::Regressor(Box::new(DummyRegressor::default())),
    )
    .unwrap();
    let mut composed = compose(
        Composable::Transformer(transformer(CosineTransformer::default())),
        inner,
    )
    .unwrap()
    .into_regressor()
    .unwrap();
    let mut constructed = RegressorPipeline::new(
        vec![
            Step::Unnamed(transformer(CosineTransformer::default())),
            Step::Unnamed(transformer(LogTransformer::default())),
        ],
        Box::new(DummyRegressor::default()),
    )
    .unwrap();

    assert_eq!(
        composed.fit_predict(&x, &y).unwrap(),
        constructed.fit_predict(&x, &y).unwrap()
    );
}

#[test]
fn regressor_cannot_be_followed_by_a_transformer() {
    let res = compose(
        Composable::Regressor(Box::new(DummyRegressor::<f64>::default())),
        Composable::Transformer(transformer(LogTransformer::default())),
    );

    assert!(matches!(res, Err(Error::NotComposable { .. })));
}

#[test]
fn transformed_target_forecaster_updates_through_the_transformers() {
    let mut rng = Xoshiro256Plus::seed_from_u64(4);
    let y = generate::seasonal_series(30, 1, 10., 6, &mut rng);
    let values = y.as_series_array().unwrap();
    let (head, tail) = (
        TsData::SeriesArray(values.slice(ndarray::s![..24, ..]).to_owned()),
        TsData::SeriesArray(values.slice(ndarray::s![24.., ..]).to_owned()),
    );
    let fh = ForecastingHorizon::up_to(6).unwrap();
    let seasonal = || -> Box<dyn Forecaster<f64>> {
        Box::new(
            NaiveForecasterParams::new()
                .strategy(NaiveStrategy::Last)
                .sp(6)
                .build()
                .unwrap(),
        )
    };

    let mut updated = TransformedTargetForecaster::new(
        vec![Step::Unnamed(transformer(LogTransformer::default()))],
        seasonal(),
    )
    .unwrap();
    updated.fit(&head, None, Some(fh.clone())).unwrap();
    updated.update(&tail, None).unwrap();

    let mut full = TransformedTargetForecaster::new(
        vec![Step::Unnamed(transformer(LogTransformer::default()))],
        seasonal(),
    )
    .unwrap();
    let expected = full.fit_predict(&y, None, fh).unwrap();
    let expected = expected.as_series_array().unwrap();
    let predicted = updated.predict(None, None).unwrap();

    assert_abs_diff_eq!(predicted.as_series_array().unwrap(), expected, epsilon = 1e-10);
    // last season repeated
    assert_abs_diff_eq!(
        expected,
        &values.slice(ndarray::s![24.., ..]).to_owned(),
        epsilon = 1e-10
    );
}

#[test]
fn multiplexer_follows_the_selected_forecaster() {
    let y = tempora_datasets::trend(10, 1., 2.);
    let fh = ForecastingHorizon::up_to(2).unwrap();
    let mut multiplexer = MultiplexForecaster::new(
        vec![
            Step::named("last", naive(NaiveStrategy::Last)),
            Step::named("drift", naive(NaiveStrategy::Drift)),
        ],
        Some("last".into()),
    )
    .unwrap();

    let last = multiplexer.fit_predict(&y, None, fh.clone()).unwrap();
    assert_eq!(last.as_series_array().unwrap().column(0).to_vec(), vec![19., 19.]);

    multiplexer
        .set_params(Params::new().with("selected_forecaster", "drift"))
        .unwrap();
    assert!(!multiplexer.is_fitted());
    let drift = multiplexer.fit_predict(&y, None, fh).unwrap();
    assert_abs_diff_eq!(
        drift.as_series_array().unwrap().column(0).to_owned(),
        Array1::from(vec![21., 23.]),
        epsilon = 1e-10
    );
}

#[test]
fn unfitted_composites_refuse_to_predict() {
    let x = generate::panel(3, 1, 5, 1., 2., &mut Xoshiro256Plus::seed_from_u64(5));

    let pipeline =
        TransformerPipeline::new(vec![Step::Unnamed(transformer(LogTransformer::default()))])
            .unwrap();
    assert!(matches!(pipeline.transform(&x, None), Err(Error::NotFitted(_))));

    let regressor = RegressorPipeline::new(
        vec![Step::Unnamed(transformer(LogTransformer::default()))],
        Box::new(DummyRegressor::default()),
    )
    .unwrap();
    assert!(matches!(regressor.predict(&x), Err(Error::NotFitted(_))));
}

#[test]
fn regressor_pipeline_leaves_its_blueprints_untouched() {
    let mut rng = Xoshiro256Plus::seed_from_u64(6);
    let (x, y) = generate::regression_panel(8, 1, 5, 0.1, &mut rng);
    let mut pipeline = RegressorPipeline::new(
        vec![
            Step::Unnamed(transformer(LogTransformer::default())),
            Step::Unnamed(transformer(CosineTransformer::default())),
        ],
        Box::new(KNeighborsRegressorParams::new().n_neighbors(2).build::<f64>().unwrap()),
    )
    .unwrap();
    let before = pipeline.get_params(true);

    pipeline.fit(&x, &y).unwrap();

    assert!(pipeline.is_fitted());
    assert!(!pipeline.regressor().is_fitted());
    assert!(pipeline.transformers().estimators().all(|t| !t.is_fitted()));
    assert_eq!(pipeline.get_params(true), before);
}

#[test]
fn target_forecaster_leaves_its_blueprints_untouched() {
    let mut rng = Xoshiro256Plus::seed_from_u64(7);
    let y = generate::seasonal_series(24, 1, 10., 6, &mut rng);
    let mut forecaster = TransformedTargetForecaster::new(
        vec![Step::Unnamed(transformer(LogTransformer::default()))],
        naive(NaiveStrategy::Drift),
    )
    .unwrap();
    let before = forecaster.get_params(true);

    forecaster
        .fit(&y, None, Some(ForecastingHorizon::up_to(3).unwrap()))
        .unwrap();

    assert!(forecaster.is_fitted());
    assert!(!forecaster.forecaster().is_fitted());
    assert!(forecaster.transformers().estimators().all(|t| !t.is_fitted()));
    assert_eq!(forecaster.get_params(true), before);
}
