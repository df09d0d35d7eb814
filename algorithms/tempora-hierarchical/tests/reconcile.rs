use std::collections::BTreeSet;

use approx::assert_abs_diff_eq;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use tempora::forecasting::NaiveForecaster;
use tempora::prelude::*;
use tempora_datasets::generate;
use tempora_hierarchical::{
    has_aggregates, Aggregator, Node, ReconcileMethod, ReconcilerForecaster,
};

/// Two level hierarchy with five bottom nodes, region `a1` has two stores only
fn five_stores(named: bool) -> TsData<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let y = generate::hierarchy(&[2, 3], 24, named, &mut rng);
    let frame = y.as_frame().unwrap();
    let rows: Vec<usize> = (0..frame.nrows()).filter(|r| r / 24 != 5).collect();

    TsData::HierarchicalFrame(frame.select_rows(&rows))
}

fn reconciler(method: ReconcileMethod) -> ReconcilerForecaster<f64> {
    ReconcilerForecaster::new(Box::new(NaiveForecaster::default()), method)
}

fn fh() -> ForecastingHorizon {
    ForecastingHorizon::new(vec![1, 2]).unwrap()
}

#[test]
fn reconciliation_matrix_is_aligned_with_summation_matrix() {
    let y = five_stores(true);

    for method in ReconcileMethod::ALL.iter() {
        let mut forecaster = reconciler(*method);
        forecaster.fit(&y, None, Some(fh())).unwrap();

        let s = forecaster.summation_matrix().unwrap();
        let s_rows: BTreeSet<&Node> = s.rows().iter().collect();
        let s_columns: BTreeSet<&Node> = s.columns().iter().collect();
        assert_eq!(s_columns.len(), 5);
        assert_eq!(s_rows.len(), 8);

        for g in forecaster.reconciliation_matrices().unwrap() {
            assert_eq!(g.columns().iter().collect::<BTreeSet<_>>(), s_rows, "{}", method);
            assert_eq!(g.rows().iter().collect::<BTreeSet<_>>(), s_columns, "{}", method);
        }
    }
}

#[test]
fn reconciled_forecasts_are_coherent() {
    let y = five_stores(true);

    for method in ReconcileMethod::ALL.iter() {
        let mut forecaster = reconciler(*method);
        let pred = forecaster.fit_predict(&y, None, fh()).unwrap();
        assert!(has_aggregates(pred.as_frame().unwrap()));

        let mut aggregator = Aggregator::default();
        aggregator.fit(&pred, None).unwrap();
        let bottom = aggregator.inverse_transform(&pred, None).unwrap();
        let again = aggregator.transform(&bottom, None).unwrap();

        assert_eq!(
            again.as_frame().unwrap().index(),
            pred.as_frame().unwrap().index()
        );
        assert_abs_diff_eq!(
            again.as_frame().unwrap().values(),
            pred.as_frame().unwrap().values(),
            epsilon = 1e-6
        );
    }
}

#[test]
fn index_names_do_not_change_the_forecasts() {
    for method in ReconcileMethod::ALL.iter() {
        let named = reconciler(*method)
            .fit_predict(&five_stores(true), None, fh())
            .unwrap();
        let unnamed = reconciler(*method)
            .fit_predict(&five_stores(false), None, fh())
            .unwrap();

        assert_eq!(
            named.as_frame().unwrap().values(),
            unnamed.as_frame().unwrap().values()
        );
        assert_eq!(
            named.as_frame().unwrap().index().keys(),
            unnamed.as_frame().unwrap().index().keys()
        );
    }
}

#[test]
fn aggregated_input_gives_the_same_forecasts() {
    let y = five_stores(false);
    let aggregated = Aggregator::default().fit_transform(&y, None).unwrap();

    let from_bottom = reconciler(ReconcileMethod::MintShrink)
        .fit_predict(&y, None, fh())
        .unwrap();
    let from_aggregated = reconciler(ReconcileMethod::MintShrink)
        .fit_predict(&aggregated, None, fh())
        .unwrap();

    assert_eq!(from_bottom, from_aggregated);
}

#[test]
fn predict_before_fit_is_not_fitted() {
    let forecaster = reconciler(ReconcileMethod::Ols);

    assert!(matches!(
        forecaster.predict(Some(&fh()), None),
        Err(Error::NotFitted(_))
    ));
    assert!(forecaster.summation_matrix().is_err());
}

#[test]
fn test_parameter_sets_fit_and_predict() {
    let y = five_stores(true);

    for mut forecaster in ReconcilerForecaster::<f64>::create_test_instances("default").unwrap() {
        let pred = forecaster.fit_predict(&y, None, fh()).unwrap();
        assert_eq!(pred.metadata().n_instances, 8);
        assert!(pred.values().all(|v| v.is_finite()));
    }
}

#[test]
fn base_forecaster_blueprint_is_left_untouched() {
    let mut forecaster = reconciler(ReconcileMethod::WlsVar);
    let before = forecaster.get_params(true);

    forecaster.fit(&five_stores(true), None, Some(fh())).unwrap();

    assert!(forecaster.is_fitted());
    assert!(!forecaster.forecaster().is_fitted());
    assert_eq!(forecaster.get_params(true), before);
}
