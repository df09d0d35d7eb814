//! Utility functions for randomly generating time series

use ndarray::{s, Array, Array1, Array2, Array3, Axis};
use ndarray_rand::{
    rand::Rng,
    rand_distr::{Distribution, StandardNormal, Uniform},
    RandomExt,
};
use tempora::dataset::{IndexedFrame, TsData};

use crate::hierarchy_index;

/// Positive series with a trend, a yearly-like season of length `period` and uniform noise
///
/// Values stay above `level - 3`, so log transforms are defined for `level > 3`.
pub fn seasonal_series(
    n_timepoints: usize,
    n_columns: usize,
    level: f64,
    period: usize,
    rng: &mut impl Rng,
) -> TsData<f64> {
    let noise: Array2<f64> =
        Array::random_using((n_timepoints, n_columns), Uniform::new(-1., 1.), rng);
    let season = |t: usize| {
        2. * (2. * std::f64::consts::PI * (t % period.max(1)) as f64 / period.max(1) as f64).sin()
    };
    let signal = Array2::from_shape_fn((n_timepoints, n_columns), |(t, c)| {
        level + c as f64 + 0.1 * t as f64 + season(t)
    });

    TsData::SeriesArray(signal + noise)
}

/// Gaussian random walk starting at `start`
pub fn random_walk(n_timepoints: usize, start: f64, rng: &mut impl Rng) -> TsData<f64> {
    let steps: Array1<f64> = Array::random_using(n_timepoints, StandardNormal, rng);
    let mut level = start;
    let walk = steps.mapv(|step| {
        level += step;
        level
    });

    TsData::SeriesArray(walk.insert_axis(Axis(1)))
}

/// Equal length panel with values drawn uniformly from `[low, high)`
pub fn panel(
    n_instances: usize,
    n_channels: usize,
    n_timepoints: usize,
    low: f64,
    high: f64,
    rng: &mut impl Rng,
) -> TsData<f64> {
    TsData::Panel3D(Array3::random_using(
        (n_instances, n_channels, n_timepoints),
        Uniform::new(low, high),
        rng,
    ))
}

/// Panel of instances with lengths drawn uniformly from `min_length..=max_length`
pub fn unequal_panel(
    n_instances: usize,
    n_channels: usize,
    min_length: usize,
    max_length: usize,
    rng: &mut impl Rng,
) -> TsData<f64> {
    let lengths = Uniform::new_inclusive(min_length, max_length.max(min_length));
    let values = Uniform::new(0.5, 5.);
    let instances = (0..n_instances)
        .map(|_| {
            let n = lengths.sample(rng);
            Array2::random_using((n_channels, n), values, rng)
        })
        .collect();

    TsData::PanelList(instances)
}

/// Equal length panel whose instances are shifted by the class label, with the labels
///
/// Instances of class `k` are drawn around `2k`, so small panels are already separable.
pub fn classification_panel(
    n_per_class: usize,
    n_classes: usize,
    n_channels: usize,
    n_timepoints: usize,
    rng: &mut impl Rng,
) -> (TsData<f64>, Array1<usize>) {
    let labels = Array1::from_shape_fn(n_per_class * n_classes, |i| i % n_classes.max(1));
    let mut x = Array3::random_using(
        (labels.len(), n_channels, n_timepoints),
        Uniform::new(0., 0.5),
        rng,
    );
    for (mut instance, label) in x.axis_iter_mut(Axis(0)).zip(labels.iter()) {
        instance += 2. * *label as f64;
    }

    (TsData::Panel3D(x), labels)
}

/// Equal length panel with targets equal to the instance means plus gaussian noise
pub fn regression_panel(
    n_instances: usize,
    n_channels: usize,
    n_timepoints: usize,
    noise: f64,
    rng: &mut impl Rng,
) -> (TsData<f64>, Array1<f64>) {
    let x = Array3::random_using(
        (n_instances, n_channels, n_timepoints),
        Uniform::new(0.5, 5.),
        rng,
    );
    let eps: Array1<f64> = Array::random_using(n_instances, StandardNormal, rng);
    let y = Array1::from_shape_fn(n_instances, |i| {
        x.index_axis(Axis(0), i).mean().unwrap_or(0.) + noise * eps[i]
    });

    (TsData::Panel3D(x), y)
}

/// Bottom level hierarchy of positive seasonal series
///
/// See [`hierarchy_index`] for the layout of the index.
pub fn hierarchy(
    branching: &[usize],
    n_timepoints: usize,
    named: bool,
    rng: &mut impl Rng,
) -> TsData<f64> {
    let index = hierarchy_index(branching, n_timepoints, named);
    let n_nodes = index.len() / n_timepoints.max(1);
    let mut values = Array2::zeros((index.len(), 1));
    for node in 0..n_nodes {
        let series = seasonal_series(n_timepoints, 1, 10. + node as f64, 4, rng);
        if let TsData::SeriesArray(series) = series {
            values
                .slice_mut(s![node * n_timepoints..(node + 1) * n_timepoints, ..])
                .assign(&series);
        }
    }

    TsData::HierarchicalFrame(
        IndexedFrame::new(index, vec!["y".to_string()], values)
            .unwrap_or_else(|_| IndexedFrame::from_array(Array2::zeros((0, 1)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn seeded_generators_are_reproducible() {
        let a = seasonal_series(30, 2, 10., 12, &mut Xoshiro256Plus::seed_from_u64(42));
        let b = seasonal_series(30, 2, 10., 12, &mut Xoshiro256Plus::seed_from_u64(42));

        assert_eq!(a, b);
        assert!(a.values().all(|v| v > 6.));
    }

    #[test]
    fn unequal_panel_lengths_are_bounded() {
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let x = unequal_panel(20, 2, 3, 8, &mut rng);

        assert!(x.check().is_ok());
        for instance in x.as_panel_list().unwrap() {
            assert_eq!(instance.nrows(), 2);
            assert!((3..=8).contains(&instance.ncols()));
        }
    }

    #[test]
    fn classes_are_separated() {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let (x, y) = classification_panel(4, 3, 1, 5, &mut rng);
        let x = x.as_panel_3d().unwrap();

        for (instance, label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            let low = 2. * *label as f64;
            assert!(instance.iter().all(|v| *v >= low && *v < low + 0.5));
        }
    }

    #[test]
    fn hierarchy_has_one_series_per_bottom_node() {
        let mut rng = Xoshiro256Plus::seed_from_u64(11);
        let y = hierarchy(&[2, 2], 12, true, &mut rng);

        assert!(y.check().is_ok());
        assert_eq!(y.metadata().n_instances, 4);
        assert_eq!(y.metadata().n_timepoints, Some(12));
    }
}
