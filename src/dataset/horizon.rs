#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Relative steps ahead of the cutoff a forecaster is asked to predict
///
/// The steps are strictly positive, sorted and free of duplicates. Step `1` is the first time
/// point after the last observation seen in `fit` or `update`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastingHorizon {
    steps: Vec<usize>,
}

impl ForecastingHorizon {
    pub fn new(mut steps: Vec<usize>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::Parameters("empty forecasting horizon".into()));
        }
        if steps.contains(&0) {
            return Err(Error::Parameters(
                "forecasting horizon steps must be positive".into(),
            ));
        }
        steps.sort_unstable();
        steps.dedup();

        Ok(ForecastingHorizon { steps })
    }

    /// Horizon covering every step from `1` to `n`
    pub fn up_to(n: usize) -> Result<Self> {
        Self::new((1..=n).collect())
    }

    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The furthest step of the horizon
    pub fn max_step(&self) -> usize {
        self.steps.last().copied().unwrap_or(0)
    }

    /// Absolute time points of the horizon for a given cutoff
    pub fn to_absolute(&self, cutoff: i64) -> Vec<i64> {
        self.steps.iter().map(|s| cutoff + *s as i64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_sorted_and_unique() {
        let fh = ForecastingHorizon::new(vec![3, 1, 3, 2]).unwrap();

        assert_eq!(fh.steps(), &[1, 2, 3]);
        assert_eq!(fh.max_step(), 3);
        assert_eq!(fh.to_absolute(9), vec![10, 11, 12]);
    }

    #[test]
    fn rejects_invalid_steps() {
        assert!(ForecastingHorizon::new(vec![]).is_err());
        assert!(ForecastingHorizon::new(vec![0, 1]).is_err());
        assert_eq!(ForecastingHorizon::up_to(2).unwrap().steps(), &[1, 2]);
    }
}
