//! Building pipelines from pairs of estimators
//!
//! [`compose`] chains two estimators the way data flows through them, `left` first. The left
//! operand gets the first chance to build the composite. If it declines, the right operand is
//! asked, and only if both decline is the pair rejected. Transformers compose with everything
//! that consumes their output; nothing composes to the right of a terminal estimator.
use tracing::debug;

use super::classifier_pipeline::ClassifierPipeline;
use super::forecasting_pipeline::TransformedTargetForecaster;
use super::heterogeneous::{NamedSteps, Step};
use super::regressor_pipeline::RegressorPipeline;
use super::transformer_pipeline::{TransformerPipeline, TransformerSteps};
use crate::base::BaseObject;
use crate::dataset::Float;
use crate::error::{Error, Result};
use crate::traits::{Classifier, Forecaster, Regressor, Transformer};

/// Estimators and pipelines which take part in composition
pub enum Composable<F: Float> {
    Transformer(Box<dyn Transformer<F>>),
    TransformerPipeline(TransformerPipeline<F>),
    Regressor(Box<dyn Regressor<F>>),
    RegressorPipeline(RegressorPipeline<F>),
    Classifier(Box<dyn Classifier<F>>),
    ClassifierPipeline(ClassifierPipeline<F>),
    Forecaster(Box<dyn Forecaster<F>>),
    TransformedTargetForecaster(TransformedTargetForecaster<F>),
}

/// Outcome of asking one operand to compose with the other
pub enum Composition<F: Float> {
    Composed(Composable<F>),
    /// The operand does not know how to compose, both are handed back as `(left, right)`
    NotSupported(Composable<F>, Composable<F>),
}

impl<F: Float> Composable<F> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Composable::Transformer(e) => e.type_name(),
            Composable::TransformerPipeline(e) => e.type_name(),
            Composable::Regressor(e) => e.type_name(),
            Composable::RegressorPipeline(e) => e.type_name(),
            Composable::Classifier(e) => e.type_name(),
            Composable::ClassifierPipeline(e) => e.type_name(),
            Composable::Forecaster(e) => e.type_name(),
            Composable::TransformedTargetForecaster(e) => e.type_name(),
        }
    }

    /// Transformer steps of a transformer or transformer pipeline
    fn transformer_steps(&self) -> Option<Result<TransformerSteps<F>>> {
        match self {
            Composable::Transformer(t) => {
                Some(NamedSteps::new(vec![Step::Unnamed(t.clone())], &[]))
            }
            Composable::TransformerPipeline(p) => Some(Ok(p.clone().into_steps())),
            _ => None,
        }
    }

    /// Compose `self` followed by `right`, done by a transformer on the left
    pub fn compose_left(self, right: Composable<F>) -> Result<Composition<F>> {
        let steps = match self.transformer_steps() {
            Some(steps) => steps?,
            None => return Ok(Composition::NotSupported(self, right)),
        };
        let tail = match right.transformer_steps() {
            Some(tail) => tail?,
            None => return Ok(Composition::NotSupported(self, right)),
        };

        let pipeline = TransformerPipeline::new(steps.joined(&tail))?;
        Ok(Composition::Composed(Composable::TransformerPipeline(
            pipeline,
        )))
    }

    /// Compose `left` followed by `self`, done by the estimator consuming the output
    pub fn compose_right(self, left: Composable<F>) -> Result<Composition<F>> {
        let front = match left.transformer_steps() {
            Some(front) => front?,
            None => return Ok(Composition::NotSupported(left, self)),
        };

        let composed = match self {
            Composable::Regressor(r) => {
                Composable::RegressorPipeline(RegressorPipeline::new(front.to_steps(), r)?)
            }
            Composable::RegressorPipeline(p) => {
                Composable::RegressorPipeline(p.prepend_steps(&front)?)
            }
            Composable::Classifier(c) => {
                Composable::ClassifierPipeline(ClassifierPipeline::new(front.to_steps(), c)?)
            }
            Composable::ClassifierPipeline(p) => {
                Composable::ClassifierPipeline(p.prepend_steps(&front)?)
            }
            Composable::Forecaster(f) => Composable::TransformedTargetForecaster(
                TransformedTargetForecaster::new(front.to_steps(), f)?,
            ),
            Composable::TransformedTargetForecaster(p) => {
                Composable::TransformedTargetForecaster(p.prepend_steps(&front)?)
            }
            other => return Ok(Composition::NotSupported(left, other)),
        };
        Ok(Composition::Composed(composed))
    }

    /// Fluent form of [`compose`]
    pub fn then(self, right: Composable<F>) -> Result<Composable<F>> {
        compose(self, right)
    }

    pub fn into_transformer(self) -> Result<Box<dyn Transformer<F>>> {
        match self {
            Composable::Transformer(t) => Ok(t),
            Composable::TransformerPipeline(p) => Ok(Box::new(p)),
            other => Err(other.mismatch("transformer")),
        }
    }

    pub fn into_regressor(self) -> Result<Box<dyn Regressor<F>>> {
        match self {
            Composable::Regressor(r) => Ok(r),
            Composable::RegressorPipeline(p) => Ok(Box::new(p)),
            other => Err(other.mismatch("regressor")),
        }
    }

    pub fn into_classifier(self) -> Result<Box<dyn Classifier<F>>> {
        match self {
            Composable::Classifier(c) => Ok(c),
            Composable::ClassifierPipeline(p) => Ok(Box::new(p)),
            other => Err(other.mismatch("classifier")),
        }
    }

    pub fn into_forecaster(self) -> Result<Box<dyn Forecaster<F>>> {
        match self {
            Composable::Forecaster(f) => Ok(f),
            Composable::TransformedTargetForecaster(p) => Ok(Box::new(p)),
            other => Err(other.mismatch("forecaster")),
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::Parameters(format!("expected a {}, got {}", expected, self.type_name()))
    }
}

/// Chain `left` and `right`, data flowing through `left` first
///
/// Fails with [`Error::NotComposable`] if neither operand supports the pair.
pub fn compose<F: Float>(left: Composable<F>, right: Composable<F>) -> Result<Composable<F>> {
    debug!(left = left.type_name(), right = right.type_name(), "composing");
    let (left, right) = match left.compose_left(right)? {
        Composition::Composed(c) => return Ok(c),
        Composition::NotSupported(left, right) => (left, right),
    };
    match right.compose_right(left)? {
        Composition::Composed(c) => Ok(c),
        Composition::NotSupported(left, right) => Err(Error::NotComposable {
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        }),
    }
}

macro_rules! impl_from {
    ($variant:ident, $ty:ty) => {
        impl<F: Float> From<$ty> for Composable<F> {
            fn from(e: $ty) -> Self {
                Composable::$variant(e)
            }
        }
    };
}

impl_from!(Transformer, Box<dyn Transformer<F>>);
impl_from!(TransformerPipeline, TransformerPipeline<F>);
impl_from!(Regressor, Box<dyn Regressor<F>>);
impl_from!(RegressorPipeline, RegressorPipeline<F>);
impl_from!(Classifier, Box<dyn Classifier<F>>);
impl_from!(ClassifierPipeline, ClassifierPipeline<F>);
impl_from!(Forecaster, Box<dyn Forecaster<F>>);
impl_from!(TransformedTargetForecaster, TransformedTargetForecaster<F>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::NaiveForecaster;
    use crate::regression::KNeighborsRegressor;
    use crate::transformations::{CosineTransformer, LogTransformer};

    fn log() -> Composable<f64> {
        Composable::Transformer(Box::new(LogTransformer::default()))
    }

    fn cosine() -> Composable<f64> {
        Composable::Transformer(Box::new(CosineTransformer::default()))
    }

    fn knn() -> Composable<f64> {
        Composable::Regressor(Box::new(KNeighborsRegressor::default()))
    }

    #[test]
    fn transformers_compose_into_a_pipeline() {
        let composed = compose(log(), cosine()).unwrap();

        match composed {
            Composable::TransformerPipeline(p) => {
                assert_eq!(p.steps().names(), vec!["LogTransformer", "CosineTransformer"])
            }
            _ => panic!("expected a transformer pipeline"),
        }
    }

    #[test]
    fn nested_composition_matches_constructor() {
        let composed = compose(log(), compose(cosine(), knn()).unwrap()).unwrap();
        let built = RegressorPipeline::new(
            vec![
                Step::Unnamed(Box::new(LogTransformer::default()) as Box<dyn Transformer<f64>>),
                Step::Unnamed(Box::new(CosineTransformer::default()) as Box<dyn Transformer<f64>>),
            ],
            Box::new(KNeighborsRegressor::default()),
        )
        .unwrap();

        match composed {
            Composable::RegressorPipeline(p) => {
                assert_eq!(p.get_params(true), built.get_params(true));
                assert_eq!(p.get_tags(), built.get_tags());
            }
            _ => panic!("expected a regressor pipeline"),
        }
    }

    #[test]
    fn reserved_step_names_fail_like_the_constructor() {
        let named = || {
            TransformerPipeline::new(vec![Step::named(
                "regressor",
                Box::new(LogTransformer::default()) as Box<dyn Transformer<f64>>,
            )])
            .unwrap()
        };

        let built = RegressorPipeline::new(
            named().steps().to_steps(),
            Box::new(KNeighborsRegressor::default()),
        );
        assert!(matches!(built, Err(Error::Parameters(_))));
        assert!(matches!(
            compose(Composable::TransformerPipeline(named()), knn()),
            Err(Error::Parameters(_))
        ));
    }

    #[test]
    fn fluent_form_builds_a_target_forecaster() {
        let composed = log()
            .then(Composable::Forecaster(Box::new(NaiveForecaster::default())))
            .unwrap();

        assert_eq!(composed.type_name(), "TransformedTargetForecaster");
        assert!(composed.into_forecaster().is_ok());
    }

    #[test]
    fn nothing_composes_after_a_regressor() {
        match compose(knn(), log()) {
            Err(Error::NotComposable { left, right }) => {
                assert_eq!(left, "KNeighborsRegressor");
                assert_eq!(right, "LogTransformer");
            }
            _ => panic!("expected NotComposable"),
        }
    }
}
