use ndarray::{Array1, Array2};
use tracing::info;

use super::delegate::Delegate;
use super::heterogeneous::{split_component_params, NamedSteps, Step};
use super::merge::merge_collection_terminal;
use super::regressor_pipeline::steps_param;
use super::transformer_pipeline::{
    chain_fitted_params, chain_tags, fit_chain, fitted_chain, transform_chain, TransformerSteps,
};
use crate::base::{
    AnyEstimator, BaseObject, EstimatorState, ParamPath, ParamValue, Params, TestParams,
};
use crate::classification::{DummyClassifier, KNeighborsClassifier};
use crate::dataset::{Float, MType, TsData};
use crate::error::Result;
use crate::tags::{Tag, TagSet};
use crate::traits::{Classifier, Transformer};
use crate::transformations::{Imputer, SummaryTransformer};

const CLASSIFIER: &str = "classifier";
const TRANSFORMERS: &str = "transformers";
const RESERVED: [&str; 2] = [CLASSIFIER, TRANSFORMERS];

/// A chain of transformers followed by a time series classifier
///
/// Class labels are passed to the transformers as a single column table.
pub struct ClassifierPipeline<F: Float> {
    transformers: TransformerSteps<F>,
    classifier: Box<dyn Classifier<F>>,
    tags: TagSet,
    transformers_: Option<Vec<Box<dyn Transformer<F>>>>,
    classifier_: Delegate<Box<dyn Classifier<F>>>,
    state: EstimatorState,
}

impl<F: Float> ClassifierPipeline<F> {
    pub fn new(
        transformers: Vec<Step<Box<dyn Transformer<F>>>>,
        classifier: Box<dyn Classifier<F>>,
    ) -> Result<Self> {
        Ok(Self::from_parts(
            NamedSteps::new(transformers, &RESERVED)?,
            classifier,
        ))
    }

    fn from_parts(
        transformers: TransformerSteps<F>,
        classifier: Box<dyn Classifier<F>>,
    ) -> Self {
        let tags = TagSet::collection_defaults()
            .with(Tag::XInnerType, vec![MType::Panel3D, MType::PanelList])
            .merged(&merge_collection_terminal(
                &chain_tags(&transformers),
                &classifier.get_tags(),
            ));

        ClassifierPipeline {
            transformers,
            classifier,
            tags,
            transformers_: None,
            classifier_: Delegate::new("ClassifierPipeline"),
            state: EstimatorState::default(),
        }
    }

    pub fn transformers(&self) -> &TransformerSteps<F> {
        &self.transformers
    }

    pub fn classifier(&self) -> &dyn Classifier<F> {
        &*self.classifier
    }

    pub fn prepend(&self, transformer: Box<dyn Transformer<F>>) -> Result<Self> {
        self.prepend_steps(&NamedSteps::new(vec![Step::Unnamed(transformer)], &RESERVED)?)
    }

    pub(crate) fn prepend_steps(&self, front: &TransformerSteps<F>) -> Result<Self> {
        Ok(Self::from_parts(
            NamedSteps::new(front.joined(&self.transformers), &RESERVED)?,
            self.classifier.clone(),
        ))
    }

    fn transformed(&self, x: &TsData<F>) -> Result<TsData<F>> {
        transform_chain(fitted_chain(&self.transformers_, self.type_name())?, x, None)
    }
}

impl<F: Float> Clone for ClassifierPipeline<F> {
    fn clone(&self) -> Self {
        let mut pipeline = Self::from_parts(self.transformers.clone(), self.classifier.clone());
        pipeline.state = self.state.unfitted();
        pipeline
    }
}

impl<F: Float> BaseObject<F> for ClassifierPipeline<F> {
    fn type_name(&self) -> &'static str {
        "ClassifierPipeline"
    }

    fn class_tags(&self) -> TagSet {
        self.tags.clone()
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, deep: bool) -> Params<F> {
        let mut params = Params::new()
            .with(
                CLASSIFIER,
                ParamValue::Estimator(AnyEstimator::Classifier(self.classifier.clone())),
            )
            .with(TRANSFORMERS, self.transformers.to_param());
        if deep {
            params.extend(self.transformers.get_params(true));
            params.extend(self.classifier.get_params(true).prefixed(CLASSIFIER));
        }
        params
    }

    fn set_params(&mut self, mut params: Params<F>) -> Result<()> {
        let mut classifier = match params.remove(CLASSIFIER) {
            Some(value) => value
                .into_estimator(&ParamPath::from(CLASSIFIER))?
                .into_classifier()?,
            None => self.classifier.clone(),
        };
        let mut transformers = steps_param(&mut params, &self.transformers, &RESERVED)?;

        let (classifier_params, rest) = split_component_params(params, CLASSIFIER, &classifier);
        if !classifier_params.is_empty() {
            classifier.set_params(classifier_params)?;
        }
        transformers.set_params(rest)?.check_leaves(&[])?;

        let state = self.state.unfitted();
        *self = Self::from_parts(transformers, classifier);
        self.state = state;
        Ok(())
    }
}

impl<F: Float> Classifier<F> for ClassifierPipeline<F> {
    fn fit_core(&mut self, x: &TsData<F>, y: &Array1<usize>) -> Result<()> {
        let targets = TsData::from_targets(&y.mapv(F::cast));
        let (fitted, xt) = fit_chain(&self.transformers, x, Some(&targets))?;
        self.classifier_.fit(&*self.classifier, &xt, y)?;
        self.transformers_ = Some(fitted);
        info!(
            estimator = "ClassifierPipeline",
            n_steps = self.transformers.len() + 1,
            "fitted composite"
        );
        Ok(())
    }

    fn predict_core(&self, x: &TsData<F>) -> Result<Array1<usize>> {
        self.classifier_.predict(&self.transformed(x)?)
    }

    fn predict_proba_core(&self, x: &TsData<F>) -> Result<Array2<F>> {
        self.classifier_.predict_proba(&self.transformed(x)?)
    }

    fn fitted_params_core(&self) -> Params<F> {
        let mut params = match &self.transformers_ {
            Some(fitted) => chain_fitted_params(&self.transformers, fitted),
            None => Params::new(),
        };
        if let Ok(p) = self.classifier_.fitted_params() {
            params.extend(p.prefixed(CLASSIFIER));
        }
        params
    }

    fn boxed_clone(&self) -> Box<dyn Classifier<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for ClassifierPipeline<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        let transformer = |t: Box<dyn Transformer<F>>| {
            ParamValue::List(vec![ParamValue::Estimator(AnyEstimator::Transformer(t))])
        };
        let classifier =
            |c: Box<dyn Classifier<F>>| ParamValue::Estimator(AnyEstimator::Classifier(c));
        vec![
            Params::new()
                .with(TRANSFORMERS, transformer(Box::new(Imputer::default())))
                .with(CLASSIFIER, classifier(Box::new(KNeighborsClassifier::default()))),
            Params::new()
                .with(
                    TRANSFORMERS,
                    transformer(Box::new(SummaryTransformer::default())),
                )
                .with(CLASSIFIER, classifier(Box::new(DummyClassifier::default()))),
        ]
    }

    fn from_params(params: Params<F>) -> Result<Self> {
        let mut pipeline = Self::new(vec![], Box::new(DummyClassifier::default()))?;
        pipeline.set_params(params)?;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transformations::CosineTransformer;
    use ndarray::{array, Array3};

    fn data() -> (TsData<f64>, Array1<usize>) {
        let x = Array3::from_shape_fn((6, 1, 4), |(i, _, t)| if i < 3 { t as f64 } else { 10. + t as f64 });
        (TsData::Panel3D(x), array![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn predictions_match_manual_chain() {
        let (x, y) = data();
        let mut pipe = ClassifierPipeline::new(
            vec![Step::Unnamed(Box::new(CosineTransformer::default()) as Box<dyn Transformer<f64>>)],
            Box::new(KNeighborsClassifier::default()),
        )
        .unwrap();
        let pred = pipe.fit_predict(&x, &y).unwrap();

        let xt = CosineTransformer::default().fit_transform(&x, None).unwrap();
        let expected = KNeighborsClassifier::default().fit_predict(&xt, &y).unwrap();

        assert_eq!(pred, expected);
        assert_eq!(pipe.predict_proba(&x).unwrap().ncols(), 2);
    }

    #[test]
    fn classifier_parameters_are_routed() {
        let mut pipe =
            ClassifierPipeline::new(vec![], Box::new(KNeighborsClassifier::<f64>::default()))
                .unwrap();
        pipe.set_params(Params::new().with(ParamPath::new(vec!["classifier", "n_neighbors"]), 3usize))
            .unwrap();

        assert_eq!(
            pipe.get_params(true)
                .get(ParamPath::new(vec!["classifier", "n_neighbors"])),
            Some(&ParamValue::Int(3))
        );
        assert!(matches!(
            pipe.set_params(Params::new().with(ParamPath::new(vec!["classifier", "bogus"]), 3usize)),
            Err(Error::UnknownParameter(_))
        ));
    }

    #[test]
    fn predict_before_fit_fails() {
        let (x, _) = data();
        let pipe =
            ClassifierPipeline::new(vec![], Box::new(DummyClassifier::<f64>::default())).unwrap();

        assert!(matches!(pipe.predict(&x), Err(Error::NotFitted(_))));
    }
}
