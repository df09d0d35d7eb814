//! Base estimator protocol
//!
//! Every estimator, whatever its category, implements [`BaseObject`]. It provides the tag
//! lookups, the fitted state machine and the dynamic parameter surface. The category specific
//! lifecycles (`fit`, `predict`, `transform`, ...) live in [`crate::traits`] and build on it.
use crate::dataset::{Float, ForecastingHorizon, MType};
use crate::error::{Error, Result};
use crate::tags::{Capabilities, Tag, TagSet, TagValue};

mod params;

pub use params::{
    default_with_params, subset_dict_keys, AnyEstimator, ParamPath, ParamValue, Params,
    TestParams, SEPARATOR,
};

/// Mutable state every estimator carries next to its constructor parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimatorState {
    tags: TagSet,
    fitted: bool,
    horizon: Option<ForecastingHorizon>,
    input_mtype: Option<MType>,
}

impl EstimatorState {
    /// Fresh, unfitted state with instance tag overrides
    pub fn with_tags(tags: TagSet) -> Self {
        EstimatorState {
            tags,
            ..Default::default()
        }
    }

    /// Copy of the state a clone starts with: same tag overrides, nothing fitted
    pub fn unfitted(&self) -> Self {
        EstimatorState::with_tags(self.tags.clone())
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn set_fitted(&mut self, fitted: bool) {
        self.fitted = fitted;
    }

    /// Forget everything learned in `fit`, tag overrides are kept
    pub fn reset(&mut self) {
        self.fitted = false;
        self.horizon = None;
        self.input_mtype = None;
    }

    pub fn horizon(&self) -> Option<&ForecastingHorizon> {
        self.horizon.as_ref()
    }

    pub fn set_horizon(&mut self, horizon: Option<ForecastingHorizon>) {
        self.horizon = horizon;
    }

    /// Representation of the data seen in `fit`
    pub fn input_mtype(&self) -> Option<MType> {
        self.input_mtype
    }

    pub fn set_input_mtype(&mut self, mtype: MType) {
        self.input_mtype = Some(mtype);
    }
}

/// Behaviour shared by all estimators
pub trait BaseObject<F: Float> {
    /// Name of the estimator class, used for error messages and automatic step names
    fn type_name(&self) -> &'static str;

    /// Class level tags, already layered on top of the category defaults
    fn class_tags(&self) -> TagSet;

    fn state(&self) -> &EstimatorState;

    fn state_mut(&mut self) -> &mut EstimatorState;

    /// Constructor parameters, with the parameters of components if `deep` is set
    fn get_params(&self, deep: bool) -> Params<F>;

    /// Set constructor parameters
    ///
    /// Invalid values are rejected before anything is changed. A successful call resets the
    /// estimator to the unfitted state.
    fn set_params(&mut self, params: Params<F>) -> Result<()>;

    fn is_fitted(&self) -> bool {
        self.state().is_fitted()
    }

    fn check_is_fitted(&self) -> Result<()> {
        if self.is_fitted() {
            Ok(())
        } else {
            Err(Error::NotFitted(self.type_name().to_string()))
        }
    }

    /// Registry defaults overridden by the class tags
    fn get_class_tags(&self) -> TagSet {
        TagSet::defaults().merged(&self.class_tags())
    }

    fn get_class_tag(&self, tag: Tag) -> TagValue {
        self.get_class_tags()
            .get(tag)
            .cloned()
            .unwrap_or_else(|| tag.default_value())
    }

    /// Class tags overridden by the instance tags
    fn get_tags(&self) -> TagSet {
        self.get_class_tags().merged(self.state().tags())
    }

    fn get_tag(&self, tag: Tag) -> TagValue {
        self.get_tags()
            .get(tag)
            .cloned()
            .unwrap_or_else(|| tag.default_value())
    }

    fn get_flag(&self, tag: Tag) -> bool {
        self.get_tags().flag(tag)
    }

    fn get_mtypes(&self, tag: Tag) -> Vec<MType> {
        self.get_tags().mtypes(tag)
    }

    /// Look up a tag by its flat key
    ///
    /// Unknown keys return `default`. If there is no default and `raise_on_missing` is set the
    /// lookup fails with [`Error::UnknownTag`].
    fn get_tag_by_name(
        &self,
        key: &str,
        default: Option<TagValue>,
        raise_on_missing: bool,
    ) -> Result<Option<TagValue>> {
        match key.parse::<Tag>() {
            Ok(tag) => Ok(Some(self.get_tag(tag))),
            Err(err) => match default {
                Some(value) => Ok(Some(value)),
                None if raise_on_missing => Err(err),
                None => Ok(None),
            },
        }
    }

    /// Write instance level overrides
    fn set_tags(&mut self, tags: TagSet) -> Result<()> {
        for (tag, value) in tags.iter() {
            self.state_mut().tags_mut().insert(*tag, value.clone())?;
        }
        Ok(())
    }

    /// Adopt tags of another estimator, all of them if `tags` is `None`
    fn clone_tags<E: BaseObject<F> + ?Sized>(&mut self, other: &E, tags: Option<&[Tag]>)
    where
        Self: Sized,
    {
        let source = other.get_tags();
        let selected = match tags {
            Some(tags) => tags.to_vec(),
            None => source.iter().map(|(t, _)| *t).collect(),
        };
        for tag in selected {
            if let Some(value) = source.get(tag) {
                self.state_mut().tags_mut().insert(tag, value.clone()).ok();
            }
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::from_tags(&self.get_tags())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        state: EstimatorState,
        k: usize,
    }

    impl BaseObject<f64> for Dummy {
        fn type_name(&self) -> &'static str {
            "Dummy"
        }

        fn class_tags(&self) -> TagSet {
            TagSet::collection_defaults().with(Tag::Multivariate, true)
        }

        fn state(&self) -> &EstimatorState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut EstimatorState {
            &mut self.state
        }

        fn get_params(&self, _deep: bool) -> Params<f64> {
            Params::new().with("k", self.k)
        }

        fn set_params(&mut self, params: Params<f64>) -> Result<()> {
            params.check_leaves(&["k"])?;
            if let Some(k) = params.get("k") {
                self.k = k.as_usize(&ParamPath::from("k"))?;
            }
            self.state.reset();
            Ok(())
        }
    }

    fn dummy() -> Dummy {
        Dummy {
            state: EstimatorState::default(),
            k: 1,
        }
    }

    #[test]
    fn instance_tags_override_class_tags() {
        let mut est = dummy();
        assert!(est.get_flag(Tag::Multivariate));
        assert!(!est.get_flag(Tag::MissingValues));

        est.set_tags(TagSet::new().with(Tag::Multivariate, false))
            .unwrap();
        assert!(!est.get_flag(Tag::Multivariate));
        assert!(est.get_class_tag(Tag::Multivariate).as_bool().unwrap());
        assert_eq!(est.get_mtypes(Tag::XInnerType), vec![MType::Panel3D]);
    }

    #[test]
    fn set_tags_is_idempotent() {
        let mut est = dummy();
        let tags = TagSet::new().with(Tag::MissingValues, true);

        est.set_tags(tags.clone()).unwrap();
        let first = est.get_tags();
        est.set_tags(tags).unwrap();

        assert_eq!(est.get_tags(), first);
    }

    #[test]
    fn tag_lookup_by_name() {
        let est = dummy();

        assert_eq!(
            est.get_tag_by_name("capability:multivariate", None, true)
                .unwrap(),
            Some(TagValue::Bool(true))
        );
        assert_eq!(
            est.get_tag_by_name("unknown", Some(TagValue::Bool(false)), true)
                .unwrap(),
            Some(TagValue::Bool(false))
        );
        assert_eq!(est.get_tag_by_name("unknown", None, false).unwrap(), None);
        assert!(matches!(
            est.get_tag_by_name("unknown", None, true),
            Err(Error::UnknownTag(_))
        ));
    }

    #[test]
    fn clone_tags_copies_a_subset() {
        let mut source = dummy();
        source
            .set_tags(TagSet::new().with(Tag::MissingValues, true))
            .unwrap();
        let mut target = dummy();
        target.set_tags(TagSet::new().with(Tag::Multivariate, false)).unwrap();

        target.clone_tags(&source, Some(&[Tag::MissingValues]));
        assert!(target.get_flag(Tag::MissingValues));
        assert!(!target.get_flag(Tag::Multivariate));

        target.clone_tags(&source, None);
        assert!(target.get_flag(Tag::Multivariate));
    }

    #[test]
    fn not_fitted_until_marked() {
        let mut est = dummy();
        assert!(matches!(est.check_is_fitted(), Err(Error::NotFitted(_))));

        est.state_mut().set_fitted(true);
        assert!(est.check_is_fitted().is_ok());
        est.set_params(Params::new().with("k", 3usize)).unwrap();
        assert!(!est.is_fitted());
        assert!(est.set_params(Params::new().with("j", 3usize)).is_err());
    }
}
