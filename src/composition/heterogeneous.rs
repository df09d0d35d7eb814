//! Ordered collections of named components
//!
//! Composites store their components as [`NamedSteps`]. Steps are either all named by the
//! user or all unnamed, in which case names are generated from the component type names and
//! made unique. The parameters of each step are exposed under paths starting with the step
//! name.
use std::collections::HashMap;

use crate::base::{subset_dict_keys, AnyEstimator, BaseObject, ParamPath, ParamValue, Params};
use crate::dataset::Float;
use crate::error::{Error, Result};
use crate::traits::{Classifier, Forecaster, Regressor, Transformer};

/// A component passed to a composite, with or without an explicit name
#[derive(Clone)]
pub enum Step<E> {
    Named(String, E),
    Unnamed(E),
}

impl<E> Step<E> {
    pub fn named<S: Into<String>>(name: S, estimator: E) -> Self {
        Step::Named(name.into(), estimator)
    }

    pub fn unnamed(estimator: E) -> Self {
        Step::Unnamed(estimator)
    }

    pub fn estimator(&self) -> &E {
        match self {
            Step::Named(_, e) | Step::Unnamed(e) => e,
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Step::Named(..))
    }
}

/// Boxed estimators which can be stored as steps of a composite
pub trait StepEstimator: Clone {
    type Elem: Float;

    fn as_base(&self) -> &dyn BaseObject<Self::Elem>;

    fn as_base_mut(&mut self) -> &mut dyn BaseObject<Self::Elem>;

    fn into_any(self) -> AnyEstimator<Self::Elem>;

    fn from_any(any: AnyEstimator<Self::Elem>) -> Result<Self>;
}

macro_rules! impl_step_estimator {
    ($category:ident, $variant:ident, $into:ident) => {
        impl<F: Float> StepEstimator for Box<dyn $category<F>> {
            type Elem = F;

            fn as_base(&self) -> &dyn BaseObject<F> {
                self
            }

            fn as_base_mut(&mut self) -> &mut dyn BaseObject<F> {
                self
            }

            fn into_any(self) -> AnyEstimator<F> {
                AnyEstimator::$variant(self)
            }

            fn from_any(any: AnyEstimator<F>) -> Result<Self> {
                any.$into()
            }
        }
    };
}

impl_step_estimator!(Transformer, Transformer, into_transformer);
impl_step_estimator!(Regressor, Regressor, into_regressor);
impl_step_estimator!(Classifier, Classifier, into_classifier);
impl_step_estimator!(Forecaster, Forecaster, into_forecaster);

/// Make a list of strings unique by suffixing duplicates with a running count
///
/// Every occurrence of a duplicated string gets `_<n>` appended, `n` counting occurrences in
/// order. The procedure is repeated until no duplicates remain, so `["A", "A", "A_1"]` becomes
/// `["A_1_1", "A_2", "A_1_2"]`.
pub fn make_strings_unique(strings: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for s in &strings {
        *counts.entry(s.as_str()).or_insert(0) += 1;
    }
    if counts.values().all(|c| *c == 1) {
        return strings;
    }

    let mut running: HashMap<&str, usize> = HashMap::new();
    let unique = strings
        .iter()
        .map(|s| {
            if counts[s.as_str()] > 1 {
                let n = running.entry(s.as_str()).or_insert(0);
                *n += 1;
                format!("{}_{}", s, n)
            } else {
                s.clone()
            }
        })
        .collect();

    make_strings_unique(unique)
}

/// Split off the parameters addressing the component stored under the parameter `name`
///
/// Returns the component's parameters with `name` stripped and everything else.
pub(crate) fn split_component_params<F: Float>(
    params: Params<F>,
    name: &str,
    component: &dyn BaseObject<F>,
) -> (Params<F>, Params<F>) {
    let keys: Vec<String> = component
        .get_params(false)
        .keys()
        .map(|p| p.head().to_string())
        .collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

    let routed = subset_dict_keys(&params, &keys, Some(name));
    let rest = params
        .into_iter()
        .filter(|(path, _)| match path.strip_prefix(name) {
            Some(tail) => !keys.contains(&tail.head()),
            None => true,
        })
        .collect();

    (routed, rest)
}

/// Named components of a composite, in order
#[derive(Clone)]
pub struct NamedSteps<E> {
    steps: Vec<(String, E)>,
    auto_named: bool,
}

impl<E: StepEstimator> NamedSteps<E> {
    /// Create the named steps of a composite
    ///
    /// Names must be unique, non-empty and must not clash with `reserved`, the parameter names
    /// of the composite itself.
    pub fn new(steps: Vec<Step<E>>, reserved: &[&str]) -> Result<Self> {
        let n_named = steps.iter().filter(|s| s.is_named()).count();
        if n_named != 0 && n_named != steps.len() {
            return Err(Error::Parameters(
                "steps must either all be named or all be unnamed".into(),
            ));
        }
        let auto_named = n_named == 0;

        let (names, estimators): (Vec<String>, Vec<E>) = steps
            .into_iter()
            .map(|s| match s {
                Step::Named(name, e) => (name, e),
                Step::Unnamed(e) => (e.as_base().type_name().to_string(), e),
            })
            .unzip();
        let names = if auto_named {
            make_strings_unique(names)
        } else {
            names
        };

        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::Parameters("step names must not be empty".into()));
            }
            if names[..i].contains(name) {
                return Err(Error::Parameters(format!(
                    "step names must be unique, `{}` is used twice",
                    name
                )));
            }
            if reserved.contains(&name.as_str()) {
                return Err(Error::Parameters(format!(
                    "step name `{}` clashes with a parameter of the composite",
                    name
                )));
            }
        }

        Ok(NamedSteps {
            steps: names.into_iter().zip(estimators).collect(),
            auto_named,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_auto_named(&self) -> bool {
        self.auto_named
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &E)> {
        self.steps.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn estimators(&self) -> impl Iterator<Item = &E> {
        self.steps.iter().map(|(_, e)| e)
    }

    pub fn estimators_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.steps.iter_mut().map(|(_, e)| e)
    }

    pub fn get(&self, name: &str) -> Option<&E> {
        self.steps.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|(n, _)| n == name)
    }

    /// The steps as they were passed in, generated names are dropped again
    pub fn to_steps(&self) -> Vec<Step<E>> {
        self.steps
            .iter()
            .map(|(n, e)| {
                if self.auto_named {
                    Step::Unnamed(e.clone())
                } else {
                    Step::Named(n.clone(), e.clone())
                }
            })
            .collect()
    }

    /// Steps of `self` followed by the steps of `other`
    ///
    /// If both sides were auto-named the result is unnamed again, so names are regenerated
    /// for the joined chain. Otherwise the current names are kept and made unique.
    pub fn joined(&self, other: &NamedSteps<E>) -> Vec<Step<E>> {
        if self.auto_named && other.auto_named {
            return self
                .estimators()
                .chain(other.estimators())
                .map(|e| Step::Unnamed(e.clone()))
                .collect();
        }

        let names = self
            .names()
            .into_iter()
            .chain(other.names())
            .map(str::to_string)
            .collect();
        make_strings_unique(names)
            .into_iter()
            .zip(self.estimators().chain(other.estimators()))
            .map(|(name, e)| Step::Named(name, e.clone()))
            .collect()
    }

    /// Steps as a single parameter value
    ///
    /// Unnamed steps become a list of estimators, named steps a list of `[name, estimator]`
    /// pairs.
    pub fn to_param(&self) -> ParamValue<E::Elem> {
        ParamValue::List(
            self.steps
                .iter()
                .map(|(n, e)| {
                    let estimator = ParamValue::Estimator(e.clone().into_any());
                    if self.auto_named {
                        estimator
                    } else {
                        ParamValue::List(vec![ParamValue::Str(n.clone()), estimator])
                    }
                })
                .collect(),
        )
    }

    /// Parse a parameter value produced by [`NamedSteps::to_param`]
    pub fn steps_from_param(value: ParamValue<E::Elem>, path: &ParamPath) -> Result<Vec<Step<E>>> {
        value
            .into_list(path)?
            .into_iter()
            .map(|item| match item {
                ParamValue::List(pair) if pair.len() == 2 => {
                    let mut pair = pair.into_iter();
                    let name = match pair.next() {
                        Some(ParamValue::Str(name)) => name,
                        _ => {
                            return Err(Error::Parameters(format!(
                                "`{}` expects [name, estimator] pairs",
                                path
                            )))
                        }
                    };
                    let estimator = pair
                        .next()
                        .ok_or_else(|| Error::Parameters(format!("`{}` is missing an estimator", path)))?
                        .into_estimator(path)?;
                    Ok(Step::Named(name, E::from_any(estimator)?))
                }
                other => Ok(Step::Unnamed(E::from_any(other.into_estimator(path)?)?)),
            })
            .collect()
    }

    /// Steps under their names and, if `deep`, their parameters under `[name, ...]`
    pub fn get_params(&self, deep: bool) -> Params<E::Elem> {
        let mut params = Params::new();
        for (name, estimator) in &self.steps {
            params.insert(
                name.as_str(),
                ParamValue::Estimator(estimator.clone().into_any()),
            );
            if deep {
                params.extend(estimator.as_base().get_params(true).prefixed(name));
            }
        }
        params
    }

    /// Route the parameters addressing steps, returning all others
    ///
    /// A leaf path equal to a step name replaces that step, longer paths are passed on to the
    /// step's own `set_params` with the name stripped.
    pub fn set_params(&mut self, params: Params<E::Elem>) -> Result<Params<E::Elem>> {
        let mut rest = Params::new();
        let mut nested: Vec<Params<E::Elem>> = vec![Params::new(); self.steps.len()];

        for (path, value) in params {
            match self.position(path.head()) {
                Some(pos) if path.is_leaf() => {
                    let estimator = E::from_any(value.into_estimator(&path)?)?;
                    self.steps[pos].1 = estimator;
                }
                Some(pos) => {
                    if let Some(tail) = path.tail() {
                        nested[pos].insert(tail, value);
                    }
                }
                None => rest.insert(path, value),
            }
        }

        for ((_, estimator), params) in self.steps.iter_mut().zip(nested) {
            if !params.is_empty() {
                estimator.as_base_mut().set_params(params)?;
            }
        }

        Ok(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unique_strings_are_kept() {
        assert_eq!(make_strings_unique(strings(&["a", "b"])), strings(&["a", "b"]));
    }

    #[test]
    fn duplicates_get_running_counts() {
        assert_eq!(
            make_strings_unique(strings(&["A", "B", "A"])),
            strings(&["A_1", "B", "A_2"])
        );
        assert_eq!(
            make_strings_unique(strings(&["A", "A", "A_1"])),
            strings(&["A_1_1", "A_2", "A_1_2"])
        );
    }
}
