//! Dynamic parameter surface of estimators
//!
//! Constructor parameters are exposed through [`Params`], a map from typed [`ParamPath`]s to
//! [`ParamValue`]s. A path is a sequence of segments. Composites expose the parameters of
//! their components under paths starting with the component name, so a search over
//! hyperparameters can address every nested parameter without string concatenation.
use std::collections::BTreeMap;
use std::fmt;

use crate::dataset::Float;
use crate::error::{Error, Result};
use crate::traits::{Classifier, Forecaster, Regressor, Transformer};

use super::BaseObject;

/// Separator used when displaying or parsing a path
pub const SEPARATOR: &str = "__";

/// Typed path to a possibly nested parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamPath(Vec<String>);

impl ParamPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamPath(segments.into_iter().map(Into::into).collect())
    }

    /// Split a `step__param` style key into segments
    pub fn parse(key: &str) -> Self {
        ParamPath(key.split(SEPARATOR).map(|s| s.to_string()).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment, the name of the parameter or component addressed
    pub fn head(&self) -> &str {
        self.0.first().map(|s| s.as_str()).unwrap_or("")
    }

    /// Whether the path addresses a parameter of the object itself
    pub fn is_leaf(&self) -> bool {
        self.0.len() == 1
    }

    /// Path below the head, `None` for leaves
    pub fn tail(&self) -> Option<ParamPath> {
        if self.0.len() > 1 {
            Some(ParamPath(self.0[1..].to_vec()))
        } else {
            None
        }
    }

    pub fn prefixed(&self, head: &str) -> ParamPath {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(head.to_string());
        segments.extend(self.0.iter().cloned());
        ParamPath(segments)
    }

    /// Remove a leading segment, `None` if the path does not start with it
    pub fn strip_prefix(&self, head: &str) -> Option<ParamPath> {
        if self.head() == head {
            self.tail()
        } else {
            None
        }
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(SEPARATOR))
    }
}

impl From<&str> for ParamPath {
    fn from(segment: &str) -> Self {
        ParamPath(vec![segment.to_string()])
    }
}

impl From<String> for ParamPath {
    fn from(segment: String) -> Self {
        ParamPath(vec![segment])
    }
}

impl From<&[&str]> for ParamPath {
    fn from(segments: &[&str]) -> Self {
        ParamPath::new(segments.iter().copied())
    }
}

/// An estimator of any category, used as parameter value
pub enum AnyEstimator<F: Float> {
    Transformer(Box<dyn Transformer<F>>),
    Regressor(Box<dyn Regressor<F>>),
    Classifier(Box<dyn Classifier<F>>),
    Forecaster(Box<dyn Forecaster<F>>),
}

impl<F: Float> AnyEstimator<F> {
    pub fn type_name(&self) -> &'static str {
        match self {
            AnyEstimator::Transformer(e) => e.type_name(),
            AnyEstimator::Regressor(e) => e.type_name(),
            AnyEstimator::Classifier(e) => e.type_name(),
            AnyEstimator::Forecaster(e) => e.type_name(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AnyEstimator::Transformer(_) => "transformer",
            AnyEstimator::Regressor(_) => "regressor",
            AnyEstimator::Classifier(_) => "classifier",
            AnyEstimator::Forecaster(_) => "forecaster",
        }
    }

    pub fn get_params(&self, deep: bool) -> Params<F> {
        match self {
            AnyEstimator::Transformer(e) => e.get_params(deep),
            AnyEstimator::Regressor(e) => e.get_params(deep),
            AnyEstimator::Classifier(e) => e.get_params(deep),
            AnyEstimator::Forecaster(e) => e.get_params(deep),
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            AnyEstimator::Transformer(e) => e.is_fitted(),
            AnyEstimator::Regressor(e) => e.is_fitted(),
            AnyEstimator::Classifier(e) => e.is_fitted(),
            AnyEstimator::Forecaster(e) => e.is_fitted(),
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::Parameters(format!(
            "expected a {}, got the {} {}",
            expected,
            self.category(),
            self.type_name()
        ))
    }

    pub fn into_transformer(self) -> Result<Box<dyn Transformer<F>>> {
        match self {
            AnyEstimator::Transformer(e) => Ok(e),
            other => Err(other.mismatch("transformer")),
        }
    }

    pub fn into_regressor(self) -> Result<Box<dyn Regressor<F>>> {
        match self {
            AnyEstimator::Regressor(e) => Ok(e),
            other => Err(other.mismatch("regressor")),
        }
    }

    pub fn into_classifier(self) -> Result<Box<dyn Classifier<F>>> {
        match self {
            AnyEstimator::Classifier(e) => Ok(e),
            other => Err(other.mismatch("classifier")),
        }
    }

    pub fn into_forecaster(self) -> Result<Box<dyn Forecaster<F>>> {
        match self {
            AnyEstimator::Forecaster(e) => Ok(e),
            other => Err(other.mismatch("forecaster")),
        }
    }
}

impl<F: Float> Clone for AnyEstimator<F> {
    fn clone(&self) -> Self {
        match self {
            AnyEstimator::Transformer(e) => AnyEstimator::Transformer(e.boxed_clone()),
            AnyEstimator::Regressor(e) => AnyEstimator::Regressor(e.boxed_clone()),
            AnyEstimator::Classifier(e) => AnyEstimator::Classifier(e.boxed_clone()),
            AnyEstimator::Forecaster(e) => AnyEstimator::Forecaster(e.boxed_clone()),
        }
    }
}

/// Two estimators are equal if they are of the same type and configured alike
impl<F: Float> PartialEq for AnyEstimator<F> {
    fn eq(&self, other: &Self) -> bool {
        self.category() == other.category()
            && self.type_name() == other.type_name()
            && self.get_params(false) == other.get_params(false)
    }
}

impl<F: Float> fmt::Debug for AnyEstimator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name())?;
        for (i, (path, value)) in self.get_params(false).iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", path, value)?;
        }
        f.write_str(")")
    }
}

/// Value of a single parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue<F: Float> {
    None,
    Bool(bool),
    Int(i64),
    Float(F),
    Str(String),
    List(Vec<ParamValue<F>>),
    Estimator(AnyEstimator<F>),
}

impl<F: Float> ParamValue<F> {
    fn invalid(&self, path: &ParamPath, expected: &str) -> Error {
        Error::Parameters(format!(
            "`{}` expects {}, got {:?}",
            path, expected, self
        ))
    }

    pub fn as_bool(&self, path: &ParamPath) -> Result<bool> {
        match self {
            ParamValue::Bool(b) => Ok(*b),
            _ => Err(self.invalid(path, "a boolean")),
        }
    }

    pub fn as_usize(&self, path: &ParamPath) -> Result<usize> {
        match self {
            ParamValue::Int(x) if *x >= 0 => Ok(*x as usize),
            _ => Err(self.invalid(path, "a non-negative integer")),
        }
    }

    /// Floats and integers are both accepted
    pub fn as_float(&self, path: &ParamPath) -> Result<F> {
        match self {
            ParamValue::Float(x) => Ok(*x),
            ParamValue::Int(x) => Ok(F::cast(*x)),
            _ => Err(self.invalid(path, "a number")),
        }
    }

    pub fn as_str(&self, path: &ParamPath) -> Result<&str> {
        match self {
            ParamValue::Str(s) => Ok(s),
            _ => Err(self.invalid(path, "a string")),
        }
    }

    pub fn as_optional_str(&self, path: &ParamPath) -> Result<Option<&str>> {
        match self {
            ParamValue::None => Ok(None),
            ParamValue::Str(s) => Ok(Some(s)),
            _ => Err(self.invalid(path, "a string or none")),
        }
    }

    pub fn as_optional_usize(&self, path: &ParamPath) -> Result<Option<usize>> {
        match self {
            ParamValue::None => Ok(None),
            _ => self.as_usize(path).map(Some),
        }
    }

    pub fn into_estimator(self, path: &ParamPath) -> Result<AnyEstimator<F>> {
        match self {
            ParamValue::Estimator(e) => Ok(e),
            other => Err(other.invalid(path, "an estimator")),
        }
    }

    pub fn into_list(self, path: &ParamPath) -> Result<Vec<ParamValue<F>>> {
        match self {
            ParamValue::List(l) => Ok(l),
            other => Err(other.invalid(path, "a list")),
        }
    }
}

impl<F: Float> From<bool> for ParamValue<F> {
    fn from(x: bool) -> Self {
        ParamValue::Bool(x)
    }
}

impl<F: Float> From<i64> for ParamValue<F> {
    fn from(x: i64) -> Self {
        ParamValue::Int(x)
    }
}

impl<F: Float> From<usize> for ParamValue<F> {
    fn from(x: usize) -> Self {
        ParamValue::Int(x as i64)
    }
}

impl<F: Float> From<&str> for ParamValue<F> {
    fn from(x: &str) -> Self {
        ParamValue::Str(x.to_string())
    }
}

impl<F: Float> From<String> for ParamValue<F> {
    fn from(x: String) -> Self {
        ParamValue::Str(x)
    }
}

impl<F: Float, T: Into<ParamValue<F>>> From<Option<T>> for ParamValue<F> {
    fn from(x: Option<T>) -> Self {
        x.map(Into::into).unwrap_or(ParamValue::None)
    }
}

impl<F: Float> From<AnyEstimator<F>> for ParamValue<F> {
    fn from(x: AnyEstimator<F>) -> Self {
        ParamValue::Estimator(x)
    }
}

impl<F: Float> From<Vec<ParamValue<F>>> for ParamValue<F> {
    fn from(x: Vec<ParamValue<F>>) -> Self {
        ParamValue::List(x)
    }
}

/// Ordered collection of parameter assignments
#[derive(Debug, Clone, PartialEq)]
pub struct Params<F: Float>(BTreeMap<ParamPath, ParamValue<F>>);

impl<F: Float> Default for Params<F> {
    fn default() -> Self {
        Params(BTreeMap::new())
    }
}

impl<F: Float> Params<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert
    pub fn with<P: Into<ParamPath>, V: Into<ParamValue<F>>>(mut self, path: P, value: V) -> Self {
        self.insert(path, value);
        self
    }

    pub fn insert<P: Into<ParamPath>, V: Into<ParamValue<F>>>(&mut self, path: P, value: V) {
        self.0.insert(path.into(), value.into());
    }

    /// Insert a float valued parameter
    pub fn with_float<P: Into<ParamPath>>(self, path: P, value: F) -> Self {
        let mut out = self;
        out.0.insert(path.into(), ParamValue::Float(value));
        out
    }

    pub fn get<P: Into<ParamPath>>(&self, path: P) -> Option<&ParamValue<F>> {
        self.0.get(&path.into())
    }

    pub fn remove<P: Into<ParamPath>>(&mut self, path: P) -> Option<ParamValue<F>> {
        self.0.remove(&path.into())
    }

    pub fn contains<P: Into<ParamPath>>(&self, path: P) -> bool {
        self.0.contains_key(&path.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParamPath> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamPath, &ParamValue<F>)> {
        self.0.iter()
    }

    /// Add every entry of `other`, overwriting existing ones
    pub fn extend(&mut self, other: Params<F>) {
        self.0.extend(other.0);
    }

    /// All paths with `head` prepended
    pub fn prefixed(self, head: &str) -> Params<F> {
        Params(
            self.0
                .into_iter()
                .map(|(path, value)| (path.prefixed(head), value))
                .collect(),
        )
    }

    /// Leaf entries addressing the object itself
    pub fn leaves(&self) -> impl Iterator<Item = (&str, &ParamValue<F>)> {
        self.0
            .iter()
            .filter(|(path, _)| path.is_leaf())
            .map(|(path, value)| (path.head(), value))
    }

    /// Fail on the first entry whose head is not in `known`
    ///
    /// Only the head is checked, nested paths are validated by the component they are routed
    /// to.
    pub fn check_leaves(&self, known: &[&str]) -> Result<()> {
        match self.0.keys().find(|p| !known.contains(&p.head())) {
            Some(path) => Err(Error::UnknownParameter(path.to_string())),
            None => Ok(()),
        }
    }
}

impl<F: Float> IntoIterator for Params<F> {
    type Item = (ParamPath, ParamValue<F>);
    type IntoIter = std::collections::btree_map::IntoIter<ParamPath, ParamValue<F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<F: Float> std::iter::FromIterator<(ParamPath, ParamValue<F>)> for Params<F> {
    fn from_iter<I: IntoIterator<Item = (ParamPath, ParamValue<F>)>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}

/// Filter parameters down to those addressing `keys`
///
/// With a `prefix` only paths starting with it are considered and the prefix is removed from
/// the returned paths. A path is kept if its (remaining) head is one of `keys`.
pub fn subset_dict_keys<F: Float>(
    params: &Params<F>,
    keys: &[&str],
    prefix: Option<&str>,
) -> Params<F> {
    params
        .iter()
        .filter_map(|(path, value)| {
            let path = match prefix {
                Some(prefix) => path.strip_prefix(prefix)?,
                None => path.clone(),
            };
            if keys.contains(&path.head()) {
                Some((path, value.clone()))
            } else {
                None
            }
        })
        .collect()
}

/// Parameter sets used to build instances for automated testing
pub trait TestParams<F: Float>: Sized {
    /// Constructor parameter sets which build valid, exercisable instances
    ///
    /// Every estimator supports the `"default"` set. Unknown set names fall back to it.
    fn get_test_params(parameter_set: &str) -> Vec<Params<F>>;

    /// Build an instance from a parameter set
    fn from_params(params: Params<F>) -> Result<Self>;

    fn create_test_instances(parameter_set: &str) -> Result<Vec<Self>> {
        Self::get_test_params(parameter_set)
            .into_iter()
            .map(Self::from_params)
            .collect()
    }
}

/// Build an instance from `Default` and apply the parameters
pub fn default_with_params<F, E>(params: Params<F>) -> Result<E>
where
    F: Float,
    E: BaseObject<F> + Default,
{
    let mut estimator = E::default();
    estimator.set_params(params)?;
    Ok(estimator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_display_with_separator() {
        let path = ParamPath::new(vec!["regressor", "n_neighbors"]);

        assert_eq!(path.to_string(), "regressor__n_neighbors");
        assert_eq!(ParamPath::parse("regressor__n_neighbors"), path);
        assert_eq!(path.head(), "regressor");
        assert_eq!(path.tail(), Some(ParamPath::from("n_neighbors")));
        assert_eq!(path.strip_prefix("transformers"), None);
    }

    #[test]
    fn step_names_may_contain_the_separator() {
        let path = ParamPath::new(vec!["my__step", "k"]);

        assert_eq!(path.head(), "my__step");
        assert_ne!(ParamPath::parse(&path.to_string()), path);
    }

    #[test]
    fn subset_routes_by_head() {
        let params = Params::<f64>::new()
            .with(ParamPath::new(vec!["regressor", "k"]), 5usize)
            .with(ParamPath::new(vec!["log", "offset"]), 1usize)
            .with("regressor", ParamValue::None);

        let sub = subset_dict_keys(&params, &["k"], Some("regressor"));
        assert_eq!(sub, Params::new().with("k", 5usize));

        let sub = subset_dict_keys(&params, &["log"], None);
        assert_eq!(sub.len(), 1);
        assert!(sub.contains(ParamPath::new(vec!["log", "offset"])));
    }

    #[test]
    fn values_convert_with_type_checks() {
        let path = ParamPath::from("k");

        assert_eq!(ParamValue::<f64>::Int(3).as_usize(&path).unwrap(), 3);
        assert!(ParamValue::<f64>::Int(-3).as_usize(&path).is_err());
        assert_eq!(ParamValue::<f64>::Int(2).as_float(&path).unwrap(), 2.);
        assert!(ParamValue::<f64>::Str("a".into()).as_bool(&path).is_err());
        assert_eq!(
            ParamValue::<f64>::from(None::<usize>),
            ParamValue::None
        );
    }

    #[test]
    fn unknown_leaves_are_reported() {
        let params = Params::<f64>::new().with("strategy", "mean").with("nope", 1usize);

        assert!(matches!(
            params.check_leaves(&["strategy"]),
            Err(Error::UnknownParameter(name)) if name == "nope"
        ));
    }
}
