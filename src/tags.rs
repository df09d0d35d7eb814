//! Capability and configuration tags
//!
//! Every estimator carries a set of tags which describe what data it can handle and how its
//! core logic wants to receive that data. The set of recognized tags is closed: each [`Tag`]
//! has a flat string key, a value domain and a registry default. Tag sets are layered, the
//! registry defaults are overridden by the defaults of an estimator category, which are
//! overridden by the tags of the estimator class, which are finally overridden by the tags an
//! instance sets on itself.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::dataset::{MType, Scitype};
use crate::error::{Error, Result};

/// Recognized tag keys
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Multivariate,
    MissingValues,
    RemovesMissingValues,
    UnequalLength,
    RemovesUnequalLength,
    Multithreading,
    Contractable,
    TrainEstimate,
    InverseTransform,
    SkipInverseTransform,
    UnivariateOnly,
    FitIsEmpty,
    Instancewise,
    XInnerType,
    YInnerType,
    OutputDataType,
    IgnoresExogeneousX,
    RequiresFhInFit,
}

/// Allowed values of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDomain {
    Bool,
    OneOf(&'static [&'static str]),
    MTypes,
}

/// Value of a tag
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Bool(bool),
    Str(String),
    MTypes(Vec<MType>),
}

/// Output kinds of a transformer
pub const OUTPUT_SERIES: &str = "Series";
pub const OUTPUT_PRIMITIVES: &str = "Primitives";

impl Tag {
    pub const ALL: [Tag; 18] = [
        Tag::Multivariate,
        Tag::MissingValues,
        Tag::RemovesMissingValues,
        Tag::UnequalLength,
        Tag::RemovesUnequalLength,
        Tag::Multithreading,
        Tag::Contractable,
        Tag::TrainEstimate,
        Tag::InverseTransform,
        Tag::SkipInverseTransform,
        Tag::UnivariateOnly,
        Tag::FitIsEmpty,
        Tag::Instancewise,
        Tag::XInnerType,
        Tag::YInnerType,
        Tag::OutputDataType,
        Tag::IgnoresExogeneousX,
        Tag::RequiresFhInFit,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Tag::Multivariate => "capability:multivariate",
            Tag::MissingValues => "capability:missing_values",
            Tag::RemovesMissingValues => "capability:missing_values:removes",
            Tag::UnequalLength => "capability:unequal_length",
            Tag::RemovesUnequalLength => "capability:unequal_length:removes",
            Tag::Multithreading => "capability:multithreading",
            Tag::Contractable => "capability:contractable",
            Tag::TrainEstimate => "capability:train_estimate",
            Tag::InverseTransform => "capability:inverse_transform",
            Tag::SkipInverseTransform => "skip-inverse-transform",
            Tag::UnivariateOnly => "univariate-only",
            Tag::FitIsEmpty => "fit_is_empty",
            Tag::Instancewise => "instancewise",
            Tag::XInnerType => "X_inner_type",
            Tag::YInnerType => "y_inner_type",
            Tag::OutputDataType => "output_data_type",
            Tag::IgnoresExogeneousX => "ignores-exogeneous-X",
            Tag::RequiresFhInFit => "requires-fh-in-fit",
        }
    }

    pub fn domain(&self) -> TagDomain {
        match self {
            Tag::XInnerType | Tag::YInnerType => TagDomain::MTypes,
            Tag::OutputDataType => TagDomain::OneOf(&[OUTPUT_SERIES, OUTPUT_PRIMITIVES]),
            _ => TagDomain::Bool,
        }
    }

    /// Registry wide default of the tag
    pub fn default_value(&self) -> TagValue {
        match self {
            Tag::XInnerType | Tag::YInnerType => TagValue::MTypes(MType::ALL.to_vec()),
            Tag::OutputDataType => TagValue::Str(OUTPUT_SERIES.to_string()),
            Tag::Instancewise | Tag::IgnoresExogeneousX => TagValue::Bool(true),
            _ => TagValue::Bool(false),
        }
    }

    /// Check that a value lies in the domain of this tag
    pub fn validate(&self, value: &TagValue) -> Result<()> {
        let valid = match (self.domain(), value) {
            (TagDomain::Bool, TagValue::Bool(_)) => true,
            (TagDomain::OneOf(allowed), TagValue::Str(s)) => allowed.contains(&s.as_str()),
            (TagDomain::MTypes, TagValue::MTypes(m)) => !m.is_empty(),
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::InvalidTagValue {
                tag: self.key().to_string(),
                expected: self.domain().to_string(),
            })
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tag::ALL
            .iter()
            .copied()
            .find(|t| t.key() == s)
            .ok_or_else(|| Error::UnknownTag(s.to_string()))
    }
}

impl fmt::Display for TagDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagDomain::Bool => f.write_str("a boolean"),
            TagDomain::OneOf(allowed) => write!(f, "one of {:?}", allowed),
            TagDomain::MTypes => f.write_str("a non-empty list of mtypes"),
        }
    }
}

impl TagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mtypes(&self) -> Option<&[MType]> {
        match self {
            TagValue::MTypes(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        TagValue::Bool(b)
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Str(s.to_string())
    }
}

impl From<Vec<MType>> for TagValue {
    fn from(m: Vec<MType>) -> Self {
        TagValue::MTypes(m)
    }
}

/// A validated mapping from tags to values
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeMap<Tag, TagValue>);

impl TagSet {
    pub fn new() -> Self {
        TagSet(BTreeMap::new())
    }

    /// Every tag set to its registry default
    pub fn defaults() -> Self {
        TagSet(Tag::ALL.iter().map(|t| (*t, t.default_value())).collect())
    }

    /// Defaults shared by every transformer
    pub fn transformer_defaults() -> Self {
        TagSet::new().with(Tag::FitIsEmpty, true)
    }

    /// Defaults shared by every time series regressor and classifier
    pub fn collection_defaults() -> Self {
        TagSet::new().with(Tag::XInnerType, vec![MType::Panel3D])
    }

    /// Defaults shared by every forecaster
    pub fn forecaster_defaults() -> Self {
        TagSet::new()
            .with(Tag::YInnerType, vec![MType::SeriesFrame])
            .with(Tag::XInnerType, vec![MType::SeriesFrame])
    }

    /// Insert a value after checking it against the tag domain
    pub fn insert<V: Into<TagValue>>(&mut self, tag: Tag, value: V) -> Result<()> {
        let value = value.into();
        tag.validate(&value)?;
        self.0.insert(tag, value);

        Ok(())
    }

    /// Builder style insert for statically known, valid values
    ///
    /// # Panics
    ///
    /// If the value lies outside the domain of the tag.
    pub fn with<V: Into<TagValue>>(mut self, tag: Tag, value: V) -> Self {
        let value = value.into();
        if let Err(err) = tag.validate(&value) {
            panic!("{}", err);
        }
        self.0.insert(tag, value);
        self
    }

    pub fn get(&self, tag: Tag) -> Option<&TagValue> {
        self.0.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains_key(&tag)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<TagValue> {
        self.0.remove(&tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &TagValue)> {
        self.0.iter()
    }

    /// Overlay `other` on top of this set, values in `other` win
    pub fn merged(&self, other: &TagSet) -> TagSet {
        let mut out = self.clone();
        for (tag, value) in other.iter() {
            out.0.insert(*tag, value.clone());
        }
        out
    }

    /// Boolean value of a tag, falling back to the registry default
    pub fn flag(&self, tag: Tag) -> bool {
        self.get(tag)
            .and_then(TagValue::as_bool)
            .or_else(|| tag.default_value().as_bool())
            .unwrap_or(false)
    }

    /// Mtype list of a tag, falling back to the registry default
    pub fn mtypes(&self, tag: Tag) -> Vec<MType> {
        self.get(tag)
            .and_then(TagValue::as_mtypes)
            .map(|m| m.to_vec())
            .unwrap_or_else(|| MType::ALL.to_vec())
    }

    /// Scitypes covered by the mtypes of a tag, in first appearance order
    pub fn scitypes(&self, tag: Tag) -> Vec<Scitype> {
        let mut out = Vec::new();
        for m in self.mtypes(tag) {
            if !out.contains(&m.scitype()) {
                out.push(m.scitype());
            }
        }
        out
    }
}

impl std::iter::FromIterator<(Tag, TagValue)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (Tag, TagValue)>>(iter: I) -> Self {
        TagSet(iter.into_iter().collect())
    }
}

/// Typed view on the capability tags of an estimator
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub multivariate: bool,
    pub missing_values: bool,
    pub unequal_length: bool,
    pub multithreading: bool,
    pub contractable: bool,
    pub train_estimate: bool,
}

impl Capabilities {
    pub fn from_tags(tags: &TagSet) -> Self {
        Capabilities {
            multivariate: tags.flag(Tag::Multivariate),
            missing_values: tags.flag(Tag::MissingValues),
            unequal_length: tags.flag(Tag::UnequalLength),
            multithreading: tags.flag(Tag::Multithreading),
            contractable: tags.flag(Tag::Contractable),
            train_estimate: tags.flag(Tag::TrainEstimate),
        }
    }
}
