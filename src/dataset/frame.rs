//! Frames with a hierarchical row index
//!
//! An [`IndexedFrame`] is a two-dimensional value array whose rows are addressed by a
//! [`MultiIndex`]. The last index level is the time point (or the instance for tables), every
//! level before it identifies the series the row belongs to.
use ndarray::{Array2, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{Error, Result};

/// A single entry of a row key
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKey {
    Int(i64),
    Str(String),
}

impl IndexKey {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            IndexKey::Int(x) => Some(*x),
            IndexKey::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IndexKey::Int(_) => None,
            IndexKey::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Int(x) => write!(f, "{}", x),
            IndexKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for IndexKey {
    fn from(x: i64) -> Self {
        IndexKey::Int(x)
    }
}

impl From<usize> for IndexKey {
    fn from(x: usize) -> Self {
        IndexKey::Int(x as i64)
    }
}

impl From<&str> for IndexKey {
    fn from(x: &str) -> Self {
        IndexKey::Str(x.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(x: String) -> Self {
        IndexKey::Str(x)
    }
}

/// Row index with one or more, optionally named, levels
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiIndex {
    names: Vec<Option<String>>,
    keys: Vec<Vec<IndexKey>>,
}

impl MultiIndex {
    /// Create a new index from level names and row keys
    ///
    /// Every key must have exactly one entry per level and keys must be unique.
    pub fn new(names: Vec<Option<String>>, keys: Vec<Vec<IndexKey>>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::InvalidData(
                "an index needs at least one level".into(),
            ));
        }
        if let Some(key) = keys.iter().find(|k| k.len() != names.len()) {
            return Err(Error::InvalidData(format!(
                "index key of length {} does not match {} levels",
                key.len(),
                names.len()
            )));
        }
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key) {
                return Err(Error::InvalidData(format!(
                    "duplicate index key {}",
                    format_key(key)
                )));
            }
        }

        Ok(MultiIndex { names, keys })
    }

    /// Unnamed index with a single integer level `0..n`
    pub fn range(n: usize) -> Self {
        MultiIndex {
            names: vec![None],
            keys: (0..n).map(|i| vec![IndexKey::from(i)]).collect(),
        }
    }

    pub fn nlevels(&self) -> usize {
        self.names.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    pub fn keys(&self) -> &[Vec<IndexKey>] {
        &self.keys
    }

    pub fn key(&self, row: usize) -> &[IndexKey] {
        &self.keys[row]
    }

    /// Values of a single level, one per row
    pub fn level_values(&self, level: usize) -> Vec<&IndexKey> {
        self.keys.iter().map(|k| &k[level]).collect()
    }

    /// Position of a row key
    pub fn position(&self, key: &[IndexKey]) -> Option<usize> {
        self.keys.iter().position(|k| k.as_slice() == key)
    }
}

pub(crate) fn format_key(key: &[IndexKey]) -> String {
    let parts = key.iter().map(|k| k.to_string()).collect::<Vec<_>>();
    format!("({})", parts.join(", "))
}

/// Two-dimensional values addressed by a [`MultiIndex`] and named columns
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFrame<F> {
    index: MultiIndex,
    columns: Vec<String>,
    values: Array2<F>,
}

impl<F: Clone> IndexedFrame<F> {
    /// Create a new frame
    ///
    /// Fails if the number of rows differs from the index length or the number of columns
    /// differs from the number of column names.
    pub fn new(index: MultiIndex, columns: Vec<String>, values: Array2<F>) -> Result<Self> {
        if index.len() != values.nrows() {
            return Err(Error::InvalidData(format!(
                "index of length {} for {} rows",
                index.len(),
                values.nrows()
            )));
        }
        if columns.len() != values.ncols() {
            return Err(Error::InvalidData(format!(
                "{} column names for {} columns",
                columns.len(),
                values.ncols()
            )));
        }

        Ok(IndexedFrame {
            index,
            columns,
            values,
        })
    }

    /// Wrap an array with a default integer index and numbered columns
    pub fn from_array(values: Array2<F>) -> Self {
        IndexedFrame {
            index: MultiIndex::range(values.nrows()),
            columns: default_columns(values.ncols()),
            values,
        }
    }

    pub fn index(&self) -> &MultiIndex {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<F> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Array2<F> {
        &mut self.values
    }

    pub fn nlevels(&self) -> usize {
        self.index.nlevels()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Group rows by every index level except the last one
    ///
    /// Groups are returned in order of first appearance, rows keep their order inside a group.
    /// A frame with a single level forms one group with an empty key.
    pub fn groups(&self) -> Vec<(Vec<IndexKey>, Vec<usize>)> {
        let depth = self.nlevels() - 1;
        let mut order: Vec<(Vec<IndexKey>, Vec<usize>)> = Vec::new();
        let mut lookup: HashMap<&[IndexKey], usize> = HashMap::new();

        for (row, key) in self.index.keys().iter().enumerate() {
            let prefix = &key[..depth];
            match lookup.get(prefix) {
                Some(&pos) => order[pos].1.push(row),
                None => {
                    lookup.insert(prefix, order.len());
                    order.push((prefix.to_vec(), vec![row]));
                }
            }
        }

        order
    }

    /// Frame made of the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let keys = rows.iter().map(|r| self.index.keys[*r].clone()).collect();

        IndexedFrame {
            index: MultiIndex {
                names: self.index.names.clone(),
                keys,
            },
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Sort rows lexicographically by their index key
    pub fn sort_index(&self) -> Self {
        let mut rows = (0..self.nrows()).collect::<Vec<_>>();
        rows.sort_by(|a, b| self.index.keys[*a].cmp(&self.index.keys[*b]));

        self.select_rows(&rows)
    }

    /// Replace the level names of the index
    pub fn rename_levels(mut self, names: Vec<Option<String>>) -> Result<Self> {
        if names.len() != self.nlevels() {
            return Err(Error::InvalidData(format!(
                "{} level names for an index with {} levels",
                names.len(),
                self.nlevels()
            )));
        }
        self.index.names = names;

        Ok(self)
    }

    pub fn into_parts(self) -> (MultiIndex, Vec<String>, Array2<F>) {
        (self.index, self.columns, self.values)
    }
}

pub(crate) fn default_columns(n: usize) -> Vec<String> {
    (0..n).map(|i| i.to_string()).collect()
}
