//! Datasets
//!
//! This module implements the in-memory representations of time series data and the metadata
//! used to negotiate between them.
//!
//! Every piece of data belongs to one abstract category, its [`Scitype`], and is stored in one
//! concrete layout, its [`MType`]. A single scitype usually has several interchangeable mtypes,
//! for example a collection of series can live in a dense three-dimensional array or in a list
//! of two-dimensional arrays with one entry per instance. [`TsData`] is the container which
//! carries both the values and the layout they are stored in.
use ndarray::{Array2, Array3, NdFloat, ScalarOperand};

use num_traits::{AsPrimitive, FromPrimitive, NumAssignOps, NumCast, Signed};
use rand::distributions::uniform::SampleUniform;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use crate::error::{Error, Result};

mod frame;
mod horizon;
mod impl_data;

pub(crate) use frame::default_columns;
pub use frame::{IndexKey, IndexedFrame, MultiIndex};
pub use horizon::ForecastingHorizon;
pub use impl_data::DataMetadata;

/// Floating point numbers
///
/// This trait bound multiplexes to the most common assumption of floating point number and
/// implement them for 32bit and 64bit floating points. They are used for the values of every
/// representation and, for regression tasks, in the targets as well.
pub trait Float:
    NdFloat
    + FromPrimitive
    + num_traits::Float
    + PartialOrd
    + Sync
    + Send
    + Default
    + fmt::Display
    + fmt::Debug
    + Signed
    + Sum
    + NumAssignOps
    + AsPrimitive<usize>
    + SampleUniform
    + ScalarOperand
    + approx::AbsDiffEq<Epsilon = Self>
{
    fn cast<T: NumCast>(x: T) -> Self {
        NumCast::from(x).unwrap_or_else(Self::nan)
    }
}

impl Float for f32 {}

impl Float for f64 {}

/// Abstract data category
///
/// The scitype describes what the data *is*, independent of how it is stored.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scitype {
    /// A single, possibly multivariate, time series
    Series,
    /// A collection of time series, one per instance
    Panel,
    /// A collection of time series indexed by a hierarchy of levels
    Hierarchical,
    /// Tabular data, one row per instance and one column per feature
    Table,
}

impl Scitype {
    pub const ALL: [Scitype; 4] = [
        Scitype::Series,
        Scitype::Panel,
        Scitype::Hierarchical,
        Scitype::Table,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scitype::Series => "Series",
            Scitype::Panel => "Panel",
            Scitype::Hierarchical => "Hierarchical",
            Scitype::Table => "Table",
        }
    }
}

impl fmt::Display for Scitype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete in-memory representation of a scitype
///
/// | mtype | scitype | layout |
/// |---|---|---|
/// | `SeriesArray` | Series | `Array2` with shape (timepoints, channels) |
/// | `SeriesFrame` | Series | [`IndexedFrame`] with a single time level |
/// | `Panel3D` | Panel | `Array3` with shape (instances, channels, timepoints) |
/// | `PanelList` | Panel | `Vec<Array2>`, each with shape (channels, timepoints of instance) |
/// | `PanelFlat` | Panel | `Array2` with shape (instances, channels * timepoints) |
/// | `PanelFrame` | Panel | [`IndexedFrame`] with (instance, time) levels |
/// | `HierarchicalFrame` | Hierarchical | [`IndexedFrame`] with (level, .., level, time) levels |
/// | `TableArray` | Table | `Array2` with shape (instances, features) |
/// | `TableFrame` | Table | [`IndexedFrame`] with a single instance level |
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MType {
    SeriesArray,
    SeriesFrame,
    Panel3D,
    PanelList,
    PanelFlat,
    PanelFrame,
    HierarchicalFrame,
    TableArray,
    TableFrame,
}

impl MType {
    pub const ALL: [MType; 9] = [
        MType::SeriesArray,
        MType::SeriesFrame,
        MType::Panel3D,
        MType::PanelList,
        MType::PanelFlat,
        MType::PanelFrame,
        MType::HierarchicalFrame,
        MType::TableArray,
        MType::TableFrame,
    ];

    /// The scitype this representation implements
    pub fn scitype(&self) -> Scitype {
        match self {
            MType::SeriesArray | MType::SeriesFrame => Scitype::Series,
            MType::Panel3D | MType::PanelList | MType::PanelFlat | MType::PanelFrame => {
                Scitype::Panel
            }
            MType::HierarchicalFrame => Scitype::Hierarchical,
            MType::TableArray | MType::TableFrame => Scitype::Table,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MType::SeriesArray => "series-array",
            MType::SeriesFrame => "series-frame",
            MType::Panel3D => "panel-3d",
            MType::PanelList => "panel-list",
            MType::PanelFlat => "panel-flat",
            MType::PanelFrame => "panel-frame",
            MType::HierarchicalFrame => "hierarchical-frame",
            MType::TableArray => "table-array",
            MType::TableFrame => "table-frame",
        }
    }

    /// All mtypes implementing `scitype`, in declaration order
    pub fn of_scitype(scitype: Scitype) -> Vec<MType> {
        MType::ALL
            .iter()
            .copied()
            .filter(|m| m.scitype() == scitype)
            .collect()
    }
}

impl fmt::Display for MType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MType::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::Parameters(format!("unknown mtype `{}`", s)))
    }
}

/// Time series data stored in one of the registered representations
///
/// The variant determines both the mtype and, through it, the scitype of the data. Frames have
/// their number of index levels validated by [`TsData::check`].
#[derive(Debug, Clone, PartialEq)]
pub enum TsData<F> {
    SeriesArray(Array2<F>),
    SeriesFrame(IndexedFrame<F>),
    Panel3D(Array3<F>),
    PanelList(Vec<Array2<F>>),
    PanelFlat(Array2<F>),
    PanelFrame(IndexedFrame<F>),
    HierarchicalFrame(IndexedFrame<F>),
    TableArray(Array2<F>),
    TableFrame(IndexedFrame<F>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<TsData<f64>>();
        has_autotraits::<MType>();
        has_autotraits::<Scitype>();
    }

    #[test]
    fn every_mtype_belongs_to_one_scitype() {
        let mut total = 0;
        for scitype in Scitype::ALL.iter() {
            total += MType::of_scitype(*scitype).len();
        }
        assert_eq!(total, MType::ALL.len());
        assert_eq!(
            MType::of_scitype(Scitype::Panel),
            vec![
                MType::Panel3D,
                MType::PanelList,
                MType::PanelFlat,
                MType::PanelFrame
            ]
        );
    }

    #[test]
    fn mtype_names_round_trip() {
        for mtype in MType::ALL.iter() {
            assert_eq!(mtype.name().parse::<MType>().unwrap(), *mtype);
        }
        assert!("numpy3D".parse::<MType>().is_err());
    }
}
