use ndarray::{Array1, Array2, Array3, Axis};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::{Float, IndexedFrame, MType, Scitype, TsData};
use crate::error::{Error, Result};

/// Properties of a piece of data relevant for capability checks
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMetadata {
    pub scitype: Scitype,
    pub mtype: MType,
    /// Number of series (or rows of a table)
    pub n_instances: usize,
    /// Number of variables per time point, always one for tables
    pub n_channels: usize,
    pub is_equal_length: bool,
    pub has_missing: bool,
    /// Shared series length, `None` for unequal length collections and tables
    pub n_timepoints: Option<usize>,
}

impl DataMetadata {
    pub fn is_univariate(&self) -> bool {
        self.n_channels <= 1
    }
}

impl<F: Float> TsData<F> {
    pub fn mtype(&self) -> MType {
        match self {
            TsData::SeriesArray(_) => MType::SeriesArray,
            TsData::SeriesFrame(_) => MType::SeriesFrame,
            TsData::Panel3D(_) => MType::Panel3D,
            TsData::PanelList(_) => MType::PanelList,
            TsData::PanelFlat(_) => MType::PanelFlat,
            TsData::PanelFrame(_) => MType::PanelFrame,
            TsData::HierarchicalFrame(_) => MType::HierarchicalFrame,
            TsData::TableArray(_) => MType::TableArray,
            TsData::TableFrame(_) => MType::TableFrame,
        }
    }

    pub fn scitype(&self) -> Scitype {
        self.mtype().scitype()
    }

    /// Validate the structural invariants of the representation
    ///
    /// Frames must carry the number of index levels their mtype prescribes and every instance
    /// of a list panel must have the same number of channels.
    pub fn check(&self) -> Result<()> {
        let levels = |frame: &IndexedFrame<F>, expected: usize, exact: bool| {
            let n = frame.nlevels();
            if (exact && n != expected) || (!exact && n < expected) {
                Err(Error::InvalidData(format!(
                    "{} requires {}{} index levels, got {}",
                    self.mtype(),
                    if exact { "" } else { "at least " },
                    expected,
                    n
                )))
            } else {
                Ok(())
            }
        };

        match self {
            TsData::SeriesFrame(frame) | TsData::TableFrame(frame) => levels(frame, 1, true),
            TsData::PanelFrame(frame) => levels(frame, 2, true),
            TsData::HierarchicalFrame(frame) => levels(frame, 3, false),
            TsData::PanelList(list) => {
                if let Some(first) = list.first() {
                    if list.iter().any(|x| x.nrows() != first.nrows()) {
                        return Err(Error::InvalidData(
                            "instances of a panel list differ in their number of channels".into(),
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Infer the metadata of the data
    pub fn metadata(&self) -> DataMetadata {
        let has_missing = self.values().any(|x| x.is_nan());
        let (n_instances, n_channels, lengths) = match self {
            TsData::SeriesArray(x) => (1, x.ncols(), vec![x.nrows()]),
            TsData::SeriesFrame(x) => (1, x.values().ncols(), vec![x.nrows()]),
            TsData::Panel3D(x) => (x.len_of(Axis(0)), x.len_of(Axis(1)), {
                vec![x.len_of(Axis(2)); x.len_of(Axis(0))]
            }),
            TsData::PanelList(list) => (
                list.len(),
                list.first().map(|x| x.nrows()).unwrap_or(0),
                list.iter().map(|x| x.ncols()).collect(),
            ),
            TsData::PanelFlat(x) => (x.nrows(), 1, vec![x.ncols(); x.nrows()]),
            TsData::PanelFrame(x) | TsData::HierarchicalFrame(x) => {
                let groups = x.groups();
                (
                    groups.len(),
                    x.values().ncols(),
                    groups.iter().map(|(_, rows)| rows.len()).collect(),
                )
            }
            TsData::TableArray(x) => (x.nrows(), 1, vec![]),
            TsData::TableFrame(x) => (x.nrows(), 1, vec![]),
        };

        let is_equal_length = lengths.windows(2).all(|w| w[0] == w[1]);
        let n_timepoints = if is_equal_length {
            lengths.first().copied()
        } else {
            None
        };

        DataMetadata {
            scitype: self.scitype(),
            mtype: self.mtype(),
            n_instances,
            n_channels,
            is_equal_length,
            has_missing,
            n_timepoints,
        }
    }

    /// Iterate over every stored value
    pub fn values(&self) -> Box<dyn Iterator<Item = F> + '_> {
        match self {
            TsData::SeriesArray(x) | TsData::PanelFlat(x) | TsData::TableArray(x) => {
                Box::new(x.iter().copied())
            }
            TsData::SeriesFrame(x)
            | TsData::PanelFrame(x)
            | TsData::HierarchicalFrame(x)
            | TsData::TableFrame(x) => Box::new(x.values().iter().copied()),
            TsData::Panel3D(x) => Box::new(x.iter().copied()),
            TsData::PanelList(list) => Box::new(list.iter().flat_map(|x| x.iter().copied())),
        }
    }

    /// Apply a function to every value, keeping layout and index
    pub fn map_values<M: Fn(F) -> F>(&self, f: M) -> TsData<F> {
        let map_frame = |x: &IndexedFrame<F>| {
            let mut x = x.clone();
            x.values_mut().mapv_inplace(&f);
            x
        };

        match self {
            TsData::SeriesArray(x) => TsData::SeriesArray(x.mapv(&f)),
            TsData::SeriesFrame(x) => TsData::SeriesFrame(map_frame(x)),
            TsData::Panel3D(x) => TsData::Panel3D(x.mapv(&f)),
            TsData::PanelList(list) => {
                TsData::PanelList(list.iter().map(|x| x.mapv(&f)).collect())
            }
            TsData::PanelFlat(x) => TsData::PanelFlat(x.mapv(&f)),
            TsData::PanelFrame(x) => TsData::PanelFrame(map_frame(x)),
            TsData::HierarchicalFrame(x) => TsData::HierarchicalFrame(map_frame(x)),
            TsData::TableArray(x) => TsData::TableArray(x.mapv(&f)),
            TsData::TableFrame(x) => TsData::TableFrame(map_frame(x)),
        }
    }

    /// Targets of a regression or classification task as a single column table
    pub fn from_targets(y: &Array1<F>) -> TsData<F> {
        TsData::TableArray(y.clone().insert_axis(Axis(1)))
    }

    fn wrong_mtype(&self, expected: MType) -> Error {
        Error::InvalidData(format!("expected {} data, got {}", expected, self.mtype()))
    }

    pub fn as_series_array(&self) -> Result<&Array2<F>> {
        match self {
            TsData::SeriesArray(x) => Ok(x),
            _ => Err(self.wrong_mtype(MType::SeriesArray)),
        }
    }

    pub fn as_panel_3d(&self) -> Result<&Array3<F>> {
        match self {
            TsData::Panel3D(x) => Ok(x),
            _ => Err(self.wrong_mtype(MType::Panel3D)),
        }
    }

    pub fn as_panel_list(&self) -> Result<&[Array2<F>]> {
        match self {
            TsData::PanelList(x) => Ok(x),
            _ => Err(self.wrong_mtype(MType::PanelList)),
        }
    }

    pub fn as_table_array(&self) -> Result<&Array2<F>> {
        match self {
            TsData::TableArray(x) => Ok(x),
            _ => Err(self.wrong_mtype(MType::TableArray)),
        }
    }

    /// The frame of any frame based representation
    pub fn as_frame(&self) -> Result<&IndexedFrame<F>> {
        match self {
            TsData::SeriesFrame(x)
            | TsData::PanelFrame(x)
            | TsData::HierarchicalFrame(x)
            | TsData::TableFrame(x) => Ok(x),
            _ => Err(Error::InvalidData(format!(
                "expected frame data, got {}",
                self.mtype()
            ))),
        }
    }

    pub fn into_frame(self) -> Result<IndexedFrame<F>> {
        match self {
            TsData::SeriesFrame(x)
            | TsData::PanelFrame(x)
            | TsData::HierarchicalFrame(x)
            | TsData::TableFrame(x) => Ok(x),
            other => Err(Error::InvalidData(format!(
                "expected frame data, got {}",
                other.mtype()
            ))),
        }
    }

    pub fn into_series_array(self) -> Result<Array2<F>> {
        match self {
            TsData::SeriesArray(x) => Ok(x),
            other => Err(other.wrong_mtype(MType::SeriesArray)),
        }
    }

    pub fn into_table_array(self) -> Result<Array2<F>> {
        match self {
            TsData::TableArray(x) => Ok(x),
            other => Err(other.wrong_mtype(MType::TableArray)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{IndexKey, MultiIndex};
    use ndarray::{array, Array3};

    #[test]
    fn metadata_of_unequal_panel() {
        let x = TsData::PanelList(vec![
            array![[1., 2., 3.], [1., 2., 3.]],
            array![[1., f64::NAN], [1., 2.]],
        ]);
        let meta = x.metadata();

        assert_eq!(meta.scitype, Scitype::Panel);
        assert_eq!(meta.n_instances, 2);
        assert_eq!(meta.n_channels, 2);
        assert!(!meta.is_equal_length);
        assert!(meta.has_missing);
        assert_eq!(meta.n_timepoints, None);
    }

    #[test]
    fn metadata_of_equal_panel() {
        let x = TsData::Panel3D(Array3::<f64>::zeros((4, 1, 7)));
        let meta = x.metadata();

        assert_eq!(meta.n_instances, 4);
        assert!(meta.is_univariate());
        assert!(meta.is_equal_length);
        assert!(!meta.has_missing);
        assert_eq!(meta.n_timepoints, Some(7));
    }

    #[test]
    fn tables_are_never_multivariate() {
        let x = TsData::TableArray(array![[1., 2., 3.], [4., 5., 6.]]);
        let meta = x.metadata();

        assert_eq!(meta.n_instances, 2);
        assert!(meta.is_univariate());
    }

    #[test]
    fn frame_level_counts_are_checked() {
        let frame = IndexedFrame::from_array(array![[1.], [2.]]);
        assert!(TsData::SeriesFrame(frame.clone()).check().is_ok());
        assert!(TsData::PanelFrame(frame.clone()).check().is_err());
        assert!(TsData::HierarchicalFrame(frame).check().is_err());

        let keys = (0..2)
            .map(|t| vec![IndexKey::from("a"), IndexKey::from("b"), IndexKey::Int(t)])
            .collect();
        let index = MultiIndex::new(vec![None, None, None], keys).unwrap();
        let frame = IndexedFrame::new(index, vec!["x".into()], array![[1.], [2.]]).unwrap();
        assert!(TsData::HierarchicalFrame(frame).check().is_ok());
    }

    #[test]
    fn map_values_keeps_layout() {
        let x = TsData::PanelList(vec![array![[1., 2.]], array![[3.]]]);
        let y = x.map_values(|v| v * 2.);

        assert_eq!(y, TsData::PanelList(vec![array![[2., 4.]], array![[6.]]]));
    }
}
