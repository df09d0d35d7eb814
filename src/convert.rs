//! Conversion between data representations
//!
//! The [`ConverterRegistry`] holds directed converters between mtypes of the same scitype.
//! Missing direct converters are satisfied by chaining registered ones. Among all chains the
//! one with the fewest lossy converters wins, then the shortest one, then the one registered
//! first, so a lossy converter is only used when no lossless chain reaches the target.
use ndarray::{Array2, Array3, Axis};
use tracing::debug;

use crate::dataset::{default_columns, Float, IndexKey, IndexedFrame, MType, MultiIndex, Scitype, TsData};
use crate::error::{Error, Result};

/// Signature of a single conversion step
pub type ConvertFn<F> = fn(&TsData<F>) -> Result<TsData<F>>;

#[derive(Clone)]
struct Converter<F> {
    from: MType,
    to: MType,
    lossy: bool,
    convert: ConvertFn<F>,
}

/// Registered conversions between mtypes
#[derive(Clone)]
pub struct ConverterRegistry<F> {
    converters: Vec<Converter<F>>,
}

impl<F: Float> Default for ConverterRegistry<F> {
    fn default() -> Self {
        let mut registry = ConverterRegistry::empty();

        registry.register(MType::SeriesArray, MType::SeriesFrame, false, series_array_to_frame);
        registry.register(MType::SeriesFrame, MType::SeriesArray, true, series_frame_to_array);

        registry.register(MType::Panel3D, MType::PanelList, false, panel_3d_to_list);
        registry.register(MType::PanelList, MType::Panel3D, false, panel_list_to_3d);
        registry.register(MType::Panel3D, MType::PanelFrame, false, panel_3d_to_frame);
        registry.register(MType::PanelFrame, MType::Panel3D, true, panel_frame_to_3d);
        registry.register(MType::PanelList, MType::PanelFrame, false, panel_list_to_frame);
        registry.register(MType::PanelFrame, MType::PanelList, true, panel_frame_to_list);
        registry.register(MType::Panel3D, MType::PanelFlat, true, panel_3d_to_flat);
        registry.register(MType::PanelFlat, MType::Panel3D, false, panel_flat_to_3d);

        registry.register(MType::TableArray, MType::TableFrame, false, table_array_to_frame);
        registry.register(MType::TableFrame, MType::TableArray, true, table_frame_to_array);

        registry
    }
}

impl<F: Float> ConverterRegistry<F> {
    /// Registry without any converters
    pub fn empty() -> Self {
        ConverterRegistry {
            converters: Vec::new(),
        }
    }

    /// Register a converter, earlier registrations win ties between equally good chains
    pub fn register(&mut self, from: MType, to: MType, lossy: bool, convert: ConvertFn<F>) {
        self.converters.push(Converter {
            from,
            to,
            lossy,
            convert,
        });
    }

    /// Chain of mtypes used to get from `from` to `to` inside `scitype`
    ///
    /// The chain includes both end points. Converting an mtype to itself is the empty chain
    /// `[from]`.
    pub fn path(&self, from: MType, to: MType, scitype: Scitype) -> Result<Vec<MType>> {
        let fail = |reason: &str| Error::Conversion {
            from,
            to,
            scitype,
            reason: reason.to_string(),
        };
        if from.scitype() != scitype || to.scitype() != scitype {
            return Err(fail("mtype does not belong to the scitype"));
        }

        let mut best: Option<((usize, usize, Vec<usize>), Vec<MType>)> = None;
        let mut chain = vec![from];
        let mut used = Vec::new();
        self.search(to, scitype, &mut chain, &mut used, &mut best);

        let (_, chain) = best.ok_or_else(|| fail("no registered chain of converters"))?;

        Ok(chain)
    }

    /// Depth first enumeration of simple chains, keeping the best one
    ///
    /// Chains are ranked by number of lossy converters, then number of converters, then the
    /// registration order of the converters they use.
    fn search(
        &self,
        to: MType,
        scitype: Scitype,
        chain: &mut Vec<MType>,
        used: &mut Vec<usize>,
        best: &mut Option<((usize, usize, Vec<usize>), Vec<MType>)>,
    ) {
        let current = chain[chain.len() - 1];
        if current == to {
            let lossy = used.iter().filter(|i| self.converters[**i].lossy).count();
            let rank = (lossy, used.len(), used.clone());
            if best.as_ref().map(|(b, _)| rank < *b).unwrap_or(true) {
                *best = Some((rank, chain.clone()));
            }
            return;
        }

        for (idx, conv) in self.converters.iter().enumerate() {
            if conv.from != current || conv.to.scitype() != scitype || chain.contains(&conv.to) {
                continue;
            }
            chain.push(conv.to);
            used.push(idx);
            self.search(to, scitype, chain, used, best);
            chain.pop();
            used.pop();
        }
    }

    /// Convert `x` to the mtype `to`, staying inside `scitype`
    pub fn convert(&self, x: &TsData<F>, to: MType, scitype: Scitype) -> Result<TsData<F>> {
        let from = x.mtype();
        let chain = self.path(from, to, scitype)?;
        debug!(%from, %to, hops = chain.len() - 1, "converting data");

        let mut out = x.clone();
        for pair in chain.windows(2) {
            let conv = self
                .converters
                .iter()
                .find(|c| c.from == pair[0] && c.to == pair[1])
                .ok_or_else(|| Error::Conversion {
                    from,
                    to,
                    scitype,
                    reason: "no registered chain of converters".into(),
                })?;
            out = (conv.convert)(&out).map_err(|err| match err {
                Error::Conversion { .. } => err,
                other => Error::Conversion {
                    from,
                    to,
                    scitype,
                    reason: other.to_string(),
                },
            })?;
        }

        Ok(out)
    }
}

/// Convert `x` to `to` with the default converters
pub fn convert<F: Float>(x: &TsData<F>, to: MType, as_scitype: Scitype) -> Result<TsData<F>> {
    ConverterRegistry::default().convert(x, to, as_scitype)
}

/// Choose the representation an input is converted to
///
/// The input mtype is kept if it is accepted. Otherwise the first accepted mtype, in declared
/// order, of the same scitype as the input is chosen.
pub fn select_mtype(input: MType, accepted: &[MType], estimator: &str) -> Result<MType> {
    if accepted.contains(&input) {
        return Ok(input);
    }

    accepted
        .iter()
        .copied()
        .find(|m| m.scitype() == input.scitype())
        .ok_or_else(|| Error::UnsupportedScitype {
            estimator: estimator.to_string(),
            scitype: input.scitype(),
        })
}

/// Convert `x` into the representation chosen by [`select_mtype`]
pub fn convert_to<F: Float>(x: &TsData<F>, accepted: &[MType], estimator: &str) -> Result<TsData<F>> {
    let target = select_mtype(x.mtype(), accepted, estimator)?;
    if target == x.mtype() {
        return Ok(x.clone());
    }

    convert(x, target, x.scitype())
}

fn unexpected<F: Float>(x: &TsData<F>, expected: MType) -> Error {
    Error::InvalidData(format!("expected {} data, got {}", expected, x.mtype()))
}

fn int_key(i: usize) -> IndexKey {
    IndexKey::Int(i as i64)
}

fn series_array_to_frame<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    let x = x.as_series_array()?;
    Ok(TsData::SeriesFrame(IndexedFrame::from_array(x.clone())))
}

fn series_frame_to_array<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    match x {
        TsData::SeriesFrame(frame) => Ok(TsData::SeriesArray(frame.values().clone())),
        _ => Err(unexpected(x, MType::SeriesFrame)),
    }
}

fn panel_3d_to_list<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    let x = x.as_panel_3d()?;
    Ok(TsData::PanelList(
        x.outer_iter().map(|instance| instance.to_owned()).collect(),
    ))
}

fn panel_list_to_3d<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    let list = x.as_panel_list()?;
    let (n_channels, n_timepoints) = list.first().map(|x| x.dim()).unwrap_or((0, 0));
    if list.iter().any(|x| x.dim() != (n_channels, n_timepoints)) {
        return Err(Error::Conversion {
            from: MType::PanelList,
            to: MType::Panel3D,
            scitype: Scitype::Panel,
            reason: "instances have unequal length".into(),
        });
    }

    let mut out = Array3::zeros((list.len(), n_channels, n_timepoints));
    for (mut target, instance) in out.outer_iter_mut().zip(list.iter()) {
        target.assign(instance);
    }

    Ok(TsData::Panel3D(out))
}

/// Stack (channels, timepoints) instances into a frame with (instance, time) keys
fn instances_to_frame<'a, F: Float, I>(instances: I, n_channels: usize) -> Result<IndexedFrame<F>>
where
    I: Iterator<Item = ndarray::ArrayView2<'a, F>>,
{
    let mut keys = Vec::new();
    let mut rows: Vec<F> = Vec::new();
    for (i, instance) in instances.enumerate() {
        for (t, column) in instance.axis_iter(Axis(1)).enumerate() {
            keys.push(vec![int_key(i), int_key(t)]);
            rows.extend(column.iter().copied());
        }
    }
    let values = Array2::from_shape_vec((keys.len(), n_channels), rows)?;
    let index = MultiIndex::new(vec![None, None], keys)?;

    IndexedFrame::new(index, default_columns(n_channels), values)
}

/// Split a panel frame into (channels, timepoints) instances
fn frame_to_instances<F: Float>(frame: &IndexedFrame<F>) -> Vec<Array2<F>> {
    frame
        .groups()
        .into_iter()
        .map(|(_, rows)| frame.values().select(Axis(0), &rows).reversed_axes())
        .collect()
}

fn panel_3d_to_frame<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    let x = x.as_panel_3d()?;
    let frame = instances_to_frame(x.outer_iter(), x.len_of(Axis(1)))?;
    Ok(TsData::PanelFrame(frame))
}

fn panel_list_to_frame<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    let list = x.as_panel_list()?;
    let n_channels = list.first().map(|x| x.nrows()).unwrap_or(0);
    let frame = instances_to_frame(list.iter().map(|x| x.view()), n_channels)?;
    Ok(TsData::PanelFrame(frame))
}

fn panel_frame_to_list<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    match x {
        TsData::PanelFrame(frame) => Ok(TsData::PanelList(frame_to_instances(frame))),
        _ => Err(unexpected(x, MType::PanelFrame)),
    }
}

fn panel_frame_to_3d<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    panel_frame_to_list(x).and_then(|list| panel_list_to_3d(&list))
}

fn panel_3d_to_flat<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    let x = x.as_panel_3d()?;
    let (n, c, t) = x.dim();
    let flat = x.as_standard_layout().into_owned().into_shape((n, c * t))?;
    Ok(TsData::PanelFlat(flat))
}

fn panel_flat_to_3d<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    match x {
        TsData::PanelFlat(flat) => Ok(TsData::Panel3D(flat.clone().insert_axis(Axis(1)))),
        _ => Err(unexpected(x, MType::PanelFlat)),
    }
}

fn table_array_to_frame<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    let x = x.as_table_array()?;
    Ok(TsData::TableFrame(IndexedFrame::from_array(x.clone())))
}

fn table_frame_to_array<F: Float>(x: &TsData<F>) -> Result<TsData<F>> {
    match x {
        TsData::TableFrame(frame) => Ok(TsData::TableArray(frame.values().clone())),
        _ => Err(unexpected(x, MType::TableFrame)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    fn panel() -> TsData<f64> {
        TsData::Panel3D(Array::range(0., 12., 1.).into_shape((2, 2, 3)).unwrap())
    }

    #[test]
    fn lossless_round_trip_through_frame() {
        let x = panel();
        let frame = convert(&x, MType::PanelFrame, Scitype::Panel).unwrap();
        let meta = frame.metadata();
        assert_eq!(meta.n_instances, 2);
        assert_eq!(meta.n_channels, 2);
        assert_eq!(meta.n_timepoints, Some(3));

        let back = convert(&frame, MType::Panel3D, Scitype::Panel).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn frame_rows_hold_channels() {
        let frame = convert(&panel(), MType::PanelFrame, Scitype::Panel).unwrap();
        let frame = frame.as_frame().unwrap();

        assert_eq!(frame.values().row(0), array![0., 3.]);
        assert_eq!(frame.values().row(4), array![7., 10.]);
        assert_eq!(
            frame.index().key(4),
            &[IndexKey::Int(1), IndexKey::Int(1)]
        );
    }

    #[test]
    fn flat_panel_is_channel_major() {
        let flat = convert(&panel(), MType::PanelFlat, Scitype::Panel).unwrap();
        assert_eq!(
            flat,
            TsData::PanelFlat(array![
                [0., 1., 2., 3., 4., 5.],
                [6., 7., 8., 9., 10., 11.]
            ])
        );
    }

    #[test]
    fn unequal_list_cannot_become_3d() {
        let x = TsData::PanelList(vec![array![[1., 2., 3.]], array![[1., 2.]]]);

        assert!(matches!(
            convert(&x, MType::Panel3D, Scitype::Panel),
            Err(Error::Conversion { .. })
        ));
        let frame = convert(&x, MType::PanelFrame, Scitype::Panel).unwrap();
        assert!(!frame.metadata().is_equal_length);
    }

    #[test]
    fn conversion_stays_inside_the_scitype() {
        let x = TsData::SeriesArray(array![[1.], [2.]]);

        assert!(convert(&x, MType::PanelFrame, Scitype::Series).is_err());
        assert!(convert(&x, MType::SeriesFrame, Scitype::Panel).is_err());
    }

    #[test]
    fn multi_hop_chain_is_found() {
        let registry = ConverterRegistry::<f64>::default();
        let chain = registry
            .path(MType::PanelList, MType::PanelFlat, Scitype::Panel)
            .unwrap();
        assert_eq!(chain, vec![MType::PanelList, MType::Panel3D, MType::PanelFlat]);

        let list = TsData::PanelList(vec![array![[1., 2.]], array![[3., 4.]]]);
        let flat = registry.convert(&list, MType::PanelFlat, Scitype::Panel).unwrap();
        assert_eq!(flat, TsData::PanelFlat(array![[1., 2.], [3., 4.]]));
    }

    #[test]
    fn lossless_chain_beats_direct_lossy_converter() {
        let mut registry = ConverterRegistry::<f64>::empty();
        registry.register(MType::PanelList, MType::PanelFrame, true, panel_list_to_frame);
        registry.register(MType::PanelList, MType::Panel3D, false, panel_list_to_3d);
        registry.register(MType::Panel3D, MType::PanelFrame, false, panel_3d_to_frame);

        let chain = registry
            .path(MType::PanelList, MType::PanelFrame, Scitype::Panel)
            .unwrap();
        assert_eq!(chain, vec![MType::PanelList, MType::Panel3D, MType::PanelFrame]);
    }

    #[test]
    fn earlier_registration_wins_ties() {
        let mut registry = ConverterRegistry::<f64>::empty();
        registry.register(MType::PanelFlat, MType::PanelList, false, panel_frame_to_list);
        registry.register(MType::PanelFlat, MType::Panel3D, false, panel_flat_to_3d);
        registry.register(MType::PanelList, MType::PanelFrame, false, panel_list_to_frame);
        registry.register(MType::Panel3D, MType::PanelFrame, false, panel_3d_to_frame);

        let chain = registry
            .path(MType::PanelFlat, MType::PanelFrame, Scitype::Panel)
            .unwrap();
        assert_eq!(chain, vec![MType::PanelFlat, MType::PanelList, MType::PanelFrame]);
    }

    #[test]
    fn select_mtype_prefers_input_then_declared_order() {
        let accepted = [MType::TableArray, MType::Panel3D, MType::PanelList];

        assert_eq!(
            select_mtype(MType::PanelList, &accepted, "est").unwrap(),
            MType::PanelList
        );
        assert_eq!(
            select_mtype(MType::PanelFrame, &accepted, "est").unwrap(),
            MType::Panel3D
        );
        assert!(matches!(
            select_mtype(MType::SeriesArray, &accepted, "est"),
            Err(Error::UnsupportedScitype { .. })
        ));
    }
}
