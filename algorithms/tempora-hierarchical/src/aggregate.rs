use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use ndarray::{Array1, Array2};
use tempora::base::{
    default_with_params, BaseObject, EstimatorState, ParamPath, Params, TestParams,
};
use tempora::dataset::{IndexKey, IndexedFrame, MType, MultiIndex};
use tempora::tags::{Tag, TagSet};
use tempora::traits::Transformer;
use tempora::{Float, ParamGuard, TsData};
use tracing::debug;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{HierarchicalError, Result};
use crate::{is_aggregate, Node, TOTAL};

const FLATTEN_SINGLE_LEVELS: &str = "flatten_single_levels";

/// Whether any row of the frame belongs to an aggregate node
pub fn has_aggregates<F>(frame: &IndexedFrame<F>) -> bool
where
    F: Clone,
{
    let depth = frame.nlevels().saturating_sub(1);
    frame
        .index()
        .keys()
        .iter()
        .any(|key| is_aggregate(&key[..depth]))
}

/// Frame restricted to the bottom nodes
pub fn drop_aggregates<F: Float>(frame: &IndexedFrame<F>) -> IndexedFrame<F> {
    let depth = frame.nlevels().saturating_sub(1);
    let rows: Vec<usize> = frame
        .index()
        .keys()
        .iter()
        .enumerate()
        .filter(|(_, key)| !is_aggregate(&key[..depth]))
        .map(|(row, _)| row)
        .collect();

    frame.select_rows(&rows)
}

/// Add the aggregate nodes of every hierarchy level
///
/// Existing aggregate rows are discarded and recomputed from the bottom nodes. For every
/// level `l` each bottom row is added to the node which keeps the first `l` keys and carries
/// [`TOTAL`] on the others. With `flatten_single_levels` aggregates of a single child are left
/// out, the grand total is always kept. Rows of the result are sorted by node and time.
pub fn aggregate<F: Float>(
    frame: &IndexedFrame<F>,
    flatten_single_levels: bool,
) -> Result<IndexedFrame<F>> {
    let nlevels = frame.nlevels();
    if nlevels < 2 {
        return Err(HierarchicalError::InvalidHierarchy(format!(
            "expected hierarchy levels and a time level, got {} levels",
            nlevels
        )));
    }
    let depth = nlevels - 1;
    let bottom = drop_aggregates(frame);
    if bottom.nrows() == 0 {
        return Err(HierarchicalError::InvalidHierarchy(
            "no bottom level rows to aggregate".into(),
        ));
    }

    let mut children: BTreeMap<Node, BTreeSet<IndexKey>> = BTreeMap::new();
    for key in bottom.index().keys() {
        for level in 1..depth {
            children
                .entry(key[..level].to_vec())
                .or_default()
                .insert(key[level].clone());
        }
    }

    let mut sums: BTreeMap<Vec<IndexKey>, Array1<F>> = BTreeMap::new();
    for (key, row) in bottom.index().keys().iter().zip(bottom.values().rows()) {
        for level in 0..=depth {
            if flatten_single_levels
                && level > 0
                && level < depth
                && children.get(&key[..level]).map_or(0, |c| c.len()) == 1
            {
                continue;
            }
            let target: Vec<IndexKey> = key[..level]
                .iter()
                .cloned()
                .chain(std::iter::repeat(IndexKey::from(TOTAL)).take(depth - level))
                .chain(std::iter::once(key[depth].clone()))
                .collect();
            sums.entry(target)
                .and_modify(|sum| *sum += &row)
                .or_insert_with(|| row.to_owned());
        }
    }
    debug!(
        n_bottom_rows = bottom.nrows(),
        n_rows = sums.len(),
        "aggregated hierarchy"
    );

    let mut values = Array2::zeros((sums.len(), frame.columns().len()));
    for (mut out, sum) in values.rows_mut().into_iter().zip(sums.values()) {
        out.assign(sum);
    }
    let index = MultiIndex::new(frame.index().names().to_vec(), sums.into_keys().collect())?;

    Ok(IndexedFrame::new(index, frame.columns().to_vec(), values)?)
}

/// Checked parameters of an [`Aggregator`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorValidParams {
    flatten_single_levels: bool,
}

impl AggregatorValidParams {
    pub fn flatten_single_levels(&self) -> bool {
        self.flatten_single_levels
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorParams(AggregatorValidParams);

impl Default for AggregatorParams {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatorParams {
    pub fn new() -> Self {
        AggregatorParams(AggregatorValidParams {
            flatten_single_levels: true,
        })
    }

    /// Leave out aggregates equal to their only child, defaults to `true`
    pub fn flatten_single_levels(mut self, flatten_single_levels: bool) -> Self {
        self.0.flatten_single_levels = flatten_single_levels;
        self
    }

    pub fn build<F: Float>(self) -> tempora::Result<Aggregator<F>> {
        Ok(Aggregator::new(self.check()?))
    }
}

impl ParamGuard for AggregatorParams {
    type Checked = AggregatorValidParams;
    type Error = tempora::Error;

    fn check_ref(&self) -> tempora::Result<&Self::Checked> {
        Ok(&self.0)
    }

    fn check(self) -> tempora::Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Transformer adding the aggregate nodes of a hierarchy
///
/// `transform` returns the bottom nodes together with their aggregates, see [`aggregate`].
/// Input which already carries aggregates is aggregated again from its bottom nodes.
/// `inverse_transform` drops the aggregates.
#[derive(Debug)]
pub struct Aggregator<F> {
    params: AggregatorValidParams,
    state: EstimatorState,
    phantom: PhantomData<F>,
}

impl<F: Float> Aggregator<F> {
    pub fn new(params: AggregatorValidParams) -> Self {
        Aggregator {
            params,
            state: EstimatorState::default(),
            phantom: PhantomData,
        }
    }
}

impl<F: Float> Default for Aggregator<F> {
    fn default() -> Self {
        Aggregator::new(AggregatorParams::new().0)
    }
}

impl<F: Float> Clone for Aggregator<F> {
    fn clone(&self) -> Self {
        Aggregator {
            params: self.params.clone(),
            state: self.state.unfitted(),
            phantom: PhantomData,
        }
    }
}

impl<F: Float> BaseObject<F> for Aggregator<F> {
    fn type_name(&self) -> &'static str {
        "Aggregator"
    }

    fn class_tags(&self) -> TagSet {
        TagSet::transformer_defaults()
            .with(Tag::XInnerType, vec![MType::HierarchicalFrame])
            .with(Tag::Multivariate, true)
            .with(Tag::MissingValues, true)
            .with(Tag::UnequalLength, true)
            .with(Tag::InverseTransform, true)
    }

    fn state(&self) -> &EstimatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EstimatorState {
        &mut self.state
    }

    fn get_params(&self, _deep: bool) -> Params<F> {
        Params::new().with(FLATTEN_SINGLE_LEVELS, self.params.flatten_single_levels)
    }

    fn set_params(&mut self, params: Params<F>) -> tempora::Result<()> {
        params.check_leaves(&[FLATTEN_SINGLE_LEVELS])?;
        let mut builder = AggregatorParams(self.params.clone());
        if let Some(flatten) = params.get(FLATTEN_SINGLE_LEVELS) {
            builder = builder
                .flatten_single_levels(flatten.as_bool(&ParamPath::from(FLATTEN_SINGLE_LEVELS))?);
        }

        self.params = builder.check()?;
        self.state = self.state.unfitted();
        Ok(())
    }
}

impl<F: Float> Transformer<F> for Aggregator<F> {
    fn fit_core(&mut self, _x: &TsData<F>, _y: Option<&TsData<F>>) -> tempora::Result<()> {
        Ok(())
    }

    fn transform_core(&self, x: &TsData<F>, _y: Option<&TsData<F>>) -> tempora::Result<TsData<F>> {
        let frame = aggregate(x.as_frame()?, self.params.flatten_single_levels)?;
        Ok(TsData::HierarchicalFrame(frame))
    }

    fn inverse_transform_core(
        &self,
        x: &TsData<F>,
        _y: Option<&TsData<F>>,
    ) -> tempora::Result<TsData<F>> {
        Ok(TsData::HierarchicalFrame(drop_aggregates(x.as_frame()?)))
    }

    fn boxed_clone(&self) -> Box<dyn Transformer<F>> {
        Box::new(self.clone())
    }
}

impl<F: Float> TestParams<F> for Aggregator<F> {
    fn get_test_params(_parameter_set: &str) -> Vec<Params<F>> {
        vec![
            Params::new(),
            Params::new().with(FLATTEN_SINGLE_LEVELS, false),
        ]
    }

    fn from_params(params: Params<F>) -> tempora::Result<Self> {
        default_with_params(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempora_datasets::{hierarchy_index, trend_hierarchy};

    fn key(node: &[&str], t: usize) -> Vec<IndexKey> {
        node.iter()
            .map(|k| IndexKey::from(*k))
            .chain(std::iter::once(IndexKey::from(t)))
            .collect()
    }

    #[test]
    fn adds_a_total_per_level() {
        let y = trend_hierarchy(&[2, 2], 3, true);
        let out = Aggregator::default().fit_transform(&y, None).unwrap();
        let frame = out.as_frame().unwrap();

        // 4 bottom, 2 regions and the total, 3 time points each
        assert_eq!(frame.nrows(), 21);
        assert_eq!(frame.index().names(), y.as_frame().unwrap().index().names());
        let total = frame.index().position(&key(&[TOTAL, TOTAL], 1)).unwrap();
        // bottom nodes hold 1 + j + t
        assert_eq!(frame.values()[(total, 0)], 2. + 3. + 4. + 5.);
        let region = frame.index().position(&key(&["a1", TOTAL], 0)).unwrap();
        assert_eq!(frame.values()[(region, 0)], 3. + 4.);
    }

    #[test]
    fn aggregates_sort_before_their_children() {
        let y = trend_hierarchy(&[2, 2], 1, false);
        let out = Aggregator::default().fit_transform(&y, None).unwrap();
        let keys = out.as_frame().unwrap().index().keys().to_vec();

        assert_eq!(keys[0], key(&[TOTAL, TOTAL], 0));
        assert_eq!(keys[1], key(&["a0", TOTAL], 0));
        assert_eq!(keys[2], key(&["a0", "b0"], 0));
    }

    #[test]
    fn single_children_are_flattened() {
        let y = trend_hierarchy(&[3, 1], 2, true);

        let flat = Aggregator::default().fit_transform(&y, None).unwrap();
        // 3 bottom nodes and the total
        assert_eq!(flat.as_frame().unwrap().nrows(), 8);

        let mut full = AggregatorParams::new()
            .flatten_single_levels(false)
            .build()
            .unwrap();
        let full = full.fit_transform(&y, None).unwrap();
        assert_eq!(full.as_frame().unwrap().nrows(), 14);
    }

    #[test]
    fn aggregating_twice_is_idempotent() {
        let y = trend_hierarchy(&[2, 3], 4, true);
        let mut aggregator = Aggregator::default();
        let once = aggregator.fit_transform(&y, None).unwrap();
        let twice = aggregator.transform(&once, None).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn inverse_drops_the_aggregates() {
        let y = trend_hierarchy(&[2, 2], 3, true);
        let mut aggregator = Aggregator::default();
        let out = aggregator.fit_transform(&y, None).unwrap();
        let back = aggregator.inverse_transform(&out, None).unwrap();

        assert!(has_aggregates(out.as_frame().unwrap()));
        assert!(!has_aggregates(back.as_frame().unwrap()));
        assert_eq!(back, y);
    }

    #[test]
    fn rejects_frames_without_bottom_rows() {
        let index = hierarchy_index(&[2], 3, true);
        let frame = IndexedFrame::new(index, vec!["y".into()], Array2::<f64>::zeros((6, 1)))
            .unwrap();

        assert!(aggregate(&frame.select_rows(&[]), true).is_err());
        assert!(aggregate(&IndexedFrame::from_array(Array2::<f64>::zeros((3, 1))), true).is_err());
    }

    #[test]
    fn flatten_parameter_is_exposed() {
        let mut aggregator = Aggregator::<f64>::default();
        aggregator
            .set_params(Params::new().with(FLATTEN_SINGLE_LEVELS, false))
            .unwrap();

        assert!(!aggregator.params.flatten_single_levels());
        assert!(aggregator
            .set_params(Params::new().with("flatten", true))
            .is_err());
    }
}
