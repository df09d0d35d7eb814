//! Capability merging for composites
//!
//! A composite supports a capability if every component on the data path supports it, unless
//! a component upstream removes the limiting condition. For example a chain containing a
//! padder makes the whole pipeline accept unequal length series even if the terminal
//! estimator does not. Capabilities without well defined merge semantics (multithreading,
//! contracting, train estimates) are switched off for every composite.
use crate::tags::{Tag, TagSet, OUTPUT_SERIES};

/// Walk the chain until a step removes the condition
///
/// Returns whether the chain can handle the condition and whether it removes it.
fn walk(steps: &[TagSet], handles: Tag, removes: Tag) -> (bool, bool) {
    for step in steps {
        if !step.flag(handles) {
            return (false, false);
        }
        if step.flag(removes) {
            return (true, true);
        }
    }
    (true, false)
}

fn conservative(tags: TagSet) -> TagSet {
    tags.with(Tag::Multithreading, false)
        .with(Tag::Contractable, false)
        .with(Tag::TrainEstimate, false)
}

/// Tags of a chain of transformers, from the fully resolved tags of its steps
pub fn merge_transformer_chain(steps: &[TagSet]) -> TagSet {
    let (missing, removes_missing) =
        walk(steps, Tag::MissingValues, Tag::RemovesMissingValues);
    let (unequal, removes_unequal) =
        walk(steps, Tag::UnequalLength, Tag::RemovesUnequalLength);
    let univariate_only = steps
        .iter()
        .any(|s| s.flag(Tag::UnivariateOnly) || !s.flag(Tag::Multivariate));
    let all = |tag: Tag| steps.iter().all(|s| s.flag(tag));
    let inverse = steps
        .iter()
        .all(|s| s.flag(Tag::InverseTransform) || s.flag(Tag::SkipInverseTransform));
    let output = steps
        .last()
        .and_then(|s| s.get(Tag::OutputDataType).cloned())
        .unwrap_or_else(|| OUTPUT_SERIES.into());

    conservative(
        TagSet::new()
            .with(Tag::Multivariate, !univariate_only)
            .with(Tag::UnivariateOnly, univariate_only)
            .with(Tag::MissingValues, missing)
            .with(Tag::RemovesMissingValues, removes_missing)
            .with(Tag::UnequalLength, unequal)
            .with(Tag::RemovesUnequalLength, removes_unequal)
            .with(Tag::FitIsEmpty, all(Tag::FitIsEmpty))
            .with(Tag::Instancewise, all(Tag::Instancewise))
            .with(Tag::InverseTransform, inverse)
            .with(Tag::OutputDataType, output),
    )
}

/// Tags of a transformer chain followed by a time series regressor or classifier
pub fn merge_collection_terminal(chain: &TagSet, terminal: &TagSet) -> TagSet {
    let multivariate = terminal.flag(Tag::Multivariate) && !chain.flag(Tag::UnivariateOnly);
    let missing = (terminal.flag(Tag::MissingValues) && chain.flag(Tag::MissingValues))
        || chain.flag(Tag::RemovesMissingValues);
    let unequal = (terminal.flag(Tag::UnequalLength) && chain.flag(Tag::UnequalLength))
        || chain.flag(Tag::RemovesUnequalLength);

    conservative(
        TagSet::new()
            .with(Tag::Multivariate, multivariate)
            .with(Tag::MissingValues, missing)
            .with(Tag::UnequalLength, unequal),
    )
}

/// Tags of a transformer chain followed by a tabular estimator
///
/// Tabular estimators only see fixed width rows, so unequal length input is supported only
/// if the chain removes it.
pub fn merge_tabular_terminal(chain: &TagSet, terminal: &TagSet) -> TagSet {
    let missing = (terminal.flag(Tag::MissingValues) && chain.flag(Tag::MissingValues))
        || chain.flag(Tag::RemovesMissingValues);

    conservative(
        TagSet::new()
            .with(Tag::Multivariate, !chain.flag(Tag::UnivariateOnly))
            .with(Tag::MissingValues, missing)
            .with(Tag::UnequalLength, chain.flag(Tag::RemovesUnequalLength)),
    )
}

/// Tags of a forecaster whose target is passed through a transformer chain
pub fn merge_forecasting_terminal(chain: &TagSet, forecaster: &TagSet) -> TagSet {
    let multivariate = forecaster.flag(Tag::Multivariate) && !chain.flag(Tag::UnivariateOnly);
    let missing = (forecaster.flag(Tag::MissingValues) && chain.flag(Tag::MissingValues))
        || chain.flag(Tag::RemovesMissingValues);

    conservative(
        TagSet::new()
            .with(Tag::Multivariate, multivariate)
            .with(Tag::MissingValues, missing)
            .with(
                Tag::IgnoresExogeneousX,
                forecaster.flag(Tag::IgnoresExogeneousX),
            )
            .with(Tag::RequiresFhInFit, forecaster.flag(Tag::RequiresFhInFit)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(multivariate: bool, missing: bool, removes_missing: bool) -> TagSet {
        TagSet::defaults()
            .with(Tag::Multivariate, multivariate)
            .with(Tag::MissingValues, missing)
            .with(Tag::RemovesMissingValues, removes_missing)
    }

    #[test]
    fn multivariate_requires_every_step() {
        let chain = merge_transformer_chain(&[step(true, false, false), step(true, false, false)]);
        assert!(chain.flag(Tag::Multivariate));
        assert!(!chain.flag(Tag::UnivariateOnly));

        let chain = merge_transformer_chain(&[step(true, false, false), step(false, false, false)]);
        assert!(!chain.flag(Tag::Multivariate));
        assert!(chain.flag(Tag::UnivariateOnly));
    }

    #[test]
    fn removes_override_relaxes_terminal() {
        let terminal = TagSet::defaults().with(Tag::MissingValues, false);
        let plain = merge_transformer_chain(&[step(true, false, false)]);
        let imputing = merge_transformer_chain(&[step(true, true, true), step(true, false, false)]);

        assert!(!merge_collection_terminal(&plain, &terminal).flag(Tag::MissingValues));
        assert!(merge_collection_terminal(&imputing, &terminal).flag(Tag::MissingValues));
    }

    #[test]
    fn removal_behind_a_blocking_step_does_not_count() {
        let chain = merge_transformer_chain(&[step(true, false, false), step(true, true, true)]);

        assert!(!chain.flag(Tag::MissingValues));
        assert!(!chain.flag(Tag::RemovesMissingValues));
    }

    #[test]
    fn composites_are_conservative() {
        let terminal = TagSet::defaults()
            .with(Tag::Multithreading, true)
            .with(Tag::Contractable, true)
            .with(Tag::TrainEstimate, true);
        let merged = merge_collection_terminal(&merge_transformer_chain(&[]), &terminal);

        assert!(!merged.flag(Tag::Multithreading));
        assert!(!merged.flag(Tag::Contractable));
        assert!(!merged.flag(Tag::TrainEstimate));
    }

    #[test]
    fn tabular_terminal_needs_equal_length() {
        let terminal = TagSet::defaults().with(Tag::UnequalLength, true);
        let chain = merge_transformer_chain(&[]);

        assert!(!merge_tabular_terminal(&chain, &terminal).flag(Tag::UnequalLength));
    }
}
