//! Joins usage candidates against the non-compliant set

use crate::classifier::Classification;
use crate::domain::target::ComplianceTarget;
use crate::domain::violations::{UsageCandidate, Violation};
use std::collections::BTreeSet;

/// Judged output of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Violations in candidate order
    pub violations: Vec<Violation>,
    /// True iff at least one violation was emitted
    pub failed: bool,
}

/// Turn candidates whose feature is non-compliant into violations
///
/// Candidate order is preserved, so the output is as deterministic as the input.
/// Candidates for unknown or compliant features are dropped.
pub fn aggregate<I>(
    candidates: I,
    non_compliant: &BTreeSet<String>,
    target: &ComplianceTarget,
) -> Aggregation
where
    I: IntoIterator<Item = UsageCandidate>,
{
    join(
        candidates,
        |feature_id| non_compliant.contains(feature_id),
        |feature_id| violation_reason(feature_id, target),
    )
}

/// Like [`aggregate`], with each reason also stating why the feature failed the target
pub fn aggregate_classified<I>(
    candidates: I,
    classification: &Classification,
    target: &ComplianceTarget,
) -> Aggregation
where
    I: IntoIterator<Item = UsageCandidate>,
{
    join(
        candidates,
        |feature_id| classification.is_non_compliant(feature_id),
        |feature_id| match classification.basis(feature_id) {
            Some(basis) => format!("{}: {basis}", violation_reason(feature_id, target)),
            None => violation_reason(feature_id, target),
        },
    )
}

fn join<I, F, R>(candidates: I, is_non_compliant: F, reason: R) -> Aggregation
where
    I: IntoIterator<Item = UsageCandidate>,
    F: Fn(&str) -> bool,
    R: Fn(&str) -> String,
{
    let violations: Vec<Violation> = candidates
        .into_iter()
        .filter(|candidate| is_non_compliant(&candidate.feature_id))
        .map(|candidate| {
            let reason = reason(&candidate.feature_id);
            Violation::from_candidate(candidate, reason)
        })
        .collect();

    let failed = !violations.is_empty();
    Aggregation { violations, failed }
}

fn violation_reason(feature_id: &str, target: &ComplianceTarget) -> String {
    format!("Feature '{feature_id}' is not compliant with {target}")
}
