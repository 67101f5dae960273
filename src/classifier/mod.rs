//! Compliance classification of feature records against a Baseline target
//!
//! Architecture: Domain Services - the classifier owns the only real decision logic
//! - Each record is judged independently by `decide`
//! - `classify` partitions the whole store into compliant and non-compliant sets
//! - The newly-available override runs after the primary rule and can only downgrade

use crate::domain::features::{BaselineStatus, FeatureRecord, FeatureStore};
use crate::domain::target::{ComplianceTarget, TargetLevel};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why a feature was judged compliant or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionBasis {
    /// Status is `high`
    WidelyAvailable,
    /// Status is `low`
    NewlyAvailable,
    /// Status is neither `high` nor `low`
    NotBaseline,
    /// Status is `low` but only widely available features are accepted
    NotYetWidelyAvailable,
    /// A recorded Baseline date falls in or before the target year
    AvailableBy { year: i32 },
    /// Dates exist but all fall after the target year
    NotAvailableBy { year: i32, earliest: i32 },
    /// No Baseline dates are recorded, so no year target can admit the feature
    NoBaselineDates,
    /// Forced non-compliant by the newly-available override
    NewlyAvailableRejected,
}

impl fmt::Display for DecisionBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WidelyAvailable => f.write_str("widely available"),
            Self::NewlyAvailable => f.write_str("newly available"),
            Self::NotBaseline => f.write_str("not part of Baseline"),
            Self::NotYetWidelyAvailable => f.write_str("newly available but not yet widely available"),
            Self::AvailableBy { year } => write!(f, "Baseline since {year}"),
            Self::NotAvailableBy { year, earliest } => {
                write!(f, "not Baseline until {earliest} (after {year})")
            }
            Self::NoBaselineDates => f.write_str("no Baseline dates recorded"),
            Self::NewlyAvailableRejected => f.write_str("newly available features are rejected"),
        }
    }
}

/// Verdict for a single feature record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub compliant: bool,
    pub basis: DecisionBasis,
}

impl Decision {
    fn compliant(basis: DecisionBasis) -> Self {
        Self { compliant: true, basis }
    }

    fn non_compliant(basis: DecisionBasis) -> Self {
        Self { compliant: false, basis }
    }
}

/// Judge one record against the target
pub fn decide(record: &FeatureRecord, target: &ComplianceTarget) -> Decision {
    let primary = match target.level {
        TargetLevel::Widely => match record.baseline_status {
            BaselineStatus::High => Decision::compliant(DecisionBasis::WidelyAvailable),
            BaselineStatus::Low => Decision::non_compliant(DecisionBasis::NotYetWidelyAvailable),
            BaselineStatus::None => Decision::non_compliant(DecisionBasis::NotBaseline),
        },
        TargetLevel::Newly => match record.baseline_status {
            BaselineStatus::High => Decision::compliant(DecisionBasis::WidelyAvailable),
            BaselineStatus::Low => Decision::compliant(DecisionBasis::NewlyAvailable),
            BaselineStatus::None => Decision::non_compliant(DecisionBasis::NotBaseline),
        },
        TargetLevel::Year(year) => decide_by_year(record, year),
    };

    if target.fail_on_newly_available && record.baseline_status == BaselineStatus::Low {
        return Decision::non_compliant(DecisionBasis::NewlyAvailableRejected);
    }

    primary
}

/// Dates are authoritative for year targets; status alone never qualifies
fn decide_by_year(record: &FeatureRecord, year: i32) -> Decision {
    let earliest = [record.low_year(), record.high_year()]
        .into_iter()
        .flatten()
        .min();

    match earliest {
        Some(earliest) if earliest <= year => {
            Decision::compliant(DecisionBasis::AvailableBy { year: earliest })
        }
        Some(earliest) => Decision::non_compliant(DecisionBasis::NotAvailableBy { year, earliest }),
        None => Decision::non_compliant(DecisionBasis::NoBaselineDates),
    }
}

/// Partition of the store's identifiers for one target
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub compliant: BTreeSet<String>,
    pub non_compliant: BTreeSet<String>,
    bases: BTreeMap<String, DecisionBasis>,
}

impl Classification {
    pub fn is_compliant(&self, feature_id: &str) -> bool {
        self.compliant.contains(feature_id)
    }

    pub fn is_non_compliant(&self, feature_id: &str) -> bool {
        self.non_compliant.contains(feature_id)
    }

    pub fn total(&self) -> usize {
        self.compliant.len() + self.non_compliant.len()
    }

    /// Basis of the decision reached for a classified feature
    pub fn basis(&self, feature_id: &str) -> Option<DecisionBasis> {
        self.bases.get(feature_id).copied()
    }
}

/// Partition every record in the store into compliant and non-compliant identifiers
pub fn classify(store: &FeatureStore, target: &ComplianceTarget) -> Classification {
    let mut classification = Classification::default();

    for record in store.records() {
        let decision = decide(record, target);
        if decision.compliant {
            classification.compliant.insert(record.id.clone());
        } else {
            classification.non_compliant.insert(record.id.clone());
        }
        classification.bases.insert(record.id.clone(), decision.basis);
    }

    if classification.compliant.is_empty() {
        tracing::warn!(
            "No features are compliant with target {} ({} features loaded); check the target and feature data",
            target,
            store.len()
        );
    } else {
        tracing::debug!(
            "Classified {} compliant and {} non-compliant features for {}",
            classification.compliant.len(),
            classification.non_compliant.len(),
            target
        );
    }

    classification
}
