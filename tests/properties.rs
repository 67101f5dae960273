//! Property-based tests for compliance classification and aggregation

use proptest::prelude::*;

use baseline_guard::{
    aggregate, classify, BaselineStatus, ComplianceTarget, FeatureRecord, FeatureStore,
    TargetLevel, UsageCandidate,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;

// ============================================================================
// Strategies
// ============================================================================

fn arb_status() -> impl Strategy<Value = BaselineStatus> {
    prop_oneof![
        Just(BaselineStatus::None),
        Just(BaselineStatus::Low),
        Just(BaselineStatus::High),
    ]
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2010i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("day 1-28 is always valid"))
}

fn arb_record() -> impl Strategy<Value = FeatureRecord> {
    (
        "[a-z]{1,8}(\\.[a-z-]{1,10}){0,2}",
        arb_status(),
        prop::option::of(arb_date()),
        prop::option::of(arb_date()),
    )
        .prop_map(|(id, status, low, high)| {
            let mut record = FeatureRecord::new(id, status);
            record.low_date = low;
            record.high_date = high;
            record
        })
}

fn arb_store() -> impl Strategy<Value = FeatureStore> {
    prop::collection::vec(arb_record(), 0..40).prop_map(FeatureStore::from_records)
}

fn arb_target() -> impl Strategy<Value = ComplianceTarget> {
    (
        prop_oneof![
            Just(TargetLevel::Widely),
            Just(TargetLevel::Newly),
            (2005i32..2035).prop_map(TargetLevel::Year),
        ],
        any::<bool>(),
    )
        .prop_map(|(level, fail_on_newly)| ComplianceTarget::new(level, fail_on_newly))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every identifier lands in exactly one side of the partition
    #[test]
    fn property_classification_partitions_store(store in arb_store(), target in arb_target()) {
        let classification = classify(&store, &target);

        prop_assert!(classification.compliant.is_disjoint(&classification.non_compliant));

        let union: BTreeSet<&str> = classification
            .compliant
            .iter()
            .chain(classification.non_compliant.iter())
            .map(String::as_str)
            .collect();
        let all: BTreeSet<&str> = store.all_ids().collect();
        prop_assert_eq!(union, all);
    }

    /// Rejecting newly available features never grows the compliant set
    #[test]
    fn property_override_never_grows_compliant_set(store in arb_store(), target in arb_target()) {
        let plain = classify(&store, &ComplianceTarget::new(target.level, false));
        let strict = classify(&store, &ComplianceTarget::new(target.level, true));

        prop_assert!(strict.compliant.is_subset(&plain.compliant));
        for id in &strict.compliant {
            let record = store.lookup(id).expect("classified ids come from the store");
            prop_assert_ne!(record.baseline_status, BaselineStatus::Low);
        }
    }

    /// Features without status or dates are never compliant
    #[test]
    fn property_no_evidence_is_never_compliant(id in "[a-z]{1,12}", target in arb_target()) {
        let store = FeatureStore::from_records(vec![FeatureRecord::new(id.clone(), BaselineStatus::None)]);
        prop_assert!(classify(&store, &target).is_non_compliant(&id));
    }

    /// Aggregation keeps exactly the non-compliant candidates, in order
    #[test]
    fn property_aggregation_filters_in_order(
        store in arb_store(),
        target in arb_target(),
        picks in prop::collection::vec((any::<prop::sample::Index>(), 1u32..500), 0..30),
    ) {
        let ids: Vec<String> = store.all_ids().map(str::to_string).collect();
        prop_assume!(!ids.is_empty());

        let candidates: Vec<UsageCandidate> = picks
            .iter()
            .map(|(index, line)| {
                UsageCandidate::new(index.get(&ids).clone(), "style.css")
                    .with_position(Some(*line), Some(1))
            })
            .collect();

        let classification = classify(&store, &target);
        let aggregation = aggregate(candidates.clone(), &classification.non_compliant, &target);

        let expected: Vec<(String, u32)> = candidates
            .iter()
            .filter(|c| classification.is_non_compliant(&c.feature_id))
            .map(|c| (c.feature_id.clone(), c.line.unwrap_or_default()))
            .collect();
        let actual: Vec<(String, u32)> = aggregation
            .violations
            .iter()
            .map(|v| (v.feature_id.clone(), v.line.as_option().unwrap_or_default()))
            .collect();

        prop_assert_eq!(&actual, &expected);
        prop_assert_eq!(aggregation.failed, !expected.is_empty());
    }
}
