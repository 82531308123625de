//! Property-based tests for decision analysis and coverage aggregation
//!
//! Uses proptest to generate random decisions and verify invariants

use mcdc_gate::truth_table::index_for;
use mcdc_gate::*;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #[test]
    fn test_truth_table_rows_are_distinct(expr in any_expr()) {
        let decision = Decision::from_cel("p", &expr, 8).unwrap();
        let table = decision.truth_table();
        let n = decision.condition_count();

        prop_assert_eq!(table.len(), 1usize << n);
        let distinct: HashSet<&Vec<bool>> = table.rows().iter().map(|r| &r.values).collect();
        prop_assert_eq!(distinct.len(), table.len());
        for row in table.rows() {
            prop_assert_eq!(index_for(&row.values), row.index);
        }
    }

    #[test]
    fn test_evaluate_matches_table(expr in any_expr()) {
        let decision = Decision::from_cel("p", &expr, 8).unwrap();
        for row in decision.truth_table().rows() {
            let first = decision.evaluate(&row.values).unwrap();
            let second = decision.evaluate(&row.values).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(first, row.outcome);
        }
    }

    #[test]
    fn test_achievable_implies_pair_per_condition(expr in any_expr()) {
        let decision = Decision::from_cel("p", &expr, 8).unwrap();
        let analysis = find_independence_pairs(decision.truth_table());
        let report = analyze_decision(&decision);

        prop_assert_eq!(report.mcdc_achievable, analysis.achievable());
        if report.mcdc_achievable {
            for c in 0..decision.condition_count() {
                prop_assert!(!analysis.pairs(c).is_empty());
            }
            prop_assert_eq!(report.independence_pairs.len(), decision.condition_count());
        }
    }

    #[test]
    fn test_selection_size_bounds(expr in any_expr()) {
        let decision = Decision::from_cel("p", &expr, 8).unwrap();
        let report = analyze_decision(&decision);
        let n = decision.condition_count();

        if report.mcdc_achievable {
            let rows = report.required_test_cases.len();
            prop_assert!(rows > n, "{} rows for {} conditions in {}", rows, n, expr);
            prop_assert!(rows <= 2 * n, "{} rows for {} conditions in {}", rows, n, expr);
        }
    }

    #[test]
    fn test_chosen_pairs_are_selected_and_independent(expr in any_expr()) {
        let decision = Decision::from_cel("p", &expr, 8).unwrap();
        let table = decision.truth_table();
        let report = analyze_decision(&decision);
        let rows: HashSet<usize> = report.required_test_cases.iter().map(|c| c.row).collect();

        for pair in &report.independence_pairs {
            prop_assert!(rows.contains(&pair.row_false));
            prop_assert!(rows.contains(&pair.row_true));
            prop_assert_ne!(table.outcome(pair.row_false), table.outcome(pair.row_true));
            prop_assert_eq!((pair.row_false ^ pair.row_true).count_ones(), 1);
        }
    }

    #[test]
    fn test_recording_is_idempotent(lines in prop::collection::btree_set(1u32..40, 0..20)) {
        let scope = RunScope {
            changed_lines: (1..=30).map(|l| LineRef::new("a.rs", l)).collect(),
            ..Default::default()
        };
        let mut agg = CoverageAggregator::new(RunId::from("p"));
        agg.start(CoverableUniverse::new(scope, &[]), chrono::Utc::now()).unwrap();

        let delta = CoverageDelta::new().lines("a.rs", lines.iter().copied());
        let first = agg.record_test("t1", &delta).unwrap();
        let after_first = agg.metrics().unwrap();
        let second = agg.record_test("t2", &delta).unwrap();
        let after_second = agg.metrics().unwrap();

        prop_assert_eq!(first.lines.len(), lines.iter().filter(|l| **l <= 30).count());
        prop_assert!(second.is_empty());
        prop_assert_eq!(after_first.changed_lines, after_second.changed_lines);
    }

    #[test]
    fn test_threshold_met_is_stable(batches in prop::collection::vec(prop::collection::btree_set(1u32..=20, 0..8), 1..10)) {
        let scope = RunScope {
            changed_lines: (1..=20).map(|l| LineRef::new("a.rs", l)).collect(),
            ..Default::default()
        };
        let config = RunConfig::default()
            .with_mcdc_required(false)
            .with_plateau_test_count(100)
            .with_max_tests(1000);
        let mut run = RunContext::start(RunId::from("p"), config, scope, &[]).unwrap();

        let mut met = false;
        for (i, batch) in batches.iter().enumerate() {
            let delta = CoverageDelta::new().lines("a.rs", batch.iter().copied());
            run.record_test(&format!("t{}", i), &delta).unwrap();
            let decision = run.should_stop().unwrap();
            let now_met = decision.signals.contains(&StopReason::ThresholdMet);
            prop_assert!(!met || now_met);
            met = now_met;
        }
    }
}

fn any_expr() -> impl Strategy<Value = String> {
    let leaf = prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]).prop_map(String::from);
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(|v| format!("({})", v.join(" && "))),
            prop::collection::vec(inner.clone(), 2..4).prop_map(|v| format!("({})", v.join(" || "))),
            inner.prop_map(|e| format!("!({})", e)),
        ]
    })
}
