//! End-to-end scenarios: decision analysis through stop decisions

use chrono::{Duration, Utc};
use mcdc_gate::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn changed_lines(count: u32) -> RunScope {
    RunScope {
        changed_lines: (1..=count).map(|l| LineRef::new("src/order.rs", l)).collect(),
        ..Default::default()
    }
}

#[test]
fn test_a_and_b_or_c_analysis() {
    let decision = Decision::from_cel("ship", "A && (B || C)", 8).unwrap();
    let table = decision.truth_table();

    assert_eq!(table.len(), 8);
    let outcomes: Vec<bool> = table.rows().iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![false, false, false, false, false, true, true, true]
    );

    let report = analyze_decision(&decision);
    assert!(report.mcdc_achievable);
    assert_eq!(report.reason, McdcStatus::Satisfiable);
    assert_eq!(report.truth_table_row_count, 8);
    assert!((3..=4).contains(&report.required_test_cases.len()));
    assert_eq!(report.independence_pairs.len(), 3);
    assert_eq!(report.condition_names, vec!["A", "B", "C"]);
}

#[test]
fn test_decision_graph_matches_cel() {
    let graph: DecisionGraph = serde_json::from_str(
        r#"{
            "id": "ship",
            "conditions": [{"id": "A"}, {"id": "B"}, {"id": "C"}],
            "nodes": [
                {"op": "condition", "condition": "A"},
                {"op": "condition", "condition": "B"},
                {"op": "condition", "condition": "C"},
                {"op": "or", "operands": [1, 2]},
                {"op": "and", "operands": [0, 3]}
            ],
            "root": 4
        }"#,
    )
    .unwrap();
    let from_graph = Decision::from_graph(&graph, 8).unwrap();
    let from_cel = Decision::from_cel("ship", "A && (B || C)", 8).unwrap();

    assert_eq!(from_graph.fingerprint(), from_cel.fingerprint());
    assert_eq!(
        analyze_decision(&from_graph).required_test_cases,
        analyze_decision(&from_cel).required_test_cases
    );
}

#[rstest]
#[case::too_complex("a && b && c && d && e", 4, McdcStatus::TooComplex)]
#[case::masked("a || (a && b)", 8, McdcStatus::MaskedConditions)]
#[case::satisfiable("a || b", 8, McdcStatus::Satisfiable)]
fn test_decision_status(#[case] expr: &str, #[case] max: usize, #[case] expected: McdcStatus) {
    let inputs = vec![DecisionInput::cel("d", expr)];
    let config = RunConfig::default().with_max_conditions(max);
    let outcomes = analyze_decisions(&inputs, &config);
    let report = outcomes[0].report().unwrap();
    assert_eq!(report.reason, expected);
    assert_eq!(report.mcdc_achievable, expected == McdcStatus::Satisfiable);
}

#[test]
fn test_one_bad_decision_does_not_fail_the_set() {
    let inputs = vec![
        DecisionInput::cel("good", "x && y"),
        DecisionInput::cel("bad", "x && ("),
    ];
    let outcomes = analyze_decisions(&inputs, &RunConfig::default());
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].report().is_some());
    assert!(matches!(
        &outcomes[1],
        DecisionOutcome::Rejected { decision_id, .. } if decision_id == "bad"
    ));
}

#[test]
fn test_continue_below_threshold() {
    let start = Utc::now();
    let config = RunConfig::default().with_mcdc_required(false);
    let mut run = RunContext::start_at(RunId::from("s1"), config, changed_lines(20), &[], start)
        .unwrap();

    run.record_test_at(
        "t1",
        &CoverageDelta::new().lines("src/order.rs", 1..=11),
        start,
    )
    .unwrap();
    let first = run.evaluate_at(start).unwrap();
    assert!(!first.should_stop);
    assert_eq!(first.reason, StopReason::Continue);
    assert!((first.confidence - 0.6875).abs() < 1e-9);

    // 60% after a test adding 5% of the changed lines
    let marginal = run
        .record_test_at("t2", &CoverageDelta::new().line("src/order.rs", 12), start)
        .unwrap();
    assert!((marginal.effectiveness - 0.05).abs() < 1e-9);
    let second = run.evaluate_at(start).unwrap();
    assert_eq!(second.reason, StopReason::Continue);
    assert!((second.confidence - 0.75).abs() < 1e-9);
    assert_eq!(run.history().len(), 2);
}

#[test]
fn test_plateau_after_zero_gain_tests() {
    let start = Utc::now();
    let mut run = RunContext::start_at(
        RunId::from("s2"),
        RunConfig::default(),
        changed_lines(20),
        &[],
        start,
    )
    .unwrap();
    run.record_test_at("t0", &CoverageDelta::new().lines("src/order.rs", 1..=5), start)
        .unwrap();

    for i in 1..=4 {
        run.record_test_at(
            &format!("t{}", i),
            &CoverageDelta::new().line("src/order.rs", 1),
            start,
        )
        .unwrap();
        assert_eq!(run.evaluate_at(start).unwrap().reason, StopReason::Continue);
    }
    run.record_test_at("t5", &CoverageDelta::new(), start).unwrap();

    let decision = run.evaluate_at(start).unwrap();
    assert!(decision.should_stop);
    assert_eq!(decision.reason, StopReason::Plateau);
    assert_eq!(decision.confidence, 1.0);
    assert_eq!(decision.metrics.coverage.consecutive_zero_gain_tests, 5);
}

#[test]
fn test_threshold_waits_for_mcdc() {
    let start = Utc::now();
    let inputs = vec![DecisionInput::cel("ship", "A && (B || C)").with_location("src/order.rs:3")];
    let mut run = RunContext::start_at(
        RunId::from("s3"),
        RunConfig::default(),
        changed_lines(5),
        &inputs,
        start,
    )
    .unwrap();
    let rows: Vec<usize> = run.reports()[0]
        .required_test_cases
        .iter()
        .map(|c| c.row)
        .collect();

    run.record_test_at("lines", &CoverageDelta::new().lines("src/order.rs", 1..=5), start)
        .unwrap();
    assert_eq!(run.evaluate_at(start).unwrap().reason, StopReason::Continue);

    for row in &rows {
        run.record_test_at(
            &format!("row{}", row),
            &CoverageDelta::new().case("ship", *row),
            start,
        )
        .unwrap();
    }
    let done = run.evaluate_at(start).unwrap();
    assert_eq!(done.reason, StopReason::ThresholdMet);
    assert!(done.metrics.mcdc_complete);
    assert!(run.gap_report().unwrap().is_complete());
}

#[test]
fn test_too_complex_blocks_threshold_when_mcdc_required() {
    let start = Utc::now();
    let inputs = vec![DecisionInput::cel("wide", "a && b && c")];
    let config = RunConfig::default().with_max_conditions(2);
    let mut run =
        RunContext::start_at(RunId::from("s4"), config, changed_lines(1), &inputs, start).unwrap();
    run.record_test_at("t1", &CoverageDelta::new().line("src/order.rs", 1), start)
        .unwrap();

    let decision = run.evaluate_at(start).unwrap();
    assert_eq!(decision.reason, StopReason::Continue);
    assert_eq!(decision.metrics.coverage.decisions_unachievable, 1);

    let later = run.evaluate_at(start + Duration::minutes(61)).unwrap();
    assert_eq!(later.reason, StopReason::TimeLimit);
}

#[test]
fn test_duplicate_decision_ids_fail_run_start() {
    let inputs = vec![
        DecisionInput::cel("check", "a && b").with_location("x.rs:1"),
        DecisionInput::cel("check", "p || q || r").with_location("y.rs:9"),
    ];
    let err = RunContext::start(RunId::from("dup"), RunConfig::default(), changed_lines(1), &inputs)
        .unwrap_err();
    assert!(matches!(err, Error::MalformedDecision { ref decision, .. } if decision == "check"));

    let decisions = vec![
        Decision::from_cel("check", "a && b", 8).unwrap(),
        Decision::from_cel("check", "p || q || r", 8).unwrap(),
    ];
    let err = RunContext::from_decisions(
        RunId::from("dup"),
        RunConfig::default(),
        changed_lines(1),
        decisions,
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::MalformedDecision { .. }));
}

#[test]
fn test_wide_decision_above_supported_ceiling_is_too_complex() {
    let expr: Vec<String> = (0..64).map(|i| format!("c{}", i)).collect();
    let err = Decision::from_cel("wide", &expr.join(" && "), 100).unwrap_err();
    assert!(matches!(
        err,
        Error::TooManyConditions {
            conditions: 64,
            max: MAX_SUPPORTED_CONDITIONS,
            ..
        }
    ));

    let input = DecisionInput::cel("wide", expr.join(" && "));
    let (decision, outcome) = McdcAnalyzer::new().analyze_input(&input, 100);
    assert!(decision.is_none());
    assert_eq!(outcome.report().unwrap().reason, McdcStatus::TooComplex);
}
