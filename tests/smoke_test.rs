//! Smoke test to verify basic functionality

use mcdc_gate::*;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn smoke_test_single_decision() {
    let decision = Decision::from_cel("guard", "user.active && (role == \"admin\" || owner)", 8).unwrap();
    assert_eq!(decision.condition_count(), 3);

    let report = analyze_decision(&decision);
    assert!(report.mcdc_achievable);
    assert_eq!(report.required_test_cases.len(), 4);
    assert!(report.to_report().contains("✓ MCDC achievable"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["reason"], "satisfiable");
    assert_eq!(json["truth_table_row_count"], 8);
}

#[test]
fn smoke_test_config_and_run_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();

    let config_path = dir.path().join("gate.yaml");
    fs::write(&config_path, "changed_lines_threshold: 50\nmcdc_required: false\n").unwrap();
    let config = RunConfig::load(&config_path).unwrap();
    assert_eq!(config.changed_lines_threshold, 50.0);

    let run_path = dir.path().join("run.json");
    fs::write(
        &run_path,
        r#"{
            "run_id": "disk",
            "config": {"changed_lines_threshold": 50, "mcdc_required": false},
            "scope": {"changed_lines": [
                {"file": "x.rs", "line": 1},
                {"file": "x.rs", "line": 2}
            ]},
            "decisions": [{"id": "d", "expression": "p || q"}],
            "tests": [
                {"test_id": "first", "lines_hit": [{"file": "x.rs", "line": 1}]},
                {"test_id": "second", "lines_hit": [{"file": "x.rs", "line": 2}]}
            ]
        }"#,
    )
    .unwrap();

    let file = RunFile::load(&run_path).unwrap();
    assert_eq!(file.run_id, RunId::from("disk"));
    let outcome = replay(&file, true).unwrap();

    assert_eq!(outcome.halted_after, Some(1));
    let last = outcome.final_decision().unwrap();
    assert_eq!(last.reason, StopReason::ThresholdMet);
    assert!(outcome.to_report().contains("Halted after 1 test(s)"));
}

#[test]
fn smoke_test_schemas_generate() {
    let schema = schemars::schema_for!(RunConfig);
    let json = serde_json::to_string(&schema).unwrap();
    assert!(json.contains("changed_lines_threshold"));

    let stop = serde_json::to_string(&schemars::schema_for!(StopDecision)).unwrap();
    assert!(stop.contains("threshold_met"));
}
