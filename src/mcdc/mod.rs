//! MCDC analysis
//!
//! Turns a decision into its MCDC requirements: the truth table, the
//! independence pairs of every condition and a small set of required test
//! cases that demonstrate each condition's independent effect.
//!
//! ## Submodules
//!
//! - `independence` - independence-pair search over the truth table
//! - `select` - minimum test set selection (greedy set cover)
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcdc_gate::{analyze_decision, Decision};
//!
//! let decision = Decision::from_cel("auth", "admin && (owner || shared)", 8)?;
//! let report = analyze_decision(&decision);
//! for case in &report.required_test_cases {
//!     println!("{} -> {}", case.assignment, case.expected_outcome);
//! }
//! ```

mod independence;
mod select;

pub use independence::{find_independence_pairs, IndependenceAnalysis, IndependencePair};
pub use select::{GreedySelector, Selection, TestSetSelector};

use crate::config::RunConfig;
use crate::decision::{Decision, DecisionInput};
use crate::error::Error;
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a required test case within a run
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct RequiredCaseId {
    pub decision_id: String,
    pub row: usize,
}

impl RequiredCaseId {
    pub fn new(decision_id: impl Into<String>, row: usize) -> Self {
        Self {
            decision_id: decision_id.into(),
            row,
        }
    }
}

impl fmt::Display for RequiredCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.decision_id, self.row)
    }
}

/// Value of one condition in a required test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConditionValue {
    pub condition: String,
    pub value: bool,
}

/// A truth table row that a real test must exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequiredTestCase {
    pub decision_id: String,
    pub row: usize,
    /// Human-readable assignment, e.g. `A=T, B=F, C=T`
    pub assignment: String,
    pub values: Vec<ConditionValue>,
    pub expected_outcome: bool,
    /// Conditions whose independence pair uses this row
    pub proves: Vec<String>,
}

impl RequiredTestCase {
    pub fn id(&self) -> RequiredCaseId {
        RequiredCaseId::new(self.decision_id.clone(), self.row)
    }
}

/// Why a decision is or is not MCDC achievable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum McdcStatus {
    /// Every condition has an independence pair
    Satisfiable,
    /// Some conditions can never flip the outcome on their own
    MaskedConditions,
    /// More conditions than the configured maximum; not analyzed
    TooComplex,
}

/// Pair chosen to prove one condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChosenPair {
    pub condition: String,
    pub row_false: usize,
    pub row_true: usize,
}

/// Per-decision MCDC report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct McdcReport {
    pub decision_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Canonical expression text; empty when not analyzed
    pub expression: String,
    pub fingerprint: String,
    /// Number of conditions
    pub conditions: usize,
    pub condition_names: Vec<String>,
    pub mcdc_achievable: bool,
    pub reason: McdcStatus,
    pub required_test_cases: Vec<RequiredTestCase>,
    pub independence_pairs: Vec<ChosenPair>,
    pub truth_table_row_count: usize,
    pub unachievable_conditions: Vec<String>,
    /// Selector that produced the test cases
    pub selector: String,
}

impl McdcReport {
    /// Report for a decision rejected with `TooManyConditions`
    pub fn too_complex(
        decision_id: impl Into<String>,
        conditions: usize,
        location: Option<String>,
    ) -> Self {
        Self {
            decision_id: decision_id.into(),
            location,
            expression: String::new(),
            fingerprint: String::new(),
            conditions,
            condition_names: vec![],
            mcdc_achievable: false,
            reason: McdcStatus::TooComplex,
            required_test_cases: vec![],
            independence_pairs: vec![],
            truth_table_row_count: 0,
            unachievable_conditions: vec![],
            selector: String::new(),
        }
    }

    pub fn required_ids(&self) -> impl Iterator<Item = RequiredCaseId> + '_ {
        self.required_test_cases.iter().map(RequiredTestCase::id)
    }

    pub fn to_report(&self) -> String {
        let mut out = String::new();

        let status = match self.reason {
            McdcStatus::Satisfiable => "✓ MCDC achievable",
            McdcStatus::MaskedConditions => "✗ MCDC not achievable (masked conditions)",
            McdcStatus::TooComplex => "✗ Too complex, not analyzed",
        };
        out.push_str(&format!("Decision: {}\n", self.decision_id));
        if let Some(loc) = &self.location {
            out.push_str(&format!("Location: {}\n", loc));
        }
        if !self.expression.is_empty() {
            out.push_str(&format!("Expression: {}\n", self.expression));
        }
        out.push_str(&format!("Status: {}\n", status));
        out.push_str(&format!(
            "Conditions: {}, truth table rows: {}\n",
            self.conditions, self.truth_table_row_count
        ));

        if !self.unachievable_conditions.is_empty() {
            out.push_str(&format!(
                "Masked: {}\n",
                self.unachievable_conditions.join(", ")
            ));
        }

        if !self.independence_pairs.is_empty() {
            out.push_str("\nIndependence pairs:\n");
            for pair in &self.independence_pairs {
                out.push_str(&format!(
                    "  {}: rows {} / {}\n",
                    pair.condition, pair.row_false, pair.row_true
                ));
            }
        }

        if !self.required_test_cases.is_empty() {
            out.push_str(&format!(
                "\nRequired test cases ({}, {} selection):\n",
                self.required_test_cases.len(),
                self.selector
            ));
            for case in &self.required_test_cases {
                out.push_str(&format!(
                    "  [{:>3}] {} → {}  (proves {})\n",
                    case.row,
                    case.assignment,
                    if case.expected_outcome { "T" } else { "F" },
                    case.proves.join(", ")
                ));
            }
        }

        out
    }
}

/// Result of analyzing one decision input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecisionOutcome {
    Analyzed { report: McdcReport },
    Rejected { decision_id: String, error: String },
}

impl DecisionOutcome {
    pub fn report(&self) -> Option<&McdcReport> {
        match self {
            DecisionOutcome::Analyzed { report } => Some(report),
            DecisionOutcome::Rejected { .. } => None,
        }
    }
}

/// Analyze a decision with the greedy selector
pub fn analyze_decision(decision: &Decision) -> McdcReport {
    McdcAnalyzer::new().analyze(decision)
}

/// Analyze many decisions in parallel; one bad decision never fails the set
pub fn analyze_decisions(inputs: &[DecisionInput], config: &RunConfig) -> Vec<DecisionOutcome> {
    let analyzer = McdcAnalyzer::new();
    inputs
        .par_iter()
        .map(|input| analyzer.analyze_input(input, config.max_conditions_per_decision).1)
        .collect()
}

/// MCDC analyzer
pub struct McdcAnalyzer {
    selector: Box<dyn TestSetSelector>,
}

impl McdcAnalyzer {
    pub fn new() -> Self {
        Self {
            selector: Box::new(GreedySelector),
        }
    }

    pub fn with_selector(selector: Box<dyn TestSetSelector>) -> Self {
        Self { selector }
    }

    pub fn analyze(&self, decision: &Decision) -> McdcReport {
        let table = decision.truth_table();
        let analysis = find_independence_pairs(table);
        let selection = self.selector.select(table, &analysis);
        let names: Vec<String> = decision.conditions().iter().map(|c| c.id.clone()).collect();

        let required_test_cases = selection
            .rows
            .iter()
            .filter_map(|&index| table.row(index))
            .map(|row| {
                let values: Vec<ConditionValue> = names
                    .iter()
                    .zip(&row.values)
                    .map(|(name, value)| ConditionValue {
                        condition: name.clone(),
                        value: *value,
                    })
                    .collect();
                RequiredTestCase {
                    decision_id: decision.id().to_string(),
                    row: row.index,
                    assignment: format_assignment(&values),
                    values,
                    expected_outcome: row.outcome,
                    proves: selection
                        .conditions_proven_by(row.index)
                        .into_iter()
                        .map(|c| names[c].clone())
                        .collect(),
                }
            })
            .collect();

        let independence_pairs = selection
            .chosen_pairs
            .iter()
            .map(|p| ChosenPair {
                condition: names[p.condition].clone(),
                row_false: p.row_a,
                row_true: p.row_b,
            })
            .collect();

        let unachievable: Vec<String> = analysis
            .unachievable()
            .into_iter()
            .map(|c| names[c].clone())
            .collect();
        let achievable = unachievable.is_empty();

        tracing::debug!(
            decision = decision.id(),
            conditions = names.len(),
            rows = selection.len(),
            achievable,
            "analyzed decision"
        );

        McdcReport {
            decision_id: decision.id().to_string(),
            location: decision.location().map(str::to_string),
            expression: decision.expression(),
            fingerprint: decision.fingerprint(),
            conditions: names.len(),
            condition_names: names,
            mcdc_achievable: achievable,
            reason: if achievable {
                McdcStatus::Satisfiable
            } else {
                McdcStatus::MaskedConditions
            },
            required_test_cases,
            independence_pairs,
            truth_table_row_count: table.len(),
            unachievable_conditions: unachievable,
            selector: self.selector.name().to_string(),
        }
    }

    /// Build and analyze one input. `TooManyConditions` becomes a
    /// `too_complex` report; other errors reject the decision.
    pub fn analyze_input(
        &self,
        input: &DecisionInput,
        max_conditions: usize,
    ) -> (Option<Decision>, DecisionOutcome) {
        match input.build(max_conditions) {
            Ok(decision) => {
                let report = self.analyze(&decision);
                (Some(decision), DecisionOutcome::Analyzed { report })
            }
            Err(Error::TooManyConditions {
                decision,
                conditions,
                max,
            }) => {
                tracing::warn!(
                    decision = %decision,
                    conditions,
                    max,
                    "decision too complex for MCDC analysis"
                );
                let location = input.location().map(str::to_string);
                (
                    None,
                    DecisionOutcome::Analyzed {
                        report: McdcReport::too_complex(decision, conditions, location),
                    },
                )
            }
            Err(e) => {
                tracing::warn!(decision = input.id(), error = %e, "decision rejected");
                (
                    None,
                    DecisionOutcome::Rejected {
                        decision_id: input.id().to_string(),
                        error: e.to_string(),
                    },
                )
            }
        }
    }
}

impl Default for McdcAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn format_assignment(values: &[ConditionValue]) -> String {
    values
        .iter()
        .map(|v| format!("{}={}", v.condition, if v.value { "T" } else { "F" }))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_for_a_and_b_or_c() {
        let d = Decision::from_cel("d", "A && (B || C)", 8).unwrap();
        let report = analyze_decision(&d);

        assert!(report.mcdc_achievable);
        assert_eq!(report.reason, McdcStatus::Satisfiable);
        assert_eq!(report.conditions, 3);
        assert_eq!(report.truth_table_row_count, 8);
        assert!((3..=4).contains(&report.required_test_cases.len()));

        let first = &report.required_test_cases[0];
        assert_eq!(first.assignment, "A=F, B=F, C=T");
        assert!(!first.expected_outcome);
        assert_eq!(first.proves, vec!["A".to_string()]);
    }

    #[test]
    fn test_masked_report() {
        let d = Decision::from_cel("m", "a || (a && b)", 8).unwrap();
        let report = analyze_decision(&d);
        assert!(!report.mcdc_achievable);
        assert_eq!(report.reason, McdcStatus::MaskedConditions);
        assert_eq!(report.unachievable_conditions, vec!["b".to_string()]);
    }

    #[test]
    fn test_too_complex_input_yields_report() {
        let input = DecisionInput::cel("wide", "a && b && c && d");
        let (decision, outcome) = McdcAnalyzer::new().analyze_input(&input, 3);
        assert!(decision.is_none());
        let report = outcome.report().unwrap();
        assert_eq!(report.reason, McdcStatus::TooComplex);
        assert!(!report.mcdc_achievable);
        assert_eq!(report.conditions, 4);
        assert!(report.required_test_cases.is_empty());
    }

    #[test]
    fn test_analyze_decisions_isolates_failures() {
        let inputs = vec![
            DecisionInput::cel("ok", "a || b"),
            DecisionInput::cel("broken", "a && ("),
        ];
        let outcomes = analyze_decisions(&inputs, &RunConfig::default());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].report().is_some());
        assert!(matches!(
            &outcomes[1],
            DecisionOutcome::Rejected { decision_id, .. } if decision_id == "broken"
        ));
    }

    #[test]
    fn test_report_json_shape() {
        let d = Decision::from_cel("j", "a && b", 8).unwrap();
        let json = serde_json::to_value(analyze_decision(&d)).unwrap();
        assert_eq!(json["reason"], "satisfiable");
        assert_eq!(json["truth_table_row_count"], 4);
        assert_eq!(json["required_test_cases"].as_array().unwrap().len(), 3);
    }
}
