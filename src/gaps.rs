//! Gap report: what a run has not covered yet
//!
//! Turns a snapshot into an actionable list for the test generator:
//! uncovered changed and new lines grouped into per-file ranges, uncovered
//! branches, and required MCDC test cases that no test has resolved.

use crate::coverage::{BranchRef, CoverageMetrics, CoverageSnapshot, LineRef};
use crate::mcdc::{McdcReport, McdcStatus, RequiredCaseId};
use crate::run::RunId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Contiguous uncovered lines of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LineRange {
    pub file: String,
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}:{}", self.file, self.start)
        } else {
            write!(f, "{}:{}-{}", self.file, self.start, self.end)
        }
    }
}

/// A required MCDC test case not observed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaseGap {
    pub decision_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub row: usize,
    pub assignment: String,
    pub expected_outcome: bool,
    pub proves: Vec<String>,
}

/// A decision no test can satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlockedDecision {
    pub decision_id: String,
    pub reason: McdcStatus,
    /// Masked condition names; empty when too complex to analyze
    pub conditions: Vec<String>,
}

/// Everything still uncovered in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GapReport {
    pub run_id: RunId,
    pub coverage: CoverageMetrics,
    pub uncovered_changed_lines: Vec<LineRange>,
    pub uncovered_new_lines: Vec<LineRange>,
    pub uncovered_branches: Vec<BranchRef>,
    pub missing_cases: Vec<CaseGap>,
    pub blocked_decisions: Vec<BlockedDecision>,
}

impl GapReport {
    pub fn build(snapshot: &CoverageSnapshot, reports: &[McdcReport]) -> Self {
        let observed = &snapshot.observed;
        let universe = &snapshot.universe;

        let uncovered = |lines: &BTreeSet<LineRef>| {
            to_ranges(lines.iter().filter(|l| !observed.lines.contains(*l)))
        };

        let missing_cases = reports
            .iter()
            .flat_map(|r| {
                r.required_test_cases
                    .iter()
                    .filter(|case| !observed.cases.contains(&RequiredCaseId::new(&r.decision_id, case.row)))
                    .map(|case| CaseGap {
                        decision_id: r.decision_id.clone(),
                        location: r.location.clone(),
                        row: case.row,
                        assignment: case.assignment.clone(),
                        expected_outcome: case.expected_outcome,
                        proves: case.proves.clone(),
                    })
            })
            .collect();

        let blocked_decisions = reports
            .iter()
            .filter(|r| !r.mcdc_achievable)
            .map(|r| BlockedDecision {
                decision_id: r.decision_id.clone(),
                reason: r.reason,
                conditions: r.unachievable_conditions.clone(),
            })
            .collect();

        Self {
            run_id: snapshot.run_id.clone(),
            coverage: snapshot.metrics(),
            uncovered_changed_lines: uncovered(&universe.changed_lines),
            uncovered_new_lines: uncovered(&universe.new_lines),
            uncovered_branches: universe
                .branches
                .iter()
                .filter(|b| !observed.branches.contains(*b))
                .cloned()
                .collect(),
            missing_cases,
            blocked_decisions,
        }
    }

    /// Nothing left that a test could still cover
    pub fn is_complete(&self) -> bool {
        self.uncovered_changed_lines.is_empty()
            && self.uncovered_new_lines.is_empty()
            && self.uncovered_branches.is_empty()
            && self.missing_cases.is_empty()
    }

    pub fn to_report(&self) -> String {
        let mut out = String::new();
        let c = &self.coverage;

        let status = if self.is_complete() {
            "✓ COMPLETE"
        } else {
            "✗ GAPS REMAIN"
        };
        out.push_str(&format!("Run {}: {}\n", self.run_id, status));
        out.push_str(&format!(
            "Coverage: {}/{} ({:.0}%)\n",
            c.overall.covered,
            c.overall.total,
            c.overall.percentage()
        ));

        section(&mut out, "Uncovered changed lines", &self.uncovered_changed_lines);
        section(&mut out, "Uncovered new lines", &self.uncovered_new_lines);
        section(&mut out, "Uncovered branches", &self.uncovered_branches);

        if !self.missing_cases.is_empty() {
            out.push_str(&format!("\nMissing MCDC cases ({}):\n", self.missing_cases.len()));
            for gap in &self.missing_cases {
                out.push_str(&format!(
                    "  {}#{}: {} → {}\n",
                    gap.decision_id,
                    gap.row,
                    gap.assignment,
                    if gap.expected_outcome { "T" } else { "F" }
                ));
                if !gap.proves.is_empty() {
                    out.push_str(&format!("    → proves {}\n", gap.proves.join(", ")));
                }
            }
        }

        if !self.blocked_decisions.is_empty() {
            out.push_str("\nDecisions that cannot reach MCDC:\n");
            for blocked in &self.blocked_decisions {
                match blocked.reason {
                    McdcStatus::TooComplex => out.push_str(&format!(
                        "  {} [TOO COMPLEX]\n",
                        blocked.decision_id
                    )),
                    _ => out.push_str(&format!(
                        "  {} [MASKED]: {}\n",
                        blocked.decision_id,
                        blocked.conditions.join(", ")
                    )),
                }
            }
        }

        out
    }
}

fn section<T: fmt::Display>(out: &mut String, title: &str, items: &[T]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n{}:\n", title));
    for item in items {
        out.push_str(&format!("  {}\n", item));
    }
}

/// Group sorted lines into contiguous per-file ranges
fn to_ranges<'a>(lines: impl Iterator<Item = &'a LineRef>) -> Vec<LineRange> {
    let mut ranges: Vec<LineRange> = Vec::new();
    for line in lines {
        match ranges.last_mut() {
            Some(r) if r.file == line.file && r.end + 1 == line.line => r.end = line.line,
            _ => ranges.push(LineRange {
                file: line.file.clone(),
                start: line.line,
                end: line.line,
            }),
        }
    }
    ranges
}
