//! Coverage aggregation for a single run
//!
//! The aggregator owns the run's [`CoverageSnapshot`]. Every recorded test
//! adds the in-scope items it hit that were not observed before; the
//! snapshot only ever grows. Observed items are sets, so recording the same
//! delta twice yields nothing new the second time.
//!
//! Items outside the coverable universe (lines that did not change, unknown
//! branches or test cases) are counted but never add marginal coverage.

use crate::error::{Error, Result};
use crate::mcdc::{McdcReport, McdcStatus, RequiredCaseId};
use crate::run::RunId;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A source line
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct LineRef {
    pub file: String,
    pub line: u32,
}

impl LineRef {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One outcome of a branch point
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct BranchRef {
    pub file: String,
    pub line: u32,
    /// Branch outcome label, e.g. `true` / `false` or a match arm index
    pub outcome: String,
}

impl BranchRef {
    pub fn new(file: impl Into<String>, line: u32, outcome: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            outcome: outcome.into(),
        }
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}]", self.file, self.line, self.outcome)
    }
}

/// Lines and branches in scope for a run, supplied by the diff layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RunScope {
    #[serde(default)]
    pub changed_lines: BTreeSet<LineRef>,
    /// Lines added by the change
    #[serde(default)]
    pub new_lines: BTreeSet<LineRef>,
    #[serde(default)]
    pub branches: BTreeSet<BranchRef>,
}

/// MCDC requirement of one in-scope decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DecisionRequirement {
    pub achievable: bool,
    pub status: McdcStatus,
    /// Required truth table rows
    pub rows: BTreeSet<usize>,
}

/// Everything a run can cover
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverableUniverse {
    pub changed_lines: BTreeSet<LineRef>,
    pub new_lines: BTreeSet<LineRef>,
    pub branches: BTreeSet<BranchRef>,
    pub decisions: BTreeMap<String, DecisionRequirement>,
}

impl CoverableUniverse {
    pub fn new(scope: RunScope, reports: &[McdcReport]) -> Self {
        let decisions = reports
            .iter()
            .map(|r| {
                (
                    r.decision_id.clone(),
                    DecisionRequirement {
                        achievable: r.mcdc_achievable,
                        status: r.reason,
                        rows: r.required_test_cases.iter().map(|c| c.row).collect(),
                    },
                )
            })
            .collect();

        Self {
            changed_lines: scope.changed_lines,
            new_lines: scope.new_lines,
            branches: scope.branches,
            decisions,
        }
    }

    pub fn contains_line(&self, line: &LineRef) -> bool {
        self.changed_lines.contains(line) || self.new_lines.contains(line)
    }

    pub fn contains_case(&self, case: &RequiredCaseId) -> bool {
        self.decisions
            .get(&case.decision_id)
            .is_some_and(|d| d.rows.contains(&case.row))
    }

    /// Distinct coverable lines (changed ∪ new)
    pub fn line_count(&self) -> usize {
        self.changed_lines.union(&self.new_lines).count()
    }

    pub fn required_case_count(&self) -> usize {
        self.decisions.values().map(|d| d.rows.len()).sum()
    }

    /// All coverable items: lines, branches and required test cases
    pub fn total(&self) -> usize {
        self.line_count() + self.branches.len() + self.required_case_count()
    }

    pub fn required_cases(&self) -> impl Iterator<Item = RequiredCaseId> + '_ {
        self.decisions.iter().flat_map(|(id, d)| {
            d.rows
                .iter()
                .map(move |row| RequiredCaseId::new(id.clone(), *row))
        })
    }
}

/// Per-test coverage delta pushed in by the test runner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CoverageDelta {
    #[serde(default)]
    pub lines_hit: BTreeSet<LineRef>,
    #[serde(default)]
    pub branches_hit: BTreeSet<BranchRef>,
    #[serde(default)]
    pub conditions_resolved: BTreeSet<RequiredCaseId>,
}

impl CoverageDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, file: &str, line: u32) -> Self {
        self.lines_hit.insert(LineRef::new(file, line));
        self
    }

    pub fn lines(mut self, file: &str, lines: impl IntoIterator<Item = u32>) -> Self {
        self.lines_hit
            .extend(lines.into_iter().map(|l| LineRef::new(file, l)));
        self
    }

    pub fn branch(mut self, file: &str, line: u32, outcome: &str) -> Self {
        self.branches_hit.insert(BranchRef::new(file, line, outcome));
        self
    }

    pub fn case(mut self, decision_id: &str, row: usize) -> Self {
        self.conditions_resolved
            .insert(RequiredCaseId::new(decision_id, row));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines_hit.is_empty() && self.branches_hit.is_empty() && self.conditions_resolved.is_empty()
    }
}

/// Coverage newly contributed by one test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarginalCoverage {
    pub test_id: String,
    pub lines: Vec<LineRef>,
    pub branches: Vec<BranchRef>,
    pub cases: Vec<RequiredCaseId>,
    /// Marginal items / total coverable items
    pub effectiveness: f64,
}

impl MarginalCoverage {
    pub fn count(&self) -> usize {
        self.lines.len() + self.branches.len() + self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Audit entry for one recorded test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestRecord {
    pub sequence: usize,
    pub test_id: String,
    pub recorded_at: DateTime<Utc>,
    pub marginal_lines: usize,
    pub marginal_branches: usize,
    pub marginal_cases: usize,
    pub out_of_scope: usize,
    pub effectiveness: f64,
}

impl TestRecord {
    pub fn marginal(&self) -> usize {
        self.marginal_lines + self.marginal_branches + self.marginal_cases
    }
}

/// Items observed so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObservedSet {
    pub lines: BTreeSet<LineRef>,
    pub branches: BTreeSet<BranchRef>,
    pub cases: BTreeSet<RequiredCaseId>,
}

/// Cumulative coverage state of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageSnapshot {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub universe: CoverableUniverse,
    pub observed: ObservedSet,
    pub tests: Vec<TestRecord>,
}

/// Covered / total for one category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ratio {
    pub covered: usize,
    pub total: usize,
}

impl Ratio {
    pub fn new(covered: usize, total: usize) -> Self {
        Self { covered, total }
    }

    /// Fraction in [0, 1]; an empty category counts as fully covered
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.covered as f64 / self.total as f64
        }
    }

    pub fn percentage(&self) -> f64 {
        self.fraction() * 100.0
    }
}

/// Coverage ratios derived from a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageMetrics {
    pub changed_lines: Ratio,
    pub new_lines: Ratio,
    pub branches: Ratio,
    pub mcdc_cases: Ratio,
    pub overall: Ratio,
    pub decisions_total: usize,
    /// Decisions that are achievable and have every required case observed
    pub decisions_satisfied: usize,
    pub decisions_unachievable: usize,
    pub tests_recorded: usize,
    /// Trailing run of tests that added nothing
    pub consecutive_zero_gain_tests: usize,
    pub last_effectiveness: Option<f64>,
    pub mean_effectiveness: f64,
}

impl CoverageSnapshot {
    fn new(run_id: RunId, universe: CoverableUniverse, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            universe,
            observed: ObservedSet::default(),
            tests: Vec::new(),
        }
    }

    pub fn consecutive_zero_gain_tests(&self) -> usize {
        self.tests
            .iter()
            .rev()
            .take_while(|t| t.marginal() == 0)
            .count()
    }

    /// Whether an achievable decision has all of its required cases observed
    pub fn decision_satisfied(&self, decision_id: &str) -> bool {
        self.universe.decisions.get(decision_id).is_some_and(|d| {
            d.achievable
                && d.rows
                    .iter()
                    .all(|row| self.observed.cases.contains(&RequiredCaseId::new(decision_id, *row)))
        })
    }

    pub fn metrics(&self) -> CoverageMetrics {
        let u = &self.universe;
        let o = &self.observed;

        let changed = u
            .changed_lines
            .iter()
            .filter(|l| o.lines.contains(*l))
            .count();
        let new = u.new_lines.iter().filter(|l| o.lines.contains(*l)).count();

        let decisions_satisfied = u
            .decisions
            .keys()
            .filter(|id| self.decision_satisfied(id))
            .count();
        let decisions_unachievable = u.decisions.values().filter(|d| !d.achievable).count();

        let covered_total = o.lines.len() + o.branches.len() + o.cases.len();
        let mean_effectiveness = if self.tests.is_empty() {
            0.0
        } else {
            self.tests.iter().map(|t| t.effectiveness).sum::<f64>() / self.tests.len() as f64
        };

        CoverageMetrics {
            changed_lines: Ratio::new(changed, u.changed_lines.len()),
            new_lines: Ratio::new(new, u.new_lines.len()),
            branches: Ratio::new(o.branches.len(), u.branches.len()),
            mcdc_cases: Ratio::new(o.cases.len(), u.required_case_count()),
            overall: Ratio::new(covered_total, u.total()),
            decisions_total: u.decisions.len(),
            decisions_satisfied,
            decisions_unachievable,
            tests_recorded: self.tests.len(),
            consecutive_zero_gain_tests: self.consecutive_zero_gain_tests(),
            last_effectiveness: self.tests.last().map(|t| t.effectiveness),
            mean_effectiveness,
        }
    }
}

/// Aggregates per-test deltas into one run's snapshot
#[derive(Debug, Clone)]
pub struct CoverageAggregator {
    run_id: RunId,
    snapshot: Option<CoverageSnapshot>,
}

impl CoverageAggregator {
    /// An aggregator with no run started yet
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            snapshot: None,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn is_started(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Initialize the run's snapshot
    pub fn start(&mut self, universe: CoverableUniverse, started_at: DateTime<Utc>) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::DuplicateRun(self.run_id.clone()));
        }
        tracing::info!(
            run = %self.run_id,
            coverable = universe.total(),
            decisions = universe.decisions.len(),
            "coverage run started"
        );
        self.snapshot = Some(CoverageSnapshot::new(self.run_id.clone(), universe, started_at));
        Ok(())
    }

    pub fn snapshot(&self) -> Result<&CoverageSnapshot> {
        self.snapshot
            .as_ref()
            .ok_or_else(|| Error::UnknownRun(self.run_id.clone()))
    }

    pub fn metrics(&self) -> Result<CoverageMetrics> {
        self.snapshot().map(CoverageSnapshot::metrics)
    }

    /// Record one test execution now
    pub fn record_test(&mut self, test_id: &str, delta: &CoverageDelta) -> Result<MarginalCoverage> {
        self.record_test_at(test_id, delta, Utc::now())
    }

    /// Record one test execution; returns only what was new
    pub fn record_test_at(
        &mut self,
        test_id: &str,
        delta: &CoverageDelta,
        at: DateTime<Utc>,
    ) -> Result<MarginalCoverage> {
        let snapshot = self
            .snapshot
            .as_mut()
            .ok_or_else(|| Error::UnknownRun(self.run_id.clone()))?;

        let mut marginal = MarginalCoverage {
            test_id: test_id.to_string(),
            ..Default::default()
        };
        let mut out_of_scope = 0;

        for line in &delta.lines_hit {
            if !snapshot.universe.contains_line(line) {
                out_of_scope += 1;
            } else if snapshot.observed.lines.insert(line.clone()) {
                marginal.lines.push(line.clone());
            }
        }
        for branch in &delta.branches_hit {
            if !snapshot.universe.branches.contains(branch) {
                out_of_scope += 1;
            } else if snapshot.observed.branches.insert(branch.clone()) {
                marginal.branches.push(branch.clone());
            }
        }
        for case in &delta.conditions_resolved {
            if !snapshot.universe.contains_case(case) {
                out_of_scope += 1;
            } else if snapshot.observed.cases.insert(case.clone()) {
                marginal.cases.push(case.clone());
            }
        }

        let total = snapshot.universe.total();
        marginal.effectiveness = if total == 0 {
            0.0
        } else {
            marginal.count() as f64 / total as f64
        };

        snapshot.tests.push(TestRecord {
            sequence: snapshot.tests.len() + 1,
            test_id: test_id.to_string(),
            recorded_at: at,
            marginal_lines: marginal.lines.len(),
            marginal_branches: marginal.branches.len(),
            marginal_cases: marginal.cases.len(),
            out_of_scope,
            effectiveness: marginal.effectiveness,
        });

        tracing::debug!(
            run = %self.run_id,
            test = test_id,
            marginal = marginal.count(),
            out_of_scope,
            "recorded test"
        );

        Ok(marginal)
    }
}
