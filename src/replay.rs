//! Run file replay
//!
//! A run file bundles a config, the run scope, the in-scope decisions and an
//! ordered list of test executions. Replaying it drives a [`RunContext`]
//! exactly as a live test generator would: record each test, then ask the
//! stop engine. Test timestamps come from `elapsed_minutes`, so a replay is
//! deterministic.
//!
//! ```yaml
//! run_id: checkout-pr-42
//! config:
//!   changed_lines_threshold: 80
//!   plateau_test_count: 3
//! scope:
//!   changed_lines:
//!     - { file: src/checkout.rs, line: 10 }
//! decisions:
//!   - id: can_ship
//!     expression: "paid && (in_stock || backorder)"
//! tests:
//!   - test_id: ships_paid_in_stock
//!     elapsed_minutes: 2
//!     lines_hit: [{ file: src/checkout.rs, line: 10 }]
//!     conditions_resolved: [{ decision_id: can_ship, row: 6 }]
//! ```

use crate::config::RunConfig;
use crate::coverage::{BranchRef, CoverageDelta, LineRef, MarginalCoverage, RunScope};
use crate::decision::DecisionInput;
use crate::error::{Error, Result};
use crate::gaps::GapReport;
use crate::mcdc::{DecisionOutcome, McdcReport, RequiredCaseId};
use crate::run::{RunContext, RunId};
use crate::stop::StopDecision;
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// A recorded run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    #[serde(default = "default_run_id")]
    pub run_id: RunId,
    #[serde(default)]
    pub config: RunConfig,
    #[serde(default)]
    pub scope: RunScope,
    #[serde(default)]
    pub decisions: Vec<DecisionInput>,
    #[serde(default)]
    pub tests: Vec<TestStep>,
}

fn default_run_id() -> RunId {
    RunId::from("replay")
}

/// One test execution in a run file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TestStep {
    pub test_id: String,
    /// Minutes since run start; defaults to the previous test's time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_minutes: Option<u64>,
    #[serde(default)]
    pub lines_hit: BTreeSet<LineRef>,
    #[serde(default)]
    pub branches_hit: BTreeSet<BranchRef>,
    #[serde(default)]
    pub conditions_resolved: BTreeSet<RequiredCaseId>,
}

impl TestStep {
    pub fn delta(&self) -> CoverageDelta {
        CoverageDelta {
            lines_hit: self.lines_hit.clone(),
            branches_hit: self.branches_hit.clone(),
            conditions_resolved: self.conditions_resolved.clone(),
        }
    }
}

impl RunFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_norway::from_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a run file; `.json` is read as JSON, anything else as YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }
}

/// One replayed test and the verdict that followed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReplayStep {
    pub marginal: MarginalCoverage,
    pub decision: StopDecision,
}

/// Result of replaying a run file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReplayOutcome {
    pub run_id: RunId,
    pub reports: Vec<McdcReport>,
    pub rejected: Vec<DecisionOutcome>,
    pub steps: Vec<ReplayStep>,
    /// Number of tests replayed before the run was halted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_after: Option<usize>,
    pub gaps: GapReport,
}

impl ReplayOutcome {
    pub fn final_decision(&self) -> Option<&StopDecision> {
        self.steps.last().map(|s| &s.decision)
    }

    pub fn to_report(&self) -> String {
        let mut out = format!(
            "Run {}: {} decisions analyzed, {} rejected, {} tests replayed\n\n",
            self.run_id,
            self.reports.len(),
            self.rejected.len(),
            self.steps.len()
        );
        for step in &self.steps {
            out.push_str(&format!(
                "{} (+{} items)\n",
                step.marginal.test_id,
                step.marginal.count()
            ));
            out.push_str(&step.decision.to_report());
        }
        if let Some(n) = self.halted_after {
            out.push_str(&format!("\nHalted after {} test(s)\n", n));
        }
        out.push('\n');
        out.push_str(&self.gaps.to_report());
        out
    }
}

/// Replay starting now
pub fn replay(file: &RunFile, halt_on_stop: bool) -> Result<ReplayOutcome> {
    replay_at(file, halt_on_stop, Utc::now())
}

/// Replay with the run starting at `started_at`. With `halt_on_stop`, the
/// run is halted at the first stop verdict and later tests are skipped.
pub fn replay_at(
    file: &RunFile,
    halt_on_stop: bool,
    started_at: DateTime<Utc>,
) -> Result<ReplayOutcome> {
    let mut run = RunContext::start_at(
        file.run_id.clone(),
        file.config.clone(),
        file.scope.clone(),
        &file.decisions,
        started_at,
    )?;

    let mut clock = started_at;
    let mut steps = Vec::with_capacity(file.tests.len());
    let mut halted_after = None;

    for (i, test) in file.tests.iter().enumerate() {
        if let Some(minutes) = test.elapsed_minutes {
            let offset = i64::try_from(minutes)
                .ok()
                .and_then(Duration::try_minutes)
                .ok_or_else(|| Error::Other(format!("elapsed_minutes out of range: {}", minutes)))?;
            clock = clock.max(started_at + offset);
        }

        let marginal = run.record_test_at(&test.test_id, &test.delta(), clock)?;
        let decision = run.evaluate_at(clock)?;
        let stop = decision.should_stop;
        steps.push(ReplayStep { marginal, decision });

        if stop && halt_on_stop {
            run.halt();
            halted_after = Some(i + 1);
            break;
        }
    }

    Ok(ReplayOutcome {
        run_id: run.id().clone(),
        reports: run.reports().to_vec(),
        rejected: run.rejected().to_vec(),
        steps,
        halted_after,
        gaps: run.gap_report()?,
    })
}
