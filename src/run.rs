//! Run context and registry
//!
//! A [`RunContext`] is one test-generation run: its config, the analyzed
//! in-scope decisions, the coverage aggregator and the stop engine. It is
//! owned by the caller and mutated through `&mut self`.
//!
//! [`RunRegistry`] holds many concurrent runs. Each run sits behind its own
//! mutex, so recording into one run never blocks another.

use crate::config::RunConfig;
use crate::coverage::{
    CoverableUniverse, CoverageAggregator, CoverageDelta, CoverageMetrics, CoverageSnapshot,
    MarginalCoverage, RunScope,
};
use crate::decision::{Decision, DecisionInput};
use crate::error::{Error, Result};
use crate::gaps::GapReport;
use crate::mcdc::{DecisionOutcome, McdcAnalyzer, McdcReport};
use crate::stop::{StopConditionEngine, StopDecision};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Opaque run identifier
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Coverage keys required cases by decision id, so ids must be unique per run
fn check_unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::malformed(id, "decision id appears more than once in the run"));
        }
    }
    Ok(())
}

/// State of one test-generation run
#[derive(Debug)]
pub struct RunContext {
    id: RunId,
    config: RunConfig,
    decisions: Vec<Decision>,
    reports: Vec<McdcReport>,
    rejected: Vec<DecisionOutcome>,
    aggregator: CoverageAggregator,
    engine: StopConditionEngine,
}

impl RunContext {
    /// Start a run now
    pub fn start(
        id: RunId,
        config: RunConfig,
        scope: RunScope,
        inputs: &[DecisionInput],
    ) -> Result<Self> {
        Self::start_at(id, config, scope, inputs, Utc::now())
    }

    /// Start a run: validate the config, analyze every decision input in
    /// parallel and initialize coverage at `started_at`.
    ///
    /// Individual decisions that fail to build are kept as rejected outcomes
    /// and do not fail the run.
    pub fn start_at(
        id: RunId,
        config: RunConfig,
        scope: RunScope,
        inputs: &[DecisionInput],
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        config.validate()?;
        check_unique_ids(inputs.iter().map(DecisionInput::id))?;

        let analyzer = McdcAnalyzer::new();
        let max = config.max_conditions_per_decision;
        let analyzed: Vec<(Option<Decision>, DecisionOutcome)> = inputs
            .par_iter()
            .map(|input| analyzer.analyze_input(input, max))
            .collect();

        let mut decisions = Vec::new();
        let mut reports = Vec::new();
        let mut rejected = Vec::new();
        for (decision, outcome) in analyzed {
            decisions.extend(decision);
            match outcome {
                DecisionOutcome::Analyzed { report } => reports.push(report),
                rejected_outcome => rejected.push(rejected_outcome),
            }
        }

        Self::assemble(id, config, scope, decisions, reports, rejected, started_at)
    }

    /// Start a run from decisions that are already built
    pub fn from_decisions(
        id: RunId,
        config: RunConfig,
        scope: RunScope,
        decisions: Vec<Decision>,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        config.validate()?;
        check_unique_ids(decisions.iter().map(Decision::id))?;

        let analyzer = McdcAnalyzer::new();
        let max = config.max_conditions_per_decision;
        let (decisions, oversized): (Vec<Decision>, Vec<Decision>) = decisions
            .into_iter()
            .partition(|d| d.condition_count() <= max);

        let mut reports: Vec<McdcReport> = decisions.par_iter().map(|d| analyzer.analyze(d)).collect();
        for d in &oversized {
            tracing::warn!(
                decision = d.id(),
                conditions = d.condition_count(),
                max,
                "decision too complex for MCDC analysis"
            );
            reports.push(McdcReport::too_complex(
                d.id(),
                d.condition_count(),
                d.location().map(str::to_string),
            ));
        }

        Self::assemble(id, config, scope, decisions, reports, Vec::new(), started_at)
    }

    fn assemble(
        id: RunId,
        config: RunConfig,
        scope: RunScope,
        decisions: Vec<Decision>,
        reports: Vec<McdcReport>,
        rejected: Vec<DecisionOutcome>,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let mut aggregator = CoverageAggregator::new(id.clone());
        aggregator.start(CoverableUniverse::new(scope, &reports), started_at)?;

        Ok(Self {
            id,
            config,
            decisions,
            reports,
            rejected,
            aggregator,
            engine: StopConditionEngine::new(),
        })
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn reports(&self) -> &[McdcReport] {
        &self.reports
    }

    /// Decision inputs that could not be built
    pub fn rejected(&self) -> &[DecisionOutcome] {
        &self.rejected
    }

    pub fn report(&self, decision_id: &str) -> Option<&McdcReport> {
        self.reports.iter().find(|r| r.decision_id == decision_id)
    }

    pub fn snapshot(&self) -> Result<&CoverageSnapshot> {
        self.aggregator.snapshot()
    }

    pub fn metrics(&self) -> Result<CoverageMetrics> {
        self.aggregator.metrics()
    }

    pub fn history(&self) -> &[StopDecision] {
        self.engine.history()
    }

    pub fn is_stopped(&self) -> bool {
        self.engine.is_stopped()
    }

    pub fn record_test(&mut self, test_id: &str, delta: &CoverageDelta) -> Result<MarginalCoverage> {
        self.record_test_at(test_id, delta, Utc::now())
    }

    /// Fold one test's delta into the run. Fails once the run is halted.
    pub fn record_test_at(
        &mut self,
        test_id: &str,
        delta: &CoverageDelta,
        at: DateTime<Utc>,
    ) -> Result<MarginalCoverage> {
        if self.engine.is_stopped() {
            return Err(Error::RunStopped(self.id.clone()));
        }
        self.aggregator.record_test_at(test_id, delta, at)
    }

    pub fn should_stop(&mut self) -> Result<StopDecision> {
        self.evaluate_at(Utc::now())
    }

    /// Evaluate stop criteria as of `now`
    pub fn evaluate_at(&mut self, now: DateTime<Utc>) -> Result<StopDecision> {
        let snapshot = self.aggregator.snapshot()?;
        Ok(self.engine.evaluate(snapshot, &self.config, now))
    }

    /// Stop accepting tests
    pub fn halt(&mut self) {
        tracing::info!(run = %self.id, "run halted");
        self.engine.halt();
    }

    /// What is still uncovered
    pub fn gap_report(&self) -> Result<GapReport> {
        Ok(GapReport::build(self.aggregator.snapshot()?, &self.reports))
    }
}

/// Many concurrent runs keyed by id
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<RunId, Arc<Mutex<RunContext>>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start and register a run; its reports are returned
    pub fn start_run(
        &self,
        id: RunId,
        config: RunConfig,
        scope: RunScope,
        inputs: &[DecisionInput],
    ) -> Result<Vec<McdcReport>> {
        if self.runs.read().contains_key(&id) {
            return Err(Error::DuplicateRun(id));
        }
        let context = RunContext::start(id, config, scope, inputs)?;
        let reports = context.reports().to_vec();
        self.insert(context)?;
        Ok(reports)
    }

    /// Register a context built by the caller
    pub fn insert(&self, context: RunContext) -> Result<Arc<Mutex<RunContext>>> {
        let mut runs = self.runs.write();
        if runs.contains_key(context.id()) {
            return Err(Error::DuplicateRun(context.id().clone()));
        }
        let id = context.id().clone();
        let run = Arc::new(Mutex::new(context));
        runs.insert(id, Arc::clone(&run));
        Ok(run)
    }

    pub fn get(&self, id: &RunId) -> Result<Arc<Mutex<RunContext>>> {
        self.runs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownRun(id.clone()))
    }

    /// Run `f` with exclusive access to one run
    pub fn with_run<T>(&self, id: &RunId, f: impl FnOnce(&mut RunContext) -> T) -> Result<T> {
        let run = self.get(id)?;
        let mut guard = run.lock();
        Ok(f(&mut guard))
    }

    pub fn record_test(
        &self,
        id: &RunId,
        test_id: &str,
        delta: &CoverageDelta,
    ) -> Result<MarginalCoverage> {
        self.with_run(id, |run| run.record_test(test_id, delta))?
    }

    pub fn should_stop(&self, id: &RunId) -> Result<StopDecision> {
        self.with_run(id, RunContext::should_stop)?
    }

    pub fn halt(&self, id: &RunId) -> Result<()> {
        self.with_run(id, RunContext::halt)
    }

    pub fn gap_report(&self, id: &RunId) -> Result<GapReport> {
        self.with_run(id, |run| run.gap_report())?
    }

    /// Drop a run from the registry, returning its handle
    pub fn remove(&self, id: &RunId) -> Result<Arc<Mutex<RunContext>>> {
        self.runs
            .write()
            .remove(id)
            .ok_or_else(|| Error::UnknownRun(id.clone()))
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.runs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}
