//! Stop condition engine
//!
//! Recommends whether test generation for a run may stop. Each evaluation
//! checks every criterion against the current snapshot, in priority order:
//!
//! 1. `threshold_met` - changed (and new) line coverage reached the
//!    configured thresholds and, when MCDC is required, every in-scope
//!    decision is achievable and fully resolved
//! 2. `plateau` - the last K recorded tests added nothing
//! 3. `time_limit` - the run's wall-clock budget is used up
//! 4. `max_tests` - the test budget is used up
//!
//! The highest-priority true criterion becomes the reason; every true
//! criterion is listed in `signals`. Evaluations never mutate an earlier
//! decision, they append a new one to the history. The engine recommends;
//! halting is the caller's call (see [`StopConditionEngine::halt`]).

use crate::config::RunConfig;
use crate::coverage::{CoverageMetrics, CoverageSnapshot};
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict reason, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ThresholdMet,
    Plateau,
    TimeLimit,
    MaxTests,
    Continue,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::ThresholdMet => "threshold_met",
            StopReason::Plateau => "plateau",
            StopReason::TimeLimit => "time_limit",
            StopReason::MaxTests => "max_tests",
            StopReason::Continue => "continue",
        };
        f.write_str(s)
    }
}

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Collecting,
    Evaluating,
    /// Terminal
    Stopped,
}

/// Every signal the verdict was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StopMetrics {
    pub coverage: CoverageMetrics,
    pub changed_lines_threshold: f64,
    pub new_lines_threshold: f64,
    pub mcdc_required: bool,
    /// All in-scope decisions achievable and resolved
    pub mcdc_complete: bool,
    pub plateau_window: usize,
    pub elapsed_seconds: i64,
    pub time_limit_seconds: i64,
    pub max_tests: usize,
}

/// One stop/continue recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StopDecision {
    pub should_stop: bool,
    pub reason: StopReason,
    /// In [0, 1]. For `continue`, how close changed-line coverage is to
    /// its threshold.
    pub confidence: f64,
    pub metrics: StopMetrics,
    /// Every criterion that currently holds, highest priority first
    pub signals: Vec<StopReason>,
    /// 1-based evaluation number within the run
    pub sequence: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl StopDecision {
    pub fn to_report(&self) -> String {
        let c = &self.metrics.coverage;
        let verdict = if self.should_stop {
            "■ STOP"
        } else {
            "▶ CONTINUE"
        };
        let mut out = format!(
            "#{} {} ({}, confidence {:.2})\n",
            self.sequence, verdict, self.reason, self.confidence
        );
        out.push_str(&format!(
            "  changed lines {}/{} ({:.1}%, need {:.0}%), new lines {}/{}, branches {}/{}\n",
            c.changed_lines.covered,
            c.changed_lines.total,
            c.changed_lines.percentage(),
            self.metrics.changed_lines_threshold,
            c.new_lines.covered,
            c.new_lines.total,
            c.branches.covered,
            c.branches.total
        ));
        out.push_str(&format!(
            "  mcdc cases {}/{}, decisions {}/{} satisfied, tests {}, zero-gain streak {}/{}\n",
            c.mcdc_cases.covered,
            c.mcdc_cases.total,
            c.decisions_satisfied,
            c.decisions_total,
            c.tests_recorded,
            c.consecutive_zero_gain_tests,
            self.metrics.plateau_window
        ));
        if self.signals.len() > 1 {
            let all: Vec<String> = self.signals.iter().map(ToString::to_string).collect();
            out.push_str(&format!("  signals: {}\n", all.join(", ")));
        }
        out
    }
}

/// Evaluates stop criteria and keeps the decision history of one run
#[derive(Debug, Clone)]
pub struct StopConditionEngine {
    state: EngineState,
    history: Vec<StopDecision>,
}

impl StopConditionEngine {
    pub fn new() -> Self {
        Self {
            state: EngineState::Collecting,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == EngineState::Stopped
    }

    pub fn history(&self) -> &[StopDecision] {
        &self.history
    }

    pub fn last(&self) -> Option<&StopDecision> {
        self.history.last()
    }

    /// Caller decided to stop feeding tests; terminal
    pub fn halt(&mut self) {
        self.state = EngineState::Stopped;
    }

    /// Evaluate against the wall clock
    pub fn should_stop(&mut self, snapshot: &CoverageSnapshot, config: &RunConfig) -> StopDecision {
        self.evaluate(snapshot, config, Utc::now())
    }

    /// Evaluate all criteria at `now`
    pub fn evaluate(
        &mut self,
        snapshot: &CoverageSnapshot,
        config: &RunConfig,
        now: DateTime<Utc>,
    ) -> StopDecision {
        let stopped = self.is_stopped();
        if !stopped {
            self.state = EngineState::Evaluating;
        }

        let coverage = snapshot.metrics();
        let elapsed = (now - snapshot.started_at).max(Duration::zero());
        let time_limit_minutes = i64::try_from(config.time_limit_minutes).unwrap_or(i64::MAX);
        let time_limit = Duration::try_minutes(time_limit_minutes).unwrap_or(Duration::MAX);

        let mcdc_complete = coverage.decisions_satisfied == coverage.decisions_total;
        let lines_met = meets(coverage.changed_lines.fraction(), config.changed_lines_threshold)
            && meets(coverage.new_lines.fraction(), config.new_lines_threshold);
        let threshold_met = lines_met && (!config.mcdc_required || mcdc_complete);

        let plateau_window = config.plateau_test_count.max(1);
        let zero_streak = coverage.consecutive_zero_gain_tests;

        let mut signals = Vec::new();
        if threshold_met {
            signals.push(StopReason::ThresholdMet);
        }
        if zero_streak >= plateau_window {
            signals.push(StopReason::Plateau);
        }
        if elapsed >= time_limit {
            signals.push(StopReason::TimeLimit);
        }
        if coverage.tests_recorded >= config.max_tests {
            signals.push(StopReason::MaxTests);
        }

        let reason = signals.first().copied().unwrap_or(StopReason::Continue);
        let confidence = match reason {
            StopReason::Plateau => (zero_streak as f64 / plateau_window as f64).min(1.0),
            StopReason::Continue => progress_toward(
                coverage.changed_lines.fraction(),
                config.changed_lines_threshold,
            ),
            _ => 1.0,
        };

        let decision = StopDecision {
            should_stop: reason != StopReason::Continue,
            reason,
            confidence,
            metrics: StopMetrics {
                coverage,
                changed_lines_threshold: config.changed_lines_threshold,
                new_lines_threshold: config.new_lines_threshold,
                mcdc_required: config.mcdc_required,
                mcdc_complete,
                plateau_window,
                elapsed_seconds: elapsed.num_seconds(),
                time_limit_seconds: time_limit.num_seconds(),
                max_tests: config.max_tests,
            },
            signals,
            sequence: self.history.len() + 1,
            evaluated_at: now,
        };

        if decision.should_stop {
            tracing::info!(
                run = %snapshot.run_id,
                reason = %decision.reason,
                confidence = decision.confidence,
                "stop recommended"
            );
        } else {
            tracing::debug!(
                run = %snapshot.run_id,
                confidence = decision.confidence,
                "continue"
            );
        }

        self.history.push(decision.clone());
        if !stopped {
            self.state = EngineState::Collecting;
        }
        decision
    }
}

impl Default for StopConditionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// `fraction` (0–1) reaches `threshold_percent` (0–100)
fn meets(fraction: f64, threshold_percent: f64) -> bool {
    fraction * 100.0 + 1e-9 >= threshold_percent
}

/// Coverage as a fraction of the threshold, capped at 1
fn progress_toward(fraction: f64, threshold_percent: f64) -> f64 {
    if threshold_percent <= 0.0 {
        return 1.0;
    }
    (fraction * 100.0 / threshold_percent).clamp(0.0, 1.0)
}
