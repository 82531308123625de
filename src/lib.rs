// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # mcdc-gate
//!
//! MCDC requirement analysis and stop-condition scoring for change-scoped
//! test generation.
//!
//! ## Core Concept
//!
//! A test generator working on a code change needs two answers: which test
//! cases does each changed boolean decision require, and has enough been
//! covered to stop generating tests. mcdc-gate answers both:
//!
//! - **Analyze** each decision into its truth table, independence pairs and
//!   a small set of required MCDC test cases
//! - **Aggregate** per-test coverage deltas into a monotonic run snapshot
//! - **Decide** after every test whether to stop, with a reason and a
//!   confidence score
//! - **Report** what is still uncovered
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mcdc_gate::*;
//!
//! let decision = Decision::from_cel("can_ship", "paid && (in_stock || backorder)", 8)?;
//! let report = analyze_decision(&decision);
//! for case in &report.required_test_cases {
//!     println!("{} → {}", case.assignment, case.expected_outcome);
//! }
//!
//! let mut run = RunContext::start(
//!     RunId::from("pr-42"),
//!     RunConfig::default(),
//!     scope,
//!     &[DecisionInput::cel("can_ship", "paid && (in_stock || backorder)")],
//! )?;
//! run.record_test("ships_paid_in_stock", &CoverageDelta::new().line("src/ship.rs", 10).case("can_ship", 6))?;
//! let verdict = run.should_stop()?;
//! if verdict.should_stop {
//!     run.halt();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                                                              │
//! │  DecisionGraph / CEL                                         │
//! │       │                                                      │
//! │       └──► Decision ──► TruthTable ──► independence pairs    │
//! │                                  │                           │
//! │                                  └──► TestSetSelector        │
//! │                                          │                   │
//! │                                          ▼                   │
//! │                                     McdcReport               │
//! │                                          │                   │
//! │  RunScope ───────────────────────────────┤                   │
//! │                                          ▼                   │
//! │  CoverageDelta ──► CoverageAggregator ──► CoverageSnapshot   │
//! │                                          │                   │
//! │                                          ├──► StopDecision   │
//! │                                          └──► GapReport      │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`RunContext`] ties one run's pieces together; [`RunRegistry`] holds
//! many runs for concurrent callers.

pub mod config;
pub mod coverage;
pub mod decision;
pub mod error;
pub mod gaps;
pub mod mcdc;
pub mod replay;
pub mod run;
pub mod stop;
pub mod truth_table;

// Re-exports
pub use config::{RunConfig, MAX_SUPPORTED_CONDITIONS};
pub use coverage::{
    BranchRef, CoverableUniverse, CoverageAggregator, CoverageDelta, CoverageMetrics,
    CoverageSnapshot, LineRef, MarginalCoverage, Ratio, RunScope, TestRecord,
};
pub use decision::{CelDecision, Condition, Decision, DecisionGraph, DecisionInput, Expr, Node};
pub use error::{Error, Result};
pub use gaps::{BlockedDecision, CaseGap, GapReport, LineRange};
pub use mcdc::{
    analyze_decision, analyze_decisions, find_independence_pairs, DecisionOutcome,
    GreedySelector, IndependenceAnalysis, IndependencePair, McdcAnalyzer, McdcReport,
    McdcStatus, RequiredCaseId, RequiredTestCase, Selection, TestSetSelector,
};
pub use replay::{replay, replay_at, ReplayOutcome, RunFile, TestStep};
pub use run::{RunContext, RunId, RunRegistry};
pub use stop::{EngineState, StopConditionEngine, StopDecision, StopMetrics, StopReason};
pub use truth_table::{TruthTable, TruthTableRow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
