//! Minimum test set selection
//!
//! Reduces the independence pairs of a decision to a small set of truth
//! table rows such that every achievable condition has one pair with both
//! rows selected.
//!
//! [`GreedySelector`] is a greedy set-cover **approximation**, not an exact
//! minimum: exact minimum set cover is NP-hard. An exact solver can be
//! plugged in through [`TestSetSelector`] without changing callers.
//!
//! Bounds for an achievable decision with N conditions: at least N + 1
//! rows (N pairs along distinct hypercube directions form a forest), at
//! most 2N rows (every two picks resolve at least one condition).

use super::independence::{IndependenceAnalysis, IndependencePair};
use crate::truth_table::TruthTable;
use serde::{Deserialize, Serialize};

/// Rows chosen for a decision and the pair each condition is proven by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected row indices, ascending
    pub rows: Vec<usize>,
    /// One pair per achievable condition, in condition order
    pub chosen_pairs: Vec<IndependencePair>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Conditions whose chosen pair uses `row`
    pub fn conditions_proven_by(&self, row: usize) -> Vec<usize> {
        self.chosen_pairs
            .iter()
            .filter(|p| p.contains(row))
            .map(|p| p.condition)
            .collect()
    }
}

/// Strategy for turning independence pairs into concrete rows
pub trait TestSetSelector: Send + Sync {
    fn name(&self) -> &'static str;

    fn select(&self, table: &TruthTable, analysis: &IndependenceAnalysis) -> Selection;
}

/// Greedy set cover over truth table rows.
///
/// Each step picks the unselected row that completes the most unresolved
/// conditions' pairs given the rows already selected. When no row completes
/// anything, it picks the row taking part in the most unresolved conditions'
/// pairs. Ties go to the lowest row index. Each condition is finally proven
/// by its fully-selected pair with the lowest row indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySelector;

impl TestSetSelector for GreedySelector {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn select(&self, table: &TruthTable, analysis: &IndependenceAnalysis) -> Selection {
        let conditions = table.condition_count();
        let mut selected = vec![false; table.len()];
        // Unachievable conditions have nothing to resolve
        let mut resolved: Vec<bool> = (0..conditions)
            .map(|c| analysis.pairs(c).is_empty())
            .collect();

        let has_pair = |row: usize, c: usize| table.outcome(row) != table.outcome(table.flip(row, c));

        while resolved.iter().any(|r| !r) {
            let completing = best_row(&selected, |row| {
                (0..conditions)
                    .filter(|&c| !resolved[c] && has_pair(row, c) && selected[table.flip(row, c)])
                    .count()
            });
            let pick = match completing {
                Some(row) => row,
                None => {
                    let participating = best_row(&selected, |row| {
                        (0..conditions)
                            .filter(|&c| !resolved[c] && has_pair(row, c))
                            .count()
                    });
                    match participating {
                        Some(row) => row,
                        None => break,
                    }
                }
            };

            selected[pick] = true;
            for (c, done) in resolved.iter_mut().enumerate() {
                if !*done && has_pair(pick, c) && selected[table.flip(pick, c)] {
                    *done = true;
                }
            }
        }

        let chosen_pairs = (0..conditions)
            .filter_map(|c| {
                analysis
                    .pairs(c)
                    .iter()
                    .find(|p| selected[p.row_a] && selected[p.row_b])
                    .copied()
            })
            .collect();
        let rows = selected
            .iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(|(i, _)| i)
            .collect();

        Selection { rows, chosen_pairs }
    }
}

/// Unselected row with the highest positive score, lowest index on ties
fn best_row(selected: &[bool], score: impl Fn(usize) -> usize) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for row in (0..selected.len()).filter(|r| !selected[*r]) {
        let s = score(row);
        if s > 0 && best.is_none_or(|(bs, _)| s > bs) {
            best = Some((s, row));
        }
    }
    best.map(|(_, row)| row)
}
