//! Independence-pair search
//!
//! For condition i, rows a and b form an independence pair when they differ
//! only in condition i and the decision's outcome differs between them.
//! Each row a with bit i clear is paired with `a | bit(i)`, so every pair is
//! found once with `row_a < row_b`. Cost is O(2^N · N).

use crate::truth_table::TruthTable;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Two rows proving one condition's independent effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct IndependencePair {
    pub condition: usize,
    /// Row with the condition false
    pub row_a: usize,
    /// Row with the condition true
    pub row_b: usize,
}

impl IndependencePair {
    pub fn rows(&self) -> [usize; 2] {
        [self.row_a, self.row_b]
    }

    pub fn contains(&self, row: usize) -> bool {
        self.row_a == row || self.row_b == row
    }

    /// The other side of the pair, if `row` is one side
    pub fn partner(&self, row: usize) -> Option<usize> {
        if row == self.row_a {
            Some(self.row_b)
        } else if row == self.row_b {
            Some(self.row_a)
        } else {
            None
        }
    }
}

/// All independence pairs of one truth table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndependenceAnalysis {
    /// Pairs per condition, sorted by `row_a`
    pub pairs_by_condition: Vec<Vec<IndependencePair>>,
}

impl IndependenceAnalysis {
    /// True when every condition has at least one pair
    pub fn achievable(&self) -> bool {
        self.pairs_by_condition.iter().all(|p| !p.is_empty())
    }

    /// Conditions with no pair (masked by the decision's structure)
    pub fn unachievable(&self) -> Vec<usize> {
        self.pairs_by_condition
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn pairs(&self, condition: usize) -> &[IndependencePair] {
        &self.pairs_by_condition[condition]
    }

    pub fn total_pairs(&self) -> usize {
        self.pairs_by_condition.iter().map(Vec::len).sum()
    }
}

/// Find every independence pair in the table
pub fn find_independence_pairs(table: &TruthTable) -> IndependenceAnalysis {
    let n = table.condition_count();
    let pairs_by_condition = (0..n)
        .map(|condition| {
            let bit = table.condition_bit(condition);
            table
                .rows()
                .iter()
                .filter(|row| row.index & bit == 0)
                .filter_map(|row| {
                    let partner = row.index | bit;
                    (table.outcome(partner) != row.outcome).then_some(IndependencePair {
                        condition,
                        row_a: row.index,
                        row_b: partner,
                    })
                })
                .collect()
        })
        .collect();

    IndependenceAnalysis { pairs_by_condition }
}
