//! Truth table generation
//!
//! Enumerates all 2^N assignments of a decision's conditions.
//!
//! Row numbering: the row index is the assignment read as a binary number
//! with condition 0 as the **most significant** bit. For conditions
//! `(A, B, C)`, row 0 is `FFF`, row 1 is `FFT`, row 4 is `TFF` and row 7 is
//! `TTT`. Every row carries a value for every condition, including
//! conditions the short-circuit evaluator never read for that row.

use crate::decision::Decision;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One assignment and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TruthTableRow {
    pub index: usize,
    /// One value per condition, in condition order
    pub values: Vec<bool>,
    pub outcome: bool,
    /// Conditions the short-circuit evaluator actually read
    pub consulted: Vec<bool>,
}

impl TruthTableRow {
    /// Compact form such as `TFT`
    pub fn bits(&self) -> String {
        self.values.iter().map(|v| if *v { 'T' } else { 'F' }).collect()
    }
}

/// Exhaustive, immutable truth table of a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TruthTable {
    condition_count: usize,
    rows: Vec<TruthTableRow>,
}

impl TruthTable {
    /// Build the table; use [`Decision::truth_table`] for the cached copy
    pub fn generate(decision: &Decision) -> Self {
        let n = decision.condition_count();
        let rows = (0..1usize << n)
            .map(|index| {
                let values = assignment_for(index, n);
                let (outcome, consulted) = decision.eval_unchecked(&values);
                TruthTableRow {
                    index,
                    values,
                    outcome,
                    consulted,
                }
            })
            .collect();

        Self {
            condition_count: n,
            rows,
        }
    }

    pub fn condition_count(&self) -> usize {
        self.condition_count
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TruthTableRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&TruthTableRow> {
        self.rows.get(index)
    }

    pub fn outcome(&self, index: usize) -> bool {
        self.rows[index].outcome
    }

    /// Bit mask selecting `condition` within a row index
    pub fn condition_bit(&self, condition: usize) -> usize {
        1 << (self.condition_count - 1 - condition)
    }

    /// Index of the row that differs from `index` only in `condition`
    pub fn flip(&self, index: usize, condition: usize) -> usize {
        index ^ self.condition_bit(condition)
    }

    /// Number of rows whose outcome is true
    pub fn true_count(&self) -> usize {
        self.rows.iter().filter(|r| r.outcome).count()
    }

    /// Fixed-width text table. Values the evaluator never read are shown
    /// in lower case.
    pub fn to_report(&self, decision: &Decision) -> String {
        let mut out = String::new();
        let names: Vec<&str> = decision.conditions().iter().map(|c| c.id.as_str()).collect();
        let widths: Vec<usize> = names.iter().map(|n| n.len().max(1)).collect();

        out.push_str(&format!("Decision: {}\n", decision));
        out.push_str(&format!(
            "Rows: {} ({} true, {} false)\n\n",
            self.len(),
            self.true_count(),
            self.len() - self.true_count()
        ));

        out.push_str(" row │");
        for (name, w) in names.iter().zip(&widths) {
            out.push_str(&format!(" {:^w$}", name, w = *w));
        }
        out.push_str(" │ outcome\n");
        out.push_str("─────┼");
        out.push_str(&"─".repeat(widths.iter().map(|w| w + 1).sum::<usize>()));
        out.push_str("─┼────────\n");

        for row in &self.rows {
            out.push_str(&format!("{:>4} │", row.index));
            for (i, w) in widths.iter().enumerate() {
                let cell = match (row.values[i], row.consulted[i]) {
                    (true, true) => "T",
                    (false, true) => "F",
                    (true, false) => "t",
                    (false, false) => "f",
                };
                out.push_str(&format!(" {:^w$}", cell, w = *w));
            }
            out.push_str(&format!(" │ {}\n", if row.outcome { "T" } else { "F" }));
        }

        out
    }
}

/// Assignment for a row index, condition 0 in the most significant bit
pub fn assignment_for(index: usize, condition_count: usize) -> Vec<bool> {
    (0..condition_count)
        .map(|i| index & (1 << (condition_count - 1 - i)) != 0)
        .collect()
}

/// Row index for an assignment, inverse of [`assignment_for`]
pub fn index_for(values: &[bool]) -> usize {
    values
        .iter()
        .fold(0, |acc, v| (acc << 1) | usize::from(*v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_encoding_msb_first() {
        assert_eq!(assignment_for(4, 3), vec![true, false, false]);
        assert_eq!(assignment_for(1, 3), vec![false, false, true]);
        assert_eq!(index_for(&[true, true, false]), 6);
        for i in 0..16 {
            assert_eq!(index_for(&assignment_for(i, 4)), i);
        }
    }

    #[test]
    fn test_a_and_b_or_c() {
        let d = Decision::from_cel("d", "A && (B || C)", 8).unwrap();
        let table = d.truth_table();

        assert_eq!(table.len(), 8);
        let outcomes: Vec<bool> = table.rows().iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![false, false, false, false, false, true, true, true]
        );
        assert_eq!(table.row(6).unwrap().bits(), "TTF");
    }

    #[test]
    fn test_unconsulted_conditions_still_assigned() {
        let d = Decision::from_cel("d", "A && B", 8).unwrap();
        let table = d.truth_table();
        // Row 1 = (F, T): B is never read but keeps its value
        let row = table.row(1).unwrap();
        assert_eq!(row.values, vec![false, true]);
        assert_eq!(row.consulted, vec![true, false]);
    }

    #[test]
    fn test_flip() {
        let d = Decision::from_cel("d", "A || B || C", 8).unwrap();
        let table = d.truth_table();
        assert_eq!(table.flip(0, 0), 4);
        assert_eq!(table.flip(5, 2), 4);
        assert_eq!(table.flip(5, 1), 7);
    }

    #[test]
    fn test_table_is_cached() {
        let d = Decision::from_cel("d", "A || B", 8).unwrap();
        let first = d.truth_table() as *const TruthTable;
        let second = d.truth_table() as *const TruthTable;
        assert_eq!(first, second);
    }

    #[test]
    fn test_report_marks_masked_values() {
        let d = Decision::from_cel("d", "A && B", 8).unwrap();
        let report = d.truth_table().to_report(&d);
        assert!(report.contains("Rows: 4 (1 true, 3 false)"));
        // Row 0: A=F read, B=f masked
        assert!(report.lines().any(|l| l.starts_with("   0 │ F f")));
    }
}
