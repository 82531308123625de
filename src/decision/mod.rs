//! Boolean decision model
//!
//! A [`Decision`] is a tree of conditions joined by AND / OR / NOT. AND and
//! OR are n-ary and evaluate their operands left to right with short
//! circuit: evaluation stops at the first operand that settles the result.
//!
//! ## Submodules
//!
//! - `graph` - node-arena wire format supplied by external front-ends
//! - `cel` - CEL expression front-end (`a && (b || !c)`)
//!
//! Condition order is the left-to-right order of first appearance in the
//! tree. It is fixed at construction and drives truth-table row numbering.

mod cel;
mod graph;

pub use graph::{CelDecision, ConditionDecl, DecisionGraph, DecisionInput, Node};

use crate::config::MAX_SUPPORTED_CONDITIONS;
use crate::error::{Error, Result};
use crate::truth_table::TruthTable;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// An atomic boolean sub-expression of a decision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    /// Identifier, unique within the decision
    pub id: String,
    /// Source text of the condition, when the front-end supplies it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Condition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Source text if known, otherwise the id
    pub fn label(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.id)
    }
}

/// Expression tree over condition indices
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Condition(usize),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn cond(index: usize) -> Self {
        Expr::Condition(index)
    }

    pub fn and(operands: Vec<Expr>) -> Self {
        Expr::And(operands)
    }

    pub fn or(operands: Vec<Expr>) -> Self {
        Expr::Or(operands)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expr) -> Self {
        Expr::Not(Box::new(operand))
    }

    /// Short-circuit evaluation; marks every condition it reads in `consulted`
    fn eval(&self, values: &[bool], consulted: &mut [bool]) -> bool {
        match self {
            Expr::Condition(i) => {
                consulted[*i] = true;
                values[*i]
            }
            Expr::And(operands) => {
                for op in operands {
                    if !op.eval(values, consulted) {
                        return false;
                    }
                }
                true
            }
            Expr::Or(operands) => {
                for op in operands {
                    if op.eval(values, consulted) {
                        return true;
                    }
                }
                false
            }
            Expr::Not(inner) => !inner.eval(values, consulted),
        }
    }

    fn collect_order(&self, seen: &mut Vec<usize>) {
        match self {
            Expr::Condition(i) => {
                if !seen.contains(i) {
                    seen.push(*i);
                }
            }
            Expr::And(ops) | Expr::Or(ops) => ops.iter().for_each(|op| op.collect_order(seen)),
            Expr::Not(inner) => inner.collect_order(seen),
        }
    }

    fn check_shape(&self, decision: &str, declared: usize) -> Result<()> {
        match self {
            Expr::Condition(i) if *i >= declared => Err(Error::malformed(
                decision,
                format!("reference to undefined condition #{}", i),
            )),
            Expr::Condition(_) => Ok(()),
            Expr::And(ops) | Expr::Or(ops) => {
                if ops.is_empty() {
                    return Err(Error::malformed(decision, "AND/OR with no operands"));
                }
                ops.iter().try_for_each(|op| op.check_shape(decision, declared))
            }
            Expr::Not(inner) => inner.check_shape(decision, declared),
        }
    }

    fn remap(self, mapping: &HashMap<usize, usize>) -> Expr {
        match self {
            Expr::Condition(i) => Expr::Condition(mapping[&i]),
            Expr::And(ops) => Expr::And(ops.into_iter().map(|op| op.remap(mapping)).collect()),
            Expr::Or(ops) => Expr::Or(ops.into_iter().map(|op| op.remap(mapping)).collect()),
            Expr::Not(inner) => Expr::Not(Box::new(inner.remap(mapping))),
        }
    }

    /// Number of leaves, counting repeated conditions each time
    pub fn leaf_count(&self) -> usize {
        match self {
            Expr::Condition(_) => 1,
            Expr::And(ops) | Expr::Or(ops) => ops.iter().map(Expr::leaf_count).sum(),
            Expr::Not(inner) => inner.leaf_count(),
        }
    }

    fn render(&self, conditions: &[Condition], out: &mut String) {
        match self {
            Expr::Condition(i) => out.push_str(&conditions[*i].id),
            Expr::And(ops) => render_joined(ops, " && ", conditions, out, |op| {
                matches!(op, Expr::Or(o) if o.len() > 1)
            }),
            Expr::Or(ops) => render_joined(ops, " || ", conditions, out, |_| false),
            Expr::Not(inner) => {
                out.push('!');
                if matches!(inner.as_ref(), Expr::Condition(_) | Expr::Not(_)) {
                    inner.render(conditions, out);
                } else {
                    out.push('(');
                    inner.render(conditions, out);
                    out.push(')');
                }
            }
        }
    }
}

fn render_joined(
    ops: &[Expr],
    sep: &str,
    conditions: &[Condition],
    out: &mut String,
    needs_parens: impl Fn(&Expr) -> bool,
) {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        if needs_parens(op) {
            out.push('(');
            op.render(conditions, out);
            out.push(')');
        } else {
            op.render(conditions, out);
        }
    }
}

/// A boolean decision over N ordered conditions
#[derive(Debug, Clone)]
pub struct Decision {
    id: String,
    conditions: Vec<Condition>,
    root: Expr,
    location: Option<String>,
    table: OnceLock<TruthTable>,
}

impl Decision {
    /// Build a decision from declared conditions and a tree over their
    /// indices.
    ///
    /// Conditions are reordered to left-to-right first appearance. The
    /// condition count is checked against `max_conditions`, capped at
    /// [`MAX_SUPPORTED_CONDITIONS`], before any truth table exists.
    pub fn new(
        id: impl Into<String>,
        conditions: Vec<Condition>,
        root: Expr,
        max_conditions: usize,
    ) -> Result<Self> {
        let id = id.into();

        if conditions.is_empty() {
            return Err(Error::malformed(&id, "decision has no conditions"));
        }
        let mut ids = std::collections::HashSet::new();
        for cond in &conditions {
            if !ids.insert(cond.id.as_str()) {
                return Err(Error::malformed(
                    &id,
                    format!("condition '{}' declared twice", cond.id),
                ));
            }
        }
        root.check_shape(&id, conditions.len())?;

        let mut order = Vec::with_capacity(conditions.len());
        root.collect_order(&mut order);
        if let Some(unused) = (0..conditions.len()).find(|i| !order.contains(i)) {
            return Err(Error::malformed(
                &id,
                format!("condition '{}' is declared but never used", conditions[unused].id),
            ));
        }

        let max = max_conditions.min(MAX_SUPPORTED_CONDITIONS);
        if order.len() > max {
            return Err(Error::TooManyConditions {
                decision: id,
                conditions: order.len(),
                max,
            });
        }

        let mapping: HashMap<usize, usize> = order
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, new))
            .collect();
        let conditions = order.iter().map(|old| conditions[*old].clone()).collect();
        let root = root.remap(&mapping);

        Ok(Self {
            id,
            conditions,
            root,
            location: None,
            table: OnceLock::new(),
        })
    }

    /// Parse a CEL boolean expression. Atoms (identifiers, member paths,
    /// comparisons) become conditions.
    pub fn from_cel(id: impl Into<String>, expr: &str, max_conditions: usize) -> Result<Self> {
        cel::decision_from_cel(id.into(), expr, max_conditions)
    }

    /// Build from the node-arena wire format
    pub fn from_graph(graph: &DecisionGraph, max_conditions: usize) -> Result<Self> {
        graph.build(max_conditions)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source location (`file:line`) when known
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Conditions in left-to-right order
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Evaluate under a full assignment (one value per condition, in order)
    pub fn evaluate(&self, assignment: &[bool]) -> Result<bool> {
        self.evaluate_traced(assignment).map(|(outcome, _)| outcome)
    }

    /// Evaluate and report which conditions the short-circuit evaluator read
    pub fn evaluate_traced(&self, assignment: &[bool]) -> Result<(bool, Vec<bool>)> {
        if assignment.len() != self.conditions.len() {
            return Err(Error::InvalidAssignment {
                decision: self.id.clone(),
                expected: self.conditions.len(),
                got: assignment.len(),
            });
        }
        let mut consulted = vec![false; assignment.len()];
        let outcome = self.root.eval(assignment, &mut consulted);
        Ok((outcome, consulted))
    }

    /// Evaluate a complete assignment without the length check
    pub(crate) fn eval_unchecked(&self, values: &[bool]) -> (bool, Vec<bool>) {
        let mut consulted = vec![false; values.len()];
        let outcome = self.root.eval(values, &mut consulted);
        (outcome, consulted)
    }

    /// Exhaustive truth table, generated on first use and cached
    pub fn truth_table(&self) -> &TruthTable {
        self.table.get_or_init(|| TruthTable::generate(self))
    }

    /// Canonical text form, e.g. `a && (b || c)`
    pub fn expression(&self) -> String {
        let mut out = String::new();
        self.root.render(&self.conditions, &mut out);
        out
    }

    /// Content hash of the condition list and tree
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let ids: Vec<&str> = self.conditions.iter().map(|c| c.id.as_str()).collect();
        let mut hasher = Sha256::new();
        hasher.update(ids.join("\n").as_bytes());
        hasher.update([0]);
        hasher.update(self.expression().as_bytes());
        format!("sha256:{}", hex::encode(&hasher.finalize()[..8]))
    }
}

impl PartialEq for Decision {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.conditions == other.conditions && self.root == other.root
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.expression())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn abc() -> Vec<Condition> {
        vec![Condition::new("A"), Condition::new("B"), Condition::new("C")]
    }

    #[test]
    fn test_short_circuit_and() {
        let d = Decision::new(
            "d",
            abc(),
            Expr::and(vec![Expr::cond(0), Expr::or(vec![Expr::cond(1), Expr::cond(2)])]),
            8,
        )
        .unwrap();

        let (outcome, consulted) = d.evaluate_traced(&[false, true, true]).unwrap();
        assert!(!outcome);
        assert_eq!(consulted, vec![true, false, false]);

        let (outcome, consulted) = d.evaluate_traced(&[true, true, false]).unwrap();
        assert!(outcome);
        assert_eq!(consulted, vec![true, true, false]);
    }

    #[test]
    fn test_conditions_reordered_by_first_appearance() {
        // Declared A, B, C but the tree reads C first
        let d = Decision::new(
            "d",
            abc(),
            Expr::or(vec![Expr::cond(2), Expr::and(vec![Expr::cond(0), Expr::cond(1)])]),
            8,
        )
        .unwrap();
        let ids: Vec<_> = d.conditions().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
        assert_eq!(d.expression(), "C || A && B");
    }

    #[test]
    fn test_too_many_conditions() {
        let conditions: Vec<_> = (0..9).map(|i| Condition::new(format!("c{}", i))).collect();
        let root = Expr::and((0..9).map(Expr::cond).collect());
        let err = Decision::new("wide", conditions, root, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyConditions {
                conditions: 9,
                max: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_max_conditions_capped_at_supported_ceiling() {
        let n = MAX_SUPPORTED_CONDITIONS + 1;
        let conditions: Vec<_> = (0..n).map(|i| Condition::new(format!("c{}", i))).collect();
        let root = Expr::or((0..n).map(Expr::cond).collect());
        let err = Decision::new("wide", conditions, root, usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyConditions { conditions, max, .. }
                if conditions == n && max == MAX_SUPPORTED_CONDITIONS
        ));
    }

    #[rstest]
    #[case::undefined(Expr::and(vec![Expr::cond(0), Expr::cond(5)]))]
    #[case::empty_and(Expr::and(vec![]))]
    #[case::empty_or(Expr::or(vec![Expr::cond(0), Expr::or(vec![])]))]
    #[case::unused(Expr::and(vec![Expr::cond(0), Expr::cond(1)]))]
    fn test_malformed(#[case] root: Expr) {
        let err = Decision::new("bad", abc(), root, 8).unwrap_err();
        assert!(matches!(err, Error::MalformedDecision { .. }), "{:?}", err);
    }

    #[test]
    fn test_duplicate_condition_ids() {
        let conditions = vec![Condition::new("A"), Condition::new("A")];
        let err =
            Decision::new("dup", conditions, Expr::or(vec![Expr::cond(0), Expr::cond(1)]), 8)
                .unwrap_err();
        assert!(matches!(err, Error::MalformedDecision { .. }));
    }

    #[test]
    fn test_assignment_length_checked() {
        let d = Decision::new("d", vec![Condition::new("A")], Expr::cond(0), 8).unwrap();
        assert!(matches!(
            d.evaluate(&[true, false]),
            Err(Error::InvalidAssignment { expected: 1, got: 2, .. })
        ));
    }

    #[test]
    fn test_not_rendering_and_eval() {
        let d = Decision::new(
            "d",
            vec![Condition::new("A"), Condition::new("B")],
            Expr::not(Expr::and(vec![Expr::cond(0), Expr::not(Expr::cond(1))])),
            8,
        )
        .unwrap();
        assert_eq!(d.expression(), "!(A && !B)");
        assert!(!d.evaluate(&[true, false]).unwrap());
        assert!(d.evaluate(&[true, true]).unwrap());
    }

    #[test]
    fn test_fingerprint_stable_and_structural() {
        let a = Decision::from_cel("x", "a && b", 8).unwrap();
        let b = Decision::from_cel("y", "a && b", 8).unwrap();
        let c = Decision::from_cel("x", "a || b", 8).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert!(a.fingerprint().starts_with("sha256:"));
    }
}
