//! Node-arena wire format for decisions
//!
//! External front-ends hand over each decision as a flat list of nodes that
//! refer to their children by index. The arena is validated and expanded
//! into an [`Expr`] tree: undefined conditions, dangling indices, empty
//! AND/OR nodes and cycles are rejected as malformed.

use super::{Condition, Decision, Expr};
use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upper bound on tree size after expanding shared sub-expressions
const MAX_EXPANDED_NODES: usize = 4096;

/// A declared condition in the wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ConditionDecl {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One node of the decision arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Node {
    /// Leaf referring to a declared condition by id
    Condition { condition: String },
    And { operands: Vec<usize> },
    Or { operands: Vec<usize> },
    Not { operand: usize },
}

/// A parsed decision as produced by a language-aware front-end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DecisionGraph {
    pub id: String,

    /// `file:line` of the decision in changed code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub conditions: Vec<ConditionDecl>,

    pub nodes: Vec<Node>,

    /// Index of the root node
    pub root: usize,
}

/// A decision given as a CEL boolean expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CelDecision {
    pub id: String,

    pub expression: String,

    /// `file:line` of the decision in changed code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Either form a decision may arrive in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DecisionInput {
    Graph(DecisionGraph),
    Cel(CelDecision),
}

impl DecisionInput {
    pub fn cel(id: impl Into<String>, expression: impl Into<String>) -> Self {
        DecisionInput::Cel(CelDecision {
            id: id.into(),
            expression: expression.into(),
            location: None,
        })
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        let location = Some(location.into());
        match &mut self {
            DecisionInput::Graph(g) => g.location = location,
            DecisionInput::Cel(c) => c.location = location,
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            DecisionInput::Graph(g) => &g.id,
            DecisionInput::Cel(c) => &c.id,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            DecisionInput::Graph(g) => g.location.as_deref(),
            DecisionInput::Cel(c) => c.location.as_deref(),
        }
    }

    pub fn build(&self, max_conditions: usize) -> Result<Decision> {
        match self {
            DecisionInput::Graph(g) => g.build(max_conditions),
            DecisionInput::Cel(c) => {
                let decision = Decision::from_cel(c.id.clone(), &c.expression, max_conditions)?;
                Ok(match &c.location {
                    Some(loc) => decision.with_location(loc.clone()),
                    None => decision,
                })
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

struct Expander<'a> {
    graph: &'a DecisionGraph,
    condition_index: HashMap<&'a str, usize>,
    marks: Vec<Mark>,
    built: Vec<Option<Expr>>,
    expanded: usize,
}

impl<'a> Expander<'a> {
    fn expand(&mut self, node: usize) -> Result<Expr> {
        let graph = self.graph;
        let id = &graph.id;
        let Some(def) = graph.nodes.get(node) else {
            return Err(Error::malformed(
                id,
                format!("node index {} out of range ({} nodes)", node, graph.nodes.len()),
            ));
        };

        match self.marks[node] {
            Mark::InProgress => {
                return Err(Error::malformed(id, format!("cycle through node {}", node)));
            }
            Mark::Done => {
                if let Some(expr) = &self.built[node] {
                    self.expanded += expr.leaf_count();
                    self.check_size()?;
                    return Ok(expr.clone());
                }
            }
            Mark::Unvisited => {}
        }

        self.marks[node] = Mark::InProgress;
        let expr = match def {
            Node::Condition { condition } => {
                let index = self
                    .condition_index
                    .get(condition.as_str())
                    .copied()
                    .ok_or_else(|| {
                        Error::malformed(
                            id,
                            format!("node {} references undefined condition '{}'", node, condition),
                        )
                    })?;
                self.expanded += 1;
                Expr::Condition(index)
            }
            Node::And { operands } | Node::Or { operands } => {
                if operands.is_empty() {
                    return Err(Error::malformed(id, format!("node {} has no operands", node)));
                }
                let children = operands
                    .iter()
                    .map(|child| self.expand(*child))
                    .collect::<Result<Vec<_>>>()?;
                if matches!(def, Node::And { .. }) {
                    Expr::And(children)
                } else {
                    Expr::Or(children)
                }
            }
            Node::Not { operand } => Expr::Not(Box::new(self.expand(*operand)?)),
        };
        self.check_size()?;

        self.marks[node] = Mark::Done;
        self.built[node] = Some(expr.clone());
        Ok(expr)
    }

    fn check_size(&self) -> Result<()> {
        if self.expanded > MAX_EXPANDED_NODES {
            return Err(Error::malformed(
                &self.graph.id,
                format!(
                    "expression exceeds {} leaves after expanding shared nodes",
                    MAX_EXPANDED_NODES
                ),
            ));
        }
        Ok(())
    }
}

impl DecisionGraph {
    /// Validate the arena and build the decision
    pub fn build(&self, max_conditions: usize) -> Result<Decision> {
        let mut condition_index = HashMap::new();
        for (i, decl) in self.conditions.iter().enumerate() {
            if condition_index.insert(decl.id.as_str(), i).is_some() {
                return Err(Error::malformed(
                    &self.id,
                    format!("condition '{}' declared twice", decl.id),
                ));
            }
        }

        let mut expander = Expander {
            graph: self,
            condition_index,
            marks: vec![Mark::Unvisited; self.nodes.len()],
            built: vec![None; self.nodes.len()],
            expanded: 0,
        };
        let root = expander.expand(self.root)?;

        let conditions = self
            .conditions
            .iter()
            .map(|decl| Condition {
                id: decl.id.clone(),
                text: decl.text.clone(),
            })
            .collect();

        let decision = Decision::new(self.id.clone(), conditions, root, max_conditions)?;
        Ok(match &self.location {
            Some(loc) => decision.with_location(loc.clone()),
            None => decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decl(id: &str) -> ConditionDecl {
        ConditionDecl {
            id: id.into(),
            text: None,
        }
    }

    fn leaf(id: &str) -> Node {
        Node::Condition {
            condition: id.into(),
        }
    }

    fn a_and_b_or_c() -> DecisionGraph {
        DecisionGraph {
            id: "check".into(),
            location: Some("src/auth.rs:42".into()),
            conditions: vec![decl("A"), decl("B"), decl("C")],
            nodes: vec![
                Node::And {
                    operands: vec![1, 2],
                },
                leaf("A"),
                Node::Or {
                    operands: vec![3, 4],
                },
                leaf("B"),
                leaf("C"),
            ],
            root: 0,
        }
    }

    #[test]
    fn test_build_graph() {
        let d = a_and_b_or_c().build(8).unwrap();
        assert_eq!(d.expression(), "A && (B || C)");
        assert_eq!(d.location(), Some("src/auth.rs:42"));
    }

    #[test]
    fn test_graph_from_json() {
        let json = r#"{
            "id": "g",
            "conditions": [{"id": "x", "text": "x > 0"}, {"id": "y"}],
            "nodes": [
                {"op": "or", "operands": [1, 2]},
                {"op": "condition", "condition": "x"},
                {"op": "not", "operand": 3},
                {"op": "condition", "condition": "y"}
            ],
            "root": 0
        }"#;
        let graph: DecisionGraph = serde_json::from_str(json).unwrap();
        let d = graph.build(8).unwrap();
        assert_eq!(d.expression(), "x || !y");
        assert_eq!(d.conditions()[0].label(), "x > 0");
    }

    #[test]
    fn test_undefined_condition() {
        let mut graph = a_and_b_or_c();
        graph.nodes[4] = leaf("D");
        let err = graph.build(8).unwrap_err();
        assert!(err.to_string().contains("undefined condition 'D'"));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = a_and_b_or_c();
        graph.nodes[2] = Node::Or {
            operands: vec![3, 0],
        };
        let err = graph.build(8).unwrap_err();
        assert!(matches!(err, Error::MalformedDecision { .. }));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_dangling_index() {
        let mut graph = a_and_b_or_c();
        graph.root = 17;
        assert!(matches!(
            graph.build(8),
            Err(Error::MalformedDecision { .. })
        ));
    }

    #[test]
    fn test_shared_subexpression_expanded() {
        // (A || B) && !(A || B) with the OR node shared
        let graph = DecisionGraph {
            id: "shared".into(),
            location: None,
            conditions: vec![decl("A"), decl("B")],
            nodes: vec![
                Node::And {
                    operands: vec![1, 4],
                },
                Node::Or {
                    operands: vec![2, 3],
                },
                leaf("A"),
                leaf("B"),
                Node::Not { operand: 1 },
            ],
            root: 0,
        };
        let d = graph.build(8).unwrap();
        assert_eq!(d.condition_count(), 2);
        assert_eq!(d.expression(), "(A || B) && !(A || B)");
    }

    #[test]
    fn test_cel_input_form() {
        let input: DecisionInput =
            serde_norway::from_str("id: c\nexpression: \"a && !b\"\nlocation: lib.rs:3\n").unwrap();
        let d = input.build(8).unwrap();
        assert_eq!(input.id(), "c");
        assert_eq!(d.expression(), "a && !b");
        assert_eq!(d.location(), Some("lib.rs:3"));
    }

    #[test]
    fn test_cel_input_rejects_unknown_fields() {
        let typo = serde_norway::from_str::<DecisionInput>("id: c\nexpression: a\nlocaton: lib.rs:3\n");
        assert!(typo.is_err());

        let json = serde_json::from_str::<DecisionInput>(r#"{"id": "c", "expression": "a", "line": 3}"#);
        assert!(json.is_err());
    }
}
