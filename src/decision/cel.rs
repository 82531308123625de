//! CEL front-end for decisions
//!
//! `&&`, `||` and `!` become the decision tree. Everything else that yields
//! a boolean (identifiers, member paths, comparisons, function calls) is an
//! atomic condition named by its rendered text. Repeated atoms map to the
//! same condition.

use super::{Condition, Decision, Expr};
use crate::error::{Error, Result};
use cel_parser::ast::{operators, CallExpr, Expr as CelAst};
use cel_parser::reference::Val;
use cel_parser::{Expression as CelExpr, Parser};

pub(super) fn decision_from_cel(id: String, text: &str, max_conditions: usize) -> Result<Decision> {
    let ast = Parser::new()
        .parse(text)
        .map_err(|e| Error::CelParse(format!("{}: {:?}", text, e)))?;

    let mut conditions: Vec<Condition> = Vec::new();
    let root = lower(&ast, &id, &mut conditions)?;
    Decision::new(id, conditions, root, max_conditions)
}

fn lower(expr: &CelExpr, decision: &str, conditions: &mut Vec<Condition>) -> Result<Expr> {
    if let CelAst::Call(call) = &expr.expr {
        if call.func_name == operators::LOGICAL_AND || call.func_name == operators::LOGICAL_OR {
            let is_and = call.func_name == operators::LOGICAL_AND;
            let mut operands = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                match lower(arg, decision, conditions)? {
                    // Flatten `a && b && c` into one n-ary node
                    Expr::And(inner) if is_and => operands.extend(inner),
                    Expr::Or(inner) if !is_and => operands.extend(inner),
                    other => operands.push(other),
                }
            }
            return Ok(if is_and {
                Expr::And(operands)
            } else {
                Expr::Or(operands)
            });
        }
        if call.func_name == operators::LOGICAL_NOT {
            let inner = call
                .args
                .first()
                .ok_or_else(|| Error::malformed(decision, "'!' without operand"))?;
            return Ok(Expr::Not(Box::new(lower(inner, decision, conditions)?)));
        }
    }

    if let CelAst::Literal(_) = &expr.expr {
        return Err(Error::malformed(
            decision,
            "constant operands are not conditions",
        ));
    }

    let atom = render(expr).ok_or_else(|| {
        Error::malformed(decision, "unsupported sub-expression in decision")
    })?;
    if atom == "true" || atom == "false" {
        return Err(Error::malformed(
            decision,
            "constant operands are not conditions",
        ));
    }

    let index = match conditions.iter().position(|c| c.id == atom) {
        Some(i) => i,
        None => {
            conditions.push(Condition::new(atom));
            conditions.len() - 1
        }
    };
    Ok(Expr::Condition(index))
}

/// Render an atomic sub-expression back to source-like text
fn render(expr: &CelExpr) -> Option<String> {
    match &expr.expr {
        CelAst::Ident(name) => Some(name.to_string()),
        CelAst::Select(select) => {
            let base = render(&select.operand)?;
            Some(format!("{}.{}", base, select.field))
        }
        CelAst::Literal(val) => render_literal(val),
        CelAst::List(list) => {
            let items = list
                .elements
                .iter()
                .map(render)
                .collect::<Option<Vec<_>>>()?;
            Some(format!("[{}]", items.join(", ")))
        }
        CelAst::Call(call) => render_call(call),
        _ => None,
    }
}

fn render_call(call: &CallExpr) -> Option<String> {
    if let Some(symbol) = infix_symbol(&call.func_name) {
        if call.args.len() == 2 {
            let left = render(&call.args[0])?;
            let right = render(&call.args[1])?;
            return Some(format!("{} {} {}", left, symbol, right));
        }
        return None;
    }
    if call.func_name == operators::LOGICAL_NOT && call.args.len() == 1 {
        return Some(format!("!{}", render(&call.args[0])?));
    }

    let args = call
        .args
        .iter()
        .map(render)
        .collect::<Option<Vec<_>>>()?;
    match &call.target {
        Some(target) => Some(format!(
            "{}.{}({})",
            render(target)?,
            call.func_name,
            args.join(", ")
        )),
        None => Some(format!("{}({})", call.func_name, args.join(", "))),
    }
}

fn infix_symbol(func_name: &str) -> Option<&'static str> {
    let symbol = match func_name {
        f if f == operators::EQUALS => "==",
        f if f == operators::NOT_EQUALS => "!=",
        f if f == operators::LESS => "<",
        f if f == operators::LESS_EQUALS => "<=",
        f if f == operators::GREATER => ">",
        f if f == operators::GREATER_EQUALS => ">=",
        f if f == operators::IN => "in",
        _ => return None,
    };
    Some(symbol)
}

fn render_literal(val: &Val) -> Option<String> {
    match val {
        Val::Int(i) => Some(i.to_string()),
        Val::UInt(u) => Some(format!("{}u", u)),
        Val::Double(f) => Some(f.to_string()),
        Val::String(s) => Some(format!("\"{}\"", s)),
        Val::Boolean(b) => Some(b.to_string()),
        Val::Null => Some("null".to_string()),
        _ => None,
    }
}
