//! Operator-sequence reduction
//!
//! Turns a flat `SEQ` node — operands and `OP` nodes in source order —
//! into either a concrete `Value` or a deferred application tree,
//! honoring operator priority and associativity with a two-stack
//! climb. An application whose operands are not all concrete becomes an
//! `APPLY` node; re-running the reducer on such a node after the
//! evaluator has substituted concrete operands finishes the job.

use std::fmt;

use crate::parsing::tree::SyntaxTree;
use crate::reduce::ops::{Assoc, Op, OpCategory, OpTable};
use crate::reduce::value::Value;

pub const SEQ_TAG: &str = "SEQ";
pub const OP_TAG: &str = "OP";
pub const APPLY_TAG: &str = "APPLY";

#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    Value(Value),
    Deferred(SyntaxTree),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReduceError {
    MalformedSequence(String),
    UnknownOperator(String),
    Apply { op: String, message: String },
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceError::MalformedSequence(msg) => write!(f, "malformed sequence: {}", msg),
            ReduceError::UnknownOperator(sym) => write!(f, "unknown operator '{}'", sym),
            ReduceError::Apply { op, message } => {
                write!(f, "cannot apply '{}': {}", op, message)
            }
        }
    }
}

impl std::error::Error for ReduceError {}

fn malformed(msg: impl Into<String>) -> ReduceError {
    ReduceError::MalformedSequence(msg.into())
}

/// An operand on the value stack: already concrete, or still a tree.
#[derive(Debug, Clone)]
enum Operand {
    Value(Value),
    Tree(SyntaxTree),
}

impl Operand {
    fn into_tree(self) -> SyntaxTree {
        match self {
            Operand::Value(v) => v.to_tree(),
            Operand::Tree(t) => t,
        }
    }
}

/// Reduce a `SEQ` node (or re-reduce an `APPLY` node) against an
/// operator table.
pub fn reduce_sequence(node: &SyntaxTree, ops: &OpTable) -> Result<Reduced, ReduceError> {
    match reduce_node(node, ops)? {
        Operand::Value(v) => Ok(Reduced::Value(v)),
        Operand::Tree(t) => Ok(Reduced::Deferred(t)),
    }
}

fn reduce_node(node: &SyntaxTree, ops: &OpTable) -> Result<Operand, ReduceError> {
    if node.is_tagged(APPLY_TAG) {
        return reduce_apply(node, ops);
    }
    if !node.is_tagged(SEQ_TAG) {
        return Err(malformed(format!(
            "expected a {} node, found {}",
            SEQ_TAG, node
        )));
    }

    let mut values: Vec<Operand> = Vec::new();
    let mut pending: Vec<Op> = Vec::new();
    let mut have_operand = false;

    for child in node.children() {
        match op_symbol(child) {
            Some(sym) if have_operand => {
                // After an operand a binary symbol shunts; a suffix-only
                // symbol applies to the operand on the spot.
                if let Some(op) = ops.binary(sym).cloned() {
                    shunt(&mut values, &mut pending, op)?;
                    have_operand = false;
                } else if let Some(op) = ops.suffix(sym) {
                    let arg = values
                        .pop()
                        .ok_or_else(|| malformed(format!("'{}' without operand", sym)))?;
                    let result = combine(op, vec![arg])?;
                    values.push(result);
                } else {
                    return Err(ReduceError::UnknownOperator(sym.to_string()));
                }
            }
            Some(sym) => {
                // Operand position: only a unary prefix fits here.
                let op = ops.prefix(sym).cloned().ok_or_else(|| {
                    malformed(format!("operator '{}' where an operand was expected", sym))
                })?;
                pending.push(op);
            }
            None => {
                if have_operand {
                    let juxt = ops
                        .juxtaposition()
                        .cloned()
                        .ok_or_else(|| malformed("adjacent operands with no operator"))?;
                    shunt(&mut values, &mut pending, juxt)?;
                }
                values.push(operand_of(child, ops)?);
                have_operand = true;
            }
        }
    }

    if !have_operand {
        return Err(malformed("sequence ends on an operator"));
    }
    while let Some(op) = pending.pop() {
        reduce_top(&mut values, &op)?;
    }
    match (values.pop(), values.is_empty()) {
        (Some(result), true) => Ok(result),
        _ => Err(malformed("leftover operands")),
    }
}

/// Push `incoming`, first reducing every pending operator that binds at
/// least as tightly (strictly tighter for right-associative ties).
fn shunt(values: &mut Vec<Operand>, pending: &mut Vec<Op>, incoming: Op) -> Result<(), ReduceError> {
    while let Some(top) = pending.last() {
        let reduce_now = incoming.priority < top.priority
            || (incoming.priority == top.priority && incoming.assoc == Assoc::Left);
        if !reduce_now {
            break;
        }
        let op = pending.pop().unwrap_or_else(|| unreachable!());
        reduce_top(values, &op)?;
    }
    pending.push(incoming);
    Ok(())
}

fn reduce_top(values: &mut Vec<Operand>, op: &Op) -> Result<(), ReduceError> {
    let arity = match op.category {
        OpCategory::Binary => 2,
        OpCategory::UnaryPrefix | OpCategory::UnarySuffix => 1,
    };
    if values.len() < arity {
        return Err(malformed(format!("'{}' is missing operands", op.symbol)));
    }
    let args = values.split_off(values.len() - arity);
    let result = combine(op, args)?;
    values.push(result);
    Ok(())
}

/// Apply an operator if every argument is concrete, otherwise build a
/// deferred `APPLY` node. Runs of the same binary operator fold into one
/// n-ary node.
fn combine(op: &Op, args: Vec<Operand>) -> Result<Operand, ReduceError> {
    if args.iter().all(|a| matches!(a, Operand::Value(_))) {
        let concrete: Vec<Value> = args
            .into_iter()
            .map(|a| match a {
                Operand::Value(v) => v,
                Operand::Tree(_) => unreachable!(),
            })
            .collect();
        let value = (op.apply)(&concrete).map_err(|e| ReduceError::Apply {
            op: op.symbol.clone(),
            message: e.message,
        })?;
        return Ok(Operand::Value(value));
    }

    let subtag = match op.category {
        OpCategory::Binary => "BIN",
        OpCategory::UnaryPrefix => "PRE",
        OpCategory::UnarySuffix => "SUF",
    };
    let mut children = vec![SyntaxTree::leaf(op.symbol.clone())];
    let mut args = args.into_iter();
    if op.category == OpCategory::Binary {
        let left = args
            .next()
            .unwrap_or_else(|| unreachable!())
            .into_tree();
        if is_same_apply(&left, &op.symbol, subtag) {
            children.extend(left.children()[1..].iter().cloned());
        } else {
            children.push(left);
        }
    }
    children.extend(args.map(Operand::into_tree));
    Ok(Operand::Tree(SyntaxTree::refined(
        APPLY_TAG, subtag, children,
    )))
}

fn is_same_apply(tree: &SyntaxTree, symbol: &str, subtag: &str) -> bool {
    tree.is_tagged(APPLY_TAG)
        && tree.subtag() == Some(subtag)
        && tree.children().first().and_then(SyntaxTree::as_leaf) == Some(symbol)
}

/// Re-reduce a deferred application, typically after the evaluator has
/// replaced symbolic operands with literal nodes.
fn reduce_apply(node: &SyntaxTree, ops: &OpTable) -> Result<Operand, ReduceError> {
    let children = node.children();
    let symbol = children
        .first()
        .and_then(SyntaxTree::as_leaf)
        .ok_or_else(|| malformed("application without an operator symbol"))?;
    let op = match node.subtag() {
        Some("PRE") => ops.prefix(symbol),
        Some("SUF") => ops.suffix(symbol),
        _ => ops.binary(symbol),
    }
    .ok_or_else(|| ReduceError::UnknownOperator(symbol.to_string()))?;

    let supplied = children.len() - 1;
    match op.category {
        OpCategory::Binary => {
            if supplied < 2 {
                return Err(malformed(format!("'{}' is missing operands", symbol)));
            }
        }
        OpCategory::UnaryPrefix | OpCategory::UnarySuffix => {
            if supplied != 1 {
                return Err(malformed(format!(
                    "'{}' applies to exactly one operand, got {}",
                    symbol, supplied
                )));
            }
        }
    }

    let mut args = Vec::with_capacity(children.len() - 1);
    for child in &children[1..] {
        args.push(operand_of(child, ops)?);
    }

    if args.iter().all(|a| matches!(a, Operand::Value(_))) {
        // Fold an n-ary run left to right.
        let mut iter = args.into_iter();
        let mut acc = match iter.next() {
            Some(Operand::Value(v)) => v,
            _ => unreachable!(),
        };
        if op.category == OpCategory::Binary {
            for next in iter {
                let right = match next {
                    Operand::Value(v) => v,
                    Operand::Tree(_) => unreachable!(),
                };
                acc = (op.apply)(&[acc, right]).map_err(|e| ReduceError::Apply {
                    op: symbol.to_string(),
                    message: e.message,
                })?;
            }
        } else {
            acc = (op.apply)(&[acc]).map_err(|e| ReduceError::Apply {
                op: symbol.to_string(),
                message: e.message,
            })?;
        }
        return Ok(Operand::Value(acc));
    }

    let mut rebuilt = vec![SyntaxTree::leaf(symbol)];
    rebuilt.extend(args.into_iter().map(Operand::into_tree));
    let subtag = node.subtag().unwrap_or("BIN").to_string();
    Ok(Operand::Tree(SyntaxTree::refined(
        APPLY_TAG, subtag, rebuilt,
    )))
}

/// Lift a sequence child onto the value stack: nested sequences and
/// applications reduce recursively, literal nodes become values, and
/// anything else stays symbolic.
fn operand_of(child: &SyntaxTree, ops: &OpTable) -> Result<Operand, ReduceError> {
    if child.is_tagged(SEQ_TAG) || child.is_tagged(APPLY_TAG) {
        return reduce_node(child, ops);
    }
    Ok(match Value::from_tree(child) {
        Some(v) => Operand::Value(v),
        None => Operand::Tree(child.clone()),
    })
}

fn op_symbol(child: &SyntaxTree) -> Option<&str> {
    if child.is_tagged(OP_TAG) {
        child.children().first()?.as_leaf()
    } else {
        None
    }
}
