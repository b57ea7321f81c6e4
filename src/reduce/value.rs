//! Concrete values
//!
//! The reducer evaluates opportunistically: operands that are literal
//! number or string nodes become `Value`s immediately, everything else
//! stays a tree until the evaluator can supply bindings.

use std::fmt;

use serde::Serialize;

use crate::parsing::tree::SyntaxTree;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
}

impl Value {
    /// Read a concrete value out of a literal node, if it is one.
    pub fn from_tree(tree: &SyntaxTree) -> Option<Value> {
        match tree.tag()? {
            "NUM" => {
                let text = tree.leaf_text();
                match tree.subtag() {
                    Some("REAL") => text.parse::<f64>().ok().map(Value::Real),
                    Some("INT") | None => text.parse::<i64>().ok().map(Value::Int),
                    _ => None,
                }
            }
            "INT" => tree.leaf_text().parse::<i64>().ok().map(Value::Int),
            "REAL" => tree.leaf_text().parse::<f64>().ok().map(Value::Real),
            "STR" => Some(Value::Str(tree.leaf_text())),
            _ => None,
        }
    }

    /// Embed the value back into a tree, for deferred applications.
    pub fn to_tree(&self) -> SyntaxTree {
        match self {
            Value::Int(_) => {
                SyntaxTree::refined("NUM", "INT", vec![SyntaxTree::leaf(self.to_string())])
            }
            Value::Real(_) => {
                SyntaxTree::refined("NUM", "REAL", vec![SyntaxTree::leaf(self.to_string())])
            }
            Value::Str(s) => SyntaxTree::node("STR", vec![SyntaxTree::leaf(s.clone())]),
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refined_num_nodes_become_values() {
        let int = SyntaxTree::refined("NUM", "INT", vec![SyntaxTree::leaf("42")]);
        assert_eq!(Value::from_tree(&int), Some(Value::Int(42)));

        let real = SyntaxTree::refined(
            "NUM",
            "REAL",
            vec![
                SyntaxTree::leaf("1.5"),
                SyntaxTree::node("EXPO", vec![SyntaxTree::leaf("e3")]),
            ],
        );
        assert_eq!(Value::from_tree(&real), Some(Value::Real(1500.0)));
    }

    #[test]
    fn name_nodes_are_not_values() {
        let name = SyntaxTree::node("NAME", vec![SyntaxTree::leaf("x")]);
        assert_eq!(Value::from_tree(&name), None);
    }

    #[test]
    fn value_tree_roundtrip() {
        for v in [Value::Int(-3), Value::Real(2.5)] {
            assert_eq!(Value::from_tree(&v.to_tree()), Some(v));
        }
    }
}
