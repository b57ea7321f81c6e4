//! The expression language
//!
//! Ships the built-in line grammar and the default arithmetic operator
//! set, and wires grammar, engine and reducer into a one-call
//! interpreter for a line of input.

use std::fmt;

use once_cell::sync::Lazy;

use crate::grammar::compiler::{compile, CompilerOptions};
use crate::grammar::rule::CompiledGrammar;
use crate::parsing::engine::{self, EngineFault, Parse};
use crate::parsing::tree::SyntaxTree;
use crate::reduce::ops::{ApplyError, ApplyFn, Assoc, Op, OpCategory, OpTable, JUXTAPOSE};
use crate::reduce::reducer::{reduce_sequence, Reduced, ReduceError};
use crate::reduce::value::Value;

/// Grammar of one input line: numbers, names, operators, parenthesized
/// subexpressions and bracketed lists, with juxtaposition handled later
/// by the reducer. `SEQ` and `LIST` wrappers always survive shaping;
/// `NUM` refines to `NUM:INT` / `NUM:REAL`.
pub const EXPR_GRAMMAR: &str = r#"
## line grammar for the expression language
SPACE := /[ \t]*/
%SEP<$X $D> := ($X ($D! $X)*)?

LINE := SEQ
SEQ := TERM+
TERM := OP | ATOM
ATOM := NUM | NAME | PAREN | LIST
PAREN := "(" SEQ ")"
LIST := "[" %SEP<SEQ ","> "]"
NUM := REAL | INT
REAL := /\d+\.\d+/ EXPO/?
INT := /\d+/
EXPO := /[eE][+-]?\d+/
OP := [-+*/^!]
NAME := /[A-Za-z_][A-Za-z0-9_]*/
"#;

pub const START_RULE: &str = "LINE";

static GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| {
    let options = CompilerOptions::new()
        .keep(&["SEQ", "LIST"])
        .refine(&["NUM"]);
    compile(EXPR_GRAMMAR, options).expect("builtin grammar must compile")
});

pub fn expr_grammar() -> &'static CompiledGrammar {
    &GRAMMAR
}

static OPS: Lazy<OpTable> = Lazy::new(build_ops);

/// The default arithmetic operators. Juxtaposition multiplies and sits
/// between `*` and `^`, so `2x^2` reads as `2*(x^2)`.
pub fn default_ops() -> &'static OpTable {
    &OPS
}

fn build_ops() -> OpTable {
    let mut t = OpTable::new();
    let binary = |symbol: &str, priority: u32, assoc: Assoc, apply: ApplyFn| Op {
        symbol: symbol.to_string(),
        category: OpCategory::Binary,
        priority,
        assoc,
        apply,
    };
    t.register(binary("+", 5, Assoc::Left, add));
    t.register(binary("-", 5, Assoc::Left, sub));
    t.register(binary("*", 6, Assoc::Left, mul));
    t.register(binary("/", 6, Assoc::Left, div));
    t.register(binary(JUXTAPOSE, 7, Assoc::Left, mul));
    t.register(binary("^", 8, Assoc::Right, pow));
    t.register(Op {
        symbol: "-".to_string(),
        category: OpCategory::UnaryPrefix,
        priority: 9,
        assoc: Assoc::Right,
        apply: neg,
    });
    t.register(Op {
        symbol: "+".to_string(),
        category: OpCategory::UnaryPrefix,
        priority: 9,
        assoc: Assoc::Right,
        apply: pos,
    });
    t.register(Op {
        symbol: "!".to_string(),
        category: OpCategory::UnarySuffix,
        priority: 10,
        assoc: Assoc::Left,
        apply: factorial,
    });
    t
}

fn both_real(a: &Value, b: &Value) -> Result<(f64, f64), ApplyError> {
    match (a.as_real(), b.as_real()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ApplyError::new("expected numbers")),
    }
}

fn add(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [Value::Int(a), Value::Int(b)] => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| ApplyError::new("integer overflow")),
        [Value::Str(a), Value::Str(b)] => Ok(Value::Str(format!("{}{}", a, b))),
        [a, b] => both_real(a, b).map(|(x, y)| Value::Real(x + y)),
        _ => Err(ApplyError::new("expected two operands")),
    }
}

fn sub(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [Value::Int(a), Value::Int(b)] => a
            .checked_sub(*b)
            .map(Value::Int)
            .ok_or_else(|| ApplyError::new("integer overflow")),
        [a, b] => both_real(a, b).map(|(x, y)| Value::Real(x - y)),
        _ => Err(ApplyError::new("expected two operands")),
    }
}

fn mul(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [Value::Int(a), Value::Int(b)] => a
            .checked_mul(*b)
            .map(Value::Int)
            .ok_or_else(|| ApplyError::new("integer overflow")),
        [a, b] => both_real(a, b).map(|(x, y)| Value::Real(x * y)),
        _ => Err(ApplyError::new("expected two operands")),
    }
}

fn div(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [Value::Int(a), Value::Int(b)] => {
            if *b == 0 {
                return Err(ApplyError::new("division by zero"));
            }
            // i64::MIN / -1 overflows even though b is non-zero
            match (a.checked_rem(*b), a.checked_div(*b)) {
                (Some(0), Some(q)) => Ok(Value::Int(q)),
                (Some(_), Some(_)) => Ok(Value::Real(*a as f64 / *b as f64)),
                _ => Err(ApplyError::new("integer overflow")),
            }
        }
        [a, b] => {
            let (x, y) = both_real(a, b)?;
            if y == 0.0 {
                Err(ApplyError::new("division by zero"))
            } else {
                Ok(Value::Real(x / y))
            }
        }
        _ => Err(ApplyError::new("expected two operands")),
    }
}

fn pow(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [Value::Int(a), Value::Int(b)] if (0..=u32::MAX as i64).contains(b) => a
            .checked_pow(*b as u32)
            .map(Value::Int)
            .ok_or_else(|| ApplyError::new("integer overflow")),
        [a, b] => both_real(a, b).map(|(x, y)| Value::Real(x.powf(y))),
        _ => Err(ApplyError::new("expected two operands")),
    }
}

fn neg(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [Value::Int(a)] => a
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ApplyError::new("integer overflow")),
        [Value::Real(r)] => Ok(Value::Real(-r)),
        _ => Err(ApplyError::new("expected a number")),
    }
}

fn pos(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [v @ Value::Int(_)] | [v @ Value::Real(_)] => Ok(v.clone()),
        _ => Err(ApplyError::new("expected a number")),
    }
}

fn factorial(args: &[Value]) -> Result<Value, ApplyError> {
    match args {
        [Value::Int(n)] if (0..=20).contains(n) => {
            Ok(Value::Int((1..=*n).product::<i64>()))
        }
        [Value::Int(_)] => Err(ApplyError::new("factorial out of range")),
        _ => Err(ApplyError::new("expected a small non-negative integer")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Empty,
    Value(Value),
    Deferred(SyntaxTree),
    SyntaxError { remainder: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Empty => Ok(()),
            Outcome::Value(v) => write!(f, "{}", v),
            Outcome::Deferred(t) => write!(f, "{}", t),
            Outcome::SyntaxError { remainder } => {
                write!(f, "syntax error at '{}'", remainder.trim())
            }
        }
    }
}

#[derive(Debug)]
pub enum LangError {
    Engine(EngineFault),
    Reduce(ReduceError),
}

impl fmt::Display for LangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LangError::Engine(e) => write!(f, "{}", e),
            LangError::Reduce(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LangError {}

impl From<EngineFault> for LangError {
    fn from(e: EngineFault) -> Self {
        LangError::Engine(e)
    }
}

impl From<ReduceError> for LangError {
    fn from(e: ReduceError) -> Self {
        LangError::Reduce(e)
    }
}

/// Parse one line with the built-in grammar and reduce it with the
/// given operator table.
pub fn interpret_line_with(text: &str, ops: &OpTable) -> Result<Outcome, LangError> {
    if text.trim().is_empty() {
        return Ok(Outcome::Empty);
    }
    match engine::parse(expr_grammar(), START_RULE, text)? {
        Parse::NoMatch => Ok(Outcome::SyntaxError {
            remainder: text.to_string(),
        }),
        Parse::Match { tree, remainder } => {
            if !remainder.trim().is_empty() {
                return Ok(Outcome::SyntaxError { remainder });
            }
            match reduce_sequence(&tree, ops)? {
                Reduced::Value(v) => Ok(Outcome::Value(v)),
                Reduced::Deferred(t) => Ok(Outcome::Deferred(t)),
            }
        }
    }
}

/// `interpret_line_with` over the default operators.
pub fn interpret_line(text: &str) -> Result<Outcome, LangError> {
    interpret_line_with(text, default_ops())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_grammar_compiles() {
        let g = expr_grammar();
        assert!(g.contains("LINE"));
        assert!(g.contains("LIST"));
        assert!(!g.contains("SPACE"));
    }

    #[test]
    fn arithmetic_lines_evaluate() {
        assert_eq!(
            interpret_line("2 + 3 * 4").unwrap(),
            Outcome::Value(Value::Int(14))
        );
        assert_eq!(
            interpret_line("8 - 3 - 2").unwrap(),
            Outcome::Value(Value::Int(3))
        );
        assert_eq!(
            interpret_line("2 ^ 3 ^ 2").unwrap(),
            Outcome::Value(Value::Int(512))
        );
        assert_eq!(
            interpret_line("5!").unwrap(),
            Outcome::Value(Value::Int(120))
        );
    }

    #[test]
    fn integer_division_falls_back_to_real() {
        assert_eq!(
            interpret_line("7 / 2").unwrap(),
            Outcome::Value(Value::Real(3.5))
        );
        assert_eq!(
            interpret_line("8 / 2").unwrap(),
            Outcome::Value(Value::Int(4))
        );
    }

    #[test]
    fn juxtaposition_multiplies() {
        assert_eq!(
            interpret_line("2 (3 + 4)").unwrap(),
            Outcome::Value(Value::Int(14))
        );
    }

    #[test]
    fn free_names_defer() {
        match interpret_line("2 x + 1").unwrap() {
            Outcome::Deferred(t) => {
                assert!(t.is_tagged("APPLY"));
                assert_eq!(t.children()[0].as_leaf(), Some("+"));
            }
            other => panic!("expected deferred, got {:?}", other),
        }
    }

    #[test]
    fn blank_and_broken_lines() {
        assert_eq!(interpret_line("   ").unwrap(), Outcome::Empty);
        // `+` also names a prefix operator, `*` does not
        assert_eq!(
            interpret_line("2 + + 3").unwrap(),
            Outcome::Value(Value::Int(5))
        );
        assert!(matches!(
            interpret_line("2 + * 3"),
            Err(LangError::Reduce(ReduceError::MalformedSequence(_)))
        ));
        assert!(matches!(
            interpret_line("2 +"),
            Err(LangError::Reduce(ReduceError::MalformedSequence(_)))
        ));
    }
}
