//! # mex
//!
//! An interpreter core for a small expression language. Grammars are
//! written as text, compiled through a self-describing meta-grammar into
//! rule tables, and run by a memoizing backtracking engine; the flat
//! operand/operator sequences the engine produces are then reduced by
//! priority and associativity, evaluating what is concrete and deferring
//! the rest as application trees.

pub mod grammar;
pub mod lang;
pub mod parsing;
pub mod reduce;
