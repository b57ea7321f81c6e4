//! Grammar compilation: meta-grammar bootstrap, the grammar compiler
//! with its macro facility, and the JSON artifact format.

pub mod artifact;
pub mod compiler;
pub mod meta;
pub mod pattern;
pub mod rule;

pub use compiler::{compile, CompileError, CompilerOptions, SPACE_RULE};
pub use rule::CompiledGrammar;
