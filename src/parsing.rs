//! The parsing engine and the syntax trees it produces.

pub mod engine;
pub mod tree;

pub use engine::{parse, EngineFault, Parse};
pub use tree::SyntaxTree;
